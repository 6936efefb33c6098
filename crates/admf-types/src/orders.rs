use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::Symbol;

/// Unique order identifier.
pub type OrderId = Uuid;
/// Unique fill identifier.
pub type FillId = Uuid;

/// Side of an order. Direction lives here, not in quantity's sign —
/// quantity is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for Buy, -1 for Sell.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    /// The side that would establish a position in the given direction.
    pub fn from_direction(direction: i32) -> Option<Side> {
        match direction.signum() {
            1 => Some(Side::Buy),
            -1 => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Whether an order opens new exposure or closes existing exposure. The
/// Risk Manager emits CLOSE orders ahead of OPEN orders on a direction flip
/// (§4.4); the distinction is carried on the order itself so downstream
/// consumers (the Broker, reporting) don't have to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Open,
    Close,
}

/// Order types the Broker knows how to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit { limit_price: Decimal },
    Stop { stop_price: Decimal },
}

impl OrderType {
    pub fn limit_price(&self) -> Option<Decimal> {
        match self {
            OrderType::Limit { limit_price } => Some(*limit_price),
            OrderType::Stop { stop_price } => Some(*stop_price),
            OrderType::Market => None,
        }
    }
}

/// `CREATED -> PENDING -> {PARTIAL -> FILLED, FILLED, REJECTED, CANCELED}`.
/// FILLED, REJECTED, CANCELED are terminal. PARTIAL may re-enter itself with
/// increasing filled quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Pending,
    Partial,
    Filled,
    Rejected,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Rejected | OrderStatus::Canceled
        )
    }

    /// Whether `self -> next` is a legal transition per the state machine.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, Pending)
                | (Pending, Partial)
                | (Pending, Filled)
                | (Pending, Rejected)
                | (Pending, Canceled)
                | (Partial, Partial)
                | (Partial, Filled)
                | (Partial, Canceled)
        )
    }
}

/// A broker-bound instruction with a positive quantity and a side, tracked
/// by the Order Registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub filled_quantity: u64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_ts: DateTime<Utc>,
    pub rule_id: String,
    pub action_type: ActionType,
    pub average_fill_price: Option<Decimal>,
}

impl Order {
    pub fn new(
        symbol: Symbol,
        side: Side,
        quantity: u64,
        order_type: OrderType,
        created_ts: DateTime<Utc>,
        rule_id: String,
        action_type: ActionType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            side,
            quantity,
            filled_quantity: 0,
            order_type,
            status: OrderStatus::Created,
            created_ts,
            rule_id,
            action_type,
            average_fill_price: None,
        }
    }

    pub fn remaining_quantity(&self) -> u64 {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Validate the fields the Order Registry requires before registration:
    /// non-empty symbol, positive quantity, and a price on limit/stop orders.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.as_str().is_empty() {
            return Err("order symbol must not be empty".into());
        }
        if self.quantity == 0 {
            return Err("order quantity must be positive".into());
        }
        if matches!(self.order_type, OrderType::Limit { .. } | OrderType::Stop { .. })
            && self.order_type.limit_price().is_none()
        {
            return Err("limit/stop orders must carry a price".into());
        }
        Ok(())
    }

    /// Apply a fill's quantity/price to this order's running average,
    /// updating `status` to Partial or Filled.
    pub fn apply_fill(&mut self, quantity: u64, price: Decimal) {
        let total_filled = self.filled_quantity + quantity;
        self.average_fill_price = Some(match self.average_fill_price {
            Some(avg) => {
                (avg * Decimal::from(self.filled_quantity) + price * Decimal::from(quantity))
                    / Decimal::from(total_filled)
            }
            None => price,
        });
        self.filled_quantity = total_filled;
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
    }
}

/// Confirmation of partial or full execution of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: FillId,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub commission: Decimal,
    pub rule_id: String,
}

impl Fill {
    pub fn new(
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        quantity: u64,
        price: Decimal,
        timestamp: DateTime<Utc>,
        commission: Decimal,
        rule_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            symbol,
            side,
            quantity,
            price,
            timestamp,
            commission,
            rule_id,
        }
    }

    pub fn gross_amount(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }

    /// Cash impact of this fill: negative for a buy, positive for a sell,
    /// net of commission.
    pub fn cash_impact(&self) -> Decimal {
        match self.side {
            Side::Buy => -(self.gross_amount() + self.commission),
            Side::Sell => self.gross_amount() - self.commission,
        }
    }
}
