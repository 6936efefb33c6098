use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::{Bar, Symbol};
use crate::orders::{Fill, Order, OrderId, OrderStatus, Side};
use crate::portfolio::Position;

/// The closed set of event type tags (§3). Carried alongside `Event::payload`
/// so the Bus can dispatch on type without matching the payload enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Bar,
    Signal,
    Order,
    Fill,
    OrderStateChange,
    PortfolioUpdate,
    BacktestStart,
    BacktestEnd,
}

/// A strategy's directional opinion keyed by a rule_id (§3). The dedup key
/// used by the Event Bus is `"signal:" + rule_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub direction: i32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
}

/// A transition recorded against one order in the Order Registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStateChange {
    pub order_id: OrderId,
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
}

/// Snapshot published after every FILL and every BAR (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioUpdate {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub equity: Decimal,
    pub positions: Vec<Position>,
    pub realized_pnl: Decimal,
}

/// The immutable, type-specific payload carried by an `Event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Bar(Bar),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
    OrderStateChange(OrderStateChange),
    PortfolioUpdate(PortfolioUpdate),
    BacktestStart,
    BacktestEnd,
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Bar(_) => EventType::Bar,
            EventPayload::Signal(_) => EventType::Signal,
            EventPayload::Order(_) => EventType::Order,
            EventPayload::Fill(_) => EventType::Fill,
            EventPayload::OrderStateChange(_) => EventType::OrderStateChange,
            EventPayload::PortfolioUpdate(_) => EventType::PortfolioUpdate,
            EventPayload::BacktestStart => EventType::BacktestStart,
            EventPayload::BacktestEnd => EventType::BacktestEnd,
        }
    }

    /// The dedup key the Event Bus computes before dispatch (§4.1). Only
    /// SIGNAL, ORDER, and FILL carry one.
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            EventPayload::Signal(s) => Some(format!("signal:{}", s.rule_id)),
            EventPayload::Order(o) => Some(format!("order:{}", o.id)),
            EventPayload::Fill(f) => Some(format!("fill:{}", f.id)),
            _ => None,
        }
    }
}

/// The universal event envelope (§3). Events are value-like after
/// construction except for `consumed`, which chained handlers mutate to
/// short-circuit later handlers within the same dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
    pub consumed: bool,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            payload,
            consumed: false,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn dedup_key(&self) -> Option<String> {
        self.payload.dedup_key()
    }

    pub fn bar(bar: Bar) -> Self {
        let ts = bar.timestamp;
        Self::new(ts, EventPayload::Bar(bar))
    }

    pub fn signal(signal: Signal) -> Self {
        let ts = signal.timestamp;
        Self::new(ts, EventPayload::Signal(signal))
    }

    pub fn order(order: Order, timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, EventPayload::Order(order))
    }

    pub fn fill(fill: Fill) -> Self {
        let ts = fill.timestamp;
        Self::new(ts, EventPayload::Fill(fill))
    }

    pub fn order_state_change(change: OrderStateChange, timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, EventPayload::OrderStateChange(change))
    }

    pub fn portfolio_update(update: PortfolioUpdate) -> Self {
        let ts = update.timestamp;
        Self::new(ts, EventPayload::PortfolioUpdate(update))
    }

    pub fn backtest_start(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, EventPayload::BacktestStart)
    }

    pub fn backtest_end(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, EventPayload::BacktestEnd)
    }
}

/// Deterministic rule_id builder shared by the Strategy Adapter and any
/// synthetic emitter (e.g. the Coordinator's EOD close injection, §4.5).
pub fn rule_id(strategy_name: &str, symbol: &Symbol, side: Side, time_bucket: &str) -> String {
    let dir_label = match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    };
    format!("{strategy_name}_{symbol}_{dir_label}_group_{time_bucket}")
}

/// Coarse discretization of a bar timestamp used in rule_id construction
/// (§4.3): `YYYYMMDD_HHMM`.
pub fn time_bucket(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d_%H%M").to_string()
}
