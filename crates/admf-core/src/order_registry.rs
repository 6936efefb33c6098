//! Tracks every order's state machine transition (§3, §4.4 state diagram).

use std::collections::HashMap;

use admf_types::errors::{GbError, GbResult};
use admf_types::event::{Event, OrderStateChange};
use admf_types::orders::{Order, OrderId, OrderStatus};

pub struct OrderRegistry {
    orders: HashMap<OrderId, Order>,
}

impl Default for OrderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
        }
    }

    /// Validates and registers a freshly created order, transitioning it
    /// `Created -> Pending`. Returns the ORDER_STATE_CHANGE event for the
    /// Broker to pick up.
    pub fn register(&mut self, mut order: Order) -> GbResult<Event> {
        order
            .validate()
            .map_err(admf_types::errors::GbError::Validation)?;

        let from = order.status;
        if !from.can_transition_to(OrderStatus::Pending) {
            return Err(GbError::StateTransition {
                order_id: order.id.to_string(),
                from: format!("{from:?}"),
                to: format!("{:?}", OrderStatus::Pending),
            });
        }
        order.status = OrderStatus::Pending;
        let timestamp = order.created_ts;
        let order_id = order.id;
        self.orders.insert(order_id, order);

        Ok(Event::order_state_change(
            OrderStateChange {
                order_id,
                from: Some(from),
                to: OrderStatus::Pending,
            },
            timestamp,
        ))
    }

    /// Validates and applies a status transition, returning the
    /// ORDER_STATE_CHANGE event on success.
    pub fn transition(&mut self, order_id: OrderId, to: OrderStatus, timestamp: chrono::DateTime<chrono::Utc>) -> GbResult<Event> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| GbError::Internal(format!("unknown order {order_id}")))?;

        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(GbError::StateTransition {
                order_id: order_id.to_string(),
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }
        order.status = to;

        Ok(Event::order_state_change(
            OrderStateChange {
                order_id,
                from: Some(from),
                to,
            },
            timestamp,
        ))
    }

    /// Applies a fill's quantity/price to the order's running average and
    /// transitions to PARTIAL or FILLED, whichever `apply_fill` resolves to.
    pub fn apply_fill(&mut self, order_id: OrderId, quantity: u64, price: rust_decimal::Decimal) -> GbResult<()> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| GbError::Internal(format!("unknown order {order_id}")))?;
        order.apply_fill(quantity, price);
        Ok(())
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn all_orders(&self) -> Vec<Order> {
        self.orders.values().cloned().collect()
    }

    pub fn active_orders_for(&self, symbol: &admf_types::market::Symbol) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| &o.symbol == symbol && o.is_active())
            .collect()
    }

    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.orders.clear();
    }
}
