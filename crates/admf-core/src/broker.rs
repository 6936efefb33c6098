//! Registers orders and simulates fills against bar data (§4.4 state
//! machine ownership, §4.5 execution model).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;

use admf_types::backtest::{BrokerConfig, FillModel};
use admf_types::errors::GbResult;
use admf_types::event::{Event, EventPayload};
use admf_types::market::{Bar, Symbol};
use admf_types::orders::{Fill, Order, OrderId, OrderStatus, OrderType, Side};

use crate::commission::compute_commission;
use crate::order_registry::OrderRegistry;
use crate::slippage::{apply_slippage, SlippageContext};

/// Owns the order state machine and simulates execution. Named as one
/// component in the spec (§3's "Order Registry + Broker") because nothing
/// else needs to mutate order state — the Risk Manager and Portfolio only
/// ever read orders/fills by identifier.
pub struct Broker {
    registry: OrderRegistry,
    config: BrokerConfig,
    last_bar: HashMap<Symbol, Bar>,
    pending_open: HashMap<Symbol, Vec<OrderId>>,
    rng: StdRng,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            registry: OrderRegistry::new(),
            config,
            last_bar: HashMap::new(),
            pending_open: HashMap::new(),
            rng: StdRng::seed_from_u64(42),
        }
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    /// Handles ORDER: registers the order, then either fills it immediately
    /// (CurrentClose) or queues it for the next bar's open (NextOpen).
    pub fn on_order(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let EventPayload::Order(order) = &event.payload else {
            return Ok(vec![]);
        };
        let symbol = order.symbol.clone();
        let timestamp = order.created_ts;
        let order_id = order.id;

        let mut out = vec![self.registry.register(order.clone())?];

        match self.config.fill_model {
            FillModel::CurrentClose => {
                if let Some(bar) = self.last_bar.get(&symbol).cloned() {
                    out.extend(self.try_fill(order_id, bar.close, bar.high, bar.low, timestamp)?);
                } else {
                    self.pending_open.entry(symbol).or_default().push(order_id);
                }
            }
            FillModel::NextOpen => {
                self.pending_open.entry(symbol).or_default().push(order_id);
            }
        }

        Ok(out)
    }

    /// Handles BAR: records the bar as this symbol's latest, then fills any
    /// orders that were queued on a previous bar (NextOpen semantics — an
    /// order created from this same bar's signal is queued afterward by
    /// `on_order`, not filled against this bar, avoiding lookahead).
    pub fn on_bar(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let EventPayload::Bar(bar) = &event.payload else {
            return Ok(vec![]);
        };

        let mut out = Vec::new();
        if let Some(queued) = self.pending_open.remove(&bar.symbol) {
            for order_id in queued {
                let reference = match self.config.fill_model {
                    FillModel::NextOpen => bar.open,
                    FillModel::CurrentClose => bar.close,
                };
                out.extend(self.try_fill(order_id, reference, bar.high, bar.low, bar.timestamp)?);
            }
        }
        self.last_bar.insert(bar.symbol.clone(), bar.clone());
        Ok(out)
    }

    /// `reference_price` is the MARKET fill price (the bar's open or close,
    /// depending on `FillModel`); LIMIT/STOP orders ignore it and instead
    /// trigger off whether `[low, high]` crossed their trigger price,
    /// filling at that trigger price rather than the open/close (§4.5).
    fn try_fill(
        &mut self,
        order_id: OrderId,
        reference_price: Decimal,
        high: Decimal,
        low: Decimal,
        timestamp: DateTime<Utc>,
    ) -> GbResult<Vec<Event>> {
        let Some(order) = self.registry.get(order_id) else {
            return Ok(vec![]);
        };

        let Some(fill_price) = condition_met(&order.order_type, order.side, reference_price, high, low) else {
            // Limit/stop condition not met yet; stays pending for the next bar.
            let symbol = order.symbol.clone();
            self.pending_open.entry(symbol).or_default().push(order_id);
            return Ok(vec![]);
        };

        let quantity = order.remaining_quantity();
        let side = order.side;
        let symbol = order.symbol.clone();
        let rule_id = order.rule_id.clone();

        let mut slip_ctx = SlippageContext {
            side,
            reference_price: fill_price,
            quantity,
            realized_vol: Decimal::ZERO,
            rng: &mut self.rng,
        };
        let executed_price = apply_slippage(&self.config.slippage, &mut slip_ctx);
        let commission = compute_commission(&self.config.commission, quantity, executed_price);

        self.registry.apply_fill(order_id, quantity, executed_price)?;
        let new_status = self.registry.get(order_id).map_or(OrderStatus::Filled, |o| o.status);

        let mut out = vec![Event::order_state_change(
            admf_types::event::OrderStateChange {
                order_id,
                from: Some(OrderStatus::Pending),
                to: new_status,
            },
            timestamp,
        )];

        let fill = Fill::new(
            order_id,
            symbol,
            side,
            quantity,
            executed_price,
            timestamp,
            commission,
            rule_id,
        );
        out.push(Event::fill(fill));

        Ok(out)
    }

    pub fn all_orders(&self) -> Vec<Order> {
        self.registry.all_orders()
    }

    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.registry.reset();
        self.last_bar.clear();
        self.pending_open.clear();
        self.rng = StdRng::seed_from_u64(42);
    }
}

/// Whether `order_type` is satisfied against this bar, and at what price it
/// executes. Market orders always execute at `reference_price` (the bar's
/// open or close). Limit/Stop orders trigger off the bar's full `[low,
/// high]` range, not just `reference_price` — an intrabar touch fills them
/// even when the open and close both stayed on the safe side of the trigger
/// — and execute at the limit/stop price itself, not wherever the bar ended
/// up (§4.5).
fn condition_met(order_type: &OrderType, side: Side, reference_price: Decimal, high: Decimal, low: Decimal) -> Option<Decimal> {
    match order_type {
        OrderType::Market => Some(reference_price),
        OrderType::Limit { limit_price } => match side {
            Side::Buy if low <= *limit_price => Some(*limit_price),
            Side::Sell if high >= *limit_price => Some(*limit_price),
            _ => None,
        },
        OrderType::Stop { stop_price } => match side {
            Side::Buy if high >= *stop_price => Some(*stop_price),
            Side::Sell if low <= *stop_price => Some(*stop_price),
            _ => None,
        },
    }
}
