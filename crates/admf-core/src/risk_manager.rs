//! Translates SIGNAL into ORDER: sizing, limits, and idempotence (§4.4).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use admf_types::backtest::SizingMethod;
use admf_types::errors::GbResult;
use admf_types::event::{Event, EventPayload};
use admf_types::market::Symbol;
use admf_types::orders::{ActionType, Order, OrderType, Side};
use admf_types::portfolio::{Portfolio, RiskLimits};

use crate::sizing::{Sizer, SizingContext};

/// Read-only view the Risk Manager needs into account state to size orders
/// and check limits. Portfolio ownership stays with the Portfolio Handler;
/// the Risk Manager only ever calls `.borrow()`, never `.borrow_mut()`.
pub type SharedPortfolio = Rc<RefCell<Portfolio>>;

pub struct RiskManager {
    portfolio: SharedPortfolio,
    sizing_method: SizingMethod,
    limits: RiskLimits,
    current_direction: HashMap<Symbol, i32>,
    processed_rule_ids: HashSet<String>,
    open_orders_by_symbol: HashMap<Symbol, admf_types::orders::OrderId>,
    orders_rejected: u64,
    signals_deduped: u64,
}

impl RiskManager {
    pub fn new(portfolio: SharedPortfolio, sizing_method: SizingMethod, limits: RiskLimits) -> Self {
        Self {
            portfolio,
            sizing_method,
            limits,
            current_direction: HashMap::new(),
            processed_rule_ids: HashSet::new(),
            open_orders_by_symbol: HashMap::new(),
            orders_rejected: 0,
            signals_deduped: 0,
        }
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected
    }

    pub fn signals_deduped(&self) -> u64 {
        self.signals_deduped
    }

    /// §4.4 algorithm, steps 1-7.
    pub fn on_signal(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let EventPayload::Signal(signal) = &event.payload else {
            return Ok(vec![]);
        };

        // Step 1-2: dedup (second line of defense after the Bus).
        if self.processed_rule_ids.contains(&signal.rule_id) {
            self.signals_deduped += 1;
            return Ok(vec![]);
        }
        self.processed_rule_ids.insert(signal.rule_id.clone());

        // Step 3-4.
        let cur = *self.current_direction.get(&signal.symbol).unwrap_or(&0);
        let tgt = signal.direction.signum();
        if cur == tgt {
            return Ok(vec![]);
        }

        let mut orders = Vec::new();

        // Step 5: close on a direction change away from a non-flat current.
        if cur != 0 && tgt != cur {
            let quantity = self
                .portfolio
                .borrow()
                .get_position(&signal.symbol)
                .map_or(0, |p| p.quantity.unsigned_abs());
            if quantity > 0 {
                let close_side = if cur > 0 { Side::Sell } else { Side::Buy };
                let order = Order::new(
                    signal.symbol.clone(),
                    close_side,
                    quantity,
                    OrderType::Market,
                    signal.timestamp,
                    format!("{}_CLOSE", signal.rule_id),
                    ActionType::Close,
                );
                orders.push(Event::order(order, signal.timestamp));
            }
        }

        // Step 6: open in the new direction, subject to sizing and limits.
        if tgt != 0 {
            let Some(side) = Side::from_direction(tgt) else {
                unreachable!("tgt != 0 implies a definite side");
            };
            let ctx = SizingContext {
                equity: self.portfolio.borrow().equity(),
                price: signal.price,
            };
            let quantity = self.sizing_method.size(&ctx);

            if quantity > 0 {
                if let Some(reason) = self.limit_violation(&signal.symbol, quantity, signal.price) {
                    tracing::warn!(
                        symbol = %signal.symbol,
                        rule_id = %signal.rule_id,
                        reason = %reason,
                        "order suppressed by risk limit"
                    );
                    self.orders_rejected += 1;
                } else {
                    let order = Order::new(
                        signal.symbol.clone(),
                        side,
                        quantity,
                        OrderType::Market,
                        signal.timestamp,
                        format!("{}_OPEN", signal.rule_id),
                        ActionType::Open,
                    );
                    orders.push(Event::order(order, signal.timestamp));
                }
            }
        }

        // Step 7: update direction state even when the open leg above was
        // rejected, to avoid oscillating re-attempts on the next signal.
        self.current_direction.insert(signal.symbol.clone(), tgt);

        Ok(orders)
    }

    /// Recomputes `current_direction[symbol]` from the actual post-fill
    /// position sign, per §9's resolution of partial-fill behavior. Called
    /// by the Coordinator's FILL wiring, not internally from `on_signal`.
    pub fn sync_direction_from_position(&mut self, symbol: &Symbol) {
        let direction = self
            .portfolio
            .borrow()
            .get_position(symbol)
            .map_or(0, |p| p.direction());
        self.current_direction.insert(symbol.clone(), direction);
    }

    fn limit_violation(&self, symbol: &Symbol, quantity: u64, price: rust_decimal::Decimal) -> Option<String> {
        if quantity > self.limits.max_position_size {
            return Some(format!(
                "quantity {quantity} exceeds max_position_size {}",
                self.limits.max_position_size
            ));
        }

        let portfolio = self.portfolio.borrow();

        if self.limits.enforce_single_position {
            let other_open = portfolio
                .positions
                .iter()
                .any(|(sym, pos)| sym != symbol && !pos.is_flat());
            if other_open {
                return Some("enforce_single_position: another symbol is non-flat".to_string());
            }
        }

        let open_positions = portfolio.positions.values().filter(|p| !p.is_flat()).count();
        let opening_new_symbol = portfolio.get_position(symbol).map_or(true, |p| p.is_flat());
        if opening_new_symbol && open_positions + 1 > self.limits.max_positions {
            return Some(format!(
                "max_positions {} would be exceeded",
                self.limits.max_positions
            ));
        }

        let equity = portfolio.equity();
        if equity > rust_decimal::Decimal::ZERO {
            let existing_exposure: rust_decimal::Decimal = portfolio
                .positions
                .values()
                .map(|p| (rust_decimal::Decimal::from(p.quantity.abs()) * p.last_mark_price).abs())
                .sum();
            let new_notional = rust_decimal::Decimal::from(quantity) * price;
            let projected = (existing_exposure + new_notional) / equity;
            if projected > self.limits.max_exposure {
                return Some(format!(
                    "projected exposure {projected} exceeds max_exposure {}",
                    self.limits.max_exposure
                ));
            }
        }

        None
    }

    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.processed_rule_ids.clear();
        self.current_direction.clear();
        self.open_orders_by_symbol.clear();
        self.orders_rejected = 0;
        self.signals_deduped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admf_types::event::Signal;
    use admf_types::orders::Fill;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn signal(symbol: &str, direction: i32, rule_id: &str) -> Event {
        Event::signal(Signal {
            symbol: Symbol::new(symbol),
            direction,
            price: dec!(100),
            timestamp: Utc::now(),
            rule_id: rule_id.to_string(),
        })
    }

    fn manager() -> RiskManager {
        let portfolio = Rc::new(RefCell::new(Portfolio::new(dec!(100_000))));
        RiskManager::new(portfolio, SizingMethod::Fixed { quantity: 10 }, RiskLimits::default())
    }

    #[test]
    fn new_signal_opens_with_no_close() {
        let mut rm = manager();
        let events = rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        assert_eq!(events.len(), 1);
        let EventPayload::Order(order) = &events[0].payload else {
            panic!("expected order");
        };
        assert_eq!(order.action_type, ActionType::Open);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 10);
    }

    #[test]
    fn duplicate_rule_id_is_dropped() {
        let mut rm = manager();
        rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        let events = rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        assert!(events.is_empty());
        assert_eq!(rm.signals_deduped(), 1);
    }

    #[test]
    fn same_direction_signal_does_nothing() {
        let mut rm = manager();
        rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        let events = rm.on_signal(&signal("MINI", 1, "r2")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn direction_flip_emits_close_then_open() {
        let mut rm = manager();
        rm.on_signal(&signal("MINI", 1, "r1")).unwrap();

        // Simulate the resulting fill so the portfolio reflects a position.
        {
            let mut pf = rm.portfolio.borrow_mut();
            pf.apply_fill(&Fill::new(
                Uuid::new_v4(),
                Symbol::new("MINI"),
                Side::Buy,
                10,
                dec!(100),
                Utc::now(),
                dec!(0),
                "r1_OPEN".into(),
            ));
        }
        rm.sync_direction_from_position(&Symbol::new("MINI"));

        let events = rm.on_signal(&signal("MINI", -1, "r2")).unwrap();
        assert_eq!(events.len(), 2);
        let EventPayload::Order(close) = &events[0].payload else {
            panic!("expected close order");
        };
        assert_eq!(close.action_type, ActionType::Close);
        assert_eq!(close.side, Side::Sell);
        assert_eq!(close.quantity, 10);
        assert_eq!(close.rule_id, "r2_CLOSE");

        let EventPayload::Order(open) = &events[1].payload else {
            panic!("expected open order");
        };
        assert_eq!(open.action_type, ActionType::Open);
        assert_eq!(open.side, Side::Sell);
        assert_eq!(open.rule_id, "r2_OPEN");
    }

    #[test]
    fn flat_signal_closes_without_opening() {
        let mut rm = manager();
        rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        {
            let mut pf = rm.portfolio.borrow_mut();
            pf.apply_fill(&Fill::new(
                Uuid::new_v4(),
                Symbol::new("MINI"),
                Side::Buy,
                10,
                dec!(100),
                Utc::now(),
                dec!(0),
                "r1_OPEN".into(),
            ));
        }
        rm.sync_direction_from_position(&Symbol::new("MINI"));

        let events = rm.on_signal(&signal("MINI", 0, "r2")).unwrap();
        assert_eq!(events.len(), 1);
        let EventPayload::Order(close) = &events[0].payload else {
            panic!("expected close order");
        };
        assert_eq!(close.action_type, ActionType::Close);
    }

    #[test]
    fn enforce_single_position_rejects_second_symbol() {
        let portfolio = Rc::new(RefCell::new(Portfolio::new(dec!(100_000))));
        let limits = RiskLimits {
            enforce_single_position: true,
            ..RiskLimits::default()
        };
        let mut rm = RiskManager::new(portfolio.clone(), SizingMethod::Fixed { quantity: 10 }, limits);

        rm.on_signal(&signal("AAA", 1, "r1")).unwrap();
        {
            let mut pf = portfolio.borrow_mut();
            pf.apply_fill(&Fill::new(
                Uuid::new_v4(),
                Symbol::new("AAA"),
                Side::Buy,
                10,
                dec!(100),
                Utc::now(),
                dec!(0),
                "r1_OPEN".into(),
            ));
        }

        let events = rm.on_signal(&signal("BBB", 1, "r2")).unwrap();
        assert!(events.is_empty());
        assert_eq!(rm.orders_rejected(), 1);
    }

    #[test]
    fn reset_clears_all_state() {
        let mut rm = manager();
        rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        rm.reset();
        // Same rule_id now passes dedup again because state was cleared.
        let events = rm.on_signal(&signal("MINI", 1, "r1")).unwrap();
        assert_eq!(events.len(), 1);
    }
}
