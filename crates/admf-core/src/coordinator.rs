//! Runs one full backtest: mandatory reset, bar-by-bar dispatch, EOD close
//! injection, and result aggregation (§4.7).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use admf_types::backtest::{BacktestConfig, BacktestResult, RunCounters};
use admf_types::errors::GbResult;
use admf_types::event::{Event, EventPayload, EventType};
use admf_types::market::{Bar, Symbol};
use admf_types::orders::{ActionType, Fill, Order, OrderType, Side};
use admf_types::portfolio::Portfolio;
use admf_types::strategy::Strategy;

use crate::broker::Broker;
use crate::data_handler::DataHandler;
use crate::event_bus::EventBus;
use crate::portfolio_handler::PortfolioHandler;
use crate::risk_manager::RiskManager;
use crate::strategy_adapter::StrategyAdapter;

/// Orchestrates one backtest run. A fresh `Coordinator` can run the same
/// configuration repeatedly — every `run` call performs the mandatory reset
/// phase first (§4.7), so results are isolated between runs regardless of
/// what the previous run left behind.
pub struct Coordinator {
    config: BacktestConfig,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle the caller can flip from another thread/task to stop the
    /// run cooperatively between bars. The dispatch loop itself stays
    /// single-threaded; this is the only cross-thread touchpoint.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn run(&mut self, strategy: Box<dyn Strategy>, series: Vec<(Symbol, Vec<Bar>)>) -> GbResult<BacktestResult> {
        self.cancel.store(false, Ordering::SeqCst);

        let portfolio = Rc::new(RefCell::new(Portfolio::new(self.config.initial_capital)));
        let mut bus = EventBus::new();
        let mut data_handler = DataHandler::new(series);

        let strategy_adapter = Rc::new(RefCell::new(StrategyAdapter::new(strategy)));
        let risk_manager = Rc::new(RefCell::new(RiskManager::new(
            portfolio.clone(),
            self.config.risk.sizing_method.clone(),
            self.config.risk.limits.clone(),
        )));
        let broker = Rc::new(RefCell::new(Broker::new(self.config.broker.clone())));
        let portfolio_handler = Rc::new(RefCell::new(PortfolioHandler::new(portfolio.clone())));
        let fills: Rc<RefCell<Vec<Fill>>> = Rc::new(RefCell::new(Vec::new()));

        // Mandatory reset phase (§4.7): bus first, then every stateful
        // component, regardless of whether this is the first run.
        bus.reset();
        risk_manager.borrow_mut().reset();
        broker.borrow_mut().reset();
        portfolio_handler.borrow_mut().reset();
        data_handler.reset();
        strategy_adapter.borrow_mut().reset();
        fills.borrow_mut().clear();

        {
            let broker = broker.clone();
            bus.subscribe(EventType::Bar, 0, Box::new(move |event| broker.borrow_mut().on_bar(event)));
        }
        {
            let adapter = strategy_adapter.clone();
            bus.subscribe(EventType::Bar, 10, Box::new(move |event| adapter.borrow_mut().on_bar(event)));
        }
        {
            let handler = portfolio_handler.clone();
            bus.subscribe(EventType::Bar, 20, Box::new(move |event| handler.borrow_mut().on_bar(event)));
        }
        {
            let rm = risk_manager.clone();
            bus.subscribe(EventType::Signal, 0, Box::new(move |event| rm.borrow_mut().on_signal(event)));
        }
        {
            let broker = broker.clone();
            bus.subscribe(EventType::Order, 0, Box::new(move |event| broker.borrow_mut().on_order(event)));
        }
        {
            let handler = portfolio_handler.clone();
            bus.subscribe(EventType::Fill, 0, Box::new(move |event| handler.borrow_mut().on_fill(event)));
        }
        {
            let rm = risk_manager.clone();
            bus.subscribe(
                EventType::Fill,
                10,
                Box::new(move |event| {
                    if let EventPayload::Fill(fill) = &event.payload {
                        rm.borrow_mut().sync_direction_from_position(&fill.symbol);
                    }
                    Ok(vec![])
                }),
            );
        }
        {
            let fills = fills.clone();
            bus.subscribe(
                EventType::Fill,
                20,
                Box::new(move |event| {
                    if let EventPayload::Fill(fill) = &event.payload {
                        fills.borrow_mut().push(fill.clone());
                    }
                    Ok(vec![])
                }),
            );
        }

        let symbols = data_handler.symbols().to_vec();
        let bar_count = data_handler.bar_count();
        tracing::info!(?symbols, bar_count, "starting backtest run");

        let mut last_date: HashMap<Symbol, NaiveDate> = HashMap::new();
        let mut last_close: HashMap<Symbol, (Decimal, DateTime<Utc>)> = HashMap::new();
        let mut last_ts: Option<DateTime<Utc>> = None;
        let mut started = false;

        while let Some(bar) = data_handler.next_bar() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("backtest run canceled before data exhausted");
                break;
            }

            let bar_date = bar.timestamp.date_naive();
            if self.config.close_positions_eod {
                if let Some(prev_date) = last_date.get(&bar.symbol).copied() {
                    if prev_date != bar_date {
                        if let Some((close_price, close_ts)) = last_close.get(&bar.symbol).copied() {
                            if let Some(order_event) =
                                eod_close_order(&portfolio, &bar.symbol, close_price, close_ts, prev_date)
                            {
                                bus.publish(order_event);
                            }
                        }
                    }
                }
            }

            if !started {
                bus.publish(Event::backtest_start(bar.timestamp));
                started = true;
            }

            last_ts = Some(bar.timestamp);
            last_date.insert(bar.symbol.clone(), bar_date);
            last_close.insert(bar.symbol.clone(), (bar.close, bar.timestamp));

            bus.publish(Event::bar(bar));
        }

        if self.config.close_positions_eod {
            if let Some(end_ts) = last_ts {
                let end_date = end_ts.date_naive();
                for symbol in symbols.clone() {
                    if let Some((close_price, close_ts)) = last_close.get(&symbol).copied() {
                        if let Some(order_event) = eod_close_order(&portfolio, &symbol, close_price, close_ts, end_date)
                        {
                            bus.publish(order_event);
                        }
                    }
                }
            }
        }

        if started {
            bus.publish(Event::backtest_end(last_ts.expect("started implies at least one bar")));
        }

        let stats = bus.stats();
        let counters = RunCounters {
            orders_rejected: risk_manager.borrow().orders_rejected(),
            signals_deduped: risk_manager.borrow().signals_deduped() + stats.duplicates_dropped,
            handler_errors: stats.handler_errors,
        };

        let portfolio_ref = portfolio.borrow();
        tracing::info!(
            final_cash = %portfolio_ref.cash,
            equity = %portfolio_ref.equity(),
            orders_rejected = counters.orders_rejected,
            "backtest run complete"
        );

        Ok(BacktestResult {
            equity_curve: portfolio_ref.equity_curve.clone(),
            final_cash: portfolio_ref.cash,
            total_realized_pnl: portfolio_ref.total_realized_pnl(),
            total_unrealized_pnl: portfolio_ref.total_unrealized_pnl(),
            orders: broker.borrow().all_orders(),
            fills: fills.borrow().clone(),
            counters,
        })
    }
}

/// Builds a synthetic CLOSE order for a non-flat position, bypassing the
/// Risk Manager entirely — the Coordinator detects the date change and
/// decides to close, it does not ask whether to (§4.5).
fn eod_close_order(
    portfolio: &Rc<RefCell<Portfolio>>,
    symbol: &Symbol,
    close_price: Decimal,
    close_ts: DateTime<Utc>,
    date: NaiveDate,
) -> Option<Event> {
    let quantity = portfolio.borrow().get_position(symbol).map(|p| (p.quantity, p.direction()))?;
    let (qty, direction) = quantity;
    if qty == 0 {
        return None;
    }
    let side = if direction > 0 { Side::Sell } else { Side::Buy };
    let order = Order::new(
        symbol.clone(),
        side,
        qty.unsigned_abs(),
        OrderType::Market,
        close_ts,
        format!("EOD_{}", date.format("%Y%m%d")),
        ActionType::Close,
    );
    let _ = close_price;
    Some(Event::order(order, close_ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use admf_types::backtest::{BacktestConfig, SizingMethod};
    use admf_types::strategy::Direction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;

    struct AlwaysBuyThenFlat {
        bars_seen: u32,
    }

    impl Strategy for AlwaysBuyThenFlat {
        fn name(&self) -> &str {
            "always_buy"
        }
        fn on_bar(&mut self, _bar: &Bar) -> Direction {
            self.bars_seen += 1;
            if self.bars_seen == 1 {
                Direction::Buy
            } else {
                Direction::Flat
            }
        }
        fn reset(&mut self) {
            self.bars_seen = 0;
        }
        fn get_parameters(&self) -> StdHashMap<String, admf_types::strategy::ParameterValue> {
            StdHashMap::new()
        }
    }

    fn bars() -> Vec<(Symbol, Vec<Bar>)> {
        let mut series = Vec::new();
        for i in 0..5 {
            series.push(Bar::new(
                Symbol::new("MINI"),
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 30 + i, 0).unwrap(),
                dec!(100),
                dec!(101),
                dec!(99),
                dec!(100) + Decimal::from(i),
                dec!(1000),
            ));
        }
        vec![(Symbol::new("MINI"), series)]
    }

    #[test]
    fn run_produces_an_equity_curve_and_at_least_one_order() {
        let config = BacktestConfig::default()
            .with_symbols(vec![Symbol::new("MINI")])
            .with_sizing(SizingMethod::Fixed { quantity: 10 });
        let mut coordinator = Coordinator::new(config);
        let result = coordinator
            .run(Box::new(AlwaysBuyThenFlat { bars_seen: 0 }), bars())
            .unwrap();

        assert!(!result.equity_curve.is_empty());
        assert!(!result.orders.is_empty());
        assert_eq!(result.counters.handler_errors, 0);
    }

    #[test]
    fn two_consecutive_runs_produce_identical_results() {
        let config = BacktestConfig::default()
            .with_symbols(vec![Symbol::new("MINI")])
            .with_sizing(SizingMethod::Fixed { quantity: 10 });
        let mut coordinator = Coordinator::new(config);
        let first = coordinator
            .run(Box::new(AlwaysBuyThenFlat { bars_seen: 0 }), bars())
            .unwrap();
        let second = coordinator
            .run(Box::new(AlwaysBuyThenFlat { bars_seen: 0 }), bars())
            .unwrap();

        assert_eq!(first.final_cash, second.final_cash);
        assert_eq!(first.orders.len(), second.orders.len());
        assert_eq!(first.fills.len(), second.fills.len());
    }
}
