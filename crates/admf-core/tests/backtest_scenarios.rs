//! End-to-end scenarios driven entirely through the public `Coordinator`
//! API (or, where the Coordinator has no seam to exercise a property
//! directly, through the public `RiskManager` it wraps).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use admf_core::strategies::MovingAverageCrossover;
use admf_core::{Coordinator, RiskManager};
use admf_types::backtest::{BacktestConfig, BrokerConfig, FillModel, RiskConfig, SizingMethod};
use admf_types::event::{Event, Signal};
use admf_types::market::{Bar, Symbol};
use admf_types::orders::ActionType;
use admf_types::portfolio::{Portfolio, RiskLimits};
use admf_types::strategy::{Direction, ParameterValue, Strategy};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn bar(symbol: &str, y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32, close: Decimal) -> Bar {
    Bar::new(
        Symbol::new(symbol),
        Utc.with_ymd_and_hms(y, m, d, hh, mm, ss).unwrap(),
        close,
        close,
        close,
        close,
        dec!(1000),
    )
}

fn current_close_zero_cost() -> BrokerConfig {
    BrokerConfig {
        fill_model: FillModel::CurrentClose,
        ..Default::default()
    }
}

struct AlwaysBuy;

impl Strategy for AlwaysBuy {
    fn name(&self) -> &str {
        "always_buy"
    }
    fn on_bar(&mut self, _bar: &Bar) -> Direction {
        Direction::Buy
    }
    fn reset(&mut self) {}
    fn get_parameters(&self) -> HashMap<String, ParameterValue> {
        HashMap::new()
    }
}

struct BuySellBuy {
    step: usize,
}

impl Strategy for BuySellBuy {
    fn name(&self) -> &str {
        "scripted"
    }
    fn on_bar(&mut self, _bar: &Bar) -> Direction {
        let direction = match self.step {
            0 => Direction::Buy,
            1 => Direction::Sell,
            _ => Direction::Buy,
        };
        self.step += 1;
        direction
    }
    fn reset(&mut self) {
        self.step = 0;
    }
    fn get_parameters(&self) -> HashMap<String, ParameterValue> {
        HashMap::new()
    }
}

struct BuyThenFlat {
    bars_seen: u32,
}

impl Strategy for BuyThenFlat {
    fn name(&self) -> &str {
        "buy_then_flat"
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
    fn get_parameters(&self) -> HashMap<String, ParameterValue> {
        HashMap::new()
    }
}

/// Scenario 1 (§8): MA-crossover golden path. Uses a fast(2)/slow(3) pair
/// instead of the spec's illustrative fast(5)/slow(15)-over-100-bars
/// example so the exact crossing count is hand-verifiable here: the closes
/// below cross fast above slow once at bar 3 (BUY), below slow at bar 6
/// (SELL), and above again at bar 9 (BUY) — 3 crossings, alternating
/// direction, 12 distinct bar timestamps.
#[test]
fn ma_crossover_golden_path_produces_one_order_chain_per_crossing() {
    let closes = [10, 10, 10, 20, 20, 20, 5, 5, 5, 30, 30, 30];
    let series: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar("MINI", 2024, 3, 1, 9, 30 + i as u32, 0, Decimal::from(c)))
        .collect();

    let config = BacktestConfig::default()
        .with_symbols(vec![Symbol::new("MINI")])
        .with_sizing(SizingMethod::Fixed { quantity: 10 });
    let mut coordinator = Coordinator::new(config);
    let result = coordinator
        .run(Box::new(MovingAverageCrossover::new(2, 3)), vec![(Symbol::new("MINI"), series)])
        .unwrap();

    // 3 crossings: first is OPEN-only (1 order), the other two are
    // CLOSE+OPEN (2 orders each) => 1 + 2 + 2 = 5.
    assert_eq!(result.orders.len(), 5);
    assert_eq!(result.counters.signals_deduped, 0);
    assert_eq!(result.equity_curve.len(), 12);

    let opens = result.orders.iter().filter(|o| o.action_type == ActionType::Open).count();
    let closes_count = result.orders.iter().filter(|o| o.action_type == ActionType::Close).count();
    assert_eq!(opens, 3);
    assert_eq!(closes_count, 2);
}

/// Scenario 2 (§8): the identical SIGNAL rule_id arriving twice (two bars
/// in the same minute bucket) collapses to exactly one order chain, with
/// the Event Bus counting the second as a dropped duplicate.
#[test]
fn duplicate_signal_in_the_same_minute_bucket_is_deduplicated() {
    let series = vec![
        bar("MINI", 2024, 3, 1, 9, 30, 0, dec!(100)),
        bar("MINI", 2024, 3, 1, 9, 30, 45, dec!(100)),
    ];

    let config = BacktestConfig::default()
        .with_symbols(vec![Symbol::new("MINI")])
        .with_sizing(SizingMethod::Fixed { quantity: 10 });
    let mut coordinator = Coordinator::new(config);
    let result = coordinator.run(Box::new(AlwaysBuy), vec![(Symbol::new("MINI"), series)]).unwrap();

    assert_eq!(result.orders.len(), 1);
    assert_eq!(result.counters.signals_deduped, 1);
}

/// Scenario 3 (§8): reset isolation. Running the same configuration twice
/// through one `Coordinator` — which always resets internally before
/// dispatching a bar (§4.7) — produces identical results both times.
#[test]
fn rerunning_one_coordinator_produces_identical_results() {
    let series = || {
        vec![(
            Symbol::new("MINI"),
            vec![
                bar("MINI", 2024, 3, 1, 9, 30, 0, dec!(100)),
                bar("MINI", 2024, 3, 1, 9, 31, 0, dec!(105)),
                bar("MINI", 2024, 3, 1, 9, 32, 0, dec!(110)),
            ],
        )]
    };
    let config = BacktestConfig::default()
        .with_symbols(vec![Symbol::new("MINI")])
        .with_sizing(SizingMethod::Fixed { quantity: 10 });
    let mut coordinator = Coordinator::new(config);

    let first = coordinator.run(Box::new(BuyThenFlat { bars_seen: 0 }), series()).unwrap();
    let second = coordinator.run(Box::new(BuyThenFlat { bars_seen: 0 }), series()).unwrap();

    assert_eq!(first.equity_curve, second.equity_curve);
    assert_eq!(first.final_cash, second.final_cash);
    assert_eq!(first.orders.len(), second.orders.len());
}

/// Same scenario, but demonstrating *why* the reset is mandatory by driving
/// the `RiskManager` directly without its own `reset()` between two
/// identical passes: the rule_ids from the first pass are still in
/// `processed_rule_ids`, so the second pass yields no orders at all.
#[test]
fn skipping_reset_on_the_risk_manager_suppresses_every_order_on_rerun() {
    let portfolio = Rc::new(RefCell::new(Portfolio::new(dec!(100_000))));
    let mut rm = RiskManager::new(portfolio, SizingMethod::Fixed { quantity: 10 }, RiskLimits::default());

    let make_signal = || {
        Event::signal(Signal {
            symbol: Symbol::new("MINI"),
            direction: 1,
            price: dec!(100),
            timestamp: Utc::now(),
            rule_id: "ma_crossover_MINI_BUY_group_20240301_0930".to_string(),
        })
    };

    let first_pass = rm.on_signal(&make_signal()).unwrap();
    assert_eq!(first_pass.len(), 1);

    // No rm.reset() here: the rerun must produce nothing.
    let second_pass = rm.on_signal(&make_signal()).unwrap();
    assert!(second_pass.is_empty());
    assert_eq!(rm.signals_deduped(), 1);

    rm.reset();
    let after_reset = rm.on_signal(&make_signal()).unwrap();
    assert_eq!(after_reset.len(), 1);
}

/// Scenario 4 (§8): position flip accounting. BUY 100 @ 50, SELL 100 @ 60
/// realizes +1000 and flattens; SELL 100 @ 60 flips short, and BUY 100 @ 55
/// covers it for +500 more, for +1500 total.
#[test]
fn position_flip_accumulates_realized_pnl_across_two_closes() {
    let series = vec![
        bar("MINI", 2024, 3, 1, 9, 30, 0, dec!(50)),
        bar("MINI", 2024, 3, 1, 9, 31, 0, dec!(60)),
        bar("MINI", 2024, 3, 1, 9, 32, 0, dec!(55)),
    ];

    let config = BacktestConfig {
        broker: current_close_zero_cost(),
        ..BacktestConfig::default()
            .with_symbols(vec![Symbol::new("MINI")])
            .with_sizing(SizingMethod::Fixed { quantity: 100 })
    };
    let mut coordinator = Coordinator::new(config);
    let result = coordinator
        .run(Box::new(BuySellBuy { step: 0 }), vec![(Symbol::new("MINI"), series)])
        .unwrap();

    assert_eq!(result.total_realized_pnl, dec!(1500));
    // Final leg (BUY covering the short) leaves a long 100 @ 55, so the
    // account is not flat — 5 orders total: OPEN, (CLOSE+OPEN), (CLOSE+OPEN).
    assert_eq!(result.orders.len(), 5);
}

/// Scenario 5 (§8): with `close_positions_eod`, a position opened on day 1
/// is flattened by a synthetic CLOSE before the strategy ever sees a day 2
/// bar.
#[test]
fn eod_close_flattens_positions_before_the_next_days_first_bar() {
    let series = vec![
        bar("MINI", 2024, 3, 1, 9, 30, 0, dec!(100)),
        bar("MINI", 2024, 3, 1, 9, 31, 0, dec!(100)),
        bar("MINI", 2024, 3, 2, 9, 30, 0, dec!(110)),
    ];

    let config = BacktestConfig {
        close_positions_eod: true,
        broker: current_close_zero_cost(),
        ..BacktestConfig::default()
            .with_symbols(vec![Symbol::new("MINI")])
            .with_sizing(SizingMethod::Fixed { quantity: 10 })
    };
    let mut coordinator = Coordinator::new(config);
    let result = coordinator
        .run(Box::new(BuyThenFlat { bars_seen: 0 }), vec![(Symbol::new("MINI"), series)])
        .unwrap();

    let eod_close = result.orders.iter().find(|o| o.rule_id.starts_with("EOD_"));
    assert!(eod_close.is_some(), "expected a synthetic EOD close order");
    assert_eq!(eod_close.unwrap().action_type, ActionType::Close);
    // Bought at 100 on day 1, closed at day 1's own last close (100): flat, no P&L.
    assert_eq!(result.total_realized_pnl, Decimal::ZERO);
}

/// Scenario 6 (§8): `enforce_single_position` rejects the second of two
/// same-bar OPEN signals across different symbols.
#[test]
fn enforce_single_position_rejects_the_second_symbols_open() {
    let series = vec![
        (Symbol::new("AAA"), vec![bar("AAA", 2024, 3, 1, 9, 30, 0, dec!(100))]),
        (Symbol::new("BBB"), vec![bar("BBB", 2024, 3, 1, 9, 30, 0, dec!(100))]),
    ];

    let config = BacktestConfig {
        risk: RiskConfig {
            sizing_method: SizingMethod::Fixed { quantity: 10 },
            limits: RiskLimits {
                enforce_single_position: true,
                ..RiskLimits::default()
            },
        },
        ..BacktestConfig::default().with_symbols(vec![Symbol::new("AAA"), Symbol::new("BBB")])
    };
    let mut coordinator = Coordinator::new(config);
    let result = coordinator.run(Box::new(AlwaysBuy), series).unwrap();

    assert_eq!(result.counters.orders_rejected, 1);
    let open_positions = ["AAA", "BBB"]
        .iter()
        .filter(|s| result.orders.iter().any(|o| o.symbol == Symbol::new(*s) && o.action_type == ActionType::Open))
        .count();
    assert_eq!(open_positions, 1);
}
