//! Drives one `Coordinator` through a grid of strategy parameters. Each
//! trial calls `Coordinator::run`, which resets every core component before
//! dispatching a single bar (§4.7) — this is the direct demonstration that
//! the reset discipline holds across repeated calls on the same instance,
//! not just across freshly constructed ones.

use std::collections::HashMap;

use admf_core::Coordinator;
use admf_types::backtest::BacktestConfig;
use admf_types::market::{Bar, Symbol};
use admf_types::strategy::{ParameterValue as StrategyParam, Strategy};

use crate::search::{GridSearch, ParameterValue as SearchParam};
use crate::trial::{ObjectiveDirection, OptimizationStatus, Trial, TrialResult};

/// Converts a sampled grid point into the strategy parameter shape, passing
/// through `Int`/`Float` and dropping anything else — `set_parameters`
/// implementations only ever look for these two variants.
fn to_strategy_params(params: &HashMap<String, SearchParam>) -> HashMap<String, StrategyParam> {
    params
        .iter()
        .filter_map(|(k, v)| {
            let converted = match v {
                SearchParam::Int(i) => Some(StrategyParam::Int(*i)),
                SearchParam::Float(f) => Some(StrategyParam::Float(*f)),
                SearchParam::Json(_) => None,
            };
            converted.map(|c| (k.clone(), c))
        })
        .collect()
}

/// Runs every grid point through one `Coordinator`, scoring each trial by
/// total return, and tracks the best one seen so far.
pub struct TrialRunner {
    coordinator: Coordinator,
    search: GridSearch,
    series: Vec<(Symbol, Vec<Bar>)>,
    initial_capital: f64,
}

impl TrialRunner {
    pub fn new(config: BacktestConfig, search: GridSearch, series: Vec<(Symbol, Vec<Bar>)>) -> Self {
        let initial_capital = config.initial_capital.to_string().parse().unwrap_or(1.0);
        Self {
            coordinator: Coordinator::new(config),
            search,
            series,
            initial_capital,
        }
    }

    /// Runs every remaining grid point, building a fresh strategy instance
    /// per trial via `make_strategy` and applying the sampled parameters to
    /// it before handing it to the Coordinator.
    pub fn run_all(
        &mut self,
        status: &mut OptimizationStatus,
        make_strategy: impl Fn() -> Box<dyn Strategy>,
    ) -> Vec<TrialResult> {
        status.mark_running();
        let mut results = Vec::new();
        let mut trial_number = 0;

        loop {
            let batch = self.search.suggest(1);
            if batch.is_empty() {
                break;
            }
            let params = &batch[0];

            let mut strategy = make_strategy();
            strategy.set_parameters(&to_strategy_params(params));

            let mut trial = Trial::new(status.id, trial_number, params.clone());
            trial.mark_running(None);
            trial_number += 1;

            match self.coordinator.run(strategy, self.series.clone()) {
                Ok(backtest) => {
                    let equity: f64 = (backtest.final_cash + backtest.total_unrealized_pnl)
                        .to_string()
                        .parse()
                        .unwrap_or(0.0);
                    let objective = if self.initial_capital > 0.0 {
                        (equity - self.initial_capital) / self.initial_capital
                    } else {
                        0.0
                    };

                    let mut metrics = HashMap::new();
                    metrics.insert("orders_rejected".to_string(), backtest.counters.orders_rejected as f64);
                    metrics.insert("signals_deduped".to_string(), backtest.counters.signals_deduped as f64);

                    let result = TrialResult {
                        trial_id: trial.id,
                        objective,
                        metrics,
                        parameters: params.clone(),
                        duration_seconds: None,
                    };
                    trial.mark_completed(result.clone());
                    status.update_best(&result);
                    status.trials_completed += 1;
                    results.push(result);
                }
                Err(err) => {
                    trial.mark_failed(err.to_string());
                    status.trials_failed += 1;
                }
            }
        }

        status.mark_completed();
        results
    }
}

/// Picks the best result by `status.config.direction`, matching
/// `OptimizationStatus::update_best`'s own comparison.
pub fn best_of(results: &[TrialResult], direction: ObjectiveDirection) -> Option<&TrialResult> {
    results.iter().reduce(|best, candidate| {
        let candidate_wins = match direction {
            ObjectiveDirection::Maximize => candidate.objective > best.objective,
            ObjectiveDirection::Minimize => candidate.objective < best.objective,
        };
        if candidate_wins {
            candidate
        } else {
            best
        }
    })
}
