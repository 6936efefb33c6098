//! Built-in strategies. `MovingAverageCrossover` is the reference strategy
//! used by the golden-path scenario and the CLI's default run (§8).

use std::collections::{HashMap, VecDeque};

use admf_types::market::Bar;
use admf_types::strategy::{Direction, ParameterValue, Strategy};

/// Buys when the fast simple moving average crosses above the slow one,
/// sells on the opposite cross, and stays flat otherwise. Holds no position
/// state of its own — direction sizing and dedup are the Risk Manager's job.
pub struct MovingAverageCrossover {
    fast_period: usize,
    slow_period: usize,
    fast_window: VecDeque<rust_decimal::Decimal>,
    slow_window: VecDeque<rust_decimal::Decimal>,
    prev_relation: Option<std::cmp::Ordering>,
}

impl MovingAverageCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        assert!(fast_period > 0 && slow_period > fast_period, "slow_period must exceed fast_period");
        Self {
            fast_period,
            slow_period,
            fast_window: VecDeque::with_capacity(fast_period),
            slow_window: VecDeque::with_capacity(slow_period),
            prev_relation: None,
        }
    }

    fn push_and_average(window: &mut VecDeque<rust_decimal::Decimal>, period: usize, price: rust_decimal::Decimal) -> Option<rust_decimal::Decimal> {
        window.push_back(price);
        if window.len() > period {
            window.pop_front();
        }
        if window.len() < period {
            return None;
        }
        Some(window.iter().sum::<rust_decimal::Decimal>() / rust_decimal::Decimal::from(period as u64))
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn on_bar(&mut self, bar: &Bar) -> Direction {
        let fast = Self::push_and_average(&mut self.fast_window, self.fast_period, bar.close);
        let slow = Self::push_and_average(&mut self.slow_window, self.slow_period, bar.close);

        let (Some(fast), Some(slow)) = (fast, slow) else {
            return Direction::Flat;
        };

        let relation = fast.cmp(&slow);
        let direction = match (self.prev_relation, relation) {
            (Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal), std::cmp::Ordering::Greater) => {
                Direction::Buy
            }
            (Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal), std::cmp::Ordering::Less) => {
                Direction::Sell
            }
            _ => Direction::Flat,
        };
        self.prev_relation = Some(relation);
        direction
    }

    fn reset(&mut self) {
        self.fast_window.clear();
        self.slow_window.clear();
        self.prev_relation = None;
    }

    fn get_parameters(&self) -> HashMap<String, ParameterValue> {
        let mut params = HashMap::new();
        params.insert("fast_period".to_string(), ParameterValue::Int(self.fast_period as i64));
        params.insert("slow_period".to_string(), ParameterValue::Int(self.slow_period as i64));
        params
    }

    fn set_parameters(&mut self, parameters: &HashMap<String, ParameterValue>) {
        if let Some(ParameterValue::Int(v)) = parameters.get("fast_period") {
            self.fast_period = (*v).max(1) as usize;
        }
        if let Some(ParameterValue::Int(v)) = parameters.get("slow_period") {
            self.slow_period = (*v).max(self.fast_period as i64 + 1) as usize;
        }
    }

    fn get_parameter_space(&self) -> HashMap<String, Vec<ParameterValue>> {
        let mut space = HashMap::new();
        space.insert(
            "fast_period".to_string(),
            vec![ParameterValue::Int(5), ParameterValue::Int(10), ParameterValue::Int(20)],
        );
        space.insert(
            "slow_period".to_string(),
            vec![ParameterValue::Int(20), ParameterValue::Int(50), ParameterValue::Int(100)],
        );
        space
    }
}
