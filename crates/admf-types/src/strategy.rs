use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::market::Bar;

/// A strategy's directional opinion on a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Flat,
}

impl Direction {
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Buy => 1,
            Direction::Sell => -1,
            Direction::Flat => 0,
        }
    }

    pub fn from_sign(sign: i32) -> Direction {
        match sign.signum() {
            1 => Direction::Buy,
            -1 => Direction::Sell,
            _ => Direction::Flat,
        }
    }

    /// `BUY`/`SELL`, as used in rule_id construction (§4.3). `Flat` has no
    /// label because it never reaches the Strategy Adapter's rule_id
    /// builder — a flat direction suppresses signal emission entirely.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Direction::Buy => Some("BUY"),
            Direction::Sell => Some("SELL"),
            Direction::Flat => None,
        }
    }
}

/// A named, bounded value a strategy exposes for parameter search (§6,
/// consumed by the grid-search optimizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

/// The narrow contract the Strategy Adapter (§4.3) bridges to the bus. A
/// strategy is a pure function of market data to intended direction; it is
/// never given the portfolio or order state, so it cannot decide whether a
/// trade is warranted — that is the Risk Manager's job.
pub trait Strategy: Send {
    /// Human-readable identity used to build rule_ids
    /// (`{strategy_name}_{symbol}_{dir_label}_group_{time_bucket}`).
    fn name(&self) -> &str;

    /// Process one bar and return a directional opinion.
    fn on_bar(&mut self, bar: &Bar) -> Direction;

    /// Clear any indicator state. Called by the Coordinator's mandatory
    /// reset phase (§4.7) before every run.
    fn reset(&mut self);

    fn get_parameters(&self) -> HashMap<String, ParameterValue> {
        HashMap::new()
    }

    fn set_parameters(&mut self, _parameters: &HashMap<String, ParameterValue>) {}

    /// Named axes and candidate values a grid search may sweep over.
    fn get_parameter_space(&self) -> HashMap<String, Vec<ParameterValue>> {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sign_round_trips() {
        assert_eq!(Direction::from_sign(Direction::Buy.sign()), Direction::Buy);
        assert_eq!(Direction::from_sign(Direction::Sell.sign()), Direction::Sell);
        assert_eq!(Direction::from_sign(Direction::Flat.sign()), Direction::Flat);
        assert_eq!(Direction::from_sign(7), Direction::Buy);
        assert_eq!(Direction::from_sign(-3), Direction::Sell);
    }

    #[test]
    fn flat_direction_has_no_label() {
        assert_eq!(Direction::Buy.label(), Some("BUY"));
        assert_eq!(Direction::Sell.label(), Some("SELL"));
        assert_eq!(Direction::Flat.label(), None);
    }
}
