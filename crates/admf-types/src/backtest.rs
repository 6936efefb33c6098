use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Symbol;
use crate::orders::{Fill, Order};
use crate::portfolio::{EquityCurve, RiskLimits};

/// One of the four sizing methods the Risk Manager may be configured with
/// (§4.4). `percent_risk` and `volatility_target` both need a reference
/// price from the triggering signal and the current equity to resolve to a
/// concrete share count; that happens in `admf-core::sizing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SizingMethod {
    Fixed { quantity: u64 },
    PercentEquity { pct: Decimal },
    PercentRisk { risk_pct: Decimal, stop_distance: Decimal },
    VolatilityTarget { target_vol: Decimal, realized_vol: Decimal },
}

impl Default for SizingMethod {
    fn default() -> Self {
        SizingMethod::Fixed { quantity: 1 }
    }
}

/// §4.5 slippage models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlippageModel {
    None,
    Fixed { basis_points: Decimal },
    Variable {
        base_bps: Decimal,
        size_impact: Decimal,
        volatility_impact: Decimal,
        random_factor: Decimal,
    },
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::None
    }
}

/// §4.5 commission models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommissionModel {
    None,
    Percentage { rate: Decimal, min: Decimal, max: Decimal },
    Fixed { per_trade: Decimal },
    PerShare { rate: Decimal },
    Tiered { schedule: Vec<(u64, Decimal)> },
}

impl Default for CommissionModel {
    fn default() -> Self {
        CommissionModel::None
    }
}

/// Whether a MARKET order fills at the next bar's open or the current
/// bar's close (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillModel {
    NextOpen,
    CurrentClose,
}

impl Default for FillModel {
    fn default() -> Self {
        FillModel::NextOpen
    }
}

/// Risk Manager configuration (§4.4, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskConfig {
    pub sizing_method: SizingMethod,
    pub limits: RiskLimits,
}

/// Broker configuration (§4.5, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    pub slippage: SlippageModel,
    pub commission: CommissionModel,
    pub fill_model: FillModel,
}

/// The full configuration schema recognized by the core (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    pub symbols: Vec<Symbol>,
    pub close_positions_eod: bool,
    pub risk: RiskConfig,
    pub broker: BrokerConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(100_000),
            symbols: Vec::new(),
            close_positions_eod: false,
            risk: RiskConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn with_initial_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_sizing(mut self, method: SizingMethod) -> Self {
        self.risk.sizing_method = method;
        self
    }

    pub fn with_close_positions_eod(mut self, enabled: bool) -> Self {
        self.close_positions_eod = enabled;
        self
    }
}

/// Summary counters surfaced at the end of a run (§7) — user-visible
/// failures are reported here, not as propagated errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounters {
    pub orders_rejected: u64,
    pub signals_deduped: u64,
    pub handler_errors: u64,
}

/// Everything the Backtest Coordinator collects at the end of a run (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub equity_curve: EquityCurve,
    pub final_cash: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub counters: RunCounters,
}
