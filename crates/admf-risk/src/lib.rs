//! Ambient portfolio risk monitoring for the ADMF-Trader backtesting engine.
//!
//! This crate is a passive observer over `PORTFOLIO_UPDATE` snapshots — it
//! is not a dependency the core itself takes, and holds no reference to any
//! core component.

pub mod alerts;
pub mod monitor;

pub use alerts::{RiskAlert, RiskAlertKind, RiskSeverity};
pub use monitor::{PortfolioRiskMonitor, RiskMonitorConfig};
