//! Portfolio-level risk monitor. Subscribes (logically — the Coordinator
//! does not depend on this crate) to `PORTFOLIO_UPDATE` snapshots and raises
//! `RiskAlert`s over a `crossbeam_channel`, mirroring the teacher's
//! publish-don't-call alerting idiom.

use crossbeam_channel::Sender;
use rust_decimal::Decimal;
use tracing::{info, warn};

use admf_types::event::PortfolioUpdate;

use crate::alerts::{RiskAlert, RiskAlertKind, RiskSeverity};

/// Thresholds the monitor checks on every snapshot. All percentages are
/// expressed as whole numbers (`10` means 10%), matching the teacher's
/// `RiskLimits` convention.
#[derive(Debug, Clone)]
pub struct RiskMonitorConfig {
    pub max_drawdown_pct: Decimal,
    pub max_concentration_pct: Decimal,
    pub max_leverage: Decimal,
}

impl Default for RiskMonitorConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: Decimal::from(20),
            max_concentration_pct: Decimal::from(50),
            max_leverage: Decimal::from(3),
        }
    }
}

/// Tracks running peak equity and raises alerts when a snapshot breaches
/// `RiskMonitorConfig`'s thresholds. Read-only over the core: it never
/// mutates the Portfolio it observes, only the snapshots handed to it.
pub struct PortfolioRiskMonitor {
    config: RiskMonitorConfig,
    peak_equity: Decimal,
    sender: Option<Sender<RiskAlert>>,
    alerts_emitted: u64,
}

impl PortfolioRiskMonitor {
    pub fn new(config: RiskMonitorConfig) -> Self {
        Self {
            config,
            peak_equity: Decimal::ZERO,
            sender: None,
            alerts_emitted: 0,
        }
    }

    /// Alerts are also pushed to `sender`, if attached, so a long-running
    /// caller (the CLI, a dashboard) can react as they happen rather than
    /// polling the returned `Vec`.
    pub fn with_sender(mut self, sender: Sender<RiskAlert>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn alerts_emitted(&self) -> u64 {
        self.alerts_emitted
    }

    /// Evaluates one snapshot, returning every alert raised by it (zero or
    /// more — a single update can simultaneously breach drawdown and
    /// leverage, say).
    pub fn on_portfolio_update(&mut self, update: &PortfolioUpdate) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();

        if update.equity > self.peak_equity {
            self.peak_equity = update.equity;
        }

        if self.peak_equity > Decimal::ZERO {
            let drawdown_pct = (self.peak_equity - update.equity) / self.peak_equity * Decimal::from(100);
            if drawdown_pct > self.config.max_drawdown_pct {
                alerts.push(RiskAlert::new(
                    update.timestamp,
                    RiskSeverity::Critical,
                    RiskAlertKind::DrawdownExceeded {
                        current_drawdown_pct: drawdown_pct,
                        limit_pct: self.config.max_drawdown_pct,
                    },
                    format!(
                        "drawdown {drawdown_pct}% exceeds {}% limit",
                        self.config.max_drawdown_pct
                    ),
                ));
            }
        }

        if update.equity > Decimal::ZERO {
            let mut gross_exposure = Decimal::ZERO;
            for position in &update.positions {
                if position.is_flat() {
                    continue;
                }
                let exposure = position.market_value().abs();
                gross_exposure += exposure;

                let weight_pct = exposure / update.equity * Decimal::from(100);
                if weight_pct > self.config.max_concentration_pct {
                    alerts.push(RiskAlert::new(
                        update.timestamp,
                        RiskSeverity::Warning,
                        RiskAlertKind::ConcentrationExceeded {
                            symbol: position.symbol.to_string(),
                            weight_pct,
                            limit_pct: self.config.max_concentration_pct,
                        },
                        format!(
                            "{} is {weight_pct}% of equity, exceeding {}% limit",
                            position.symbol, self.config.max_concentration_pct
                        ),
                    ));
                }
            }

            let leverage = gross_exposure / update.equity;
            if leverage > self.config.max_leverage {
                alerts.push(RiskAlert::new(
                    update.timestamp,
                    RiskSeverity::Critical,
                    RiskAlertKind::LeverageExceeded {
                        current_leverage: leverage,
                        limit: self.config.max_leverage,
                    },
                    format!("leverage {leverage}x exceeds {}x limit", self.config.max_leverage),
                ));
            }
        }

        self.alerts_emitted += alerts.len() as u64;
        for alert in &alerts {
            match alert.severity {
                RiskSeverity::Critical => warn!(%alert.message, "RISK CRITICAL"),
                RiskSeverity::Warning => warn!(%alert.message, "RISK WARNING"),
                RiskSeverity::Info => info!(%alert.message, "RISK INFO"),
            }
            if let Some(sender) = &self.sender {
                let _ = sender.send(alert.clone());
            }
        }

        alerts
    }

    /// Clears the running peak so a fresh backtest run doesn't inherit the
    /// previous run's drawdown baseline.
    pub fn reset(&mut self) {
        self.peak_equity = Decimal::ZERO;
        self.alerts_emitted = 0;
    }
}
