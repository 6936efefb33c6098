//! Risk alert types and severity levels.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a risk alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskSeverity {
    /// Informational — within normal operating range.
    Info,
    /// Warning — approaching a limit.
    Warning,
    /// Critical — limit breached; action required.
    Critical,
}

/// Discriminant for the kind of risk alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskAlertKind {
    /// Portfolio drawdown from its running peak equity exceeds threshold.
    DrawdownExceeded {
        current_drawdown_pct: Decimal,
        limit_pct: Decimal,
    },
    /// A single position is too concentrated.
    ConcentrationExceeded {
        symbol: String,
        weight_pct: Decimal,
        limit_pct: Decimal,
    },
    /// Portfolio leverage (gross exposure / equity) exceeds limit.
    LeverageExceeded {
        current_leverage: Decimal,
        limit: Decimal,
    },
}

/// A single risk alert emitted by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: RiskSeverity,
    pub kind: RiskAlertKind,
    pub message: String,
    /// Whether the alert has been acknowledged by a human operator.
    pub acknowledged: bool,
}

impl RiskAlert {
    /// Builds a new, unacknowledged alert stamped with `timestamp` — the
    /// triggering `PortfolioUpdate`'s timestamp, not wall-clock time, so
    /// alerts stay reproducible across identical backtest runs.
    pub fn new(timestamp: DateTime<Utc>, severity: RiskSeverity, kind: RiskAlertKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            severity,
            kind,
            message,
            acknowledged: false,
        }
    }
}
