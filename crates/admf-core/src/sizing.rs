//! Converts a Risk Manager sizing decision into a concrete share count
//! (§4.4).

use rust_decimal::Decimal;

use admf_types::backtest::SizingMethod;

/// Inputs a `Sizer` needs to resolve a quantity. Only the fields relevant to
/// the configured method are read; callers pass the rest as best-effort.
pub struct SizingContext {
    pub equity: Decimal,
    pub price: Decimal,
}

/// Computes an order quantity from a signal and account state. Expressed as
/// a trait (not a free function) so new sizing methods can be added without
/// touching the Risk Manager's dispatch logic — mirrors how `Strategy` and
/// the Broker's slippage/commission models are pluggable.
pub trait Sizer {
    fn size(&self, ctx: &SizingContext) -> u64;
}

impl Sizer for SizingMethod {
    fn size(&self, ctx: &SizingContext) -> u64 {
        match self {
            SizingMethod::Fixed { quantity } => *quantity,
            SizingMethod::PercentEquity { pct } => {
                if ctx.price <= Decimal::ZERO {
                    return 0;
                }
                let notional = ctx.equity * pct;
                to_whole_shares(notional / ctx.price)
            }
            SizingMethod::PercentRisk {
                risk_pct,
                stop_distance,
            } => {
                if *stop_distance <= Decimal::ZERO {
                    return 0;
                }
                let risk_budget = ctx.equity * risk_pct;
                to_whole_shares(risk_budget / *stop_distance)
            }
            SizingMethod::VolatilityTarget {
                target_vol,
                realized_vol,
            } => {
                if *realized_vol <= Decimal::ZERO || ctx.price <= Decimal::ZERO {
                    return 0;
                }
                let scale = target_vol / realized_vol;
                to_whole_shares(ctx.equity * scale / ctx.price)
            }
        }
    }
}

fn to_whole_shares(qty: Decimal) -> u64 {
    if qty <= Decimal::ZERO {
        0
    } else {
        qty.trunc().try_into().unwrap_or(u64::MAX)
    }
}
