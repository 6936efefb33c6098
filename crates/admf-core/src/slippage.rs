//! Adjusts a simulated fill price away from the reference price (§4.5).

use rand::Rng;
use rust_decimal::Decimal;

use admf_types::backtest::SlippageModel;
use admf_types::orders::Side;

/// Inputs a slippage model may use to compute its adjustment.
pub struct SlippageContext<'a> {
    pub side: Side,
    pub reference_price: Decimal,
    pub quantity: u64,
    pub realized_vol: Decimal,
    pub rng: &'a mut dyn rand::RngCore,
}

/// Applies `model` to `ctx`, returning the adjusted fill price. Slippage
/// always moves the price against the order: worse for buys (higher),
/// worse for sells (lower).
pub fn apply_slippage(model: &SlippageModel, ctx: &mut SlippageContext) -> Decimal {
    let bps = match model {
        SlippageModel::None => Decimal::ZERO,
        SlippageModel::Fixed { basis_points } => *basis_points,
        SlippageModel::Variable {
            base_bps,
            size_impact,
            volatility_impact,
            random_factor,
        } => {
            let size_term = *size_impact * Decimal::from(ctx.quantity);
            let vol_term = *volatility_impact * ctx.realized_vol;
            let random_bps = if *random_factor > Decimal::ZERO {
                let draw: f64 = ctx.rng.gen_range(0.0..1.0);
                *random_factor * Decimal::from_f64_retain(draw).unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            base_bps + size_term + vol_term + random_bps
        }
    };

    let direction = match ctx.side {
        Side::Buy => Decimal::ONE,
        Side::Sell => -Decimal::ONE,
    };
    let adjustment = ctx.reference_price * (bps / Decimal::from(10_000)) * direction;
    ctx.reference_price + adjustment
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn ctx(side: Side, rng: &mut StdRng) -> SlippageContext {
        SlippageContext {
            side,
            reference_price: dec!(100),
            quantity: 10,
            realized_vol: dec!(0),
            rng,
        }
    }

    #[test]
    fn no_slippage_returns_reference_price() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = ctx(Side::Buy, &mut rng);
        assert_eq!(apply_slippage(&SlippageModel::None, &mut c), dec!(100));
    }

    #[test]
    fn fixed_slippage_worsens_buys_and_improves_nothing_for_sells() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = SlippageModel::Fixed {
            basis_points: dec!(10),
        };
        let mut buy_ctx = ctx(Side::Buy, &mut rng);
        let buy_price = apply_slippage(&model, &mut buy_ctx);
        assert!(buy_price > dec!(100));

        let mut rng2 = StdRng::seed_from_u64(1);
        let mut sell_ctx = ctx(Side::Sell, &mut rng2);
        let sell_price = apply_slippage(&model, &mut sell_ctx);
        assert!(sell_price < dec!(100));
    }
}
