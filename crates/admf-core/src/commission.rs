//! Computes per-fill commission from the configured model (§4.5).

use rust_decimal::Decimal;

use admf_types::backtest::CommissionModel;

pub fn compute_commission(model: &CommissionModel, quantity: u64, price: Decimal) -> Decimal {
    match model {
        CommissionModel::None => Decimal::ZERO,
        CommissionModel::Percentage { rate, min, max } => {
            let notional = Decimal::from(quantity) * price;
            (notional * rate).clamp(*min, *max)
        }
        CommissionModel::Fixed { per_trade } => *per_trade,
        CommissionModel::PerShare { rate } => rate * Decimal::from(quantity),
        CommissionModel::Tiered { schedule } => tiered_commission(schedule, quantity),
    }
}

/// `schedule` is a list of `(threshold, rate_per_share)` pairs, ascending by
/// threshold; the highest threshold not exceeding `quantity` applies. An
/// empty schedule charges nothing.
fn tiered_commission(schedule: &[(u64, Decimal)], quantity: u64) -> Decimal {
    let rate = schedule
        .iter()
        .filter(|(threshold, _)| *threshold <= quantity)
        .max_by_key(|(threshold, _)| *threshold)
        .map(|(_, rate)| *rate)
        .unwrap_or(Decimal::ZERO);
    rate * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn none_charges_nothing() {
        assert_eq!(compute_commission(&CommissionModel::None, 100, dec!(50)), Decimal::ZERO);
    }

    #[test]
    fn percentage_is_clamped_between_min_and_max() {
        let model = CommissionModel::Percentage {
            rate: dec!(0.001),
            min: dec!(1),
            max: dec!(10),
        };
        // notional 100 * 50 = 5000 * 0.001 = 5, within [1, 10]
        assert_eq!(compute_commission(&model, 100, dec!(50)), dec!(5));
        // tiny trade clamped to the floor
        let model_floor = CommissionModel::Percentage {
            rate: dec!(0.001),
            min: dec!(2),
            max: dec!(10),
        };
        assert_eq!(compute_commission(&model_floor, 1, dec!(1)), dec!(2));
    }

    #[test]
    fn per_share_scales_with_quantity() {
        let model = CommissionModel::PerShare { rate: dec!(0.01) };
        assert_eq!(compute_commission(&model, 200, dec!(50)), dec!(2));
    }

    #[test]
    fn tiered_picks_the_highest_applicable_threshold() {
        let model = CommissionModel::Tiered {
            schedule: vec![(0, dec!(0.01)), (500, dec!(0.005)), (1000, dec!(0.002))],
        };
        assert_eq!(compute_commission(&model, 10, dec!(1)), dec!(0.1));
        assert_eq!(compute_commission(&model, 750, dec!(1)), dec!(3.75));
        assert_eq!(compute_commission(&model, 1500, dec!(1)), dec!(3));
    }
}
