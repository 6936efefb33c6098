use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::market::Symbol;
use crate::orders::{Fill, Side};

/// A single fill recorded against a position, kept for audit/reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
    pub realized_pnl_delta: Decimal,
}

/// Signed net holding in one symbol, with a weighted-average cost basis.
///
/// Sign convention: positive = long, negative = short, zero = flat. Cost
/// basis is defined only when `quantity != 0`; a full close resets it to
/// zero. Unlike a naive implementation, the entry is never removed from the
/// portfolio's position map when it goes flat — it persists for the
/// duration of the run and is only destroyed on `reset()` (see
/// `Portfolio::reset`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: i64,
    pub cost_basis: Decimal,
    pub realized_pnl: Decimal,
    pub last_mark_price: Decimal,
    pub transactions: Vec<Transaction>,
}

impl Position {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: 0,
            cost_basis: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            last_mark_price: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Current direction as used by the Risk Manager's `current_direction`
    /// map: `sign(quantity)`.
    pub fn direction(&self) -> i32 {
        self.quantity.signum() as i32
    }

    pub fn market_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.last_mark_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        if self.quantity == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.quantity) * (self.last_mark_price - self.cost_basis)
    }

    pub fn update_market_price(&mut self, price: Decimal) {
        self.last_mark_price = price;
    }

    /// Apply an incoming fill (§4.6, steps 2-3 of the Portfolio algorithm).
    /// Returns the realized P&L delta produced by this fill, so the caller
    /// (`Portfolio::apply_fill`) can update cash and cumulative totals.
    pub fn apply_fill(&mut self, side: Side, quantity: u64, price: Decimal, timestamp: DateTime<Utc>) -> Decimal {
        let signed_qty = side.sign() * quantity as i64;
        let mut realized_delta = Decimal::ZERO;

        let same_direction_or_flat =
            self.quantity == 0 || self.quantity.signum() == signed_qty.signum();

        if !same_direction_or_flat {
            // Reduction or flip: close the overlapping portion against cost basis.
            let closed = signed_qty.unsigned_abs().min(self.quantity.unsigned_abs());
            realized_delta =
                Decimal::from(closed) * (price - self.cost_basis) * Decimal::from(self.quantity.signum());
            self.realized_pnl += realized_delta;
        }

        let new_quantity = self.quantity + signed_qty;

        if same_direction_or_flat {
            // Opening or adding: weighted-average cost basis.
            let old_notional = Decimal::from(self.quantity.abs()) * self.cost_basis;
            let new_notional = Decimal::from(signed_qty.abs()) * price;
            let total_qty = self.quantity.abs() + signed_qty.abs();
            self.cost_basis = if total_qty == 0 {
                Decimal::ZERO
            } else {
                (old_notional + new_notional) / Decimal::from(total_qty)
            };
        } else if new_quantity == 0 {
            self.cost_basis = Decimal::ZERO;
        } else if new_quantity.signum() != self.quantity.signum() {
            // Flipped through flat: residual quantity is re-based at this fill's price.
            self.cost_basis = price;
        }
        // else: partial reduction, same sign, cost basis is unchanged.

        self.quantity = new_quantity;
        self.transactions.push(Transaction {
            timestamp,
            side,
            quantity,
            price,
            realized_pnl_delta: realized_delta,
        });

        realized_delta
    }
}

/// Cash plus mark-to-market value of all positions, sampled once per
/// distinct bar timestamp.
pub type EquityCurve = Vec<(DateTime<Utc>, Decimal)>;

/// Cash, positions, equity curve, and cumulative commission for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub initial_capital: Decimal,
    pub cash: Decimal,
    pub positions: HashMap<Symbol, Position>,
    pub equity_curve: EquityCurve,
    pub total_commissions: Decimal,
    last_equity_timestamp: Option<DateTime<Utc>>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            equity_curve: Vec::new(),
            total_commissions: Decimal::ZERO,
            last_equity_timestamp: None,
        }
    }

    /// §4.6 FILL handling: update the position, cash, and cumulative
    /// commission. Returns the realized P&L delta from this fill.
    pub fn apply_fill(&mut self, fill: &Fill) -> Decimal {
        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));
        let realized_delta = position.apply_fill(fill.side, fill.quantity, fill.price, fill.timestamp);

        let signed_qty = Decimal::from(fill.side.sign()) * Decimal::from(fill.quantity);
        self.cash -= signed_qty * fill.price + fill.commission;
        self.total_commissions += fill.commission;

        realized_delta
    }

    /// §4.6 BAR handling: mark the symbol to market and, if this is a new
    /// bar timestamp, append one equity-curve sample.
    pub fn mark_to_market(&mut self, symbol: &Symbol, price: Decimal, timestamp: DateTime<Utc>) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.update_market_price(price);
        }
        if self.last_equity_timestamp != Some(timestamp) {
            self.equity_curve.push((timestamp, self.equity()));
            self.last_equity_timestamp = Some(timestamp);
        } else if let Some(last) = self.equity_curve.last_mut() {
            last.1 = self.cash
                + self
                    .positions
                    .values()
                    .map(|p| p.market_value())
                    .sum::<Decimal>();
        }
    }

    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value())
                .sum::<Decimal>()
    }

    pub fn total_realized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl()).sum()
    }

    pub fn get_position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn total_return(&self) -> Decimal {
        if self.initial_capital > Decimal::ZERO {
            (self.equity() - self.initial_capital) / self.initial_capital
        } else {
            Decimal::ZERO
        }
    }

    /// Destroys positions and the equity curve; resets cash to
    /// `initial_capital`. Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.positions.clear();
        self.cash = self.initial_capital;
        self.equity_curve.clear();
        self.total_commissions = Decimal::ZERO;
        self.last_equity_timestamp = None;
    }
}

/// Portfolio risk limits, enforced by the Risk Manager (§4.4) — kept in
/// `admf-types` since both `admf-core` and `admf-risk` need the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_positions: usize,
    pub max_position_size: u64,
    pub max_exposure: Decimal,
    pub enforce_single_position: bool,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_positions: usize::MAX,
            max_position_size: u64::MAX,
            max_exposure: Decimal::from(1_000_000_000u64),
            enforce_single_position: false,
        }
    }
}
