//! Pull-based merge of per-symbol bar series into one chronological stream
//! (§4.2).

use std::collections::HashMap;

use admf_types::market::{Bar, Symbol};

/// Holds one sorted series per symbol and merges them by timestamp on pull.
/// Symbols that share a timestamp are emitted in the order they were added
/// to the handler (stable symbol ordering), matching `Bar`'s own `Ord` impl.
pub struct DataHandler {
    symbol_order: Vec<Symbol>,
    series: HashMap<Symbol, Vec<Bar>>,
    cursors: HashMap<Symbol, usize>,
}

impl DataHandler {
    /// `series` need not be pre-sorted; each symbol's bars are sorted here.
    pub fn new(series: Vec<(Symbol, Vec<Bar>)>) -> Self {
        let mut symbol_order = Vec::with_capacity(series.len());
        let mut series_map = HashMap::with_capacity(series.len());
        let mut cursors = HashMap::with_capacity(series.len());

        for (symbol, mut bars) in series {
            bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            symbol_order.push(symbol.clone());
            cursors.insert(symbol.clone(), 0);
            series_map.insert(symbol, bars);
        }

        Self {
            symbol_order,
            series: series_map,
            cursors,
        }
    }

    /// Pulls the chronologically next bar across all symbols. Ties are
    /// broken by the order symbols were registered in `new`.
    pub fn next_bar(&mut self) -> Option<Bar> {
        let mut best: Option<&Symbol> = None;

        for symbol in &self.symbol_order {
            let cursor = *self.cursors.get(symbol).unwrap_or(&0);
            let Some(bars) = self.series.get(symbol) else {
                continue;
            };
            let Some(candidate) = bars.get(cursor) else {
                continue;
            };
            match best {
                None => best = Some(symbol),
                Some(current_best) => {
                    let current_ts = self.series[current_best][self.cursors[current_best]].timestamp;
                    if candidate.timestamp < current_ts {
                        best = Some(symbol);
                    }
                }
            }
        }

        let symbol = best?.clone();
        let cursor = self.cursors.get_mut(&symbol).unwrap();
        let bar = self.series[&symbol][*cursor].clone();
        *cursor += 1;
        Some(bar)
    }

    pub fn is_exhausted(&self) -> bool {
        self.symbol_order.iter().all(|symbol| {
            let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
            cursor >= self.series.get(symbol).map_or(0, Vec::len)
        })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbol_order
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Rewinds every series' cursor to the start without reloading data.
    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
    }
}
