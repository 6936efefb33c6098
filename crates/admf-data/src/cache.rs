//! In-memory bar cache keyed by symbol. The teacher's version used
//! `DashMap`/`parking_lot` for concurrent access; the engine loads data
//! once per process and runs single-threaded; a plain `HashMap` is enough
//! to let the optimizer re-run the same series across trials without
//! re-reading the CSV each time.

use std::collections::HashMap;

use admf_types::market::{Bar, Symbol};

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Caches a symbol's full bar series after its first load.
#[derive(Debug, Default)]
pub struct BarCache {
    entries: HashMap<Symbol, Vec<Bar>>,
    stats: CacheStats,
}

impl BarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, symbol: &Symbol) -> Option<&[Bar]> {
        match self.entries.get(symbol) {
            Some(bars) => {
                self.stats.hits += 1;
                Some(bars.as_slice())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn store(&mut self, symbol: Symbol, bars: Vec<Bar>) {
        self.stats.stores += 1;
        self.entries.insert(symbol, bars);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_bars() -> Vec<Bar> {
        vec![Bar::new(
            Symbol::new("MINI"),
            Utc::now(),
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            dec!(1000),
        )]
    }

    #[test]
    fn miss_then_hit_after_store() {
        let mut cache = BarCache::new();
        let symbol = Symbol::new("MINI");
        assert!(cache.get(&symbol).is_none());

        cache.store(symbol.clone(), sample_bars());
        assert_eq!(cache.get(&symbol).unwrap().len(), 1);

        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().stores, 1);
    }

    #[test]
    fn clear_resets_entries_and_stats() {
        let mut cache = BarCache::new();
        let symbol = Symbol::new("MINI");
        cache.store(symbol.clone(), sample_bars());
        cache.get(&symbol);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }
}
