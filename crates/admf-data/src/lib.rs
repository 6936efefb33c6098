pub mod cache;
pub mod loaders;

pub use cache::BarCache;
pub use loaders::{validate_bars, CsvBarLoader};

use admf_types::errors::GbResult;
use admf_types::market::{Bar, Symbol};
use std::path::Path;

/// Loads a symbol's series, serving from `cache` when present.
pub struct DataSource {
    cache: BarCache,
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource {
    pub fn new() -> Self {
        Self { cache: BarCache::new() }
    }

    /// Loads `path` for `symbol`, caching the result for subsequent calls
    /// with the same symbol (used by the optimizer to avoid re-reading the
    /// CSV on every trial).
    pub fn load_csv(&mut self, path: impl AsRef<Path>, symbol: Symbol) -> GbResult<Vec<Bar>> {
        if let Some(cached) = self.cache.get(&symbol) {
            return Ok(cached.to_vec());
        }
        let bars = CsvBarLoader::load(path, Some(symbol.clone()))?;
        self.cache.store(symbol, bars.clone());
        Ok(bars)
    }

    pub fn load_directory(&mut self, dir: impl AsRef<Path>) -> GbResult<Vec<(Symbol, Vec<Bar>)>> {
        let series = CsvBarLoader::load_directory(dir)?;
        for (symbol, bars) in &series {
            self.cache.store(symbol.clone(), bars.clone());
        }
        Ok(series)
    }

    pub fn cache(&self) -> &BarCache {
        &self.cache
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }
}
