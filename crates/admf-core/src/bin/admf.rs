//! `admf` — loads one CSV series, runs a single backtest through the
//! `Coordinator` with the built-in moving-average-crossover strategy, and
//! prints the equity curve and run counters as JSON. Replaces the teacher's
//! bare TCP health-check stub (`gb-engine::bin::engine_service`) with
//! something that actually exercises the core end to end.
//!
//! Usage: `admf <csv-path> [config.json]`
//!
//! `<csv-path>` may be a single file (symbol taken from the file stem) or a
//! directory of CSV files (one symbol per file). `config.json`, if given, is
//! deserialized directly into `BacktestConfig`; otherwise the default config
//! is used with `symbols` filled in from the loaded series.

use std::env;
use std::path::Path;
use std::sync::atomic::Ordering;

use admf_core::strategies::MovingAverageCrossover;
use admf_core::Coordinator;
use admf_data::DataSource;
use admf_types::backtest::BacktestConfig;
use tracing_subscriber::EnvFilter;

fn load_config(path: Option<&str>, symbols: Vec<admf_types::market::Symbol>) -> anyhow::Result<BacktestConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let config: BacktestConfig = serde_json::from_str(&raw)?;
            Ok(config)
        }
        None => Ok(BacktestConfig::default().with_symbols(symbols)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(csv_path) = args.get(1) else {
        eprintln!("usage: admf <csv-path> [config.json]");
        std::process::exit(2);
    };

    let mut data_source = DataSource::new();
    let path = Path::new(csv_path);
    let series = if path.is_dir() {
        data_source.load_directory(path)?
    } else {
        let symbol = admf_types::market::Symbol::new(
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("UNKNOWN").to_uppercase(),
        );
        vec![(symbol.clone(), data_source.load_csv(path, symbol)?)]
    };

    let symbols = series.iter().map(|(symbol, _)| symbol.clone()).collect();
    let config = load_config(args.get(2).map(String::as_str), symbols)?;

    let mut coordinator = Coordinator::new(config);
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received ctrl-c, canceling run");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let strategy = Box::new(MovingAverageCrossover::new(5, 20));
    let result = coordinator.run(strategy, series)?;

    let output = serde_json::json!({
        "equity_curve": result.equity_curve,
        "final_cash": result.final_cash,
        "total_realized_pnl": result.total_realized_pnl,
        "total_unrealized_pnl": result.total_unrealized_pnl,
        "counters": result.counters,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
