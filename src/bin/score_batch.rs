//! One-shot batch driver: optionally ingest, then evaluate + normalize the whole store.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use startup_scorer::bootstrap::AppRuntime;
use startup_scorer::config::ScoringConfig;
use startup_scorer::normalize::{Strategy, TieRule};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Zscore,
    Percentile,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TiesArg {
    First,
    Average,
}

#[derive(Parser, Debug)]
#[command(name = "score-batch", about = "Evaluate and normalize every stored startup")]
struct Cli {
    /// Scoring config file (JSON or TOML)
    #[arg(long, env = "SCORING_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// JSON store file, overrides the config
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    #[arg(long, value_enum)]
    ties: Option<TiesArg>,
    #[arg(long)]
    concurrency: Option<usize>,
    /// Leave already-scored records untouched
    #[arg(long)]
    skip_scored: bool,
    /// Pull founders from the people-search API first
    #[arg(long)]
    ingest: bool,
    /// Complete ingested records through the oracle before storing
    #[arg(long, requires = "ingest")]
    fill: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(p) => ScoringConfig::load_from_file(p)?,
        None => ScoringConfig::load_default()?,
    };
    if let Some(store) = cli.store {
        cfg.store_path = store;
    }
    if let Some(s) = cli.strategy {
        cfg.strategy = match s {
            StrategyArg::Zscore => Strategy::ZScore,
            StrategyArg::Percentile => Strategy::Percentile,
        };
    }
    if let Some(t) = cli.ties {
        cfg.ties = match t {
            TiesArg::First => TieRule::FirstOccurrence,
            TiesArg::Average => TieRule::Average,
        };
    }
    if let Some(n) = cli.concurrency {
        cfg.concurrency = n.max(1);
    }
    cfg.skip_scored |= cli.skip_scored;

    let rt = AppRuntime::from_config(cfg);

    if cli.ingest {
        let report = rt.ingest_people_search(cli.fill).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let report = rt.orchestrator().run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
