use std::{io, sync::Arc};

use anyhow::{Context, Result};
use bar_feed::{HistDataReq, SecurityType, SeriesKey};
use clap::{Args, Parser, Subcommand};
use hist_cache::{
    HistDataService, SqliteStore,
    config::{CacheConfig, load_config_path},
    csv_io,
    db::migrate,
    providers::build_broker,
    store::BarStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Historical bar cache CLI")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE", default_value = "hist_cache.toml")]
    config: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations.
    Migrate,
    /// Show what a request would download, without downloading.
    Plan(ReqArgs),
    /// Serve a request, downloading missing ranges.
    Get {
        #[command(flatten)]
        req: ReqArgs,
        /// Write the result here instead of stdout.
        #[arg(long, value_name = "FILE")]
        csv: Option<String>,
    },
    /// Load bars from a CSV file into the store.
    Import {
        #[arg(long, value_name = "FILE")]
        csv: String,
        #[arg(long, default_value = "Stock")]
        security_type: String,
    },
}

#[derive(Args)]
struct ReqArgs {
    symbol: String,
    /// e.g. "1h", "5 mins", "1d".
    bar_size: String,
    /// e.g. "8d", "36h", "2W".
    duration: String,
    /// End instant, e.g. "2017-09-13" or "2017-09-12 14:15:00"; exchange time.
    #[arg(long)]
    end: String,
    #[arg(long, default_value = "Stock")]
    security_type: String,
}

impl ReqArgs {
    fn to_request(&self, cfg: &CacheConfig) -> Result<HistDataReq> {
        Ok(HistDataReq::parse(
            &self.security_type,
            &self.symbol,
            &self.bar_size,
            &self.duration,
            &self.end,
            &cfg.exchange_tz,
        )?)
    }
}

fn service(cfg: &CacheConfig, store: SqliteStore) -> Result<HistDataService> {
    let calendar = cfg.trading_calendar();
    let broker = build_broker(&cfg.provider, &calendar).context("building broker")?;
    Ok(HistDataService::new(broker, Arc::new(store), calendar)
        .with_max_concurrency(cfg.max_concurrent_downloads))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config))?;

    match cli.cmd {
        Cmd::Migrate => {
            let applied = migrate::run_sqlite(&cfg.database_url)?;
            println!("applied {} migration(s)", applied.len());
        }
        Cmd::Plan(args) => {
            let req = args.to_request(&cfg)?;
            let store = SqliteStore::open(&cfg.database_url)?;
            let plan = service(&cfg, store)?.plan(&req).await?;
            print!("{plan}");
        }
        Cmd::Get { req, csv } => {
            let req = req.to_request(&cfg)?;
            let store = SqliteStore::open(&cfg.database_url)?;
            let block = service(&cfg, store)?.get_hist_data(&req).await?;
            let tz = cfg.exchange_tz()?;
            match csv {
                Some(path) => {
                    csv_io::write_block_path(&block, &path, tz)?;
                    eprintln!("wrote {} rows to {path}", block.len());
                }
                None => csv_io::write_block(&block, io::stdout().lock(), tz)?,
            }
        }
        Cmd::Import { csv, security_type } => {
            let security_type: SecurityType = security_type.parse()?;
            let block = csv_io::read_block_path(&csv, cfg.exchange_tz()?)
                .with_context(|| format!("reading {csv}"))?;
            let store = SqliteStore::open(&cfg.database_url)?;
            let mut total = 0;
            for (symbol, bar_size) in block.series() {
                let key = SeriesKey::new(symbol, security_type, bar_size);
                let rows = block
                    .rows()
                    .filter(|r| r.symbol == key.symbol && r.bar_size == key.bar_size)
                    .cloned()
                    .collect();
                total += store.insert_rows(&key, rows).await?;
            }
            println!("imported {total} rows from {csv}");
        }
    }

    Ok(())
}
