mod logging;
mod pipeline;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use enpull_core::config::DEFAULT_CONFIG_PATH;
use enpull_core::{Config, IntervalPlanner, RecordMapper, format_day, parse_day};
use enpull_store::DuckStore;
use enpull_sync::ExportClient;
use tracing::{debug, info};

/// Pull supporter and consent exports from Engaging Networks into DuckDB.
#[derive(Parser, Debug)]
#[command(name = "enpull", version)]
struct Args {
    /// First day to pull (MMDDYYYY). Defaults to the day after the last
    /// ingested signing date.
    #[arg(long, value_parser = parse_day)]
    start: Option<NaiveDate>,

    /// Last day to pull (MMDDYYYY). Defaults to yesterday.
    #[arg(long, value_parser = parse_day)]
    end: Option<NaiveDate>,

    /// JSON config with the service token and database settings
    #[arg(short, long, env = "ENPULL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Only print errors to the console
    #[arg(short, long)]
    silent: bool,

    /// Also append progress to this file
    #[arg(short, long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.silent, args.log.as_deref())?;
    info!("enpull v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args.config)?;
    let table = config.tables.person_events.as_str();

    let mut store = DuckStore::open_at(config.database.path.as_deref())
        .context("opening destination database")?;
    store.ensure_person_table(table)?;

    let last_ingested = match args.start {
        Some(_) => None,
        None => store.last_signing_date(table)?,
    };
    let range = IntervalPlanner::for_today().plan(args.start, args.end, last_ingested)?;
    info!(
        start = %format_day(range.start()),
        end = %format_day(range.end()),
        days = range.len(),
        "planned run"
    );
    debug!(days = ?range.formatted(), "planned days");

    let mapper = RecordMapper::new(&config);
    let client = ExportClient::new(config.export.base_url.clone(), config.token.clone());
    let summary = pipeline::run(&client, &mut store, &mapper, &range).await?;

    info!(
        days = summary.days,
        inserted = summary.inserted,
        updated = summary.updated,
        ignored = summary.ignored,
        failed_batches = summary.failed_batches,
        "run complete"
    );
    Ok(())
}
