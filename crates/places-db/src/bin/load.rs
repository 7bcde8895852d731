//! places-load: load place records into the place store.
//!
//! Reads a JSON array or JSON Lines file, validates every record, and
//! upserts the valid ones in chunks. Re-running on the same input leaves the
//! store unchanged. The run report is printed to stdout as JSON; logs go to
//! stderr.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use places_db::{
    apply_schema, create_pool_with_config, Error, IngestAbort, IngestMode, IngestionPipeline,
    IngestionReport, InputFormat, JsonLines, PgPlaceWriter, PoolConfig, RawRecord,
    DEFAULT_DATABASE_URL,
};

#[derive(Parser, Debug)]
#[command(name = "places-load")]
#[command(author, version, about = "Load place records into the places store")]
struct Cli {
    /// JSON array file, or JSON Lines file (`.jsonl`), of place records
    input: PathBuf,

    /// Input records per transaction
    #[arg(long, default_value_t = IngestionPipeline::DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    batch_size: usize,

    /// Treat the input as JSON Lines regardless of extension
    #[arg(long)]
    jsonl: bool,

    /// Validate and predict inserts/updates without writing
    #[arg(long)]
    dry_run: bool,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, hide_env_values = true)]
    database_url: String,

    /// Skip the ingestion lock (concurrent runs may interleave)
    #[arg(long)]
    no_lock: bool,

    /// Create the places table and indexes before loading
    #[arg(long, conflicts_with = "dry_run")]
    init_schema: bool,

    /// Log output format: "text" or "json"
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Printed instead of the plain report when a run aborts.
#[derive(Serialize)]
struct AbortSummary<'a> {
    error: &'static str,
    message: String,
    resume_offset: usize,
    report: &'a IngestionReport,
}

enum Input {
    Parsed(Vec<RawRecord>),
    Lines(JsonLines<BufReader<File>>),
}

impl Input {
    /// Record count when the whole input is already in memory.
    fn known_len(&self) -> Option<usize> {
        match self {
            Input::Parsed(records) => Some(records.len()),
            Input::Lines(_) => None,
        }
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing report")?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "places-load failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mode = if cli.dry_run {
        IngestMode::DryRun
    } else {
        IngestMode::Apply
    };

    // JSON Lines is streamed from disk; a JSON array has to be parsed whole.
    let format = InputFormat::for_path(&cli.input, cli.jsonl);
    let input = match format {
        InputFormat::JsonArray => {
            let text = tokio::fs::read_to_string(&cli.input)
                .await
                .with_context(|| format!("reading {}", cli.input.display()))?;
            let records = format
                .parse(&text)
                .with_context(|| format!("parsing {}", cli.input.display()))?;
            Input::Parsed(records)
        }
        InputFormat::JsonLines => {
            let file = File::open(&cli.input)
                .with_context(|| format!("opening {}", cli.input.display()))?;
            Input::Lines(JsonLines::new(BufReader::new(file)))
        }
    };

    info!(
        subsystem = "ingest",
        component = "cli",
        op = "load",
        input = %cli.input.display(),
        format = ?format,
        records = input.known_len(),
        mode = mode.as_str(),
        "Input opened"
    );

    let pool_config = PoolConfig::from_env()?;
    let pool = create_pool_with_config(&cli.database_url, pool_config).await?;

    if cli.init_schema {
        apply_schema(&pool).await?;
    }

    let mut writer = if mode == IngestMode::DryRun || cli.no_lock {
        PgPlaceWriter::acquire(&pool).await?
    } else {
        PgPlaceWriter::acquire_exclusive(&pool).await?
    };

    let pipeline = IngestionPipeline::new().with_batch_size(cli.batch_size);
    let outcome = match input {
        Input::Parsed(records) => pipeline.run(&mut writer, records, mode).await,
        Input::Lines(mut lines) => {
            let outcome = pipeline.run(&mut writer, &mut lines, mode).await;
            match (outcome, lines.take_error()) {
                // Input cut short by a read error; resume where reading stopped.
                (Ok(report), Some(err)) => Err(IngestAbort {
                    resume_offset: report.total,
                    report,
                    source: Error::Io(err),
                }),
                (outcome, _) => outcome,
            }
        }
    };
    drop(writer);
    pool.close().await;

    match outcome {
        Ok(report) => {
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(IngestAbort {
            report,
            resume_offset,
            source,
        }) => {
            print_json(&AbortSummary {
                error: source.code(),
                message: source.to_string(),
                resume_offset,
                report: &report,
            })?;
            Ok(ExitCode::FAILURE)
        }
    }
}
