//! Parcel Ingest - per-state bulk loader

use std::path::PathBuf;
use std::process;

use clap::Parser;
use parcel_common::logging::{init_logging, LogConfig, LogLevel};
use parcel_ingest::error::EXIT_USAGE;
use parcel_ingest::manifest::format_rate;
use parcel_ingest::{
    default_datasets, select_datasets, IngestConfig, IngestResult, LoadOrchestrator, LoadReport,
    PgLoadStore, StateCode, StateJob,
};
use tracing::{error, info};

const MANIFEST_HELP: &str = "\
Each finished file adds a line to <MANIFEST_DIR>/completed_<STATE>.txt:

  File finished: ZTrans/Main.txt\t\tState Code: 06\tSuccess rate:99.50%

The file is named with its dataset (ZTrans/Main.txt, not Main.txt) because
ZAsmt and ZTrans both ship a Main.txt. Tools that match the bare file name
must strip the dataset prefix.";

#[derive(Parser, Debug)]
#[command(name = "parcel-ingest")]
#[command(author, version, about = "Load one state's ZAsmt and ZTrans extracts into PostgreSQL")]
#[command(after_help = MANIFEST_HELP)]
struct Cli {
    /// Two-character state code, e.g. 06
    state: String,

    /// Only load these datasets (comma separated)
    #[arg(long, value_delimiter = ',', env = "PARCEL_DATASETS")]
    datasets: Vec<String>,

    /// Directory holding one subdirectory per state
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Where completion manifests are written
    #[arg(long)]
    manifest_dir: Option<PathBuf>,

    /// Where rejected-record logs are written
    #[arg(long)]
    error_dir: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Inserted rows per committed batch
    #[arg(long)]
    commit_interval: Option<u64>,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            process::exit(code);
        },
    };

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("parcel-ingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The loader still runs if logging cannot be set up
    let guard = init_logging(&log_config).ok();

    let code = match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            info!(state = %report.state, "Store into database for state {} finished", report.state);
            0
        },
        Err(e) => {
            error!(error = %e, "Load failed");
            eprintln!("Error: {e}");
            e.exit_code()
        },
    };

    // Flush the file appender before exiting
    drop(guard);
    process::exit(code);
}

async fn run(cli: Cli) -> IngestResult<LoadReport> {
    let state = StateCode::parse(&cli.state)?;

    let mut config = IngestConfig::load()?;
    if let Some(url) = cli.database_url {
        config = config.with_database_url(url);
    }
    if let Some(dir) = cli.data_root {
        config = config.with_data_root(dir);
    }
    if let Some(dir) = cli.manifest_dir {
        config = config.with_manifest_dir(dir);
    }
    if let Some(dir) = cli.error_dir {
        config = config.with_error_dir(dir);
    }
    if let Some(interval) = cli.commit_interval {
        config = config.with_commit_interval(interval);
    }
    if cli.no_progress {
        config = config.with_progress(false);
    }
    config.validate()?;

    let datasets = if cli.datasets.is_empty() {
        default_datasets()
    } else {
        select_datasets(default_datasets(), &cli.datasets)?
    };

    let job = StateJob::new(state, datasets, &config.paths.data_root)?;
    let store = PgLoadStore::connect(&config.database).await?;

    LoadOrchestrator::new(store, job, &config)?.run().await
}

fn print_summary(report: &LoadReport) {
    println!("State {}:", report.state);
    for file in &report.files {
        println!(
            "  {:<28} {:>10}/{:<10} {}%",
            file.label,
            file.progress.progress,
            file.progress.tracker,
            format_rate(file.success_rate())
        );
        if let Some(log) = &file.error_log {
            println!("    rejected records: {}", log.display());
        }
    }
    println!(
        "  {} records, {} inserted, {} rejected",
        report.total_records(),
        report.total_inserted(),
        report.total_rejected()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_state_is_usage_error() {
        let err = Cli::try_parse_from(["parcel-ingest"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_help_describes_manifest_file_names() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("completed_<STATE>.txt"));
        assert!(help.contains("ZTrans/Main.txt, not Main.txt"));
    }

    #[test]
    fn test_dataset_list() {
        let cli =
            Cli::try_parse_from(["parcel-ingest", "06", "--datasets", "ZAsmt,ZTrans"]).unwrap();
        assert_eq!(cli.state, "06");
        assert_eq!(cli.datasets, vec!["ZAsmt", "ZTrans"]);
    }
}
