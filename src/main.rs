// ==========================================
// BOQ Import Engine - Command-line Entry
// ==========================================
// Usage:
//   boq-import import <file.csv> [mapping.json] [config.json]
//   boq-import compare <baseline.json> <actual.json>
//
// Reports are printed to stdout as JSON; logs go to stderr (RUST_LOG,
// BOQ_IMPORT_LOG_JSON=1 for JSON lines).
// Exit code 1 when an import is not successful.
// ==========================================

use anyhow::{bail, Context, Result};
use boq_import::config::{load_column_mapping, ConfigManager};
use boq_import::{
    compare_versions, load_items, logging, BoqImportEngine, CancellationToken, ColumnMapping,
    CsvRowSource, EngineError,
};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage:
  boq-import import <file.csv> [mapping.json] [config.json]
  boq-import compare <baseline.json> <actual.json>";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    if std::env::var_os("BOQ_IMPORT_LOG_JSON").is_some() {
        logging::init_json();
    } else {
        logging::init();
    }

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let rest: Vec<PathBuf> = args.map(PathBuf::from).collect();

    match command.as_str() {
        "import" => run_import(&rest).await,
        "compare" => run_compare(&rest),
        "" | "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

async fn run_import(args: &[PathBuf]) -> Result<ExitCode> {
    let Some(source_path) = args.first() else {
        bail!("missing <file.csv>\n{}", USAGE);
    };

    let mapping = match args.get(1) {
        Some(path) => load_column_mapping(path)
            .with_context(|| format!("loading column mapping {}", path.display()))?,
        None => ColumnMapping::default(),
    };
    let manager = ConfigManager::load(args.get(2).map(PathBuf::as_path))
        .context("loading import configuration")?;

    tracing::info!(
        version = boq_import::VERSION,
        source = %source_path.display(),
        "starting BOQ import"
    );

    let engine = BoqImportEngine::from_snapshot(manager.snapshot(), mapping)?;
    let source = CsvRowSource::open(source_path)
        .with_context(|| format!("opening {}", source_path.display()))?;

    // Ctrl-C stops dispatching new chunks; finished chunks are still reported
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling import");
            on_signal.cancel();
        }
    });

    let report = match engine.run(source, cancel).await {
        Ok(report) => report,
        Err(EngineError::RunFailed { message, report }) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            bail!("import failed: {}", message);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_compare(args: &[PathBuf]) -> Result<ExitCode> {
    let (Some(baseline_path), Some(actual_path)) = (args.first(), args.get(1)) else {
        bail!("compare needs <baseline.json> <actual.json>\n{}", USAGE);
    };

    let baseline = load_items(baseline_path)
        .with_context(|| format!("loading {}", baseline_path.display()))?;
    let actual = load_items(actual_path)
        .with_context(|| format!("loading {}", actual_path.display()))?;
    let report = compare_versions(&baseline, &actual);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
