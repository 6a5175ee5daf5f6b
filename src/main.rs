use group_assign::config::Settings;
use group_assign::models::{AssignmentReport, FieldMapping, RawRecord};
use group_assign::{Assigner, AssignmentError};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info, warn};

/// Failures of a batch run
#[derive(Debug, Error)]
enum RunError {
    #[error("Failed to read roster: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid roster JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unresolved required fields: {0}")]
    Mapping(String),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),
}

fn run(roster_path: &str, settings: &Settings) -> Result<AssignmentReport, RunError> {
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("assignment", %run_id);
    let _guard = span.enter();

    let records: Vec<RawRecord> = serde_json::from_str(&std::fs::read_to_string(roster_path)?)?;
    info!("Loaded {} roster records from {}", records.len(), roster_path);

    let candidates = settings.field_candidates()?;
    let detected = FieldMapping::detect(FieldMapping::headers_of(&records), &candidates);
    for field in &detected.unresolved_optional {
        warn!("No header found for optional field {}", field);
    }
    let mapping = settings.apply_overrides(detected.mapping)?;

    let missing = mapping.missing_required();
    if !missing.is_empty() {
        let names: Vec<_> = missing.iter().map(|f| f.as_str()).collect();
        return Err(RunError::Mapping(names.join(", ")));
    }

    let assigner = Assigner::new(settings.engine_config())?;
    let result = assigner.assign_records(&records, &mapping)?;

    Ok(AssignmentReport::from_result(&result, run_id))
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging; output goes to stderr so stdout carries only the report
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    let mut args = std::env::args().skip(1);
    let Some(roster_path) = args.next() else {
        error!("Usage: group-assign <roster.json> [settings.toml]");
        return ExitCode::from(2);
    };

    let settings = match args.next() {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration loaded successfully");

    match run(&roster_path, &settings) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
