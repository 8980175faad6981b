//! # fleetdesk-check
//!
//! Validates a JSON dataset snapshot and exits non-zero when anything
//! blocks saving.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetdesk_cli::check::{load_dataset, run_check, CheckArgs, OutputFormat};
use fleetdesk_cli::report::render_text;
use fleetdesk_core::EngineConfig;

/// Validate a fleetdesk dataset snapshot.
#[derive(Parser, Debug)]
#[command(name = "fleetdesk-check", version, about)]
struct Cli {
    #[command(flatten)]
    check: CheckArgs,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fleetdesk_core=info,fleetdesk_cli=info".into());
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if cli.log_json {
        tracing_subscriber::registry().with(filter).with(fmt.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt).init();
    }

    // --- Configuration ---
    let config = EngineConfig::from_env()?;
    tracing::debug!(?config, "Loaded engine configuration");

    let as_of = cli
        .check
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let dataset = load_dataset(&cli.check.dataset)?;
    tracing::info!(
        path = %cli.check.dataset.display(),
        collections = dataset.names().count(),
        %as_of,
        "Loaded dataset"
    );

    let report = run_check(&cli.check, &dataset, as_of, &config)?;
    match cli.check.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.can_save() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
