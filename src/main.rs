//! # Scope News
//!
//! Produces four printed news digests per run, one for each geographic scope
//! (local, regional, national, global). Each scope is searched on Tavily,
//! summarized by a language model, rendered to a Word document and sent to
//! the default printer.
//!
//! ## Usage
//!
//! ```sh
//! export TAVILY_API_KEY=tvly-...
//! export OPENAI_API_KEY=sk-...
//! scope_news -o ./reports
//! ```
//!
//! ## Architecture
//!
//! 1. **Startup**: load `.env`, parse the CLI, read `config.yaml`, validate
//!    credentials. Missing credentials abort with exit code 2.
//! 2. **Per scope**, in order: search → summarize → render → print. A failure
//!    ends that scope only; the next scope always runs.
//! 3. **Report**: one outcome per scope is logged. The exit code is 0 when
//!    every scope produced its document, 1 otherwise.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod print;
mod report;
mod retry;
mod search;
mod summarize;
mod utils;

use cli::Cli;
use config::{ApiKeys, Credentials, FileConfig, Settings};
use models::{OutcomeKind, ScopeOutcome, run_succeeded};
use outputs::docx::DocxWriter;
use error::StartupError;
use pipeline::{ReportPipeline, run_report};
use print::SystemPrinter;
use search::TavilyClient;
use summarize::LlmSummarizer;

/// Exit status for configuration and credential problems.
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    // Environment first, so clap's `env` fallbacks see .env values.
    let dotenv = dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("scope_news starting up");
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded .env");
    }

    let args = Cli::parse();
    debug!(?args.output_dir, ?args.config, ?args.provider, "Parsed CLI arguments");

    let file_config = match FileConfig::discover(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let settings = Settings::resolve(&args, &file_config);

    info!(
        provider = %settings.provider,
        model = %settings.model,
        output_dir = %settings.output_dir.display(),
        dated = settings.dated,
        "Resolved settings"
    );

    let outcomes = match run_report(&settings, &ApiKeys::from(&args), build_pipeline).await {
        Ok(outcomes) => outcomes,
        Err(StartupError::Credentials(e)) => {
            error!(error = %e, "Missing credentials; nothing was searched or written");
            return ExitCode::from(EXIT_CONFIG);
        }
        Err(e) => {
            error!(error = %e, "Failed to build API clients");
            return ExitCode::FAILURE;
        }
    };

    report_outcomes(&outcomes);

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        elapsed_human = %format!("{:.2}s", elapsed.as_secs_f64()),
        "Execution complete"
    );

    if run_succeeded(&outcomes) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Wire the production collaborators for a run.
fn build_pipeline(
    settings: &Settings,
    credentials: Credentials,
) -> Result<ReportPipeline<TavilyClient, LlmSummarizer, DocxWriter, SystemPrinter>, StartupError> {
    let search = TavilyClient::new(
        &credentials.search_key,
        settings.max_results,
        settings.timeout,
        settings.retry.clone(),
    )?;
    let summarizer = LlmSummarizer::new(
        settings.provider,
        &settings.model,
        &credentials.llm_key,
        settings.timeout,
        settings.retry.clone(),
    )?;

    let writer = if settings.dated {
        DocxWriter::dated(&settings.output_dir, settings.provider.as_str())
    } else {
        DocxWriter::new(settings.output_dir.clone())
    };
    info!(dir = %writer.output_dir().display(), "Documents will be written here");

    Ok(ReportPipeline::new(
        search,
        summarizer,
        writer,
        SystemPrinter::for_host(),
        settings.queries.clone(),
    ))
}

fn report_outcomes(outcomes: &[ScopeOutcome]) {
    for o in outcomes {
        let path = o
            .document
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let stage = o.stage.map(|s| s.to_string()).unwrap_or_default();
        let message = o.message.as_deref().unwrap_or_default();

        match o.kind {
            OutcomeKind::Success => info!(scope = %o.scope, %path, "Printed"),
            OutcomeKind::PrintFailed => {
                warn!(scope = %o.scope, %path, %message, "Written but not printed")
            }
            _ => error!(scope = %o.scope, outcome = ?o.kind, %stage, %message, "Scope failed"),
        }
    }
}
