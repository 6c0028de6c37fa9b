//! The per-scope report pipeline and the runner that drives all scopes.
//!
//! [`ReportPipeline::run`] executes search → summarize → render → print for
//! one scope and stops at the first fatal stage. Every stage error is turned
//! into a [`ScopeOutcome`]; nothing propagates to the caller. A print failure
//! is recorded as `PrintFailed` but leaves the written document in place.
//!
//! [`ScopeRunner::run_all`] runs the pipeline for every scope in
//! [`Scope::ALL`] order, one after another, regardless of earlier outcomes.
//!
//! [`run_report`] is the startup sequence around them: credentials are
//! checked first, and the collaborators are only built once they pass.

use crate::config::{ApiKeys, Credentials, Queries, Settings};
use crate::error::StartupError;
use crate::models::{Scope, ScopeOutcome, Stage};
use crate::outputs::docx::DocumentWriter;
use crate::print::PrintDispatcher;
use crate::search::SearchClient;
use crate::summarize::SummarizerClient;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Search → summarize → render → print for one scope at a time.
///
/// Generic over its four collaborators so tests can swap any of them for a
/// fake; production wires in `TavilyClient`, `LlmSummarizer`, `DocxWriter`
/// and `SystemPrinter`.
pub struct ReportPipeline<S, M, W, P> {
    search: S,
    summarizer: M,
    writer: W,
    printer: P,
    queries: Queries,
}

impl<S, M, W, P> ReportPipeline<S, M, W, P>
where
    S: SearchClient,
    M: SummarizerClient,
    W: DocumentWriter,
    P: PrintDispatcher,
{
    /// Create a pipeline from its collaborators and the per-scope queries.
    ///
    /// # Arguments
    ///
    /// * `search` - Web search client
    /// * `summarizer` - Language-model client that writes the report text
    /// * `writer` - Renders report text into a document file
    /// * `printer` - Sends the written document to a printer
    /// * `queries` - Search query for each scope
    pub fn new(search: S, summarizer: M, writer: W, printer: P, queries: Queries) -> Self {
        Self {
            search,
            summarizer,
            writer,
            printer,
            queries,
        }
    }

    /// Run every stage for `scope` and report how far it got.
    ///
    /// Stages run in order and the first fatal failure ends the scope:
    /// a search error, a summarizer error or blank report, or a failed write
    /// each skip everything after them. A print failure is not fatal; the
    /// document stays on disk and the outcome is `PrintFailed`.
    ///
    /// # Returns
    ///
    /// Exactly one [`ScopeOutcome`]. This method never returns an error.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, scope: Scope) -> ScopeOutcome {
        let query = self.queries.for_scope(scope);

        info!(%query, "Searching");
        let snippets = match self.search.search(query).await {
            Ok(snippets) => snippets,
            Err(e) => {
                error!(stage = %Stage::Search, error = %e, "Search failed; skipping scope");
                return ScopeOutcome::failed(scope, Stage::Search, e.to_string());
            }
        };

        info!(snippets = snippets.len(), "Summarizing");
        let report = match self.summarizer.summarize(scope, query, &snippets).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                error!(stage = %Stage::Summarize, "Model returned an empty report; skipping scope");
                return ScopeOutcome::failed(scope, Stage::Summarize, "model returned an empty report");
            }
            Err(e) => {
                error!(stage = %Stage::Summarize, error = %e, "Summarization failed; skipping scope");
                return ScopeOutcome::failed(scope, Stage::Summarize, e.to_string());
            }
        };
        drop(snippets);

        let path = match self.writer.write(&report, &scope.file_stem()).await {
            Ok(path) => path,
            Err(e) => {
                error!(stage = %Stage::Render, error = %e, "Writing document failed; skipping scope");
                return ScopeOutcome::failed(scope, Stage::Render, e.to_string());
            }
        };
        drop(report);

        match self.printer.print(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Report written and sent to printer");
                ScopeOutcome::success(scope, path)
            }
            Err(e) => {
                warn!(stage = %Stage::Print, path = %path.display(), error = %e, "Printing failed; document kept");
                ScopeOutcome::print_failed(scope, path, e.to_string())
            }
        }
    }
}

/// Runs the pipeline for each scope in fixed order.
pub struct ScopeRunner<S, M, W, P> {
    pipeline: ReportPipeline<S, M, W, P>,
}

impl<S, M, W, P> ScopeRunner<S, M, W, P>
where
    S: SearchClient,
    M: SummarizerClient,
    W: DocumentWriter,
    P: PrintDispatcher,
{
    pub fn new(pipeline: ReportPipeline<S, M, W, P>) -> Self {
        Self { pipeline }
    }

    #[cfg(test)]
    pub fn pipeline(&self) -> &ReportPipeline<S, M, W, P> {
        &self.pipeline
    }

    /// Run the pipeline for each scope, one after another.
    ///
    /// A failed scope never stops the ones after it.
    ///
    /// # Returns
    ///
    /// One outcome per scope, in [`Scope::ALL`] order.
    pub async fn run_all(&self) -> Vec<ScopeOutcome> {
        let t0 = Instant::now();
        let mut outcomes = Vec::with_capacity(Scope::ALL.len());

        for scope in Scope::ALL {
            outcomes.push(self.pipeline.run(scope).await);
        }

        let completed = outcomes.iter().filter(|o| o.is_completed()).count();
        info!(
            scopes = outcomes.len(),
            completed,
            failed = outcomes.len() - completed,
            elapsed_ms = t0.elapsed().as_millis(),
            "All scopes processed"
        );
        outcomes
    }
}

/// Validate credentials, build the pipeline, and run every scope.
///
/// `build` is only called after both credentials are present, so a missing
/// key means no client exists and no request is sent.
///
/// # Arguments
///
/// * `settings` - Resolved run settings
/// * `keys` - API keys as supplied by flags or environment
/// * `build` - Constructs the pipeline from the settings and valid credentials
///
/// # Errors
///
/// [`StartupError::Credentials`] when a required key is missing, or whatever
/// `build` fails with.
pub async fn run_report<S, M, W, P, F>(
    settings: &Settings,
    keys: &ApiKeys,
    build: F,
) -> Result<Vec<ScopeOutcome>, StartupError>
where
    S: SearchClient,
    M: SummarizerClient,
    W: DocumentWriter,
    P: PrintDispatcher,
    F: FnOnce(&Settings, Credentials) -> Result<ReportPipeline<S, M, W, P>, StartupError>,
{
    let credentials = Credentials::resolve(keys, settings.provider)?;
    let pipeline = build(settings, credentials)?;
    Ok(ScopeRunner::new(pipeline).run_all().await)
}
