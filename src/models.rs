//! Data models shared across the pipeline.
//!
//! - [`Scope`]: the four fixed geographic report categories
//! - [`Snippet`]: one search hit handed to the summarizer
//! - [`Provider`]: which language-model API writes the report
//! - [`ScopeOutcome`]: the terminal status recorded for one scope

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// A geographic report category.
///
/// Scopes always run in the order of [`Scope::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Regional,
    National,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Local, Scope::Regional, Scope::National, Scope::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Regional => "regional",
            Scope::National => "national",
            Scope::Global => "global",
        }
    }

    /// Query used when the config file does not override it.
    pub fn default_query(&self) -> &'static str {
        match self {
            Scope::Local => "Reston, Virginia news",
            Scope::Regional => "Northern Virginia news",
            Scope::National => "United States news",
            Scope::Global => "Latest global news",
        }
    }

    /// Filename stem of the report document, e.g. `local_news`.
    pub fn file_stem(&self) -> String {
        format!("{}_news", self.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub published_date: Option<String>,
    pub image_url: Option<String>,
}

impl Snippet {
    /// Extract the domain name (before .com/.org/etc) from the source URL.
    /// For example: "https://lite.cnn.com/article" -> "cnn"
    pub fn source_tag(&self) -> Option<String> {
        let parsed = url::Url::parse(self.url.as_deref()?).ok()?;
        let host = parsed.host_str()?;
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() >= 2 {
            Some(parts[parts.len() - 2].to_string())
        } else {
            None
        }
    }
}

/// Language-model API used to write reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Openai => "gpt-4o",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::Google => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Search,
    Summarize,
    Render,
    Print,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Search => "search",
            Stage::Summarize => "summarize",
            Stage::Render => "render",
            Stage::Print => "print",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    SearchFailed,
    SummarizeFailed,
    WriteFailed,
    PrintFailed,
}

impl OutcomeKind {
    fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Search => OutcomeKind::SearchFailed,
            Stage::Summarize => OutcomeKind::SummarizeFailed,
            Stage::Render => OutcomeKind::WriteFailed,
            Stage::Print => OutcomeKind::PrintFailed,
        }
    }
}

/// Terminal status of one scope's pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeOutcome {
    pub scope: Scope,
    pub kind: OutcomeKind,
    /// Stage that failed, `None` on success.
    pub stage: Option<Stage>,
    pub message: Option<String>,
    /// Path of the written document, present for `Success` and `PrintFailed`.
    pub document: Option<PathBuf>,
}

impl ScopeOutcome {
    pub fn success(scope: Scope, document: PathBuf) -> Self {
        Self {
            scope,
            kind: OutcomeKind::Success,
            stage: None,
            message: None,
            document: Some(document),
        }
    }

    pub fn failed(scope: Scope, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            scope,
            kind: OutcomeKind::for_stage(stage),
            stage: Some(stage),
            message: Some(message.into()),
            document: None,
        }
    }

    pub fn print_failed(scope: Scope, document: PathBuf, message: impl Into<String>) -> Self {
        Self {
            document: Some(document),
            ..Self::failed(scope, Stage::Print, message)
        }
    }

    /// True when the document was produced, whether or not printing worked.
    pub fn is_completed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Success | OutcomeKind::PrintFailed)
    }
}

/// A run succeeds when every scope produced its document.
pub fn run_succeeded(outcomes: &[ScopeOutcome]) -> bool {
    outcomes.iter().all(ScopeOutcome::is_completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(url: Option<&str>) -> Snippet {
        Snippet {
            title: "Test".to_string(),
            content: "Body".to_string(),
            url: url.map(str::to_string),
            published_date: None,
            image_url: None,
        }
    }

    #[test]
    fn test_scope_order_and_stems() {
        let names: Vec<&str> = Scope::ALL.iter().map(Scope::as_str).collect();
        assert_eq!(names, vec!["local", "regional", "national", "global"]);
        assert_eq!(Scope::Local.file_stem(), "local_news");
        assert_eq!(Scope::Global.file_stem(), "global_news");
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        let provider: Provider = serde_yaml::from_str("anthropic").unwrap();
        assert_eq!(provider, Provider::Anthropic);
        assert!(serde_yaml::from_str::<Provider>("Cohere").is_err());
    }

    #[test]
    fn test_source_tag_cnn() {
        let s = snippet(Some("https://lite.cnn.com/2025/05/06/article"));
        assert_eq!(s.source_tag(), Some("cnn".to_string()));
    }

    #[test]
    fn test_source_tag_missing_or_invalid() {
        assert_eq!(snippet(None).source_tag(), None);
        assert_eq!(snippet(Some("not a url")).source_tag(), None);
        assert_eq!(snippet(Some("http://localhost/x")).source_tag(), None);
    }

    #[test]
    fn test_failed_outcome_maps_stage() {
        let o = ScopeOutcome::failed(Scope::Global, Stage::Summarize, "empty");
        assert_eq!(o.kind, OutcomeKind::SummarizeFailed);
        assert_eq!(o.stage, Some(Stage::Summarize));
        assert!(o.document.is_none());
        assert!(!o.is_completed());
    }

    #[test]
    fn test_print_failed_is_completed() {
        let o = ScopeOutcome::print_failed(Scope::Local, PathBuf::from("local_news.docx"), "no printer");
        assert_eq!(o.kind, OutcomeKind::PrintFailed);
        assert_eq!(o.document, Some(PathBuf::from("local_news.docx")));
        assert!(o.is_completed());
    }

    #[test]
    fn test_run_succeeded() {
        let ok = vec![
            ScopeOutcome::success(Scope::Local, PathBuf::from("a")),
            ScopeOutcome::print_failed(Scope::Regional, PathBuf::from("b"), "x"),
        ];
        assert!(run_succeeded(&ok));

        let mut bad = ok.clone();
        bad.push(ScopeOutcome::failed(Scope::National, Stage::Render, "disk full"));
        assert!(!run_succeeded(&bad));
    }
}
