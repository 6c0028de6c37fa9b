//! Command-line interface definitions for scope_news.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! No argument is required; API keys fall back to environment variables
//! (after `.env` has been loaded).

use crate::models::Provider;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the scope_news application.
///
/// # Examples
///
/// ```sh
/// # Write and print all four digests into the current directory
/// scope_news
///
/// # Use Anthropic and a dated directory tree under ./reports
/// scope_news --provider anthropic --dated -o ./reports
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory the report documents are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Optional path to config.yaml (defaults to ./config.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Language-model provider (overrides config.yaml)
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Exact model name (overrides config.yaml)
    #[arg(long)]
    pub model: Option<String>,

    /// Write into <output-dir>/<YYYY-MM-DD>/<provider>/
    #[arg(long)]
    pub dated: bool,

    /// Maximum search results requested per scope
    #[arg(long, default_value_t = 10)]
    pub max_results: usize,

    /// Retries for transient search and model failures
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Per-request timeout for API calls, in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Tavily search API key
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Google Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["scope_news"]);

        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(cli.provider.is_none());
        assert!(!cli.dated);
        assert_eq!(cli.max_results, 10);
        assert_eq!(cli.max_retries, 3);
        assert_eq!(cli.timeout_secs, 60);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["scope_news", "-o", "/tmp/reports", "-c", "/etc/news.yaml"]);

        assert_eq!(cli.output_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/news.yaml")));
    }

    #[test]
    fn test_cli_provider_and_keys() {
        let cli = Cli::parse_from([
            "scope_news",
            "--provider",
            "anthropic",
            "--model",
            "claude-3-5-haiku-latest",
            "--tavily-api-key",
            "tvly-123",
            "--dated",
        ]);

        assert_eq!(cli.provider, Some(Provider::Anthropic));
        assert_eq!(cli.model.as_deref(), Some("claude-3-5-haiku-latest"));
        assert_eq!(cli.tavily_api_key.as_deref(), Some("tvly-123"));
        assert!(cli.dated);
    }

    #[test]
    fn test_cli_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["scope_news", "--provider", "cohere"]).is_err());
    }
}
