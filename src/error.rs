//! Error taxonomy for the report pipeline.
//!
//! Each stage of the pipeline maps its provider-specific failures into exactly
//! one of these enums:
//!
//! | Stage     | Error              | Fatal to the scope? |
//! |-----------|--------------------|---------------------|
//! | Search    | [`SearchError`]    | yes                 |
//! | Summarize | [`SummarizeError`] | yes                 |
//! | Render    | [`WriteError`]     | yes                 |
//! | Print     | [`PrintError`]     | no                  |
//!
//! [`CredentialError`] and [`ConfigError`] are raised at startup, before any
//! scope runs, and abort the whole run. [`StartupError`] wraps the failures
//! that can stop a run between loading config and the first scope.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can be retried with backoff report themselves as transient.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Failure while querying the web-search API.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search API rejected credentials ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("search API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("search API network error: {0}")]
    Network(String),

    #[error("search API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed search API response: {0}")]
    Malformed(String),

    #[error("search API returned no results for query {0:?}")]
    Empty(String),
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::RateLimited(_) | SearchError::Network(_) => true,
            SearchError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Failure while asking the language model for a report.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("{provider} rejected credentials ({status}): {body}")]
    Auth {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} rate limit exceeded: {body}")]
    RateLimited { provider: &'static str, body: String },

    #[error("{provider} network error: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed {provider} response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned no usable text")]
    EmptyText { provider: &'static str },
}

impl Transient for SummarizeError {
    fn is_transient(&self) -> bool {
        match self {
            SummarizeError::RateLimited { .. } | SummarizeError::Network { .. } => true,
            SummarizeError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Failure while rendering a report into a document file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode document XML: {0}")]
    Xml(String),

    #[error("failed to package document archive: {0}")]
    Archive(String),

    #[error("report text contained no renderable content")]
    EmptyDocument,
}

/// Failure while submitting a document to the printer.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("cannot print {0}: file does not exist")]
    MissingFile(PathBuf),

    #[error("print command '{0}' not found (is CUPS installed?)")]
    CommandNotFound(String),

    #[error("no default printer is configured")]
    NoDefaultPrinter,

    #[error("print command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("failed to launch print command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("printing is not supported on {0}")]
    Unsupported(String),
}

/// A required API credential is absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{var} is not set; export it or add it to .env before running")]
    Missing { var: &'static str },
}

/// The optional YAML configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A run could not start: no scope was attempted.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_transience() {
        assert!(SearchError::RateLimited("slow down".into()).is_transient());
        assert!(SearchError::Network("connection reset".into()).is_transient());
        assert!(
            SearchError::Api {
                status: 503,
                body: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !SearchError::Api {
                status: 400,
                body: "bad query".into()
            }
            .is_transient()
        );
        assert!(
            !SearchError::Auth {
                status: 401,
                body: "invalid key".into()
            }
            .is_transient()
        );
        assert!(!SearchError::Empty("q".into()).is_transient());
    }

    #[test]
    fn test_summarize_error_transience() {
        assert!(
            SummarizeError::RateLimited {
                provider: "openai",
                body: "429".into()
            }
            .is_transient()
        );
        assert!(
            !SummarizeError::Auth {
                provider: "anthropic",
                status: 403,
                body: "forbidden".into()
            }
            .is_transient()
        );
        assert!(!SummarizeError::EmptyText { provider: "google" }.is_transient());
    }

    #[test]
    fn test_credential_error_names_variable() {
        let err = CredentialError::Missing {
            var: "TAVILY_API_KEY",
        };
        assert!(err.to_string().contains("TAVILY_API_KEY"));
    }

    #[test]
    fn test_print_error_messages() {
        assert_eq!(
            PrintError::CommandNotFound("lp".into()).to_string(),
            "print command 'lp' not found (is CUPS installed?)"
        );
        assert_eq!(
            PrintError::NoDefaultPrinter.to_string(),
            "no default printer is configured"
        );
    }
}
