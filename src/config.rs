//! Run configuration and credentials.
//!
//! Settings are resolved once at startup with the precedence
//! CLI flag > `config.yaml` > built-in default, and then passed by value into
//! the clients. Nothing below `main` reads the process environment.
//!
//! ```yaml
//! ai_provider: anthropic
//! model:
//!   anthropic: claude-3-5-haiku-latest
//! queries:
//!   local: "Arlington, Virginia news"
//! ```

use crate::cli::Cli;
use crate::error::{ConfigError, CredentialError};
use crate::models::{Provider, Scope};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Contents of the optional YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub ai_provider: Option<Provider>,
    pub model: ModelTable,
    pub queries: QueryOverrides,
}

/// Model name per provider.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelTable {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
}

impl ModelTable {
    pub fn for_provider(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Openai => self.openai.as_deref(),
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::Google => self.google.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryOverrides {
    pub local: Option<String>,
    pub regional: Option<String>,
    pub national: Option<String>,
    pub global: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit path, or `./config.yaml` if it exists, or nothing.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration");
                Self::load(path)
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                info!(path = DEFAULT_CONFIG_FILE, "Loading configuration");
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => {
                debug!("No config file; using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// The search query for each scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queries {
    local: String,
    regional: String,
    national: String,
    global: String,
}

impl Default for Queries {
    fn default() -> Self {
        Self {
            local: Scope::Local.default_query().to_string(),
            regional: Scope::Regional.default_query().to_string(),
            national: Scope::National.default_query().to_string(),
            global: Scope::Global.default_query().to_string(),
        }
    }
}

impl Queries {
    pub fn with_overrides(overrides: &QueryOverrides) -> Self {
        let defaults = Self::default();
        let pick = |o: &Option<String>, d: String| {
            o.as_ref()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .unwrap_or(d)
        };
        Self {
            local: pick(&overrides.local, defaults.local),
            regional: pick(&overrides.regional, defaults.regional),
            national: pick(&overrides.national, defaults.national),
            global: pick(&overrides.global, defaults.global),
        }
    }

    pub fn for_scope(&self, scope: Scope) -> &str {
        match scope {
            Scope::Local => &self.local,
            Scope::Regional => &self.regional,
            Scope::National => &self.national,
            Scope::Global => &self.global,
        }
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub queries: Queries,
    pub output_dir: PathBuf,
    pub dated: bool,
    pub max_results: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> Self {
        let provider = cli
            .provider
            .or(file.ai_provider)
            .unwrap_or(Provider::Openai);
        let model = cli
            .model
            .clone()
            .or_else(|| file.model.for_provider(provider).map(str::to_string))
            .unwrap_or_else(|| provider.default_model().to_string());

        Self {
            provider,
            model,
            queries: Queries::with_overrides(&file.queries),
            output_dir: cli.output_dir.clone(),
            dated: cli.dated,
            max_results: cli.max_results,
            timeout: Duration::from_secs(cli.timeout_secs),
            retry: RetryPolicy::new(cli.max_retries),
        }
    }
}

/// API keys as supplied by flags or environment, possibly missing.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub tavily: Option<String>,
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
}

impl From<&Cli> for ApiKeys {
    fn from(cli: &Cli) -> Self {
        Self {
            tavily: cli.tavily_api_key.clone(),
            openai: cli.openai_api_key.clone(),
            anthropic: cli.anthropic_api_key.clone(),
            google: cli.google_api_key.clone(),
        }
    }
}

/// The two credentials a run needs, validated before any scope starts.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub search_key: String,
    pub llm_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("search_key", &"<redacted>")
            .field("llm_key", &"<redacted>")
            .finish()
    }
}

fn present(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

impl Credentials {
    /// Require the search key and the selected provider's key.
    pub fn resolve(keys: &ApiKeys, provider: Provider) -> Result<Self, CredentialError> {
        let search_key = present(&keys.tavily).ok_or(CredentialError::Missing {
            var: "TAVILY_API_KEY",
        })?;
        let llm_key = match provider {
            Provider::Openai => present(&keys.openai),
            Provider::Anthropic => present(&keys.anthropic),
            Provider::Google => present(&keys.google),
        }
        .ok_or(CredentialError::Missing {
            var: provider.key_var(),
        })?;

        Ok(Self {
            search_key,
            llm_key,
        })
    }
}
