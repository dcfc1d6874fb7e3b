use serde::Deserialize;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub devin: DevinConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub pr: PrConfig,
}

#[derive(Deserialize, Clone, Default)]
pub struct GitHubConfig {
    /// Personal access token; only needed for private repositories.
    pub token: Option<String>,
    pub default_repo: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("default_repo", &self.default_repo)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct DevinConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Let the agent open PRs through its GitHub App integration.
    #[serde(default = "default_use_gh_app")]
    pub use_gh_app: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for DevinConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevinConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("use_gh_app", &self.use_gh_app)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for DevinConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            use_gh_app: default_use_gh_app(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScopeConfig {
    #[serde(default = "default_scope_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_scope_timeout")]
    pub timeout_secs: u64,
    /// Extra wait after the primary window when only interim output arrived.
    #[serde(default = "default_scope_grace")]
    pub grace_secs: u64,
    /// Field labels required before a message counts as the scoping block.
    #[serde(default = "default_min_field_markers")]
    pub min_field_markers: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_scope_interval(),
            timeout_secs: default_scope_timeout(),
            grace_secs: default_scope_grace(),
            min_field_markers: default_min_field_markers(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrConfig {
    #[serde(default = "default_pr_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_pr_timeout")]
    pub timeout_secs: u64,
}

impl Default for PrConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_pr_interval(),
            timeout_secs: default_pr_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.devin.ai/v1".to_string()
}

fn default_use_gh_app() -> bool {
    true
}

fn default_max_retries() -> u32 {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_scope_interval() -> u64 {
    3
}

fn default_scope_timeout() -> u64 {
    120
}

fn default_scope_grace() -> u64 {
    45
}

fn default_min_field_markers() -> usize {
    5
}

fn default_pr_interval() -> u64 {
    6
}

fn default_pr_timeout() -> u64 {
    240
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(
                config::File::with_name("issuescope")
                    .required(false),
            );
        }

        // Environment variable overrides with ISSUESCOPE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("ISSUESCOPE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// Resolve the target repository: CLI flag first, configured default second.
    pub fn repo_or(&self, flag: Option<&str>) -> Result<String> {
        flag.map(str::to_string)
            .or_else(|| self.github.default_repo.clone())
            .ok_or_else(|| {
                AppError::Config(
                    "No repository given. Pass --repo owner/repo or set github.default_repo"
                        .to_string(),
                )
            })
    }
}
