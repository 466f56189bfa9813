//! Application settings and engine configuration.
//!
//! Settings come from an optional `mergemap.toml` in the working directory
//! overlaid with environment variables (a `.env` file is honored at
//! startup). Engine-facing invariants are validated at construction time,
//! never deep inside scoring.

mod rules;

pub use rules::{
    CapabilityFamily, CategoryWeights, ConflictPair, RuleSet, ScoreboardTuning,
    DEFAULT_INFRA_KEYWORDS, DEFAULT_INFRA_LABELS, DEFAULT_INFRA_TICKET_PATTERNS,
};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Engine thresholds, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub infra_strong_threshold: f64,
    pub infra_weak_threshold: f64,
    pub needs_review_threshold: f64,
}

impl ClassificationConfig {
    /// Build a validated configuration.
    ///
    /// Rejects `weak >= strong`, negative thresholds, and a review
    /// threshold outside the open interval (0, 1).
    pub fn new(
        infra_strong_threshold: f64,
        infra_weak_threshold: f64,
        needs_review_threshold: f64,
    ) -> Result<Self> {
        if !infra_weak_threshold.is_finite() || !infra_strong_threshold.is_finite() {
            return Err(Error::config("infra thresholds must be finite"));
        }
        if infra_weak_threshold < 0.0 {
            return Err(Error::config("infra weak threshold must be non-negative"));
        }
        if infra_weak_threshold >= infra_strong_threshold {
            return Err(Error::config(format!(
                "infra weak threshold ({infra_weak_threshold}) must be below the strong threshold ({infra_strong_threshold})"
            )));
        }
        if !(needs_review_threshold > 0.0 && needs_review_threshold < 1.0) {
            return Err(Error::config(format!(
                "needs-review threshold must be in (0, 1), got {needs_review_threshold}"
            )));
        }
        Ok(ClassificationConfig {
            infra_strong_threshold,
            infra_weak_threshold,
            needs_review_threshold,
        })
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        ClassificationConfig {
            infra_strong_threshold: 4.0,
            infra_weak_threshold: 1.5,
            needs_review_threshold: 0.75,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mr_analysis.db")
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_ticket_patterns() -> Vec<String> {
    DEFAULT_INFRA_TICKET_PATTERNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_infra_labels() -> Vec<String> {
    DEFAULT_INFRA_LABELS.iter().map(|s| s.to_string()).collect()
}

fn default_infra_keywords() -> Vec<String> {
    DEFAULT_INFRA_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_infra_strong_threshold() -> f64 {
    4.0
}

fn default_infra_weak_threshold() -> f64 {
    1.5
}

fn default_needs_review_threshold() -> f64 {
    0.75
}

/// Full application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// GitLab API base URL; required for sync and enrich, unused elsewhere.
    #[serde(default)]
    pub gitlab_base_url: Option<String>,

    /// GitLab private token; required alongside the base URL.
    #[serde(default, skip_serializing)]
    pub gitlab_token: Option<String>,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_ticket_patterns")]
    pub infra_ticket_regex: Vec<String>,

    #[serde(default = "default_infra_labels")]
    pub infra_label_allowlist: Vec<String>,

    #[serde(default = "default_infra_keywords")]
    pub infra_keyword_list: Vec<String>,

    #[serde(default = "default_infra_strong_threshold")]
    pub infra_strong_threshold: f64,

    #[serde(default = "default_infra_weak_threshold")]
    pub infra_weak_threshold: f64,

    #[serde(default = "default_needs_review_threshold")]
    pub needs_review_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gitlab_base_url: None,
            gitlab_token: None,
            db_path: default_db_path(),
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            infra_ticket_regex: default_ticket_patterns(),
            infra_label_allowlist: default_infra_labels(),
            infra_keyword_list: default_infra_keywords(),
            infra_strong_threshold: default_infra_strong_threshold(),
            infra_weak_threshold: default_infra_weak_threshold(),
            needs_review_threshold: default_needs_review_threshold(),
        }
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Load settings: optional TOML file, then environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_toml_file(path)?,
            None => {
                let default_path = Path::new("mergemap.toml");
                if default_path.exists() {
                    Self::from_toml_file(default_path)?
                } else {
                    Settings::default()
                }
            }
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("GITLAB_BASE_URL") {
            self.gitlab_base_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = env_nonempty("GITLAB_TOKEN") {
            self.gitlab_token = Some(v);
        }
        if let Some(v) = env_nonempty("DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("PAGE_SIZE") {
            self.page_size = v
                .parse()
                .map_err(|_| Error::config(format!("PAGE_SIZE must be an integer, got {v:?}")))?;
        }
        if let Some(v) = env_nonempty("MAX_RETRIES") {
            self.max_retries = v
                .parse()
                .map_err(|_| Error::config(format!("MAX_RETRIES must be an integer, got {v:?}")))?;
        }
        if let Some(v) = env_nonempty("BACKOFF_MS") {
            self.backoff_ms = v
                .parse()
                .map_err(|_| Error::config(format!("BACKOFF_MS must be an integer, got {v:?}")))?;
        }
        if let Some(v) = env_nonempty("REQUEST_TIMEOUT") {
            self.request_timeout_secs = v.parse().map_err(|_| {
                Error::config(format!("REQUEST_TIMEOUT must be an integer, got {v:?}"))
            })?;
        }
        if let Some(v) = env_nonempty("INFRA_TICKET_REGEX") {
            self.infra_ticket_regex = split_csv(&v);
        }
        if let Some(v) = env_nonempty("INFRA_LABEL_ALLOWLIST") {
            self.infra_label_allowlist = split_csv(&v);
        }
        if let Some(v) = env_nonempty("INFRA_KEYWORD_LIST") {
            self.infra_keyword_list = split_csv(&v);
        }
        if let Some(v) = env_nonempty("INFRA_STRONG_THRESHOLD") {
            self.infra_strong_threshold = v.parse().map_err(|_| {
                Error::config(format!("INFRA_STRONG_THRESHOLD must be a number, got {v:?}"))
            })?;
        }
        if let Some(v) = env_nonempty("INFRA_WEAK_THRESHOLD") {
            self.infra_weak_threshold = v.parse().map_err(|_| {
                Error::config(format!("INFRA_WEAK_THRESHOLD must be a number, got {v:?}"))
            })?;
        }
        if let Some(v) = env_nonempty("CLASSIFICATION_NEEDS_REVIEW_THRESHOLD") {
            self.needs_review_threshold = v.parse().map_err(|_| {
                Error::config(format!(
                    "CLASSIFICATION_NEEDS_REVIEW_THRESHOLD must be a number, got {v:?}"
                ))
            })?;
        }
        Ok(())
    }

    /// Validated engine configuration from these settings.
    pub fn classification_config(&self) -> Result<ClassificationConfig> {
        ClassificationConfig::new(
            self.infra_strong_threshold,
            self.infra_weak_threshold,
            self.needs_review_threshold,
        )
    }

    /// Rule table with the configured infra patterns compiled in.
    pub fn rule_set(&self) -> Result<RuleSet> {
        RuleSet::from_raw(
            &self.infra_ticket_regex,
            self.infra_keyword_list.clone(),
            self.infra_label_allowlist.clone(),
        )
    }

    /// Base URL and token, or a configuration error naming what is missing.
    pub fn gitlab_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .gitlab_base_url
            .as_deref()
            .ok_or_else(|| Error::config("GITLAB_BASE_URL is required"))?;
        let token = self
            .gitlab_token
            .as_deref()
            .ok_or_else(|| Error::config("GITLAB_TOKEN is required"))?;
        Ok((url, token))
    }
}

/// Resolve the target project ids: explicit overrides win, then
/// `GITLAB_PROJECT_IDS` (comma-separated), then `GITLAB_PROJECT_ID`.
pub fn resolve_project_ids(overrides: &[u64]) -> Result<Vec<u64>> {
    if !overrides.is_empty() {
        let mut ids: Vec<u64> = overrides.to_vec();
        ids.sort_unstable();
        ids.dedup();
        return Ok(ids);
    }

    if let Some(many) = env_nonempty("GITLAB_PROJECT_IDS") {
        let mut ids = Vec::new();
        for raw in split_csv(&many) {
            let id = raw.parse().map_err(|_| {
                Error::config(format!("GITLAB_PROJECT_IDS entry is not an integer: {raw:?}"))
            })?;
            ids.push(id);
        }
        if ids.is_empty() {
            return Err(Error::config("GITLAB_PROJECT_IDS is set but empty"));
        }
        ids.sort_unstable();
        ids.dedup();
        return Ok(ids);
    }

    if let Some(one) = env_nonempty("GITLAB_PROJECT_ID") {
        let id = one
            .parse()
            .map_err(|_| Error::config(format!("GITLAB_PROJECT_ID is not an integer: {one:?}")))?;
        return Ok(vec![id]);
    }

    Err(Error::config(
        "provide --project-id (repeatable) or set GITLAB_PROJECT_IDS / GITLAB_PROJECT_ID",
    ))
}

/// Minimal `.env` loader: `KEY=VALUE` lines, `#` comments, no expansion.
/// Existing environment variables are never overwritten.
pub fn load_dotenv(path: Option<&Path>) {
    let env_file = path
        .map(PathBuf::from)
        .or_else(|| env::var("MERGEMAP_ENV_FILE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(".env"));
    if !env_file.exists() {
        return;
    }
    if let Err(e) = dotenvy::from_path(&env_file) {
        log::warn!("failed to load {}: {e}", env_file.display());
    }
}
