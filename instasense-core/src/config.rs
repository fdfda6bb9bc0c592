//! Application configuration.
//!
//! Settings come from an optional TOML file with `[apify]`, `[classifier]`
//! and `[analysis]` sections; every field has a default. Secrets are read
//! from the environment (a `.env` file is honoured) and override the file.

use crate::error::ConfigError;
use crate::types::BucketWidth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const APIFY_TOKEN_VAR: &str = "APIFY_API_TOKEN";
pub const HF_TOKEN_VAR: &str = "HF_API_TOKEN";
pub const MODEL_DIR_VAR: &str = "INSTASENSE_MODEL_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub apify: ApifyConfig,
    pub classifier: ClassifierConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApifyConfig {
    pub api_token: Option<String>,
    pub post_results_limit: u32,
    pub comment_results_limit: u32,
    pub request_timeout_secs: u64,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            post_results_limit: 30,
            comment_results_limit: 15,
            request_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    pub model_dir: PathBuf,
    /// Inference endpoint for the remote backend.
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    /// Raw model label -> sentiment name. Empty means the built-in mapping.
    pub labels: HashMap<String, String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::Local,
            model_dir: PathBuf::from("models/sentiment"),
            endpoint: None,
            api_token: None,
            labels: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_k: usize,
    pub bucket: String,
    pub workers: usize,
    /// Overall wall-clock budget for sentiment annotation.
    pub budget_secs: Option<u64>,
    pub histogram_bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            bucket: "weekly".to_string(),
            workers: 1,
            budget_secs: None,
            histogram_bins: 20,
        }
    }
}

impl AnalysisConfig {
    pub fn bucket_width(&self) -> Result<BucketWidth, ConfigError> {
        self.bucket
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "analysis.bucket".to_string(),
                value: self.bucket.clone(),
            })
    }
}

impl AppConfig {
    /// Load the file at `path` (or defaults when `None`), then apply the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        info!("Config loaded: {}", config.summary());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override secrets and paths from environment variables. `lookup` is
    /// the variable source so callers can substitute the process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(APIFY_TOKEN_VAR) {
            self.apify.api_token = Some(token);
        }
        if let Some(token) = non_empty(HF_TOKEN_VAR) {
            self.classifier.api_token = Some(token);
        }
        if let Some(dir) = non_empty(MODEL_DIR_VAR) {
            self.classifier.model_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.top_k == 0 {
            return Err(invalid("analysis.top_k", self.analysis.top_k));
        }
        if self.analysis.workers == 0 {
            return Err(invalid("analysis.workers", self.analysis.workers));
        }
        if self.analysis.histogram_bins == 0 {
            return Err(invalid(
                "analysis.histogram_bins",
                self.analysis.histogram_bins,
            ));
        }
        if self.apify.post_results_limit == 0 {
            return Err(invalid(
                "apify.post_results_limit",
                self.apify.post_results_limit,
            ));
        }
        self.analysis.bucket_width()?;

        if self.classifier.backend == ClassifierBackend::Remote
            && self.classifier.endpoint.is_none()
        {
            return Err(ConfigError::MissingField {
                field: "classifier.endpoint".to_string(),
            });
        }

        Ok(())
    }

    /// The Apify token, required only for commands that fetch data.
    pub fn require_apify_token(&self) -> Result<&str, ConfigError> {
        self.apify
            .api_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: APIFY_TOKEN_VAR.to_string(),
            })
    }

    /// A copy with every secret replaced by its preview.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        masked.apify.api_token = Some(preview_secret(&self.apify.api_token));
        masked.classifier.api_token = Some(preview_secret(&self.classifier.api_token));
        masked
    }

    /// One-line description with secrets masked, safe to log.
    pub fn summary(&self) -> String {
        format!(
            "apify_token={} posts={} comments/post={} backend={:?} model_dir={} endpoint={} hf_token={} top_k={} bucket={} workers={} budget={}",
            preview_secret(&self.apify.api_token),
            self.apify.post_results_limit,
            self.apify.comment_results_limit,
            self.classifier.backend,
            self.classifier.model_dir.display(),
            self.classifier.endpoint.as_deref().unwrap_or("<not set>"),
            preview_secret(&self.classifier.api_token),
            self.analysis.top_k,
            self.analysis.bucket,
            self.analysis.workers,
            self.analysis
                .budget_secs
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "none".to_string()),
        )
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn preview_secret(value: &Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(4).collect();
            format!("{}...({} chars)", head, v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}
