use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Apify(e) => {
                error!("Apify error details: {:?}", e);
            }
            CoreError::Classification(e) => {
                error!("Classification error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            CoreError::Analysis(e) => {
                error!(stage = %e.stage, "Analysis error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Apify(e) => e.is_retryable(),
            CoreError::Classification(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Apify(ApifyError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Apify(e) => e.user_friendly_message(),
            CoreError::Classification(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Analysis(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Timeout { .. } => {
                "The operation took too long to complete. Please try again.".to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Apify(_) => "APIFY".to_string(),
            CoreError::Classification(_) => "CLASSIFICATION".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Analysis(_) => "ANALYSIS".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for ApifyError {
    fn log_error(&self) -> &Self {
        error!("ApifyError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ApifyError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            ApifyError::RateLimitExceeded { .. } => true,
            ApifyError::RequestTimeout => true,
            ApifyError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ApifyError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ApifyError::InvalidToken => {
                "Apify API token is invalid or missing. Set APIFY_API_TOKEN.".to_string()
            }
            ApifyError::RateLimitExceeded { retry_after } => format!(
                "Too many requests to Apify. Please wait {} seconds before trying again.",
                retry_after
            ),
            ApifyError::ActorNotFound { actor_id } => {
                format!("Apify actor '{}' could not be found.", actor_id)
            }
            ApifyError::RunFailed { status, .. } => {
                format!("The scraping run did not finish ({}).", status)
            }
            ApifyError::RequestTimeout => {
                "Request to Apify timed out. Please try again.".to_string()
            }
            _ => "Apify API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ApifyError::InvalidToken => "APIFY_INVALID_TOKEN".to_string(),
            ApifyError::ActorNotFound { .. } => "APIFY_ACTOR_NOT_FOUND".to_string(),
            ApifyError::DatasetNotFound { .. } => "APIFY_DATASET_NOT_FOUND".to_string(),
            ApifyError::RateLimitExceeded { .. } => "APIFY_RATE_LIMIT".to_string(),
            ApifyError::RunFailed { .. } => "APIFY_RUN_FAILED".to_string(),
            ApifyError::ServerError { .. } => "APIFY_SERVER_ERROR".to_string(),
            ApifyError::RequestRejected { .. } => "APIFY_REQUEST_REJECTED".to_string(),
            ApifyError::RequestTimeout => "APIFY_TIMEOUT".to_string(),
            ApifyError::InvalidResponse { .. } => "APIFY_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for ClassificationError {
    fn log_error(&self) -> &Self {
        error!("ClassificationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ClassificationError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassificationError::ServiceUnavailable { .. }
                | ClassificationError::InferenceFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(2))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ClassificationError::EmptyText => "The comment has no text to classify.".to_string(),
            ClassificationError::InputTooLong { max_tokens, .. } => {
                format!("Text is too long. Maximum {} tokens allowed.", max_tokens)
            }
            ClassificationError::ModelLoadingFailed { model_path, .. } => format!(
                "Failed to load the sentiment model from '{}'. Please check the path.",
                model_path
            ),
            ClassificationError::ServiceUnavailable { .. } => {
                "The sentiment service is temporarily unavailable.".to_string()
            }
            ClassificationError::BudgetExceeded { .. } => {
                "Sentiment analysis ran out of time for this comment.".to_string()
            }
            _ => "Sentiment classification failed for this comment.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ClassificationError::EmptyText => "CLASSIFY_EMPTY_TEXT".to_string(),
            ClassificationError::TokenizationFailed { .. } => {
                "CLASSIFY_TOKENIZATION_FAILED".to_string()
            }
            ClassificationError::InputTooLong { .. } => "CLASSIFY_INPUT_TOO_LONG".to_string(),
            ClassificationError::InferenceFailed { .. } => "CLASSIFY_INFERENCE_FAILED".to_string(),
            ClassificationError::ModelLoadingFailed { .. } => {
                "CLASSIFY_MODEL_LOAD_FAILED".to_string()
            }
            ClassificationError::UnknownLabel { .. } => "CLASSIFY_UNKNOWN_LABEL".to_string(),
            ClassificationError::InvalidScore { .. } => "CLASSIFY_INVALID_SCORE".to_string(),
            ClassificationError::ServiceUnavailable { .. } => {
                "CLASSIFY_SERVICE_UNAVAILABLE".to_string()
            }
            ClassificationError::BudgetExceeded { .. } => "CLASSIFY_BUDGET_EXCEEDED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

impl ErrorExt for AnalysisError {
    fn log_error(&self) -> &Self {
        error!(stage = %self.stage, "AnalysisError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(stage = %self.stage, "AnalysisError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        self.source.as_ref().is_some_and(|e| e.is_retryable())
    }

    fn retry_after(&self) -> Option<Duration> {
        self.source.as_ref().and_then(|e| e.retry_after())
    }

    fn user_friendly_message(&self) -> String {
        let detail = match &self.source {
            Some(source) => source.user_friendly_message(),
            None => self.message.clone(),
        };
        format!("Analysis failed while trying to {}: {}", self.stage, detail)
    }

    fn error_code(&self) -> String {
        match self.stage {
            PipelineStage::FetchPosts => "ANALYSIS_FETCH_POSTS".to_string(),
            PipelineStage::FetchComments => "ANALYSIS_FETCH_COMMENTS".to_string(),
            PipelineStage::Classify => "ANALYSIS_CLASSIFY".to_string(),
            PipelineStage::Aggregate => "ANALYSIS_AGGREGATE".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                if let Some(retry_after) = error.retry_after() {
                    info!("Error is retryable. Retry after: {:?}", retry_after);
                }
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
