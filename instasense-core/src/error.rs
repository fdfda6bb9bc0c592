use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Apify API error: {0}")]
    Apify(#[from] ApifyError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of the post/comment fetch collaborators.
#[derive(Error, Debug, Clone)]
pub enum ApifyError {
    #[error("Invalid or missing Apify API token")]
    InvalidToken,

    #[error("Actor not found: {actor_id}")]
    ActorNotFound { actor_id: String },

    #[error("Dataset not found: {dataset_id}")]
    DatasetNotFound { dataset_id: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Actor run {run_id} finished with status {status}")]
    RunFailed { run_id: String, status: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request failed with status {status_code}: {message}")]
    RequestRejected { status_code: u16, message: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

/// Failures of a single classification call. These are recovered per
/// comment and recorded as [`crate::Sentiment::Error`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Comment text is empty")]
    EmptyText,

    #[error("Tokenization failed: {reason}")]
    TokenizationFailed { reason: String },

    #[error("Input too long: {length} tokens, max: {max_tokens}")]
    InputTooLong { length: usize, max_tokens: usize },

    #[error("Model inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("Model loading failed: {model_path}: {reason}")]
    ModelLoadingFailed { model_path: String, reason: String },

    #[error("Unknown model label: {label}")]
    UnknownLabel { label: String },

    #[error("Score out of range: {score}")]
    InvalidScore { score: f32 },

    #[error("Classifier service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Classification budget of {budget_ms}ms exceeded")]
    BudgetExceeded { budget_ms: u64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The pipeline stage an [`AnalysisError`] was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    FetchPosts,
    FetchComments,
    Classify,
    Aggregate,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::FetchPosts => "fetch posts",
            PipelineStage::FetchComments => "fetch comments",
            PipelineStage::Classify => "classify",
            PipelineStage::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

/// An error that stopped a whole analysis run, tagged with the stage it
/// happened in.
#[derive(Error, Debug)]
#[error("Stage '{stage}' failed: {message}")]
pub struct AnalysisError {
    pub stage: PipelineStage,
    pub message: String,
    #[source]
    pub source: Option<Box<CoreError>>,
}

impl AnalysisError {
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(stage: PipelineStage, source: CoreError) -> Self {
        Self {
            stage,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}
