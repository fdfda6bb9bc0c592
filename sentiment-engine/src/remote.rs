use crate::labels::LabelMap;
use crate::{checked_result, SentimentClassifier};
use instasense_core::{ClassificationError, ClassifierConfig, SentimentResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Text-classification endpoints answer either `[[{label, score}, ...]]`
/// (one list per input) or a flat list, or `{"error": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Error { error: String },
}

/// Classifies through a Hugging Face style text-classification endpoint.
#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    http_client: Client,
    endpoint: String,
    api_token: Option<String>,
    labels: LabelMap,
}

impl RemoteClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<String>,
        labels: LabelMap,
    ) -> Result<Self, ClassificationError> {
        let http_client = Client::builder()
            .user_agent(concat!("instasense/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClassificationError::ServiceUnavailable {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            labels,
        })
    }

    pub fn from_config(
        config: &ClassifierConfig,
        labels: LabelMap,
    ) -> Result<Self, ClassificationError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ClassificationError::ServiceUnavailable {
                reason: "no endpoint configured for the remote classifier".to_string(),
            }
        })?;
        Self::new(endpoint, config.api_token.clone(), labels)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_scores(&self, text: &str) -> Result<Vec<LabelScore>, ClassificationError> {
        let body = InferenceRequest {
            inputs: text,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassificationError::ServiceUnavailable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("Inference endpoint returned {}: {}", status, text);
            return Err(status_to_error(status, &text));
        }

        parse_scores(&text)
    }
}

impl SentimentClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyText);
        }

        let scores = self.request_scores(text).await?;
        let best = best_score(scores)?;
        debug!("Endpoint label {} ({:.3})", best.label, best.score);

        let label = self.labels.resolve(&best.label)?;
        checked_result(label, best.score)
    }
}

fn status_to_error(status: StatusCode, body: &str) -> ClassificationError {
    match status {
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            ClassificationError::ServiceUnavailable {
                reason: format!("{status}: {body}"),
            }
        }
        _ => ClassificationError::InferenceFailed {
            reason: format!("{status}: {body}"),
        },
    }
}

pub(crate) fn parse_scores(body: &str) -> Result<Vec<LabelScore>, ClassificationError> {
    let response: InferenceResponse =
        serde_json::from_str(body).map_err(|e| ClassificationError::InferenceFailed {
            reason: format!("unexpected endpoint response: {e}"),
        })?;

    match response {
        InferenceResponse::Nested(mut lists) => Ok(lists.drain(..).next().unwrap_or_default()),
        InferenceResponse::Flat(scores) => Ok(scores),
        InferenceResponse::Error { error } => {
            Err(ClassificationError::InferenceFailed { reason: error })
        }
    }
}

pub(crate) fn best_score(scores: Vec<LabelScore>) -> Result<LabelScore, ClassificationError> {
    scores
        .into_iter()
        .filter(|s| !s.score.is_nan())
        .reduce(|best, s| if s.score > best.score { s } else { best })
        .ok_or_else(|| ClassificationError::InferenceFailed {
            reason: "endpoint returned no scores".to_string(),
        })
}
