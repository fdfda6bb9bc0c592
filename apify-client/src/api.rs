use crate::retry::{RetryConfig, RetryExecutor};
use crate::types::{
    ApiResponse, InstagramCommentItem, InstagramCommentScraperInput, InstagramPostItem,
    InstagramPostScraperInput, RunData, RunStatus, INSTAGRAM_COMMENT_SCRAPER,
    INSTAGRAM_POST_SCRAPER,
};
use instasense_core::{ApifyConfig, ApifyError, Comment, CoreError, Post};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const APIFY_API_BASE: &str = "https://api.apify.com/v2";

/// Seconds the server may hold a run-status request open.
const WAIT_FOR_FINISH_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ApifyClient {
    http_client: Client,
    token: String,
    base_url: String,
    retry: RetryExecutor,
    post_results_limit: u32,
    comment_results_limit: u32,
    max_run_wait: Duration,
}

impl ApifyClient {
    pub fn new(token: String) -> Result<Self, CoreError> {
        Self::from_config(&ApifyConfig {
            api_token: Some(token),
            ..ApifyConfig::default()
        })
    }

    pub fn from_config(config: &ApifyConfig) -> Result<Self, CoreError> {
        let token = config
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ApifyError::InvalidToken)?;

        let http_client = Client::builder()
            .user_agent(concat!("instasense/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            token,
            base_url: APIFY_API_BASE.to_string(),
            retry: RetryExecutor::new(RetryConfig::apify()),
            post_results_limit: config.post_results_limit,
            comment_results_limit: config.comment_results_limit,
            max_run_wait: Duration::from_secs(15 * 60),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn with_max_run_wait(mut self, max_run_wait: Duration) -> Self {
        self.max_run_wait = max_run_wait;
        self
    }

    pub fn post_results_limit(&self) -> u32 {
        self.post_results_limit
    }

    pub fn comment_results_limit(&self) -> u32 {
        self.comment_results_limit
    }

    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Start an actor run. Returns immediately with the run metadata.
    pub async fn start_run<I: Serialize>(
        &self,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData, CoreError> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let (url, context) = (&url, &RequestContext::Actor(actor_id));

        self.retry
            .execute("start_run", || async move {
                debug!(actor_id, "Starting Apify actor run");
                let response = self
                    .http_client
                    .post(url)
                    .bearer_auth(&self.token)
                    .json(input)
                    .send()
                    .await
                    .map_err(map_send_error)?;
                let response = check_response(response, context).await?;
                let api_resp: ApiResponse<RunData> = parse_json(response).await?;
                Ok(api_resp.data)
            })
            .await
    }

    /// Long-poll a run until it reaches a terminal status.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData, CoreError> {
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={}",
            self.base_url, run_id, WAIT_FOR_FINISH_SECS
        );
        let (url, context) = (&url, &RequestContext::Run(run_id));
        let started = Instant::now();

        loop {
            let run: RunData = self
                .retry
                .execute("wait_for_run", || async move {
                    let response = self
                        .http_client
                        .get(url)
                        .bearer_auth(&self.token)
                        .send()
                        .await
                        .map_err(map_send_error)?;
                    let response = check_response(response, context).await?;
                    let api_resp: ApiResponse<RunData> = parse_json(response).await?;
                    Ok(api_resp.data)
                })
                .await?;

            match run.run_status() {
                RunStatus::Succeeded => return Ok(run),
                RunStatus::Failed => {
                    error!(run_id, status = %run.status, "Apify run did not succeed");
                    return Err(ApifyError::RunFailed {
                        run_id: run.id,
                        status: run.status,
                    }
                    .into());
                }
                RunStatus::InProgress => {
                    if started.elapsed() >= self.max_run_wait {
                        warn!(run_id, "Gave up waiting for Apify run");
                        return Err(CoreError::Timeout {
                            seconds: self.max_run_wait.as_secs(),
                        });
                    }
                    debug!(run_id, status = %run.status, "Run still in progress");
                }
            }
        }
    }

    /// Fetch all items of a dataset.
    pub async fn get_dataset_items<T: DeserializeOwned>(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<T>, CoreError> {
        let url = format!(
            "{}/datasets/{}/items?format=json&clean=true",
            self.base_url, dataset_id
        );
        let (url, context) = (&url, &RequestContext::Dataset(dataset_id));

        self.retry
            .execute("get_dataset_items", || async move {
                let response = self
                    .http_client
                    .get(url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(map_send_error)?;
                let response = check_response(response, context).await?;
                parse_json::<Vec<T>>(response).await
            })
            .await
    }

    /// Start a run, wait for it, and return its dataset items.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>, CoreError>
    where
        I: Serialize,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Scrape the most recent posts of an account.
    pub async fn scrape_posts(&self, username: &str) -> Result<Vec<Post>, CoreError> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "account username is empty".to_string(),
            });
        }

        info!(
            username,
            limit = self.post_results_limit,
            "Starting Instagram post scrape"
        );
        let input = InstagramPostScraperInput {
            username: vec![username.to_string()],
            results_limit: self.post_results_limit,
        };
        let items: Vec<InstagramPostItem> =
            self.run_actor(INSTAGRAM_POST_SCRAPER, &input).await?;

        let posts = collect_posts(items);
        info!(username, count = posts.len(), "Fetched Instagram posts");
        Ok(posts)
    }

    /// Scrape the comments of a single post.
    pub async fn scrape_comments(&self, post_url: &str) -> Result<Vec<Comment>, CoreError> {
        validate_post_url(post_url)?;

        debug!(
            post_url,
            limit = self.comment_results_limit,
            "Starting Instagram comment scrape"
        );
        let input = InstagramCommentScraperInput {
            direct_urls: vec![post_url.to_string()],
            results_limit: self.comment_results_limit,
        };
        let items: Vec<InstagramCommentItem> =
            self.run_actor(INSTAGRAM_COMMENT_SCRAPER, &input).await?;

        let comments: Vec<Comment> = items
            .into_iter()
            .filter_map(|item| item.into_comment(post_url))
            .collect();
        info!(post_url, count = comments.len(), "Fetched Instagram comments");
        Ok(comments)
    }
}

/// What a request was addressing, used to name the missing resource on 404.
#[derive(Debug, Clone, Copy)]
enum RequestContext<'a> {
    Actor(&'a str),
    Run(&'a str),
    Dataset(&'a str),
}

/// Keep the first item per URL, drop items without one.
pub(crate) fn collect_posts(items: Vec<InstagramPostItem>) -> Vec<Post> {
    let mut seen = HashSet::new();
    let mut posts = Vec::with_capacity(items.len());
    for item in items {
        match item.into_post() {
            Some(post) if seen.insert(post.url.clone()) => posts.push(post),
            Some(post) => debug!(url = %post.url, "Skipping duplicate post"),
            None => warn!("Skipping post item without URL"),
        }
    }
    posts
}

pub(crate) fn validate_post_url(post_url: &str) -> Result<(), CoreError> {
    let parsed = url::Url::parse(post_url).map_err(|e| CoreError::InvalidInput {
        message: format!("invalid post URL '{}': {}", post_url, e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CoreError::InvalidInput {
            message: format!("post URL must be http(s): {}", post_url),
        });
    }
    Ok(())
}

fn map_send_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        ApifyError::RequestTimeout.into()
    } else {
        error!("Network error talking to Apify: {}", e);
        CoreError::Network(e)
    }
}

async fn check_response(
    response: Response,
    context: &RequestContext<'_>,
) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), "Apify request failed: {}", body);

    Err(status_to_error(status, retry_after.as_deref(), body, context).into())
}

fn status_to_error(
    status: StatusCode,
    retry_after: Option<&str>,
    body: String,
    context: &RequestContext<'_>,
) -> ApifyError {
    match status.as_u16() {
        401 => ApifyError::InvalidToken,
        404 => match context {
            RequestContext::Actor(actor_id) => ApifyError::ActorNotFound {
                actor_id: actor_id.to_string(),
            },
            RequestContext::Dataset(dataset_id) => ApifyError::DatasetNotFound {
                dataset_id: dataset_id.to_string(),
            },
            RequestContext::Run(run_id) => ApifyError::InvalidResponse {
                details: format!("run {} not found", run_id),
            },
        },
        429 => ApifyError::RateLimitExceeded {
            retry_after: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60),
        },
        code if status.is_server_error() => ApifyError::ServerError { status_code: code },
        code => ApifyError::RequestRejected {
            status_code: code,
            message: body,
        },
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CoreError> {
    let bytes = response.bytes().await.map_err(map_send_error)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!("Failed to parse Apify response: {}", e);
        ApifyError::InvalidResponse {
            details: e.to_string(),
        }
        .into()
    })
}
