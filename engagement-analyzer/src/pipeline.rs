use crate::annotate::{annotate_sentiment, AnnotationOptions};
use crate::ranking::DEFAULT_TOP_K;
use crate::report::{EngagementReport, SkippedPost};
use crate::stats::DEFAULT_HISTOGRAM_BINS;
use apify_client::{CommentSource, PostSource};
use instasense_core::{
    AnalysisConfig, AnalysisError, BucketWidth, ConfigError, CoreError, ErrorExt, PipelineStage,
};
use sentiment_engine::SentimentClassifier;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub top_k: usize,
    pub bucket: BucketWidth,
    pub histogram_bins: usize,
    pub annotation: AnnotationOptions,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            bucket: BucketWidth::Weekly,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            annotation: AnnotationOptions::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            top_k: config.top_k,
            bucket: config.bucket_width()?,
            histogram_bins: config.histogram_bins,
            annotation: AnnotationOptions {
                workers: config.workers.max(1),
                budget: config.budget_secs.map(Duration::from_secs),
            },
        })
    }
}

/// Fetch, classify and aggregate for one account.
pub struct AnalysisPipeline<P, C, S> {
    posts: P,
    comments: C,
    classifier: S,
    options: AnalysisOptions,
}

impl<P, C, S> AnalysisPipeline<P, C, S>
where
    P: PostSource,
    C: CommentSource,
    S: SentimentClassifier,
{
    pub fn new(posts: P, comments: C, classifier: S, options: AnalysisOptions) -> Self {
        Self {
            posts,
            comments,
            classifier,
            options,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub async fn run(&self, account: &str) -> Result<EngagementReport, AnalysisError> {
        info!("Starting engagement analysis for {}", account);

        let posts = self
            .posts
            .fetch_posts(account)
            .await
            .map_err(|e| AnalysisError::with_source(PipelineStage::FetchPosts, e))?;
        info!("Fetched {} posts for {}", posts.len(), account);

        let mut comments = Vec::new();
        let mut skipped_posts = Vec::new();
        let mut last_error: Option<CoreError> = None;

        for post in &posts {
            match self.comments.fetch_comments(&post.url).await {
                Ok(mut batch) => {
                    debug!("Fetched {} comments for {}", batch.len(), post.url);
                    comments.append(&mut batch);
                }
                Err(e) => {
                    warn!("Skipping comments of {}: {}", post.url, e);
                    skipped_posts.push(SkippedPost {
                        url: post.url.clone(),
                        reason: e.user_friendly_message(),
                    });
                    last_error = Some(e);
                }
            }
        }

        if skipped_posts.len() == posts.len() {
            if let Some(e) = last_error {
                e.log_error();
                return Err(AnalysisError::with_source(PipelineStage::FetchComments, e));
            }
        }
        info!(
            "Fetched {} comments from {} posts ({} skipped)",
            comments.len(),
            posts.len() - skipped_posts.len(),
            skipped_posts.len()
        );

        let (annotated, summary) =
            annotate_sentiment(comments, &self.classifier, &self.options.annotation).await;

        let report = EngagementReport::build(
            account,
            &posts,
            &annotated,
            summary,
            skipped_posts,
            &self.options,
        );
        info!("Analysis {} for {} complete", report.run_id, account);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = AnalysisConfig {
            top_k: 3,
            bucket: "daily".to_string(),
            workers: 0,
            budget_secs: Some(30),
            histogram_bins: 10,
        };
        let options = AnalysisOptions::from_config(&config).unwrap();
        assert_eq!(options.top_k, 3);
        assert_eq!(options.bucket, BucketWidth::Daily);
        assert_eq!(options.histogram_bins, 10);
        assert_eq!(options.annotation.workers, 1);
        assert_eq!(options.annotation.budget, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_options_reject_bad_bucket() {
        let config = AnalysisConfig {
            bucket: "fortnightly".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            AnalysisOptions::from_config(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
