use futures::stream::{self, StreamExt};
use instasense_core::{AnnotatedComment, ClassificationError, Comment, SentimentResult};
use sentiment_engine::SentimentClassifier;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationOptions {
    /// Maximum number of classifications in flight. 1 is sequential.
    pub workers: usize,
    /// Wall-clock budget for the whole annotation pass.
    pub budget: Option<Duration>,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSummary {
    pub classified: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl AnnotationSummary {
    pub fn total(&self) -> usize {
        self.classified + self.failed + self.timed_out
    }
}

/// Classifies every comment and attaches the result. A failed
/// classification never aborts the pass: the comment is kept with
/// [`instasense_core::Sentiment::Error`]. Output order equals input order.
pub async fn annotate_sentiment<C>(
    comments: Vec<Comment>,
    classifier: &C,
    options: &AnnotationOptions,
) -> (Vec<AnnotatedComment>, AnnotationSummary)
where
    C: SentimentClassifier,
{
    let workers = options.workers.max(1);
    // A budget too large to represent as an instant means no deadline.
    let deadline = options
        .budget
        .and_then(|budget| Some((Instant::now().checked_add(budget)?, budget)));

    debug!(
        "Annotating {} comments with {} worker(s)",
        comments.len(),
        workers
    );

    let outcomes: Vec<Result<SentimentResult, ClassificationError>> =
        stream::iter(comments.iter())
            .map(|comment| classify_within(classifier, &comment.comment_text, deadline))
            .buffered(workers)
            .collect()
            .await;

    let mut summary = AnnotationSummary::default();
    let annotated = comments
        .into_iter()
        .zip(outcomes)
        .map(|(comment, outcome)| match outcome {
            Ok(result) => {
                summary.classified += 1;
                AnnotatedComment::classified(comment, result)
            }
            Err(ClassificationError::BudgetExceeded { .. }) => {
                summary.timed_out += 1;
                AnnotatedComment::failed(comment)
            }
            Err(e) => {
                summary.failed += 1;
                debug!("Classification failed for comment on {}: {}", comment.post_url, e);
                AnnotatedComment::failed(comment)
            }
        })
        .collect();

    if summary.timed_out > 0 {
        warn!(
            "Classification budget ran out, {} comment(s) marked as Error",
            summary.timed_out
        );
    }
    info!(
        "Sentiment annotation done: {} classified, {} failed, {} timed out",
        summary.classified, summary.failed, summary.timed_out
    );

    (annotated, summary)
}

async fn classify_within<C>(
    classifier: &C,
    text: &str,
    deadline: Option<(Instant, Duration)>,
) -> Result<SentimentResult, ClassificationError>
where
    C: SentimentClassifier,
{
    let Some((deadline, budget)) = deadline else {
        return classifier.classify(text).await;
    };

    let exceeded = || ClassificationError::BudgetExceeded {
        budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
    };

    if Instant::now() >= deadline {
        return Err(exceeded());
    }

    timeout_at(deadline, classifier.classify(text))
        .await
        .unwrap_or_else(|_| Err(exceeded()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use instasense_core::{Sentiment, SentimentLabel};

    struct LengthClassifier;

    impl SentimentClassifier for LengthClassifier {
        async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
            match text.len() {
                0 => Err(ClassificationError::EmptyText),
                1..=3 => Ok(SentimentResult::new(SentimentLabel::Negative, 0.6)),
                _ => Ok(SentimentResult::new(SentimentLabel::Positive, 0.9)),
            }
        }
    }

    fn comments(texts: &[&str]) -> Vec<Comment> {
        texts
            .iter()
            .map(|t| Comment::new("https://www.instagram.com/p/1/", *t, 0, 0))
            .collect()
    }

    #[tokio::test]
    async fn test_failures_become_error_rows() {
        let (annotated, summary) = annotate_sentiment(
            comments(&["lovely", "", "meh", ""]),
            &LengthClassifier,
            &AnnotationOptions::default(),
        )
        .await;

        let sentiments: Vec<Sentiment> = annotated.iter().map(|a| a.sentiment).collect();
        assert_eq!(
            sentiments,
            vec![
                Sentiment::Positive,
                Sentiment::Error,
                Sentiment::Negative,
                Sentiment::Error
            ]
        );
        assert_eq!(annotated[1].sentiment_confidence, None);
        assert_eq!(summary.classified, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total(), 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (annotated, summary) =
            annotate_sentiment(Vec::new(), &LengthClassifier, &AnnotationOptions::default())
                .await;
        assert!(annotated.is_empty());
        assert_eq!(summary, AnnotationSummary::default());
    }

    #[tokio::test]
    async fn test_zero_budget_marks_everything_as_error() {
        let options = AnnotationOptions {
            workers: 2,
            budget: Some(Duration::ZERO),
        };
        let (annotated, summary) =
            annotate_sentiment(comments(&["great", "fine"]), &LengthClassifier, &options).await;

        assert!(annotated.iter().all(|a| a.sentiment == Sentiment::Error));
        assert_eq!(summary.timed_out, 2);
    }

    #[tokio::test]
    async fn test_unbounded_budget_behaves_like_none() {
        let options = AnnotationOptions {
            workers: 1,
            budget: Some(Duration::from_secs(u64::MAX)),
        };
        let (annotated, summary) =
            annotate_sentiment(comments(&["great", "ok"]), &LengthClassifier, &options).await;

        assert_eq!(annotated[0].sentiment, Sentiment::Positive);
        assert_eq!(annotated[1].sentiment, Sentiment::Negative);
        assert_eq!(summary.classified, 2);
        assert_eq!(summary.timed_out, 0);
    }
}
