use apify_client::{CommentSource, PostSource};
use chrono::{TimeZone, Utc};
use engagement_analyzer::{
    annotate_sentiment, compute_averages, group_by_sentiment, top_k_by_field, AnalysisOptions,
    AnalysisPipeline, AnnotationOptions,
};
use instasense_core::{
    ApifyError, ClassificationError, Comment, CoreError, EngagementField, PipelineStage, Post,
    Sentiment, SentimentLabel, SentimentResult,
};
use sentiment_engine::SentimentClassifier;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const P1: &str = "https://www.instagram.com/p/p1/";
const P2: &str = "https://www.instagram.com/p/p2/";

#[derive(Default)]
struct FakeInstagram {
    posts: Vec<Post>,
    comments: HashMap<String, Vec<Comment>>,
    failing_posts: HashSet<String>,
    posts_unavailable: bool,
}

impl FakeInstagram {
    fn with_post(mut self, post: Post, comments: Vec<Comment>) -> Self {
        self.comments.insert(post.url.clone(), comments);
        self.posts.push(post);
        self
    }

    fn failing_comments_for(mut self, url: &str) -> Self {
        self.failing_posts.insert(url.to_string());
        self
    }
}

impl PostSource for FakeInstagram {
    async fn fetch_posts(&self, _account: &str) -> Result<Vec<Post>, CoreError> {
        if self.posts_unavailable {
            return Err(ApifyError::InvalidToken.into());
        }
        Ok(self.posts.clone())
    }
}

impl CommentSource for FakeInstagram {
    async fn fetch_comments(&self, post_url: &str) -> Result<Vec<Comment>, CoreError> {
        if self.failing_posts.contains(post_url) {
            return Err(ApifyError::RunFailed {
                run_id: "run-1".to_string(),
                status: "FAILED".to_string(),
            }
            .into());
        }
        Ok(self.comments.get(post_url).cloned().unwrap_or_default())
    }
}

/// Positive for "great", negative for "bad", neutral otherwise.
struct KeywordClassifier;

impl SentimentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyText);
        }
        let lower = text.to_lowercase();
        let result = if lower.contains("great") {
            SentimentResult::new(SentimentLabel::Positive, 0.95)
        } else if lower.contains("bad") {
            SentimentResult::new(SentimentLabel::Negative, 0.88)
        } else {
            SentimentResult::new(SentimentLabel::Neutral, 0.6)
        };
        Ok(result)
    }
}

struct FailingClassifier;

impl SentimentClassifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> Result<SentimentResult, ClassificationError> {
        Err(ClassificationError::ServiceUnavailable {
            reason: "model offline".to_string(),
        })
    }
}

/// Fails on every text containing "fail" and counts its calls.
#[derive(Default)]
struct FlakyClassifier {
    calls: AtomicUsize,
}

impl SentimentClassifier for FlakyClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("fail") {
            return Err(ClassificationError::InferenceFailed {
                reason: "boom".to_string(),
            });
        }
        KeywordClassifier.classify(text).await
    }
}

/// Sleeps for the number of milliseconds given as the text.
struct SleepyClassifier;

impl SentimentClassifier for SleepyClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        let millis: u64 = text.parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(SentimentResult::new(SentimentLabel::Neutral, 0.5))
    }
}

fn scenario_source() -> FakeInstagram {
    FakeInstagram::default().with_post(
        Post::new(P1, 10, 2),
        vec![
            Comment::new(P1, "great!", 3, 0),
            Comment::new(P1, "bad", 1, 1),
        ],
    )
}

fn comments(texts: &[&str]) -> Vec<Comment> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Comment::new(P1, *text, i as u64, 0))
        .collect()
}

#[tokio::test]
async fn test_single_post_scenario() {
    let source = scenario_source();
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let report = pipeline.run("natgeo").await.unwrap();

    assert_eq!(report.averages.avg_likes, 10.0);
    assert_eq!(report.averages.avg_comments, 2.0);
    assert_eq!(report.sentiment_groups.len(), 2);

    let positive = &report.sentiment_groups[0];
    assert_eq!(positive.sentiment, Sentiment::Positive);
    assert_eq!(positive.count, 1);
    assert_eq!(positive.sum_likes, 3);

    let negative = &report.sentiment_groups[1];
    assert_eq!(negative.sentiment, Sentiment::Negative);
    assert_eq!(negative.count, 1);
    assert_eq!(negative.sum_likes, 1);

    assert_eq!(report.top_liked[0].comment.comment_text, "great!");
    assert_eq!(report.top_replied[0].comment.comment_text, "bad");
    assert!(report.timeline.is_none());
    assert!(report.skipped_posts.is_empty());
}

#[tokio::test]
async fn test_all_classifications_failing() {
    let source = scenario_source();
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        FailingClassifier,
        AnalysisOptions::default(),
    );

    let report = pipeline.run("natgeo").await.unwrap();

    assert_eq!(report.sentiment_groups.len(), 1);
    assert_eq!(report.sentiment_groups[0].sentiment, Sentiment::Error);
    assert_eq!(report.sentiment_groups[0].count, report.comment_count);
    assert_eq!(report.annotation.failed, 2);
    assert!(report.top_liked.iter().all(|c| c.sentiment_confidence.is_none()));
}

#[tokio::test]
async fn test_post_fetch_failure_reports_stage() {
    let source = FakeInstagram {
        posts_unavailable: true,
        ..Default::default()
    };
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let err = pipeline.run("natgeo").await.unwrap_err();
    assert_eq!(err.stage, PipelineStage::FetchPosts);
    assert!(matches!(
        err.source.as_deref(),
        Some(CoreError::Apify(ApifyError::InvalidToken))
    ));
}

#[tokio::test]
async fn test_one_failing_post_is_skipped() {
    let source = scenario_source()
        .with_post(Post::new(P2, 4, 1), vec![Comment::new(P2, "great", 9, 0)])
        .failing_comments_for(P2);
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let report = pipeline.run("natgeo").await.unwrap();
    assert_eq!(report.post_count, 2);
    assert_eq!(report.comment_count, 2);
    assert_eq!(report.skipped_posts.len(), 1);
    assert_eq!(report.skipped_posts[0].url, P2);
}

#[tokio::test]
async fn test_every_post_failing_reports_comment_stage() {
    let source = scenario_source().failing_comments_for(P1);
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let err = pipeline.run("natgeo").await.unwrap_err();
    assert_eq!(err.stage, PipelineStage::FetchComments);
}

#[tokio::test]
async fn test_comment_for_unknown_post_is_kept() {
    const ORPHAN: &str = "https://www.instagram.com/p/gone/";
    let source = FakeInstagram::default().with_post(
        Post::new(P1, 10, 2),
        vec![
            Comment::new(P1, "great!", 3, 0),
            Comment::new(ORPHAN, "bad", 7, 2),
        ],
    );
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let report = pipeline.run("natgeo").await.unwrap();
    assert_eq!(report.post_count, 1);
    assert_eq!(report.comment_count, 2);
    assert!(report.skipped_posts.is_empty());
    assert_eq!(report.averages.avg_likes, 10.0);
    assert_eq!(report.top_liked[0].comment.post_url, ORPHAN);
    assert_eq!(report.sentiment_groups[1].sentiment, Sentiment::Negative);
    assert_eq!(report.sentiment_groups[1].sum_likes, 7);
}

#[tokio::test]
async fn test_empty_account_gives_empty_report() {
    let source = FakeInstagram::default();
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let report = pipeline.run("nobody").await.unwrap();
    assert_eq!(report.averages.avg_likes, 0.0);
    assert_eq!(report.averages.sample_size, 0);
    assert!(report.sentiment_groups.is_empty());
    assert!(report.top_liked.is_empty());
    assert!(report.timeline.is_none());
    assert!(report.likes_histogram.bins.is_empty());
}

#[tokio::test]
async fn test_timeline_in_report() {
    let monday = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
    let source = FakeInstagram::default().with_post(
        Post::new(P1, 1, 2),
        vec![
            Comment::new(P1, "great", 1, 0).with_timestamp(monday),
            Comment::new(P1, "bad", 1, 0).with_timestamp(monday + chrono::Duration::weeks(2)),
        ],
    );
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );

    let timeline = pipeline.run("natgeo").await.unwrap().timeline.unwrap();
    assert_eq!(timeline.width, "weekly");
    assert_eq!(timeline.buckets.len(), 3);
    assert_eq!(timeline.buckets[1].total(), 0);
}

#[tokio::test]
async fn test_k_failures_give_k_error_rows() {
    let texts = ["great", "fail 1", "bad", "fail 2", "ok", "fail 3"];
    let classifier = FlakyClassifier::default();
    let (annotated, summary) =
        annotate_sentiment(comments(&texts), &classifier, &AnnotationOptions::default()).await;

    let errors = annotated
        .iter()
        .filter(|c| c.sentiment == Sentiment::Error)
        .count();
    assert_eq!(errors, 3);
    assert_eq!(annotated.len() - errors, 3);
    assert_eq!(summary.failed, 3);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), texts.len());

    let groups = group_by_sentiment(&annotated);
    assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), texts.len());
}

#[tokio::test]
async fn test_annotation_is_idempotent() {
    let input = comments(&["great", "bad", "neither"]);
    let options = AnnotationOptions::default();

    let (first, _) = annotate_sentiment(input.clone(), &KeywordClassifier, &options).await;
    let (second, _) = annotate_sentiment(input, &KeywordClassifier, &options).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_workers_preserve_order() {
    let texts = ["40", "5", "25", "0", "15", "10"];
    let options = AnnotationOptions {
        workers: 4,
        budget: None,
    };

    let (annotated, summary) =
        annotate_sentiment(comments(&texts), &SleepyClassifier, &options).await;

    let order: Vec<&str> = annotated
        .iter()
        .map(|c| c.comment.comment_text.as_str())
        .collect();
    assert_eq!(order, texts.to_vec());
    assert_eq!(summary.classified, texts.len());
}

#[tokio::test]
async fn test_budget_expiry_marks_remaining_as_error() {
    let options = AnnotationOptions {
        workers: 1,
        budget: Some(Duration::from_millis(50)),
    };

    let (annotated, summary) =
        annotate_sentiment(comments(&["0", "500", "0", "0"]), &SleepyClassifier, &options).await;

    assert_eq!(annotated[0].sentiment, Sentiment::Neutral);
    assert!(annotated[1..].iter().all(|c| c.sentiment == Sentiment::Error));
    assert_eq!(summary.classified, 1);
    assert_eq!(summary.timed_out, 3);
}

#[tokio::test]
async fn test_top_k_is_sorted_subset() {
    let input = comments(&["a", "b", "c", "d", "e", "f", "g"]);
    let (annotated, _) =
        annotate_sentiment(input, &KeywordClassifier, &AnnotationOptions::default()).await;

    let top = top_k_by_field(&annotated, EngagementField::Likes, 5);
    assert_eq!(top.len(), 5);
    assert!(top
        .windows(2)
        .all(|pair| pair[0].comment.likes_count >= pair[1].comment.likes_count));
    assert!(top.iter().all(|row| annotated.contains(row)));
}

#[test]
fn test_averages_within_bounds() {
    let posts = vec![
        Post::new(P1, 12, 0),
        Post::new(P2, 3, 9),
        Post::new("https://www.instagram.com/p/p3/", 40, 4),
    ];
    let averages = compute_averages(&posts);
    assert!((3.0..=40.0).contains(&averages.avg_likes));
    assert!((0.0..=9.0).contains(&averages.avg_comments));
}

#[test]
fn test_pipeline_runs_on_tokio_test_runtime() {
    let source = scenario_source();
    let pipeline = AnalysisPipeline::new(
        &source,
        &source,
        KeywordClassifier,
        AnalysisOptions::default(),
    );
    let report = tokio_test::block_on(pipeline.run("natgeo")).unwrap();
    assert_eq!(report.comment_count, 2);
}
