pub mod labels;
pub mod local;
pub mod remote;

pub use labels::LabelMap;
pub use local::LocalClassifier;
pub use remote::RemoteClassifier;

use instasense_core::{
    ClassificationError, ClassifierBackend, ClassifierConfig, CoreError, SentimentLabel,
    SentimentResult,
};
use tracing::info;

/// Classifies one piece of text into a sentiment label with a confidence.
pub trait SentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError>;
}

impl<T: SentimentClassifier + ?Sized> SentimentClassifier for &T {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        (**self).classify(text).await
    }
}

/// The classifier selected by `[classifier] backend`.
#[derive(Debug, Clone)]
pub enum Classifier {
    Local(LocalClassifier),
    Remote(RemoteClassifier),
}

impl Classifier {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, CoreError> {
        let labels = LabelMap::from_config(&config.labels)?;
        let classifier = match config.backend {
            ClassifierBackend::Local => {
                Classifier::Local(LocalClassifier::load(&config.model_dir, labels)?)
            }
            ClassifierBackend::Remote => {
                Classifier::Remote(RemoteClassifier::from_config(config, labels)?)
            }
        };
        info!("Using {} sentiment classifier", classifier.backend_name());
        Ok(classifier)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Classifier::Local(_) => "local",
            Classifier::Remote(_) => "remote",
        }
    }
}

impl SentimentClassifier for Classifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        match self {
            Classifier::Local(classifier) => classifier.classify(text).await,
            Classifier::Remote(classifier) => classifier.classify(text).await,
        }
    }
}

/// Rejects scores outside `[0, 1]` before they reach the analysis.
pub fn checked_result(
    label: SentimentLabel,
    score: f32,
) -> Result<SentimentResult, ClassificationError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(ClassificationError::InvalidScore { score });
    }
    Ok(SentimentResult::new(label, score))
}
