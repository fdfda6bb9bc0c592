use instasense_core::{ClassificationError, ConfigError, SentimentLabel};
use std::collections::HashMap;

/// Maps the raw labels a model emits (`LABEL_0`, `positive`, ...) onto
/// [`SentimentLabel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    entries: HashMap<String, SentimentLabel>,
}

impl Default for LabelMap {
    fn default() -> Self {
        let entries = [
            ("LABEL_0", SentimentLabel::Negative),
            ("LABEL_1", SentimentLabel::Neutral),
            ("LABEL_2", SentimentLabel::Positive),
        ]
        .into_iter()
        .map(|(raw, label)| (raw.to_string(), label))
        .collect();

        Self { entries }
    }
}

impl LabelMap {
    /// Build from the `[classifier.labels]` table. Entries override the
    /// built-in `LABEL_n` mapping; an empty table leaves it untouched.
    pub fn from_config(labels: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut map = Self::default();
        for (raw, name) in labels {
            let label = parse_sentiment_name(name).ok_or_else(|| ConfigError::InvalidValue {
                field: format!("classifier.labels.{raw}"),
                value: name.clone(),
            })?;
            map.insert(raw.clone(), label);
        }
        Ok(map)
    }

    pub fn insert(&mut self, raw: impl Into<String>, label: SentimentLabel) {
        self.entries.insert(raw.into(), label);
    }

    pub fn resolve(&self, raw: &str) -> Result<SentimentLabel, ClassificationError> {
        let raw = raw.trim();
        self.entries
            .get(raw)
            .copied()
            .or_else(|| parse_sentiment_name(raw))
            .ok_or_else(|| ClassificationError::UnknownLabel {
                label: raw.to_string(),
            })
    }
}

fn parse_sentiment_name(name: &str) -> Option<SentimentLabel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "negative" | "neg" => Some(SentimentLabel::Negative),
        "neutral" | "neu" => Some(SentimentLabel::Neutral),
        "positive" | "pos" => Some(SentimentLabel::Positive),
        _ => None,
    }
}
