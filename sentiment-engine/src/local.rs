//! On-device sentiment classification with a BERT-family sequence
//! classifier (`BertForSequenceClassification` checkpoints such as
//! twitter-roberta sentiment models exported to safetensors).
//!
//! The model directory must contain `config.json`, `tokenizer.json` and
//! `model.safetensors`. Inference runs on the CPU inside
//! `spawn_blocking` so the async runtime is never stalled.

use crate::labels::LabelMap;
use crate::{checked_result, SentimentClassifier};
use candle_core::{Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use instasense_core::{ClassificationError, SentimentResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

const DEFAULT_NUM_LABELS: usize = 3;

/// The parts of `config.json` the classification head needs beyond the
/// encoder config.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default = "default_max_positions")]
    max_position_embeddings: usize,
    #[serde(default)]
    num_labels: Option<usize>,
    #[serde(default)]
    id2label: HashMap<String, String>,
}

impl HeadConfig {
    /// Output width of the classification head.
    fn num_labels(&self) -> usize {
        match self.num_labels {
            Some(n) => n,
            None if self.id2label.is_empty() => DEFAULT_NUM_LABELS,
            None => self.id2label.len(),
        }
    }
}

fn default_max_positions() -> usize {
    512
}

struct LoadedModel {
    encoder: BertModel,
    pooler: Linear,
    head: Linear,
    tokenizer: Tokenizer,
    id2label: Vec<String>,
    max_tokens: usize,
    device: Device,
}

#[derive(Clone)]
pub struct LocalClassifier {
    model: Arc<LoadedModel>,
    labels: LabelMap,
    model_dir: PathBuf,
}

impl std::fmt::Debug for LocalClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClassifier")
            .field("model_dir", &self.model_dir)
            .field("labels", &self.model.id2label)
            .field("max_tokens", &self.model.max_tokens)
            .finish()
    }
}

impl LocalClassifier {
    pub fn load(model_dir: &Path, labels: LabelMap) -> Result<Self, ClassificationError> {
        let load_err = |reason: String| ClassificationError::ModelLoadingFailed {
            model_path: model_dir.display().to_string(),
            reason,
        };

        info!("Loading sentiment model from {}", model_dir.display());

        let raw_config = std::fs::read_to_string(model_dir.join(CONFIG_FILE))
            .map_err(|e| load_err(format!("{CONFIG_FILE}: {e}")))?;
        let bert_config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| load_err(format!("{CONFIG_FILE}: {e}")))?;
        let head_config: HeadConfig = serde_json::from_str(&raw_config)
            .map_err(|e| load_err(format!("{CONFIG_FILE}: {e}")))?;

        let tokenizer = Tokenizer::from_file(model_dir.join(TOKENIZER_FILE))
            .map_err(|e| load_err(format!("{TOKENIZER_FILE}: {e}")))?;

        let device = Device::Cpu;

        let weights = model_dir.join(WEIGHTS_FILE);
        // SAFETY: the weights file is memory-mapped read-only and must not be
        // modified while the classifier is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device) }
            .map_err(|e| load_err(format!("{WEIGHTS_FILE}: {e}")))?;

        let encoder =
            BertModel::load(vb.clone(), &bert_config).map_err(|e| load_err(e.to_string()))?;
        let hidden = head_config.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .map_err(|e| load_err(format!("pooler: {e}")))?;
        // The weights check the head width before any label is allocated.
        let num_labels = head_config.num_labels();
        let head = candle_nn::linear(hidden, num_labels, vb.pp("classifier"))
            .map_err(|e| load_err(format!("classifier head: {e}")))?;
        let id2label = ordered_labels(&head_config.id2label, num_labels).map_err(load_err)?;

        info!(
            "Sentiment model ready: {} labels, max {} tokens",
            id2label.len(),
            head_config.max_position_embeddings
        );

        Ok(Self {
            model: Arc::new(LoadedModel {
                encoder,
                pooler,
                head,
                tokenizer,
                id2label,
                max_tokens: head_config.max_position_embeddings,
                device,
            }),
            labels,
            model_dir: model_dir.to_path_buf(),
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.model.max_tokens
    }
}

impl SentimentClassifier for LocalClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyText);
        }

        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let (raw_label, score) = tokio::task::spawn_blocking(move || model.predict(&text))
            .await
            .map_err(|e| ClassificationError::InferenceFailed {
                reason: format!("inference task failed: {e}"),
            })??;

        let label = self.labels.resolve(&raw_label)?;
        checked_result(label, score)
    }
}

impl LoadedModel {
    /// Returns the raw label of the most probable class and its probability.
    fn predict(&self, text: &str) -> Result<(String, f32), ClassificationError> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| {
            ClassificationError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        let ids = encoding.get_ids();
        if ids.len() > self.max_tokens {
            return Err(ClassificationError::InputTooLong {
                length: ids.len(),
                max_tokens: self.max_tokens,
            });
        }

        let input_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(inference_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(inference_err)?;

        let hidden_states = self
            .encoder
            .forward(&input_ids, &token_type_ids)
            .map_err(inference_err)?;

        // Pool on the first ([CLS]) token, then project to class logits.
        let cls = hidden_states.i((.., 0)).map_err(inference_err)?;
        let pooled = self
            .pooler
            .forward(&cls)
            .and_then(|t| t.tanh())
            .map_err(inference_err)?;
        let logits = self.head.forward(&pooled).map_err(inference_err)?;
        let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(inference_err)?;

        let (index, score) = argmax(&probabilities).ok_or_else(|| {
            ClassificationError::InferenceFailed {
                reason: "model produced no logits".to_string(),
            }
        })?;

        let raw_label = self
            .id2label
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{index}"));
        debug!("Classified {} tokens as {} ({:.3})", ids.len(), raw_label, score);

        Ok((raw_label, score))
    }
}

fn inference_err(e: candle_core::Error) -> ClassificationError {
    ClassificationError::InferenceFailed {
        reason: e.to_string(),
    }
}

/// Turns the `{"0": "LABEL_0", ...}` map into a dense vector of
/// `num_labels` entries indexed by class id. Ids without a name get
/// `LABEL_n`; ids outside the head are rejected.
fn ordered_labels(
    id2label: &HashMap<String, String>,
    num_labels: usize,
) -> Result<Vec<String>, String> {
    let mut labels: Vec<String> = (0..num_labels).map(|i| format!("LABEL_{i}")).collect();
    for (raw_id, label) in id2label {
        let Ok(id) = raw_id.parse::<usize>() else {
            continue;
        };
        let slot = labels.get_mut(id).ok_or_else(|| {
            format!("{CONFIG_FILE}: id2label id {id} exceeds {num_labels} head outputs")
        })?;
        *slot = label.clone();
    }
    Ok(labels)
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
