//! In-process zero-shot scoring with an NLI model on ONNX Runtime.
//!
//! Each candidate label becomes a hypothesis ("This example is {label}.")
//! paired with the input text as premise. The entailment logits of all pairs
//! are softmaxed together, so scores are mutually exclusive (single-label).
//!
//! The model directory must contain `model.onnx`, `tokenizer.json`, and
//! `config.json` (for the `id2label` map), e.g. an ONNX export of
//! `MoritzLaurer/DeBERTa-v3-base-mnli-fever-anli` or `facebook/bart-large-mnli`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intentd_core::LabelScore;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::scorer::{ScoreError, Scorer, rank};

/// Max tokens per premise/hypothesis pair.
const MAX_SEQ_LEN: usize = 512;

/// Settings for [`LocalScorer`].
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub model_dir: PathBuf,
    /// Register the CUDA execution provider (needs the `cuda` feature).
    pub use_gpu: bool,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

/// Loaded NLI model. `session.run` needs `&mut`, hence the mutex in [`LocalScorer`].
struct NliModel {
    session: Session,
    tokenizer: Tokenizer,
    /// Class index of "entailment"; `None` means use the last class.
    entailment: Option<usize>,
    token_type_ids: bool,
}

/// Zero-shot scorer backed by a resident ONNX model.
pub struct LocalScorer {
    model: Arc<Mutex<NliModel>>,
    model_dir: PathBuf,
}

impl LocalScorer {
    /// Load the model, tokenizer, and label config from `config.model_dir`.
    pub fn load(config: &LocalConfig) -> anyhow::Result<Self> {
        let model = NliModel::load(&config.model_dir, config.use_gpu)?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_dir: config.model_dir.clone(),
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

#[async_trait]
impl Scorer for LocalScorer {
    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>, ScoreError> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let labels = labels.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| ScoreError::LocalInference("model lock poisoned".into()))?;
            model
                .score(&text, &labels)
                .map_err(|e| ScoreError::LocalInference(e.to_string()))
        })
        .await
        .map_err(|e| ScoreError::LocalInference(e.to_string()))?
    }

    fn source(&self) -> &'static str {
        "local"
    }
}

impl NliModel {
    fn load(model_dir: &Path, use_gpu: bool) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        #[allow(unused_mut)]
        let mut builder = Session::builder()?;
        if use_gpu {
            #[cfg(feature = "cuda")]
            {
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            warn!("GPU requested but built without the `cuda` feature, running on CPU");
        }
        let session = builder.commit_from_file(&model_path)?;

        let token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let entailment = if config_path.exists() {
            let json = std::fs::read_to_string(&config_path)?;
            let config: ModelConfig = serde_json::from_str(&json)?;
            entailment_index(&config.id2label)
        } else {
            None
        };
        if entailment.is_none() {
            warn!(model = %model_dir.display(), "no entailment label in config.json, using last class");
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(
            model = %model_path.display(),
            gpu = use_gpu,
            entailment = ?entailment,
            "loaded zero-shot model"
        );
        Ok(Self {
            session,
            tokenizer,
            entailment,
            token_type_ids,
        })
    }

    fn score(&mut self, text: &str, labels: &[String]) -> anyhow::Result<Vec<LabelScore>> {
        anyhow::ensure!(!labels.is_empty(), "no candidate labels");
        let batch_size = labels.len();

        let hypotheses: Vec<String> = labels.iter().map(|l| hypothesis(l)).collect();
        let pairs: Vec<(&str, &str)> = hypotheses.iter().map(|h| (text, h.as_str())).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let outputs = if self.token_type_ids {
            let type_tensor = Tensor::from_array((shape, type_ids.into_boxed_slice()))?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [batch_size, num_classes].
        let (output_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] as usize == batch_size && dims[1] > 0,
            "unexpected logits shape: {dims:?}, expected [{batch_size}, classes]"
        );
        let classes = dims[1] as usize;
        let entail = self.entailment.unwrap_or(classes - 1);
        anyhow::ensure!(
            entail < classes,
            "entailment index {entail} out of range for {classes} classes"
        );

        let entailment_logits: Vec<f32> = (0..batch_size)
            .map(|i| logits[i * classes + entail])
            .collect();
        let probs = softmax(&entailment_logits);

        let scores = labels
            .iter()
            .zip(probs)
            .map(|(label, p)| LabelScore::new(label.clone(), p))
            .collect();
        Ok(rank(scores))
    }
}

/// Hypothesis sentence for a candidate label.
fn hypothesis(label: &str) -> String {
    format!("This example is {label}.")
}

/// Class index whose label starts with "entail" (case-insensitive).
fn entailment_index(id2label: &HashMap<String, String>) -> Option<usize> {
    id2label
        .iter()
        .find(|(_, label)| label.to_ascii_lowercase().starts_with("entail"))
        .and_then(|(id, _)| id.parse().ok())
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&x| f64::from(x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}
