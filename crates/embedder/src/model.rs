//! ONNX model loading and inference (feature `onnx`).
//!
//! The ONNX environment is process-global behind a once-guard; sessions and
//! tokenizers are cached per thread because `onnxruntime` sessions are not
//! `Sync`. First call on a thread pays the load cost (cold path, seconds),
//! every later call reuses the warm handle (milliseconds).

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use once_cell::sync::OnceCell;
use onnxruntime::environment::Environment;
use onnxruntime::ndarray::Array2;
use onnxruntime::session::Session;
use onnxruntime::tensor::OrtOwnedTensor;
use tokenizers::Tokenizer;

use crate::config::{EmbedderConfig, EMBEDDING_DIM};
use crate::error::EmbedError;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static MODEL_CACHE: RefCell<HashMap<PathBuf, Rc<LoadedModel>>> = RefCell::new(HashMap::new());
}

pub(crate) struct LoadedModel {
    tokenizer: Tokenizer,
    session: RefCell<Session<'static>>,
}

fn ort_environment() -> Result<&'static Environment, EmbedError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("supp-embedder")
            .build()
            .map_err(|e| EmbedError::ModelUnavailable(e.to_string()))
    })
}

impl LoadedModel {
    fn load(artifact_dir: &Path) -> Result<Self, EmbedError> {
        let model_path = artifact_dir.join("model.onnx");
        let tokenizer_path = artifact_dir.join("tokenizer.json");
        if !model_path.is_file() {
            return Err(EmbedError::ModelUnavailable(format!(
                "missing model artifact {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.is_file() {
            return Err(EmbedError::ModelUnavailable(format!(
                "missing tokenizer artifact {}",
                tokenizer_path.display()
            )));
        }

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelUnavailable(e.to_string()))?;
        let env = ort_environment()?;
        let session = env
            .new_session_builder()
            .map_err(|e| EmbedError::ModelUnavailable(e.to_string()))?
            .with_model_from_file(model_path)
            .map_err(|e| EmbedError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

pub(crate) fn get_or_load_model(artifact_dir: &Path) -> Result<Rc<LoadedModel>, EmbedError> {
    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(artifact_dir) {
            return Ok(handle.clone());
        }
        tracing::info!(path = %artifact_dir.display(), "loading embedding model");
        let handle = Rc::new(LoadedModel::load(artifact_dir)?);
        cache.insert(artifact_dir.to_path_buf(), handle.clone());
        Ok(handle)
    })
}

/// Tokenize, run the session, and mean-pool the last hidden state.
///
/// Inputs are matched against the names the model declares; BERT-family
/// models variously want `input_ids`, `attention_mask`, and
/// `token_type_ids` (zeros for single-segment input).
pub(crate) fn run_inference(
    handle: &LoadedModel,
    text: &str,
    cfg: &EmbedderConfig,
) -> Result<Vec<f32>, EmbedError> {
    let encoding = handle
        .tokenizer
        .encode(text, true)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let mut mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    if ids.len() > cfg.max_sequence_length {
        ids.truncate(cfg.max_sequence_length);
        mask.truncate(cfg.max_sequence_length);
    }
    let seq_len = ids.len();
    if seq_len == 0 {
        return Err(EmbedError::Inference("input tokenized to nothing".into()));
    }

    let input_ids = Array2::from_shape_vec((1, seq_len), ids)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let attention_mask = Array2::from_shape_vec((1, seq_len), mask.clone())
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    let mut guard = handle.session.borrow_mut();
    let session = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session.inputs.len());
    let mut ids_tensor = Some(input_ids);
    let mut mask_tensor = Some(attention_mask);
    for input in &session.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = ids_tensor.take().ok_or_else(|| {
                    EmbedError::Inference("model requested input_ids twice".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = mask_tensor.take().ok_or_else(|| {
                    EmbedError::Inference("model requested attention_mask twice".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                runtime_inputs.push(Array2::<i64>::zeros((1, seq_len)).into_dyn());
            }
            other => {
                return Err(EmbedError::Inference(format!(
                    "unsupported model input '{other}'"
                )));
            }
        }
    }

    let outputs: Vec<OrtOwnedTensor<f32, _>> = session
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let hidden = outputs
        .first()
        .ok_or_else(|| EmbedError::Inference("model produced no outputs".into()))?;

    // Mean pooling over real (unmasked) tokens.
    let view = hidden.view();
    let shape = view.shape().to_vec();
    if shape.len() != 3 || shape[2] != EMBEDDING_DIM {
        return Err(EmbedError::Inference(format!(
            "unexpected output shape {shape:?}, want [1, seq, {EMBEDDING_DIM}]"
        )));
    }
    let mut pooled = vec![0f32; EMBEDDING_DIM];
    let mut live_tokens = 0f32;
    for (token_idx, &m) in mask.iter().enumerate().take(shape[1]) {
        if m == 0 {
            continue;
        }
        live_tokens += 1.0;
        for (dim, slot) in pooled.iter_mut().enumerate() {
            *slot += view[[0, token_idx, dim]];
        }
    }
    if live_tokens > 0.0 {
        for slot in pooled.iter_mut() {
            *slot /= live_tokens;
        }
    }
    Ok(pooled)
}
