//! Candle backend for T5-family seq2seq checkpoints.
//!
//! Expects a Hugging Face style directory with `config.json`,
//! `tokenizer.json` and either `model.safetensors` or a sharded
//! `model.safetensors.index.json`.

use async_trait::async_trait;
use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::{GenerationParams, ModelDescription, TextGenerator};
use crate::error::ModelError;

struct T5Inner {
    /// Weights are shared; each request clones the model for its own KV cache.
    model: T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    device: Device,
    config: T5Config,
    eos_token_id: u32,
    /// Padding id handed to generation; taken from the tokenizer EOS token.
    pad_token_id: u32,
    max_input_tokens: usize,
    description: ModelDescription,
}

/// Seq2seq generator backed by candle.
#[derive(Clone)]
pub struct T5Generator {
    inner: Arc<T5Inner>,
}

fn load_err(context: &str, e: impl std::fmt::Display) -> ModelError {
    ModelError::Load(format!("{}: {}", context, e))
}

fn infer_err(context: &str, e: impl std::fmt::Display) -> ModelError {
    ModelError::Inference(format!("{}: {}", context, e))
}

impl T5Generator {
    /// Loads tokenizer, config and weights from `model_dir`. Blocking.
    pub fn load(
        model_dir: &Path,
        use_cuda: bool,
        max_input_tokens: usize,
    ) -> Result<Self, ModelError> {
        let device = select_device(use_cuda);

        let config_path = model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| load_err(&config_path.display().to_string(), e))?;
        let config: T5Config =
            serde_json::from_str(&config_str).map_err(|e| load_err("config.json", e))?;
        let raw_config: serde_json::Value =
            serde_json::from_str(&config_str).map_err(|e| load_err("config.json", e))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| load_err("tokenizer.json", e))?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .unwrap_or(config.eos_token_id as u32);

        let weight_files = find_safetensor_files(model_dir)?;
        let parameters = count_parameters(&weight_files)?;
        info!(
            files = weight_files.len(),
            parameters, "Loading model weights from safetensors"
        );

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&weight_files, DType::F32, &device)
                .map_err(|e| load_err("safetensors", e))?
        };
        let model =
            T5ForConditionalGeneration::load(vb, &config).map_err(|e| load_err("model", e))?;

        let description = ModelDescription {
            model_type: model_type(&raw_config),
            parameters,
            device: device_label(&device),
        };

        info!(
            model_type = %description.model_type,
            device = %description.device,
            "Model ready"
        );

        Ok(Self {
            inner: Arc::new(T5Inner {
                model,
                tokenizer,
                device,
                config,
                eos_token_id,
                pad_token_id: eos_token_id,
                max_input_tokens: max_input_tokens.max(1),
                description,
            }),
        })
    }
}

#[async_trait]
impl TextGenerator for T5Generator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError> {
        let inner = self.inner.clone();
        let prompt = prompt.to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || inner.generate_blocking(&prompt, &params))
            .await
            .map_err(|e| infer_err("generation task", e))?
    }

    fn describe(&self) -> ModelDescription {
        self.inner.description.clone()
    }
}

impl T5Inner {
    fn encode_prompt(&self, prompt: &str) -> Result<Vec<u32>, ModelError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| infer_err("tokenization", e))?;
        let mut ids = encoding.get_ids().to_vec();

        if ids.len() > self.max_input_tokens {
            debug!(
                tokens = ids.len(),
                limit = self.max_input_tokens,
                "Truncating prompt"
            );
            ids.truncate(self.max_input_tokens - 1);
            ids.push(self.eos_token_id);
        }
        Ok(ids)
    }

    fn generate_blocking(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError> {
        if params.num_return_sequences != 1 {
            warn!(
                requested = params.num_return_sequences,
                "Only a single sequence is generated"
            );
        }

        let input_ids = self.encode_prompt(prompt)?;
        let input = Tensor::new(input_ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| infer_err("input tensor", e))?;

        let mut model = self.model.clone();
        model.clear_kv_cache();

        let encoder_output = model
            .encode(&input)
            .map_err(|e| infer_err("encoder", e))?;

        let temperature = if params.do_sample && params.temperature > 0.0 {
            Some(params.temperature)
        } else {
            None
        };
        let mut sampler = LogitsProcessor::new(rand::random::<u64>(), temperature, None);

        let start_token = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let mut output_ids = vec![start_token];

        while output_ids.len() < params.max_length {
            // With the KV cache only the newest token is fed back.
            let window = if output_ids.len() == 1 || !self.config.use_cache {
                &output_ids[..]
            } else {
                &output_ids[output_ids.len() - 1..]
            };
            let decoder_input = Tensor::new(window, &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| infer_err("decoder tensor", e))?;

            let logits = model
                .decode(&decoder_input, &encoder_output)
                .and_then(|t| t.squeeze(0))
                .and_then(|t| t.to_dtype(DType::F32))
                .map_err(|e| infer_err("decoder", e))?;

            let next = sampler
                .sample(&logits)
                .map_err(|e| infer_err("sampling", e))?;
            if next == self.eos_token_id {
                break;
            }
            output_ids.push(next);
        }

        let generated = strip_padding(&output_ids[1..], self.pad_token_id);

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| infer_err("decoding", e))?;

        debug!(
            generated_tokens = generated.len(),
            output_len = text.len(),
            "Generation complete"
        );
        Ok(text.trim().to_string())
    }
}

fn strip_padding(ids: &[u32], pad_token_id: u32) -> Vec<u32> {
    ids.iter().copied().filter(|id| *id != pad_token_id).collect()
}

fn select_device(use_cuda: bool) -> Device {
    if !use_cuda {
        return Device::Cpu;
    }
    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            info!("CUDA device detected, using GPU");
            device
        }
        Ok(device) => {
            warn!("CUDA requested but not available, using CPU");
            device
        }
        Err(e) => {
            warn!(error = %e, "Failed to initialize CUDA, using CPU");
            Device::Cpu
        }
    }
}

fn device_label(device: &Device) -> String {
    if device.is_cuda() {
        "cuda:0".to_string()
    } else if device.is_metal() {
        "metal:0".to_string()
    } else {
        "cpu".to_string()
    }
}

/// Architecture name from `config.json`, e.g. `T5ForConditionalGeneration`.
fn model_type(raw_config: &serde_json::Value) -> String {
    raw_config
        .get("architectures")
        .and_then(|a| a.get(0))
        .and_then(|a| a.as_str())
        .or_else(|| raw_config.get("model_type").and_then(|m| m.as_str()))
        .unwrap_or("Unknown")
        .to_string()
}

fn find_safetensor_files(model_dir: &Path) -> Result<Vec<PathBuf>, ModelError> {
    let index_path = model_dir.join("model.safetensors.index.json");

    if index_path.exists() {
        let index_str = std::fs::read_to_string(&index_path)
            .map_err(|e| load_err(&index_path.display().to_string(), e))?;
        let index: serde_json::Value = serde_json::from_str(&index_str)
            .map_err(|e| load_err("model.safetensors.index.json", e))?;

        let files: BTreeSet<&str> = index
            .get("weight_map")
            .and_then(|v| v.as_object())
            .map(|map| map.values().filter_map(|f| f.as_str()).collect())
            .unwrap_or_default();

        if files.is_empty() {
            return Err(ModelError::Load(
                "no safetensor files listed in index".to_string(),
            ));
        }
        return Ok(files.into_iter().map(|f| model_dir.join(f)).collect());
    }

    let single = model_dir.join("model.safetensors");
    if single.exists() {
        Ok(vec![single])
    } else {
        Err(ModelError::Load(format!(
            "no safetensor files found in {}",
            model_dir.display()
        )))
    }
}

fn count_parameters(files: &[PathBuf]) -> Result<u64, ModelError> {
    let tensors = unsafe { MmapedSafetensors::multi(files) }
        .map_err(|e| load_err("safetensors header", e))?;

    Ok(tensors
        .tensors()
        .iter()
        .map(|(_, view)| view.shape().iter().product::<usize>() as u64)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use serde_json::json;

    fn tiny_config() -> serde_json::Value {
        json!({
            "vocab_size": 6,
            "d_model": 8,
            "d_kv": 4,
            "d_ff": 16,
            "num_layers": 1,
            "num_decoder_layers": 1,
            "num_heads": 2,
            "relative_attention_num_buckets": 8,
            "relative_attention_max_distance": 16,
            "dropout_rate": 0.0,
            "layer_norm_epsilon": 1e-6,
            "initializer_factor": 1.0,
            "feed_forward_proj": "relu",
            "tie_word_embeddings": true,
            "is_decoder": false,
            "is_encoder_decoder": true,
            "use_cache": true,
            "pad_token_id": 0,
            "eos_token_id": 1,
            "decoder_start_token_id": 0,
            "architectures": ["T5ForConditionalGeneration"],
            "model_type": "t5"
        })
    }

    fn tiny_tokenizer() -> serde_json::Value {
        let special = |id: u32, content: &str| {
            json!({
                "id": id,
                "content": content,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            })
        };
        json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [special(0, "<pad>"), special(1, "</s>"), special(2, "<unk>")],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [
                    { "Sequence": { "id": "A", "type_id": 0 } },
                    { "SpecialToken": { "id": "</s>", "type_id": 0 } }
                ],
                "pair": [
                    { "Sequence": { "id": "A", "type_id": 0 } },
                    { "SpecialToken": { "id": "</s>", "type_id": 0 } },
                    { "Sequence": { "id": "B", "type_id": 0 } },
                    { "SpecialToken": { "id": "</s>", "type_id": 0 } }
                ],
                "special_tokens": {
                    "</s>": { "id": "</s>", "ids": [1], "tokens": ["</s>"] }
                }
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "<pad>": 0, "</s>": 1, "<unk>": 2, "a": 3, "b": 4, "c": 5 },
                "unk_token": "<unk>"
            }
        })
    }

    /// Writes a randomly initialized single-layer checkpoint into `dir`.
    fn write_tiny_checkpoint(dir: &Path) {
        let config_json = tiny_config();
        std::fs::write(dir.join("config.json"), config_json.to_string()).unwrap();
        std::fs::write(dir.join("tokenizer.json"), tiny_tokenizer().to_string()).unwrap();

        let config: T5Config = serde_json::from_value(config_json).unwrap();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        T5ForConditionalGeneration::load(vb, &config).unwrap();
        // zero-initialized norms would flatten every hidden state
        for (name, var) in varmap.data().lock().unwrap().iter() {
            if name.ends_with("layer_norm.weight") {
                var.set(&var.ones_like().unwrap()).unwrap();
            }
        }
        varmap.save(dir.join("model.safetensors")).unwrap();
    }

    fn tiny_generator(max_input_tokens: usize) -> (tempfile::TempDir, T5Generator) {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_checkpoint(dir.path());
        let generator = T5Generator::load(dir.path(), false, max_input_tokens).unwrap();
        (dir, generator)
    }

    fn greedy(max_length: usize) -> GenerationParams {
        GenerationParams {
            max_length,
            temperature: 0.0,
            do_sample: false,
            num_return_sequences: 1,
        }
    }

    #[test]
    fn model_type_prefers_architectures() {
        let raw = json!({
            "architectures": ["T5ForConditionalGeneration"],
            "model_type": "t5"
        });
        assert_eq!(model_type(&raw), "T5ForConditionalGeneration");
        assert_eq!(model_type(&json!({"model_type": "t5"})), "t5");
        assert_eq!(model_type(&json!({})), "Unknown");
    }

    #[test]
    fn sharded_index_lists_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let index = json!({
            "weight_map": {
                "a.weight": "model-00002-of-00002.safetensors",
                "b.weight": "model-00001-of-00002.safetensors",
                "c.weight": "model-00001-of-00002.safetensors"
            }
        });
        std::fs::write(
            dir.path().join("model.safetensors.index.json"),
            index.to_string(),
        )
        .unwrap();

        let files = find_safetensor_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("model-00001-of-00002.safetensors"),
                dir.path().join("model-00002-of-00002.safetensors"),
            ]
        );
    }

    #[test]
    fn missing_weights_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_safetensor_files(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::Load(_)));
    }

    #[test]
    fn load_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = T5Generator::load(dir.path(), false, 512).err().unwrap();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn tiny_checkpoint_is_described() {
        let (_dir, generator) = tiny_generator(512);
        let description = generator.describe();
        assert_eq!(description.model_type, "T5ForConditionalGeneration");
        assert_eq!(description.device, "cpu");
        assert!(description.parameters > 0);
        assert_eq!(generator.inner.eos_token_id, 1);
        assert_eq!(generator.inner.pad_token_id, 1);
    }

    #[test]
    fn long_prompt_keeps_limit_and_eos_tail() {
        let (_dir, generator) = tiny_generator(3);
        let ids = generator.inner.encode_prompt("a b c a b c").unwrap();
        assert_eq!(ids, vec![3, 4, 1]);

        // already at the limit
        assert_eq!(generator.inner.encode_prompt("a b").unwrap(), vec![3, 4, 1]);
    }

    #[test]
    fn prompt_within_limit_is_untouched() {
        let (_dir, generator) = tiny_generator(512);
        let ids = generator.inner.encode_prompt("a b c a b c").unwrap();
        assert_eq!(ids, vec![3, 4, 5, 3, 4, 5, 1]);
    }

    #[test]
    fn max_length_one_generates_nothing() {
        let (_dir, generator) = tiny_generator(512);
        let text = generator.inner.generate_blocking("a b c", &greedy(1)).unwrap();
        assert_eq!(text, "");

        let sampled = GenerationParams::sampled(1, 0.7);
        let text = generator.inner.generate_blocking("a b c", &sampled).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn max_length_bounds_generated_words() {
        let (_dir, generator) = tiny_generator(512);
        for max_length in 2..=6 {
            let text = generator
                .inner
                .generate_blocking("a b c", &greedy(max_length))
                .unwrap();
            assert!(text.split_whitespace().count() <= max_length - 1);

            let sampled = GenerationParams::sampled(max_length, 1.0);
            let text = generator
                .inner
                .generate_blocking("c b a", &sampled)
                .unwrap();
            assert!(text.split_whitespace().count() <= max_length - 1);
            assert!(
                text.split_whitespace()
                    .all(|word| ["a", "b", "c"].contains(&word))
            );
        }
    }

    #[test]
    fn greedy_decoding_is_repeatable() {
        let (_dir, generator) = tiny_generator(512);
        let first = generator.inner.generate_blocking("a b c", &greedy(8)).unwrap();
        let second = generator.inner.generate_blocking("a b c", &greedy(8)).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn generate_runs_off_the_async_runtime() {
        let (_dir, generator) = tiny_generator(4);
        let text = generator
            .generate("a b c a b c a b c", &greedy(1))
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn padding_is_removed_from_output_ids() {
        assert_eq!(strip_padding(&[3, 1, 4, 1], 1), vec![3, 4]);
        assert!(strip_padding(&[0, 0], 0).is_empty());
        assert!(strip_padding(&[], 0).is_empty());
    }
}
