use std::num::NonZeroU32;
use std::pin::pin;

use anyhow::{Context, Result};
use log::{debug, info, trace};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaChatMessage, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;

use crate::llm::{ChatMessage, EngineError, NarrationEngine};

// ---------------------------------------------------------------------------
// Model configuration
// ---------------------------------------------------------------------------

pub struct ModelConfig {
    /// How many layers to offload to GPU (0 = CPU only).
    pub n_gpu_layers: u32,
    /// Context window size in tokens.
    pub n_ctx: u32,
    /// Maximum tokens to generate per narrator turn.
    pub max_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_gpu_layers: 0,
            n_ctx: 8092,
            max_tokens: 1000,
        }
    }
}

fn build_sampler() -> LlamaSampler {
    LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.95, 1),
        LlamaSampler::min_p(0.0, 1),
        LlamaSampler::temp(1.0),
        LlamaSampler::dist(1234),
    ])
}

// ---------------------------------------------------------------------------
// LocalEngine: in-process GGUF model
// ---------------------------------------------------------------------------

pub struct LocalEngine {
    #[allow(dead_code)]
    backend: &'static LlamaBackend,
    model: &'static LlamaModel,
    ctx: LlamaContext<'static>,
    n_ctx: u32,
    max_tokens: usize,
}

impl LocalEngine {
    pub fn load_model(model_path: &str, config: ModelConfig) -> Result<Self> {
        let backend: &'static LlamaBackend = Box::leak(Box::new(
            LlamaBackend::init().context("failed to init llama backend")?,
        ));

        info!("Loading model from: {model_path}");
        info!(
            "  config: n_gpu_layers={}, n_ctx={}, max_tokens={}",
            config.n_gpu_layers, config.n_ctx, config.max_tokens
        );

        let model_params = pin!(LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers));
        let model: &'static LlamaModel = Box::leak(Box::new(
            LlamaModel::load_from_file(backend, model_path, &model_params)
                .context("failed to load model")?,
        ));

        let n_ctx = NonZeroU32::new(config.n_ctx).context("context size must be > 0")?;
        let ctx = model
            .new_context(backend, LlamaContextParams::default().with_n_ctx(Some(n_ctx)))
            .context("failed to create inference context")?;

        info!("Model loaded successfully");

        Ok(Self {
            backend,
            model,
            ctx,
            n_ctx: config.n_ctx,
            max_tokens: config.max_tokens,
        })
    }

    /// Tokenize the conversation, feed the prompt, then sample until the model
    /// stops or the token budget runs out.
    fn generate(
        &mut self,
        messages: &[ChatMessage],
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String> {
        self.ctx.clear_kv_cache();

        let llama_msgs: Vec<LlamaChatMessage> = messages
            .iter()
            .map(|m| LlamaChatMessage::new(m.role.as_str().to_string(), m.content.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to create chat messages")?;

        let tmpl = self
            .model
            .chat_template(None)
            .context("model has no chat template")?;
        let prompt = self
            .model
            .apply_chat_template(&tmpl, &llama_msgs, true)
            .context("failed to apply chat template")?;

        trace!("=== RENDERED PROMPT ===\n{prompt}\n=== END PROMPT ===");

        let tokens = self
            .model
            .str_to_token(&prompt, AddBos::Always)
            .context("tokenization failed")?;
        anyhow::ensure!(!tokens.is_empty(), "prompt produced no tokens");

        info!("Prompt tokenized: {} tokens", tokens.len());

        let mut batch = LlamaBatch::new(self.n_ctx as usize, 1);
        let last_idx = (tokens.len() - 1) as i32;
        for (i, tok) in (0i32..).zip(tokens.iter()) {
            batch.add(*tok, i, &[0], i == last_idx)?;
        }
        self.ctx
            .decode(&mut batch)
            .context("initial decode failed")?;

        let mut sampler = build_sampler();
        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut n_cur = batch.n_tokens();

        for _ in 0..self.max_tokens {
            let tok = sampler.sample(&self.ctx, batch.n_tokens() - 1);
            sampler.accept(tok);

            if self.model.is_eog_token(tok) {
                debug!("Hit EOG token, stopping generation");
                break;
            }

            let piece = self
                .model
                .token_to_piece(tok, &mut decoder, true, None)
                .context("token_to_piece failed")?;
            on_chunk(&piece);
            output.push_str(&piece);

            batch.clear();
            batch.add(tok, n_cur, &[0], true)?;
            self.ctx.decode(&mut batch).context("decode step failed")?;
            n_cur += 1;
        }

        Ok(output)
    }
}

impl NarrationEngine for LocalEngine {
    fn requires_credential(&self) -> bool {
        false
    }

    fn narrate(
        &mut self,
        messages: &[ChatMessage],
        _credential: Option<&str>,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String, EngineError> {
        info!("=== LOCAL NARRATION: {} messages ===", messages.len());
        for (i, msg) in messages.iter().enumerate() {
            debug!("  msg[{i}] {msg}");
        }

        let output = self
            .generate(messages, on_chunk)
            .map_err(|e| EngineError::Transport(format!("{e:#}")))?;

        info!("Narration complete: {} chars", output.len());
        if output.trim().is_empty() {
            return Err(EngineError::Transport("the model returned no text".into()));
        }
        Ok(output)
    }
}
