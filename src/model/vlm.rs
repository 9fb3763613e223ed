//! Vision-language-model backend for the three model families.
//!
//! Each adapter sends the (page or region) image with a task prompt from
//! [`crate::prompts`] and parses the JSON array the prompt asks for.
//! Parsing is lenient where a sensible fallback exists: a text response
//! that is not JSON becomes one span covering the whole image, a table
//! response that is not JSON is scanned for `<table>` elements. Layout has
//! no such fallback and reports [`ModelError::InvalidResponse`], which the
//! orchestrator treats as a non-fatal layout failure.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient and frequent under concurrent load.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) spreads the retries
//! out: with 500 ms base and 2 retries the waits are 500 ms → 1 s.

use crate::config::{Precision, ProcessingConfig};
use crate::error::{ModelError, ProcessingError};
use crate::model::{
    BoundingBox, LayoutKind, LayoutModel, LayoutRegion, ModelSet, TableModel, TableRecognition,
    TextModel, TextSpan,
};
use crate::pipeline::{encode, postprocess};
use crate::prompts::ModelAssets;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Shared provider handle plus call policy.
pub struct VlmBackend {
    provider: Arc<dyn LLMProvider>,
    max_retries: u32,
    retry_backoff_ms: u64,
    detail: &'static str,
}

impl VlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ProcessingConfig) -> Self {
        Self {
            provider,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            detail: match config.precision {
                Precision::Full => "high",
                Precision::Reduced => "low",
            },
        }
    }

    /// Send `image` with `prompt` and return the cleaned response text.
    async fn ask(&self, prompt: &str, image: &DynamicImage) -> Result<String, ModelError> {
        let start = Instant::now();
        let image_data = encode::encode_for_vlm(image, self.detail)
            .map_err(|e| ModelError::Encode(e.to_string()))?;

        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(4096),
            ..Default::default()
        };

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!("VLM retry {}/{} after {}ms", attempt, self.max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "VLM call: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(postprocess::clean_response(&response.content));
                }
                Err(e) => {
                    let msg = e.to_string();
                    warn!("VLM attempt {} failed: {}", attempt + 1, msg);
                    last_err = Some(msg);
                }
            }
        }

        Err(ModelError::InferenceFailed {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

// ── Response payloads ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawSpan {
    text: String,
    #[serde(rename = "box")]
    bbox: Option<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    html: String,
    #[serde(rename = "box")]
    bbox: Option<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "box")]
    bbox: [f32; 4],
    #[serde(default = "default_score")]
    score: f32,
}

fn default_score() -> f32 {
    1.0
}

fn to_box(raw: Option<[f32; 4]>, image: &DynamicImage) -> BoundingBox {
    match raw {
        Some([x1, y1, x2, y2]) => BoundingBox::new(x1, y1, x2, y2),
        None => BoundingBox::full(image.width(), image.height()),
    }
}

fn parse_array<T: for<'de> Deserialize<'de>>(response: &str) -> Option<Vec<T>> {
    postprocess::extract_json_array(response).and_then(|s| serde_json::from_str(s).ok())
}

/// Parse a text-model response into spans.
pub(crate) fn parse_text_response(response: &str, image: &DynamicImage) -> Vec<TextSpan> {
    match parse_array::<RawSpan>(response) {
        Some(raw) => raw
            .into_iter()
            .map(|s| TextSpan {
                region: to_box(s.bbox, image),
                text: postprocess::normalise_text(&s.text),
            })
            .filter(|s| !s.text.is_empty())
            .collect(),
        None => {
            let text = postprocess::normalise_text(response);
            if text.is_empty() {
                Vec::new()
            } else {
                debug!("Text response was not JSON; using it as one span");
                vec![TextSpan {
                    region: BoundingBox::full(image.width(), image.height()),
                    text,
                }]
            }
        }
    }
}

/// Parse a table-model response into tables.
pub(crate) fn parse_table_response(response: &str, image: &DynamicImage) -> Vec<TableRecognition> {
    match parse_array::<RawTable>(response) {
        Some(raw) => raw
            .into_iter()
            .filter(|t| !t.html.trim().is_empty())
            .map(|t| TableRecognition {
                region: to_box(t.bbox, image),
                html: t.html.trim().to_string(),
            })
            .collect(),
        None => postprocess::extract_html_tables(response)
            .into_iter()
            .map(|html| TableRecognition {
                region: BoundingBox::full(image.width(), image.height()),
                html,
            })
            .collect(),
    }
}

/// Parse a layout-model response into regions; unknown classes are dropped.
pub(crate) fn parse_layout_response(response: &str) -> Result<Vec<LayoutRegion>, ModelError> {
    let raw: Vec<RawRegion> = parse_array(response).ok_or_else(|| {
        ModelError::InvalidResponse(format!(
            "expected a JSON array of regions, got {} chars",
            response.len()
        ))
    })?;

    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let kind = LayoutKind::from_name(&r.kind)
                .or_else(|| r.kind.trim().parse().ok().and_then(LayoutKind::from_label))?;
            let [x1, y1, x2, y2] = r.bbox;
            Some(LayoutRegion {
                kind,
                region: BoundingBox::new(x1, y1, x2, y2),
                score: r.score,
            })
        })
        .collect())
}

// ── Adapters ─────────────────────────────────────────────────────────────

/// [`TextModel`] backed by a VLM.
pub struct VlmTextModel {
    backend: Arc<VlmBackend>,
    prompt: String,
}

#[async_trait]
impl TextModel for VlmTextModel {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextSpan>, ModelError> {
        let response = self.backend.ask(&self.prompt, image).await?;
        Ok(parse_text_response(&response, image))
    }
}

/// [`TableModel`] backed by a VLM.
pub struct VlmTableModel {
    backend: Arc<VlmBackend>,
    prompt: String,
}

#[async_trait]
impl TableModel for VlmTableModel {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TableRecognition>, ModelError> {
        let response = self.backend.ask(&self.prompt, image).await?;
        Ok(parse_table_response(&response, image))
    }
}

/// [`LayoutModel`] backed by a VLM.
pub struct VlmLayoutModel {
    backend: Arc<VlmBackend>,
    prompt: String,
}

#[async_trait]
impl LayoutModel for VlmLayoutModel {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<LayoutRegion>, ModelError> {
        let response = self.backend.ask(&self.prompt, image).await?;
        parse_layout_response(&response)
    }
}

/// Build all three adapters from `config`.
pub fn build_model_set(config: &ProcessingConfig) -> Result<ModelSet, ProcessingError> {
    let provider = resolve_provider(config)?;
    let backend = Arc::new(VlmBackend::new(provider, config));
    let assets = ModelAssets::load(&config.models_base_path, &config.lang);
    info!(
        "VLM models ready (lang={}, precision={:?}, assets={})",
        config.lang,
        config.precision,
        config.models_base_path.display()
    );

    Ok(ModelSet::new()
        .with_text(Arc::new(VlmTextModel {
            backend: Arc::clone(&backend),
            prompt: assets.text_prompt,
        }))
        .with_table(Arc::new(VlmTableModel {
            backend: Arc::clone(&backend),
            prompt: assets.table_prompt,
        }))
        .with_layout(Arc::new(VlmLayoutModel {
            backend,
            prompt: assets.layout_prompt,
        })))
}

/// Resolve the provider, from most-specific to least-specific:
///
/// 1. `config.provider_name` (+ `config.model`)
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 3. OpenAI when `OPENAI_API_KEY` is set
/// 4. [`ProviderFactory::from_env`] auto-detection
fn resolve_provider(config: &ProcessingConfig) -> Result<Arc<dyn LLMProvider>, ProcessingError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ProcessingError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No model provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ProcessingError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ProcessingError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
