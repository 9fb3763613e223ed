//! Configuration types for document extraction.
//!
//! All run behaviour is controlled through [`ProcessingConfig`], built via its
//! [`ProcessingConfigBuilder`]. One struct holds every knob so a config can be
//! shared across page tasks, logged, and compared between runs.

use crate::error::ProcessingError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for an extraction run.
///
/// Built via [`ProcessingConfig::builder()`] or using
/// [`ProcessingConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_extractor::{ExtractionType, ProcessingConfig};
///
/// let config = ProcessingConfig::builder()
///     .extraction_type(ExtractionType::TextOnly)
///     .lang("en")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert!(config.process_text);
/// assert!(!config.process_table);
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Language code passed to the recognition models. Default: "en".
    pub lang: String,

    /// Numeric precision used for model inference. Default: [`Precision::Full`].
    ///
    /// Only trades speed against accuracy inside the model backend; the
    /// pipeline logic is identical for every value.
    pub precision: Precision,

    /// Which model subset the run was configured from. Default: [`ExtractionType::FullLayout`].
    ///
    /// Setting it through the builder also sets `process_text`,
    /// `process_table` and `layout`; the three flags are what the pipeline reads.
    pub extraction_type: ExtractionType,

    /// Run the text model. Default: true.
    pub process_text: bool,

    /// Run the table model. Default: true.
    pub process_table: bool,

    /// Run the layout model first and use its regions as hints. Default: true.
    ///
    /// Hint-only: disabling layout never disables the table model.
    pub layout: bool,

    /// Diagnostic verbosity requested by the caller. Default: false.
    ///
    /// The library only emits `tracing` events; the CLI maps this flag to an
    /// `info` (true) or `warn` (false) default filter.
    pub show_log: bool,

    /// Number of pages (and region calls per stream) processed concurrently.
    /// Model calls are additionally capped at this many in flight per run.
    /// Must be at least 1. Default: 4.
    pub concurrency: usize,

    /// Rendering DPI used when rasterising PDF pages. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Maximum rendered page dimension in pixels. Default: 2400.
    pub max_rendered_pixels: u32,

    /// Artifact storage backend settings.
    pub storage: StorageConfig,

    /// Directory holding optional model asset overrides. Default: "./models".
    ///
    /// The VLM-backed models read `text.prompt`, `table.prompt` and
    /// `layout.prompt` from here when present.
    pub models_base_path: PathBuf,

    /// Provider name for the VLM-backed models (e.g. "openai", "ollama").
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Model identifier for the VLM-backed models.
    pub model: Option<String>,

    /// Maximum retry attempts on a transient model failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            precision: Precision::default(),
            extraction_type: ExtractionType::default(),
            process_text: true,
            process_table: true,
            layout: true,
            show_log: false,
            concurrency: 4,
            dpi: 200,
            max_rendered_pixels: 2400,
            storage: StorageConfig::default(),
            models_base_path: PathBuf::from("./models"),
            provider_name: None,
            model: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("lang", &self.lang)
            .field("precision", &self.precision)
            .field("extraction_type", &self.extraction_type)
            .field("process_text", &self.process_text)
            .field("process_table", &self.process_table)
            .field("layout", &self.layout)
            .field("show_log", &self.show_log)
            .field("concurrency", &self.concurrency)
            .field("dpi", &self.dpi)
            .field("storage", &self.storage)
            .field("models_base_path", &self.models_base_path)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when neither text nor table extraction is requested.
    pub fn is_noop(&self) -> bool {
        !self.process_text && !self.process_table
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.config.lang = lang.into();
        self
    }

    pub fn precision(mut self, precision: Precision) -> Self {
        self.config.precision = precision;
        self
    }

    /// Select a model subset. Overwrites `process_text`, `process_table` and
    /// `layout`; call the individual setters afterwards to fine-tune.
    pub fn extraction_type(mut self, kind: ExtractionType) -> Self {
        let (text, table, layout) = kind.streams();
        self.config.extraction_type = kind;
        self.config.process_text = text;
        self.config.process_table = table;
        self.config.layout = layout;
        self
    }

    pub fn process_text(mut self, v: bool) -> Self {
        self.config.process_text = v;
        self
    }

    pub fn process_table(mut self, v: bool) -> Self {
        self.config.process_table = v;
        self
    }

    pub fn layout(mut self, v: bool) -> Self {
        self.config.layout = v;
        self
    }

    pub fn show_log(mut self, v: bool) -> Self {
        self.config.show_log = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn models_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.models_base_path = path.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, ProcessingError> {
        let c = &self.config;
        if c.lang.trim().is_empty() {
            return Err(ProcessingError::InvalidConfig(
                "Language code must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ProcessingError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.storage.use_s3 && c.storage.s3_bucket_name.is_none() {
            return Err(ProcessingError::InvalidConfig(
                "use_s3 requires s3_bucket_name".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

/// Artifact storage settings.
///
/// S3 is used only when `use_s3` is set **and** both a bucket name and a
/// bucket key are present; anything less falls back to the local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Upload artifacts to S3 and return presigned links. Default: false.
    pub use_s3: bool,
    pub s3_bucket_name: Option<String>,
    /// Key prefix inside the bucket.
    pub s3_bucket_key: Option<String>,
    /// AWS region. Default: "us-east-1".
    pub aws_region_name: String,
    /// Lifetime of presigned links in seconds. Default: 86400.
    pub presigned_url_expiry_secs: u64,
    /// Directory for the local backend. Default: "./outputs".
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            use_s3: false,
            s3_bucket_name: None,
            s3_bucket_key: None,
            aws_region_name: "us-east-1".to_string(),
            presigned_url_expiry_secs: 86_400,
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl StorageConfig {
    /// Whether enough is configured to use the S3 backend.
    pub fn s3_enabled(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        self.use_s3 && filled(&self.s3_bucket_name) && filled(&self.s3_bucket_key)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which model subset a run executes.
///
/// The numeric values 1–4 are accepted through [`TryFrom<u8>`] so integer
/// configuration (CLI, JSON) is validated at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionType {
    /// Text recognition over the full page, no layout pass.
    TextOnly,
    /// Table recognition over the full page, no layout pass.
    TableOnly,
    /// Text and table recognition over the full page, no layout pass.
    TextAndTable,
    /// Layout pass first, then text, table and figure extraction per region. (default)
    #[default]
    FullLayout,
}

impl ExtractionType {
    /// `(process_text, process_table, layout)` implied by this type.
    pub fn streams(self) -> (bool, bool, bool) {
        match self {
            ExtractionType::TextOnly => (true, false, false),
            ExtractionType::TableOnly => (false, true, false),
            ExtractionType::TextAndTable => (true, true, false),
            ExtractionType::FullLayout => (true, true, true),
        }
    }
}

impl TryFrom<u8> for ExtractionType {
    type Error = ProcessingError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ExtractionType::TextOnly),
            2 => Ok(ExtractionType::TableOnly),
            3 => Ok(ExtractionType::TextAndTable),
            4 => Ok(ExtractionType::FullLayout),
            other => Err(ProcessingError::InvalidConfig(format!(
                "extraction_type must be 1–4, got {other}"
            ))),
        }
    }
}

/// Numeric precision mode for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    /// Full precision (fp32). (default)
    #[default]
    Full,
    /// Reduced precision (fp16): faster, slightly less accurate.
    Reduced,
}
