//! CLI binary for ocr-extractor.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessingConfig`, initialises the model registry and prints the
//! result bundle as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_extractor::{
    process, process_to_file, registry, ExtractionType, Precision, ProcessingConfig,
    ProcessingOutput, ProcessingProgressCallback, ProgressCallback, StorageConfig,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar with one log line per finished page. Pages can
/// finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_number: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_number, Instant::now());
        }
        self.bar.set_message(format!("page {page_number}"));
    }

    fn on_page_complete(&self, page_number: usize, total: usize, items: usize) {
        let secs = self.elapsed_secs(page_number);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_number,
            total,
            dim(&format!("{items:>4} items")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_number: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep log lines to one terminal row.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error,
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_number,
            total,
            red(&msg),
        ));
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} page(s) extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) extracted  ({} with model failures)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full layout extraction of a PDF, JSON on stdout
  ocr-extract invoice.pdf

  # A single scanned image, text only
  ocr-extract --image --extraction-type 1 receipt.jpg

  # Write the result file; artifacts under ./artifacts
  ocr-extract report.pdf -o report.json --output-dir ./artifacts

  # Upload artifacts to S3 and return presigned links
  ocr-extract report.pdf --use-s3 --s3-bucket-name docs --s3-bucket-key extracts

EXTRACTION TYPES:
  1  text only            (full page, no layout)
  2  tables only          (full page, no layout)
  3  text and tables      (full page, no layout)
  4  full layout          (layout hints, text, tables, figures)  [default]

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  AWS_ACCESS_KEY_ID       S3 credentials
  AWS_SECRET_ACCESS_KEY
  AWS_ENDPOINT_URL        S3-compatible endpoint (e.g. MinIO)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Extract ordered text, tables and figures from images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-extract",
    version,
    about = "Extract ordered text, tables and figures from images and PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    /// Treat the input as a single image instead of a PDF.
    #[arg(long)]
    image: bool,

    /// Write the result JSON to this file instead of stdout.
    #[arg(short, long, env = "OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Emit result, diagnostics and stats instead of the result bundle only.
    #[arg(long)]
    full: bool,

    /// Model subset: 1=text, 2=tables, 3=text+tables, 4=full layout.
    #[arg(long, env = "OCR_EXTRACTION_TYPE", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=4))]
    extraction_type: u8,

    /// Skip the text model.
    #[arg(long)]
    no_text: bool,

    /// Skip the table model.
    #[arg(long)]
    no_table: bool,

    /// Skip the layout pass.
    #[arg(long)]
    no_layout: bool,

    /// Document language code.
    #[arg(long, env = "OCR_LANG", default_value = "en")]
    lang: String,

    /// Inference precision.
    #[arg(long, env = "OCR_PRECISION", value_enum, default_value = "full")]
    precision: PrecisionArg,

    /// Directory with optional prompt overrides.
    #[arg(long, env = "OCR_MODELS_BASE_PATH", default_value = "./models")]
    models_base_path: PathBuf,

    /// Model provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model ID (e.g. gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Upload artifacts to S3.
    #[arg(long, env = "OCR_USE_S3")]
    use_s3: bool,

    #[arg(long, env = "OCR_S3_BUCKET_NAME")]
    s3_bucket_name: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long, env = "OCR_S3_BUCKET_KEY")]
    s3_bucket_key: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    aws_region: String,

    /// Presigned link lifetime in seconds.
    #[arg(long, env = "OCR_PRESIGNED_EXPIRY", default_value_t = 86_400)]
    presigned_expiry: u64,

    /// Local artifact directory.
    #[arg(long, env = "OCR_OUTPUT_DIR", default_value = "./outputs")]
    output_dir: PathBuf,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "OCR_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Pages (and region calls) processed concurrently.
    #[arg(short, long, env = "OCR_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per model call.
    #[arg(long, env = "OCR_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Show INFO-level library logs.
    #[arg(long, env = "OCR_SHOW_LOG")]
    show_log: bool,

    /// Disable the progress bar.
    #[arg(long, env = "OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PrecisionArg {
    Full,
    Reduced,
}

impl From<PrecisionArg> for Precision {
    fn from(v: PrecisionArg) -> Self {
        match v {
            PrecisionArg::Full => Precision::Full,
            PrecisionArg::Reduced => Precision::Reduced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active, library INFO lines would interleave
    // with it; keep them for --show-log.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if cli.show_log {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ProcessingProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Models ───────────────────────────────────────────────────────────
    if !config.is_noop() {
        registry::initialize_from_config(&config).context("Failed to initialise models")?;
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let outcome = match cli.output {
        Some(ref output_path) => process_to_file(&cli.input, cli.image, output_path, &config)
            .await
            .map(|output| (output, Some(output_path.clone()))),
        None => process(&cli.input, cli.image, &config)
            .await
            .map(|output| (output, None)),
    };
    registry::shutdown();
    let (output, written_to) = outcome.context("Extraction failed")?;

    match written_to {
        Some(path) => {
            if cli.full {
                println!("{}", render_json(&output, true)?);
            }
            if !cli.quiet {
                eprintln!("   →  {}", bold(&path.display().to_string()));
            }
        }
        None => println!("{}", render_json(&output, cli.full)?),
    }

    if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ProcessingConfig> {
    let extraction_type =
        ExtractionType::try_from(cli.extraction_type).context("Invalid --extraction-type")?;

    let storage = StorageConfig {
        use_s3: cli.use_s3,
        s3_bucket_name: cli.s3_bucket_name.clone(),
        s3_bucket_key: cli.s3_bucket_key.clone(),
        aws_region_name: cli.aws_region.clone(),
        presigned_url_expiry_secs: cli.presigned_expiry,
        output_dir: cli.output_dir.clone(),
    };

    let mut builder = ProcessingConfig::builder()
        .extraction_type(extraction_type)
        .lang(cli.lang.clone())
        .precision(cli.precision.clone().into())
        .show_log(cli.show_log)
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .models_base_path(cli.models_base_path.clone())
        .storage(storage);

    if cli.no_text {
        builder = builder.process_text(false);
    }
    if cli.no_table {
        builder = builder.process_table(false);
    }
    if cli.no_layout {
        builder = builder.layout(false);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn render_json(output: &ProcessingOutput, full: bool) -> Result<String> {
    let json = if full {
        serde_json::to_string_pretty(output)
    } else {
        output.result.to_json_pretty()
    };
    json.context("Failed to serialise output")
}

fn print_summary(output: &ProcessingOutput) {
    let d = &output.diagnostics;
    let s = &output.stats;
    eprintln!(
        "{}  {}/{} pages  {} text  {} table  {} image  {}ms",
        if d.is_clean() { green("✔") } else { cyan("⚠") },
        s.processed_pages,
        s.total_pages,
        output.result.text.len(),
        output.result.table.len(),
        output.result.image.len(),
        s.total_duration_ms,
    );
    if !s.run_id.is_empty() {
        eprintln!("   {}", dim(&format!("artifacts under run {}", s.run_id)));
    }
    if !d.is_clean() {
        eprintln!(
            "   {}",
            dim(&format!(
                "failures: {} text, {} table, {} layout, {} artifact",
                d.text_failure_count(),
                d.table_failure_count(),
                d.layout_failure_count(),
                d.artifact_failure_count()
            ))
        );
    }
}
