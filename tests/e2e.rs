//! End-to-end integration tests for ocr-extractor.
//!
//! These tests use real documents in `./test_cases/` and make live VLM API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_extract_receipt -- --nocapture

use futures::StreamExt;
use ocr_extractor::{
    process, process_from_bytes, process_stream, process_to_file, registry, ExtractionType,
    ProcessingConfig, ProcessingError, ResultBundle, StorageConfig,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Build a config writing artifacts under `test_cases/output/<name>`.
fn config_for(name: &str, kind: ExtractionType) -> ProcessingConfig {
    let storage = StorageConfig {
        output_dir: output_dir().join(name),
        ..Default::default()
    };
    ProcessingConfig::builder()
        .extraction_type(kind)
        .max_retries(2)
        .storage(storage)
        .build()
        .expect("valid config")
}

/// The registry is process-wide and tests run in parallel; the first test
/// to get here installs the models, the rest reuse them.
fn ensure_registry(config: &ProcessingConfig) {
    match registry::initialize_from_config(config) {
        Ok(_) | Err(ProcessingError::RegistryAlreadyInitialized) => {}
        Err(e) => panic!("cannot initialise models: {e}"),
    }
}

/// Invariants every bundle must satisfy.
fn assert_bundle_well_formed(bundle: &ResultBundle, context: &str) {
    let mut last = None;
    for t in &bundle.text {
        assert!(!t.content.trim().is_empty(), "[{context}] empty text item");
        let key = (t.page_number, t.order);
        if let Some(prev) = last {
            assert!(key > prev, "[{context}] text not sorted: {prev:?} then {key:?}");
        }
        last = Some(key);
    }
    for t in &bundle.table {
        assert!(
            t.content_link.is_empty() || std::path::Path::new(&t.content_link).exists(),
            "[{context}] table content missing: {}",
            t.content_link
        );
    }
    let mut pages: Vec<_> = bundle.image.iter().map(|i| i.page_number).collect();
    pages.dedup();
    assert_eq!(pages.len(), bundle.image.len(), "[{context}] duplicate image item");
}

// ── Live extraction ──────────────────────────────────────────────────────────

/// Single scanned image, text only.
#[tokio::test]
async fn test_extract_receipt_text() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("receipt.jpg"));
    let config = config_for("receipt", ExtractionType::TextOnly);
    ensure_registry(&config);

    let output = process(path.to_str().unwrap(), true, &config)
        .await
        .expect("extraction should succeed");

    assert_eq!(output.stats.total_pages, 1);
    assert!(!output.result.text.is_empty(), "receipt should have text");
    assert!(output.result.text.iter().all(|t| t.page_number == 0));
    assert!(output.result.table.is_empty());
    assert_bundle_well_formed(&output.result, "receipt");

    println!("{}", output.result.to_json_pretty().unwrap());
}

/// Two-page form with full layout: text, tables and local artifacts.
#[tokio::test]
async fn test_extract_form_full_layout() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let config = config_for("irs_form", ExtractionType::FullLayout);
    ensure_registry(&config);

    let out_path = output_dir().join("irs_form.json");
    let output = process_to_file(path.to_str().unwrap(), false, &out_path, &config)
        .await
        .expect("extraction should succeed");

    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.stats.failed_pages, 0, "{:?}", output.diagnostics);
    let lower: String = output
        .result
        .text
        .iter()
        .map(|t| t.content.to_lowercase())
        .collect();
    assert!(
        lower.contains("income") || lower.contains("tax") || lower.contains("1040"),
        "form should mention tax-related content"
    );
    assert_bundle_well_formed(&output.result, "irs_form");

    let written: ResultBundle =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, output.result);
    println!("[irs_form] saved to {}", out_path.display());
}

#[tokio::test]
async fn test_extract_tables_from_bytes() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let config = config_for("irs_form_bytes", ExtractionType::TableOnly);
    ensure_registry(&config);

    let bytes = std::fs::read(&path).unwrap();
    let output = process_from_bytes(&bytes, false, &config)
        .await
        .expect("extraction should succeed");

    assert!(output.result.text.is_empty());
    for t in &output.result.table {
        let html = std::fs::read_to_string(&t.content_link).unwrap();
        assert!(html.contains("<table"), "not an HTML table: {html}");
        assert!(t.image_link.ends_with(".png"));
    }
}

#[tokio::test]
async fn test_stream_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let config = config_for("irs_form_stream", ExtractionType::TextOnly);
    ensure_registry(&config);

    let mut stream = process_stream(path.to_str().unwrap(), false, &config)
        .await
        .expect("stream should start");

    let mut seen = Vec::new();
    while let Some(report) = stream.next().await {
        println!(
            "[stream] page {} -> {} text item(s), {} error(s)",
            report.page_number(),
            report.result.text.len(),
            report.errors.len()
        );
        seen.push(report.page_number());
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1]);
}

#[tokio::test]
async fn test_extract_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let config = config_for("missing", ExtractionType::TextOnly);

    let err = process("/definitely/not/a/real/file.pdf", false, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::InvalidDocument(_)), "{err:?}");
}
