//! System prompts for the VLM-backed model adapters.
//!
//! Every prompt lives here so behaviour changes touch one place and unit
//! tests can inspect prompts without a live model. Each prompt asks for a
//! strict JSON payload that [`crate::model::vlm`] parses; `{lang}` is
//! replaced with the configured language code.
//!
//! Prompts can be overridden per model family by dropping `text.prompt`,
//! `table.prompt` or `layout.prompt` into `models_base_path`
//! (see [`ModelAssets`]).

use std::path::Path;
use tracing::{debug, warn};

/// Prompt for the text model: transcribe text lines with their boxes.
pub const TEXT_PROMPT: &str = r#"You are an OCR engine. Transcribe every line of text visible in the image.
The document language is "{lang}".

Rules:
- Preserve the exact characters you see; do not translate or summarise.
- Return one entry per visual line, top to bottom.
- Coordinates are integer pixels in the image, origin at the top-left corner.

Output ONLY a JSON array, no commentary and no code fences:
[{"text": "<line text>", "box": [x1, y1, x2, y2]}]
Return [] when the image contains no text."#;

/// Prompt for the table model: recognise tables as HTML.
pub const TABLE_PROMPT: &str = r#"You are a table structure recognition engine.
The document language is "{lang}".

Find every table in the image and reproduce its structure as HTML:
- Use <table>, <tr>, <th>, <td>; keep rowspan/colspan for merged cells.
- Copy cell text exactly; leave empty cells empty.
- Coordinates are integer pixels in the image, origin at the top-left corner.

Output ONLY a JSON array, no commentary and no code fences:
[{"html": "<table>...</table>", "box": [x1, y1, x2, y2]}]
Return [] when the image contains no table."#;

/// Prompt for the layout model: classify page regions.
pub const LAYOUT_PROMPT: &str = r#"You are a document layout analysis engine.

Segment the page image into regions and classify each one as exactly one of:
Text, Title, List, Table, Figure.

Rules:
- Regions must not overlap.
- Running headers, footers and page numbers are Text.
- Coordinates are integer pixels in the image, origin at the top-left corner.
- "score" is your confidence between 0 and 1.

Output ONLY a JSON array, no commentary and no code fences:
[{"type": "Text", "box": [x1, y1, x2, y2], "score": 0.9}]"#;

/// Substitute the language placeholder.
pub fn with_language(prompt: &str, lang: &str) -> String {
    prompt.replace("{lang}", lang)
}

/// Prompt set for one run, with any on-disk overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub text_prompt: String,
    pub table_prompt: String,
    pub layout_prompt: String,
}

impl ModelAssets {
    /// Built-in prompts for `lang`.
    pub fn builtin(lang: &str) -> Self {
        Self {
            text_prompt: with_language(TEXT_PROMPT, lang),
            table_prompt: with_language(TABLE_PROMPT, lang),
            layout_prompt: with_language(LAYOUT_PROMPT, lang),
        }
    }

    /// Built-in prompts, replaced by `<base>/{text,table,layout}.prompt`
    /// where such files exist and are non-empty.
    pub fn load(base: &Path, lang: &str) -> Self {
        let mut assets = Self::builtin(lang);
        if !base.is_dir() {
            debug!("No model asset directory at {}", base.display());
            return assets;
        }
        if let Some(p) = read_override(&base.join("text.prompt")) {
            assets.text_prompt = with_language(&p, lang);
        }
        if let Some(p) = read_override(&base.join("table.prompt")) {
            assets.table_prompt = with_language(&p, lang);
        }
        if let Some(p) = read_override(&base.join("layout.prompt")) {
            assets.layout_prompt = with_language(&p, lang);
        }
        assets
    }
}

fn read_override(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => {
            debug!("Using prompt override {}", path.display());
            Some(s)
        }
        Ok(_) => None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Ignoring unreadable prompt override {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_is_substituted() {
        let assets = ModelAssets::builtin("de");
        assert!(assets.text_prompt.contains("\"de\""));
        assert!(assets.table_prompt.contains("\"de\""));
        assert!(!assets.text_prompt.contains("{lang}"));
    }

    #[test]
    fn prompts_ask_for_json_arrays() {
        for p in [TEXT_PROMPT, TABLE_PROMPT, LAYOUT_PROMPT] {
            assert!(p.contains("JSON array"));
            assert!(p.contains("\"box\""));
        }
    }

    #[test]
    fn overrides_replace_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("table.prompt"), "custom {lang} tables").unwrap();
        std::fs::write(dir.path().join("layout.prompt"), "   ").unwrap();

        let assets = ModelAssets::load(dir.path(), "fr");
        assert_eq!(assets.table_prompt, "custom fr tables");
        assert_eq!(assets.layout_prompt, with_language(LAYOUT_PROMPT, "fr"));
        assert_eq!(assets.text_prompt, with_language(TEXT_PROMPT, "fr"));
    }

    #[test]
    fn missing_directory_uses_builtin() {
        let assets = ModelAssets::load(Path::new("/definitely/not/here"), "en");
        assert_eq!(assets, ModelAssets::builtin("en"));
    }
}
