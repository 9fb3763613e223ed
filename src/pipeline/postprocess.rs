//! Post-processing: deterministic cleanup of raw model responses.
//!
//! Even well-prompted VLMs wrap JSON in ` ```json ` fences, prepend a
//! sentence of commentary, or leak zero-width characters into transcribed
//! text. These rules repair such responses without touching content, so the
//! prompts can stay focused on *what to extract*.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fence stripping so the fence regex
//! sees `\n` only; invisible characters are removed last so they cannot hide
//! inside fence markers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw model response before parsing it.
///
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences (` ```json `, ` ```html `, bare ` ``` `)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim surrounding whitespace
pub fn clean_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ─────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Payload extraction ──────────────────────────────────────────────────────

/// The outermost `[...]` slice of a response, if any.
///
/// Tolerates commentary before or after the array.
pub fn extract_json_array(input: &str) -> Option<&str> {
    let start = input.find('[')?;
    let end = input.rfind(']')?;
    (end > start).then(|| &input[start..=end])
}

static RE_HTML_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b.*?</table\s*>").unwrap());

/// Every `<table>…</table>` element in a response, in document order.
pub fn extract_html_tables(input: &str) -> Vec<String> {
    RE_HTML_TABLE
        .find_iter(input)
        .map(|m| m.as_str().to_string())
        .collect()
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to one space and trim.
pub fn normalise_text(input: &str) -> String {
    RE_WHITESPACE
        .replace_all(&remove_invisible_chars(input), " ")
        .trim()
        .to_string()
}

/// Join recognised lines into one block, dropping empty lines.
pub fn join_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines
        .into_iter()
        .map(normalise_text)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
