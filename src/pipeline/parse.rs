//! Recognizer reply → fragment batch.
//!
//! Vision models are asked for a bare JSON array of fragments but regularly
//! return something close instead: the array wrapped in ```json fences, an
//! object with a `fragments` key, numbers as strings, or plain transcribed
//! text with no structure at all. Everything is absorbed here, at the
//! boundary, so the compositor only ever sees a valid fragment list.
//!
//! When nothing structured can be recovered the reply is kept as a single
//! synthetic fragment ([`FragmentBatch::Fallback`]) instead of an error: the
//! user still gets their text on the themed canvas.

use crate::model::{FontSizeClass, TextFragment};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Horizontal position of the synthetic fallback fragment (centre).
pub const FALLBACK_X: f64 = 50.0;
/// Baseline of the fallback fragment's first line, near the top so the
/// remaining lines flow down the canvas.
pub const FALLBACK_Y: f64 = 10.0;

/// Outcome of parsing one recognizer reply.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentBatch {
    /// The reply parsed into (possibly zero) fragments.
    Structured(Vec<TextFragment>),
    /// The reply was unstructured; its text becomes one fragment.
    Fallback(TextFragment),
}

impl FragmentBatch {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FragmentBatch::Fallback(_))
    }

    pub fn len(&self) -> usize {
        match self {
            FragmentBatch::Structured(v) => v.len(),
            FragmentBatch::Fallback(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_fragments(self) -> Vec<TextFragment> {
        match self {
            FragmentBatch::Structured(v) => v,
            FragmentBatch::Fallback(f) => vec![f],
        }
    }
}

/// Parse a raw recognizer reply.
///
/// Steps:
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …) and
///    control characters other than `\n` and `\t`
/// 4. Parse the whole reply as JSON; failing that, the outermost `[...]` slice
/// 5. Fall back to a single synthetic fragment
pub fn parse_fragments(raw: &str) -> FragmentBatch {
    let s = strip_code_fences(raw);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = remove_control_chars(&s);
    let cleaned = s.trim();

    if cleaned.is_empty() {
        debug!("Recognizer reply is empty; no fragments");
        return FragmentBatch::Structured(Vec::new());
    }

    let parsed = serde_json::from_str::<Value>(cleaned)
        .ok()
        .and_then(|v| fragments_from_value(&v))
        .or_else(|| {
            outer_array_slice(cleaned)
                .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
                .and_then(|v| fragments_from_value(&v))
        });

    match parsed {
        Some(fragments) => {
            debug!("Parsed {} fragments from recognizer reply", fragments.len());
            FragmentBatch::Structured(fragments)
        }
        None => {
            warn!(
                "Recognizer reply is not structured ({} chars); using fallback fragment",
                cleaned.len()
            );
            FragmentBatch::Fallback(fallback_fragment(cleaned))
        }
    }
}

/// The synthetic fragment used when a reply has no usable structure.
pub fn fallback_fragment(text: &str) -> TextFragment {
    TextFragment::new(text.trim(), FALLBACK_X, FALLBACK_Y, FontSizeClass::Medium)
}

// ── Cleanup ──────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("valid fence regex")
});

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

/// Drop C0/C1 controls (BEL, form feed, ESC, …) except newline and tab.
/// They carry no glyph and cannot be embedded in the SVG text layer.
fn remove_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

fn outer_array_slice(input: &str) -> Option<&str> {
    let start = input.find('[')?;
    let end = input.rfind(']')?;
    (end > start).then(|| &input[start..=end])
}

// ── Structure ────────────────────────────────────────────────────────────────

/// Wrapper keys some models put around the fragment array.
const WRAPPER_KEYS: [&str; 3] = ["fragments", "texts", "items"];

fn fragments_from_value(value: &Value) -> Option<Vec<TextFragment>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => WRAPPER_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))?,
        _ => return None,
    };

    let mut fragments = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for item in items {
        match serde_json::from_value::<RawFragment>(item.clone())
            .ok()
            .and_then(RawFragment::into_fragment)
        {
            Some(f) => fragments.push(f),
            None => dropped += 1,
        }
    }
    // An array that yielded nothing usable from a non-empty input is not
    // fragment data (e.g. a list of plain strings).
    if fragments.is_empty() && !items.is_empty() {
        return None;
    }
    if dropped > 0 {
        warn!("Dropped {} unusable fragments from recognizer reply", dropped);
    }
    Some(fragments)
}

/// Lenient wire shape: numbers may be strings, size names any case.
/// `content` is accepted for `text`; when both are present `text` wins.
#[derive(Debug, Deserialize)]
struct RawFragment {
    text: Option<String>,
    content: Option<String>,
    x: Option<Number>,
    y: Option<Number>,
    #[serde(default, alias = "fontSizeClass", alias = "font_size", rename = "fontSize")]
    font_size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<f64> {
        let v = match self {
            Number::Float(v) => *v,
            Number::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

impl RawFragment {
    fn into_fragment(self) -> Option<TextFragment> {
        let text = remove_control_chars(&self.text.or(self.content)?);
        if text.trim().is_empty() {
            return None;
        }
        let x = self.x.as_ref().and_then(Number::value)?;
        let y = self.y.as_ref().and_then(Number::value)?;
        let font_size = self
            .font_size
            .as_deref()
            .map(parse_size_class)
            .unwrap_or_default();
        Some(TextFragment::new(text, x, y, font_size))
    }
}

fn parse_size_class(s: &str) -> FontSizeClass {
    match s.trim().to_ascii_lowercase().as_str() {
        "small" | "s" => FontSizeClass::Small,
        "large" | "l" | "big" => FontSizeClass::Large,
        _ => FontSizeClass::Medium,
    }
}
