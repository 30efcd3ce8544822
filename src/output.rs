//! Result types of the `restyle*` entry points.

use crate::model::TextFragment;
use serde::Serialize;

/// A finished restyle run.
#[derive(Debug, Clone)]
pub struct RestyleOutput {
    /// Encoded PNG.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Fragments drawn on top of the template labels, in draw order.
    pub fragments: Vec<TextFragment>,
    /// True when the recognizer reply was not structured and the whole
    /// reply was drawn as one block.
    pub fallback_used: bool,
    pub stats: RestyleStats,
}

/// Timing and usage numbers for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestyleStats {
    pub fragment_count: usize,
    pub recognition_input_tokens: u64,
    pub recognition_output_tokens: u64,
    pub recognition_retries: u32,
    pub recognize_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}
