//! Prompts for the recognizer boundary.
//!
//! The prompt pins the reply to the exact fragment contract the compositor
//! consumes (percent coordinates, baseline `y`, three size classes). Models
//! still drift from it; [`crate::pipeline::parse`] absorbs the drift.
//!
//! Callers can override the system prompt via
//! [`crate::config::RestyleConfig::system_prompt`].

/// Default system prompt for extracting positioned text from a slip photo.
pub const DEFAULT_RECOGNITION_PROMPT: &str = r#"You are a layout-aware text extractor for photos of payment slips and receipts.

Return every piece of visible text together with its position on the document.

Rules:

1. OUTPUT FORMAT
   - Output ONLY a JSON array, nothing else
   - Do NOT wrap it in ```json fences
   - Each element: {"text": string, "x": number, "y": number, "fontSize": "small" | "medium" | "large"}

2. COORDINATES
   - x: horizontal centre of the text as a percentage (0-100) of the document width, from the left edge
   - y: text baseline as a percentage (0-100) of the document height, from the top edge
   - Measure against the document itself, not the surrounding photo background

3. SIZE
   - "large" for titles, totals and amounts that stand out
   - "medium" for regular body text
   - "small" for fine print, footers and legal text

4. CONTENT
   - Copy the text exactly, keeping its original language, digits, currency symbols and punctuation
   - One element per visual line or label/value group; keep reading order top to bottom
   - Skip logos and decorative elements that contain no readable text"#;

/// Text sent alongside the image in the user turn.
pub const RECOGNITION_USER_HINT: &str = "Extract the positioned text fragments from this document.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_size_class_and_field() {
        for needle in ["\"small\"", "\"medium\"", "\"large\"", "\"x\"", "\"y\"", "fontSize"] {
            assert!(
                DEFAULT_RECOGNITION_PROMPT.contains(needle),
                "prompt is missing {needle}"
            );
        }
    }
}
