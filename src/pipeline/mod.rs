//! Pipeline stages for restyling a slip photo.
//!
//! Each submodule implements exactly one transformation step and is tested
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ recognize ──▶ parse ──┐
//! (URL/path) (base64)   (VLM)      (fragments) │
//!                                              ▼
//!                         theme ──▶ compose ──▶ encode
//!                       (gradient)  (text)      (PNG)
//! ```
//!
//! 1. [`input`]     canonicalise a path or URL and decode the photo
//! 2. [`encode`]    base64 PNG for the recognizer; final PNG for the caller
//! 3. [`recognize`] drive the VLM call with retry/backoff; the only stage
//!    with network I/O
//! 4. [`parse`]     turn the free-form reply into fragments, or a single
//!    fallback block when it is not a list
//! 5. [`theme`]     gradient plus line texture at canvas size
//! 6. [`compose`]   draw fragments at their percentage positions

pub mod compose;
pub mod encode;
pub mod input;
pub mod parse;
pub mod recognize;
pub mod theme;
