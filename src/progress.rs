//! Progress-callback trait for restyle stage events.
//!
//! Inject an [`Arc<dyn RestyleProgressCallback>`] via
//! [`crate::config::RestyleConfigBuilder::progress_callback`] to follow a run
//! as it moves through load → recognize → render. The CLI drives its spinner
//! from these events; a server could forward them to a WebSocket instead.
//!
//! # Example
//!
//! ```rust
//! use slip_restyle::{RestyleConfig, RestyleProgressCallback, RestyleStage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl RestyleProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: RestyleStage, elapsed_ms: u64) {
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = RestyleConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn RestyleProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Coarse stages of one restyle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestyleStage {
    /// Resolve and decode the source photo.
    Load,
    /// Ask the vision model for positioned text.
    Recognize,
    /// Theme, composite and encode.
    Render,
}

impl fmt::Display for RestyleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestyleStage::Load => "load",
            RestyleStage::Recognize => "recognize",
            RestyleStage::Render => "render",
        })
    }
}

/// Called by the restyle pipeline as it moves between stages.
///
/// All methods default to no-ops. Implementations must be `Send + Sync`:
/// the render stage completes on a blocking thread.
pub trait RestyleProgressCallback: Send + Sync {
    fn on_stage_start(&self, stage: RestyleStage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: RestyleStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called before each recognizer retry.
    ///
    /// # Arguments
    /// * `attempt`: 1-based retry number
    /// * `max_retries`: configured retry budget
    /// * `error`: why the previous attempt failed
    fn on_recognition_retry(&self, attempt: u32, max_retries: u32, error: &str) {
        let _ = (attempt, max_retries, error);
    }

    /// Called once the PNG is ready.
    fn on_restyle_complete(&self, png_len: usize) {
        let _ = png_len;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RestyleProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RestyleConfig`].
pub type ProgressCallback = Arc<dyn RestyleProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RestyleProgressCallback for Recorder {
        fn on_stage_start(&self, stage: RestyleStage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_complete(&self, stage: RestyleStage, _elapsed_ms: u64) {
            self.events.lock().unwrap().push(format!("done:{stage}"));
        }

        fn on_recognition_retry(&self, attempt: u32, max_retries: u32, _error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("retry:{attempt}/{max_retries}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(RestyleStage::Load);
        cb.on_stage_complete(RestyleStage::Load, 3);
        cb.on_recognition_retry(1, 2, "503");
        cb.on_restyle_complete(1024);
    }

    #[test]
    fn recorder_sees_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start(RestyleStage::Recognize);
        rec.on_recognition_retry(1, 2, "timeout");
        rec.on_stage_complete(RestyleStage::Recognize, 900);
        rec.on_restyle_complete(10);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start:recognize", "retry:1/2", "done:recognize"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(RestyleStage::Render);
    }
}
