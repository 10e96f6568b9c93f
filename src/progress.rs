//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn StageProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to be told
//! when each LLM stage starts, finishes or fails. The CLI uses it to drive a
//! spinner; a host UI can forward the events wherever it likes.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2test::{GenerationConfig, Stage, StageProgressCallback};
//! use std::sync::Arc;
//!
//! struct Logger;
//!
//! impl StageProgressCallback for Logger {
//!     fn on_stage_complete(&self, stage: Stage, output_len: usize) {
//!         eprintln!("{stage} done ({output_len} chars)");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(Logger) as Arc<dyn StageProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the orchestrator around every LLM stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run strictly one after another, so calls are
/// never concurrent, but the trait is `Send + Sync` so the callback can live
/// inside a config shared across tasks.
pub trait StageProgressCallback: Send + Sync {
    /// Called just before the prompt for `stage` is sent.
    ///
    /// # Arguments
    /// * `stage`: the stage being run
    /// * `prompt_len`: byte length of the assembled prompt
    fn on_stage_start(&self, stage: Stage, prompt_len: usize) {
        let _ = (stage, prompt_len);
    }

    /// Called when `stage` produced a usable result.
    ///
    /// # Arguments
    /// * `stage`: the stage that finished
    /// * `output_len`: byte length of the raw model reply
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when `stage` failed; the session state is unchanged.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl StageProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn StageProgressCallback>;
