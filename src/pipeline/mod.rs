//! Pure building blocks used by the session.
//!
//! Each submodule does one transformation and makes no network calls, so
//! they are tested without a provider.
//!
//! ## Data Flow
//!
//! ```text
//! file ──▶ document ──▶ (LLM) ──▶ postprocess   stage 1, markdown
//!                       (LLM) ──▶ extract       stages 2 and 3, JSON
//!                       (LLM) ──▶ sections      one-shot report
//! ```
//!
//! 1. [`document`]: PDF text layer or lossy UTF-8 into one string; PDF work
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`postprocess`]: tidy the business-process markdown
//! 3. [`extract`]: recover a JSON value from prose, fences or trailing noise
//! 4. [`sections`]: split a report on its `1.`/`2.`/`3.` markers

pub mod document;
pub mod extract;
pub mod postprocess;
pub mod sections;
