//! release-relay webhook receiver.
//!
//! Binds an HTTP server (`axum`) and hands every `POST /` delivery to the
//! [`stages::PipelineExecutor`]. Signature checking, payload parsing and the
//! stages themselves live behind the executor; this crate only extracts the
//! relevant headers and maps the [`stages::PipelineOutcome`] to a response:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Completed | `200` |
//! | Ignored, Rejected | `403` |
//! | Aborted, retryable cause | `503` |
//! | Aborted, other | `500` |
//!
//! The response body is always the outcome summary.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP framing and routing live here.

pub mod webhook;

pub use webhook::{delivery_from_parts, router, serve, status_for};
