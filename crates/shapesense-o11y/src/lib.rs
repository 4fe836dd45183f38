//! Observability bootstrap: tracing subscriber setup and a panic hook.
//!
//! Embedding applications call [`logging::init`] once at startup; the
//! engine crates only ever emit through the `tracing` macros.

pub mod logging;
pub mod panic;
