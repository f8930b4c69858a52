//! chorus-lib — Speech relay engine.
//!
//! TTS engines, the fallback orchestrator, and the HTTP API.
//! Depends on chorus-core for pure types and text processing.

pub mod engine;
pub mod orchestrator;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

// Re-export chorus-core for convenience
pub use chorus_core;
