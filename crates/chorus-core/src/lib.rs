//! chorus-core — Pure types and text preparation.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod audio;
pub mod error;
pub mod text_prep;
pub mod types;
