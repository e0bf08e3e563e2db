//! The always-on listening pipeline
//!
//! Capture loop → (pool) recognition + wake detection → (pool) dispatch.

mod capture_loop;
mod recognition;

pub use capture_loop::CaptureLoop;
pub use recognition::{Heard, Recognizer};
