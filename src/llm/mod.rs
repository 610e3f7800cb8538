//! Local language-model inference.
//!
//! The pipeline treats the model as an opaque function: instructions and
//! text in, text out. Callers validate whatever comes back.

mod client;
mod config;

pub use client::{Infer, LlmClient, LlmError};
pub use config::LlmConfig;
