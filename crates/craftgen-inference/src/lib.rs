//! # craftgen-inference
//!
//! Generation backends for craftgen.
//!
//! This crate provides:
//! - OpenAI-compatible text generation and embeddings
//! - Structured (JSON) output parsing
//! - DashScope image generation
//! - The image generation strategy (model selection, reference handling,
//!   placeholder fallback)
//! - Recording mock backends (feature `mock`)

pub mod dashscope;
pub mod openai;
pub mod strategy;
pub mod streaming;
pub mod structured;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use dashscope::{DashScopeBackend, DashScopeConfig};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use strategy::{clamp_strength, ImageStrategy, ImageStrategyConfig};
pub use streaming::{single_chunk, TokenStream};
pub use structured::{extract_json_object, generate_structured, parse_structured};
