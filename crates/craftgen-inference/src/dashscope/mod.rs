//! DashScope (Alibaba Cloud Model Studio) image generation.
//!
//! One endpoint serves both the text-to-image and the transfer model; the
//! parameter set is chosen from the [`craftgen_core::GenerationRequest`]
//! variant.

mod backend;
mod types;

pub use backend::{DashScopeBackend, DashScopeConfig, DEFAULT_DASHSCOPE_URL, DEFAULT_TIMEOUT_SECS};
pub use types::*;
