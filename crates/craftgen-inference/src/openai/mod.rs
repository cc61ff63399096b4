//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint speaking the OpenAI chat completions and
//! embeddings API (OpenAI, Azure OpenAI, DashScope compatible mode, vLLM,
//! Ollama).
//!
//! # Example
//!
//! ```rust,no_run
//! use craftgen_inference::openai::OpenAIBackend;
//! use craftgen_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let answer = backend.generate("Describe celadon glaze").await.unwrap();
//!     println!("{}", answer);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_craftgen_error, OpenAIErrorCode};
pub use types::*;
