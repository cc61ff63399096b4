//! # craftgen-core
//!
//! Core types, traits, and abstractions for craftgen, a culturally grounded
//! product design generator.
//!
//! This crate provides the domain models, the error type and the collaborator
//! traits that the database, storage, inference and API crates build on.

pub mod correlation;
pub mod defaults;
pub mod error;
pub mod image;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use correlation::TurnContext;
pub use error::{Error, Result};
pub use image::{GenerationMode, GenerationRequest, ReferenceImage, TransferMode};
pub use models::*;
pub use traits::*;

/// Embedding vector type shared with the pgvector column type.
pub use pgvector::Vector;
