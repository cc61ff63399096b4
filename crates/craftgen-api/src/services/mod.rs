//! Service layer for the generation pipeline and knowledge chat.

pub mod analysis;
pub mod chat;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod sessions;
pub mod synthesizer;
pub mod transcoder;

pub use analysis::DesignAnalyzer;
pub use chat::{ChatOrchestrator, TurnAnswer, TurnEvent};
pub use pipeline::DesignPipeline;
pub use retriever::ContextRetriever;
pub use sessions::SessionService;
pub use synthesizer::ConceptSynthesizer;
pub use transcoder::{AssetTranscoder, PLACEHOLDER_PNG};
