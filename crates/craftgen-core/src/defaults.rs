//! Centralized default constants for craftgen.
//!
//! Shared values live here so the services, backends and tests agree on the
//! exact strings and limits. Organized by domain area.

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Chunks retrieved for concept synthesis (whole corpus).
pub const CONCEPT_TOP_K: usize = 3;

/// Chunks retrieved for a chat turn (scoped to the session's knowledge bases).
pub const CHAT_TOP_K: usize = 5;

/// Separator placed between retrieved chunks in a prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Context substituted when retrieval finds nothing.
pub const NO_CONTEXT_SENTINEL: &str =
    "(No specific heritage source material was found; design from general traditional-culture knowledge.)";

// =============================================================================
// IMAGE GENERATION
// =============================================================================

/// General-purpose text-to-image model.
pub const IMAGE_TEXT_MODEL: &str = "qwen-image-max";

/// Transfer-capable model used for image-to-image.
pub const IMAGE_TRANSFER_MODEL: &str = "wan2.6-image";

/// Output size requested from the image provider.
pub const IMAGE_SIZE: &str = "1024*1024";

/// Lower bound for reference conditioning strength.
pub const REFERENCE_STRENGTH_MIN: f32 = 0.4;

/// Upper bound for reference conditioning strength.
pub const REFERENCE_STRENGTH_MAX: f32 = 0.7;

/// Default reference conditioning strength.
pub const REFERENCE_STRENGTH: f32 = 0.6;

/// Returned in place of an image when the provider call fails.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://via.placeholder.com/1024x1024?text=Image+Generation+Failed";

/// Negative prompt used when the caller supplies none.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, malformed, deformed limbs, deformed fingers, waxy skin, AI artifacts, text, watermark, logo, messy composition, cartoon, anime";

// =============================================================================
// ASSET STORAGE
// =============================================================================

/// Key prefix for transcoded blueprints.
pub const BLUEPRINT_PREFIX: &str = "design-blueprints";

/// Key prefix for transcoded renders.
pub const RENDER_PREFIX: &str = "design-renders";

/// Key prefix for caller-supplied reference images.
pub const REFERENCE_PREFIX: &str = "design-refs";

/// Filename used when a URL has no usable last path segment.
pub const DEFAULT_ASSET_FILENAME: &str = "image.png";

/// Default timeout for remote asset downloads in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// CHAT
// =============================================================================

/// Answer returned when retrieval for a chat turn finds nothing.
pub const NO_RELEVANT_INFORMATION: &str = "Sorry, no relevant information was found in the selected knowledge bases. Try rephrasing the question or choosing other knowledge bases.";

/// Prefix for assistant content persisted after a failed turn.
pub const ERROR_ANSWER_PREFIX: &str = "[Error] answer generation failed: ";

/// Title for a session created without knowledge bases.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// Buffered SSE events between the turn task and the HTTP response.
pub const CHAT_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum accepted request body (JSON payloads only).
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// SSE keep-alive interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;
