//! Structured logging schema and field name constants for craftgen.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (retrieved chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for one HTTP request or chat turn.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "pipeline", "chat", "db", "inference", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "retriever", "synthesizer", "image_strategy", "transcoder", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "retrieve_context", "generate_image", "transcode", "prepare"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Chat session id.
pub const SESSION_ID: &str = "session_id";

/// Chat message id.
pub const MESSAGE_ID: &str = "message_id";

/// Owner of a chat session.
pub const USER_ID: &str = "user_id";

/// Object storage key.
pub const OBJECT_KEY: &str = "object_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Size of a stored object in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Image generation variant ("text_to_image", "transfer_text", "image_to_image").
pub const GENERATION_KIND: &str = "generation_kind";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// A fallback value was substituted.
pub const FALLBACK: &str = "fallback";
