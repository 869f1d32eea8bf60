//! Structured logging schema and field name constants for taxotag.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | A whole run or the gateway cannot continue |
//! | WARN  | Recoverable issue, fallback applied (empty candidates, skipped telemetry) |
//! | INFO  | Lifecycle events, run and batch completions |
//! | DEBUG | Decision points: chosen label, descent, flushes |
//! | TRACE | Raw payload sizes and per-candidate detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Process-run identifier (UUIDv7) shared by every flow in one run.
pub const RUN_ID: &str = "run_id";

/// Subsystem originating the log event.
/// Values: "inference", "tagging", "telemetry", "gateway"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "openai", "classifier", "descent", "batch", "proxy"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "generate", "classify_level", "tag_document", "forward"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Identifier of the document being tagged.
pub const PAPER_ID: &str = "paper_id";

/// Taxonomy level (1 = children of the root).
pub const LEVEL: &str = "level";

/// Label chosen at a level.
pub const LABEL: &str = "label";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of sibling options offered to the classifier.
pub const OPTION_COUNT: &str = "option_count";

/// Number of candidates parsed from a reply.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
