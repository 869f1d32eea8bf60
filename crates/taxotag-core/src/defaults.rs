//! Centralized default constants for taxotag.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and binaries reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// TAXONOMY
// =============================================================================

/// Name of the synthetic root node.
pub const TAXONOMY_ROOT_NAME: &str = "root";

/// Description of the synthetic root node.
pub const TAXONOMY_ROOT_DESCRIPTION: &str = "Root of taxonomy";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible endpoint (a local routing proxy).
pub const BASE_URL: &str = "http://localhost:4000";

/// Default generation model.
pub const GEN_MODEL: &str = "local-qwen3:0.6b";

/// Generation request timeout in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Generation calls slower than this are logged as slow.
pub const SLOW_GENERATION_MS: u64 = 30_000;

/// Maximum candidates the classifier asks for per level.
pub const MAX_CANDIDATES: usize = 3;

/// Label a model uses to declare that no offered category fits.
pub const NONE_LABEL: &str = "None";

// =============================================================================
// TELEMETRY
// =============================================================================

/// Directory for token usage and interaction logs.
pub const TELEMETRY_DIR: &str = "logs";

/// Buffered entries that trigger a flush to disk.
pub const TELEMETRY_FLUSH_EVERY: usize = 10;

/// Token usage ledger file name inside the telemetry directory.
pub const TOKEN_USAGE_FILE: &str = "token_usage.jsonl";

// =============================================================================
// TAGGING
// =============================================================================

/// Maximum documents tagged concurrently by the batch runner.
pub const TAG_MAX_CONCURRENT: usize = 4;

/// Default `k` for top-k accuracy.
pub const TOP_K: usize = 3;

// =============================================================================
// DATASET SPLITS
// =============================================================================

/// Records kept after shuffling.
pub const SPLIT_SIZE: usize = 100;

/// Shuffle seed.
pub const SPLIT_SEED: u64 = 108;

/// Fraction of records assigned to the training split.
pub const SPLIT_TRAIN_FRAC: f64 = 0.8;

/// Fraction of records assigned to the validation split.
pub const SPLIT_VAL_FRAC: f64 = 0.1;

/// Output directory for split files.
pub const SPLIT_OUT_DIR: &str = "data_splits";

// =============================================================================
// GATEWAY
// =============================================================================

/// Default HTTP port of the forwarding gateway.
pub const GATEWAY_PORT: u16 = 4001;

/// Client identifier merged into forwarded bodies.
pub const GATEWAY_CLIENT_IDENTIFIER: &str = "ml-ca-dev";

/// Sampling temperature merged into forwarded bodies.
pub const GATEWAY_TEMPERATURE: f64 = 0.0;

/// Token cap merged into forwarded bodies.
pub const GATEWAY_MAX_TOKENS: u64 = 300;

/// Tracking release tag merged into forwarded bodies.
pub const GATEWAY_RELEASE: &str = "ml_ca_taxotag";

/// Upstream request timeout for the gateway.
pub const GATEWAY_TIMEOUT_SECS: u64 = 300;
