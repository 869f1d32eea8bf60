//! Run-scoped token accounting and interaction logging.
//!
//! A [`Telemetry`] accumulator is created once per process run and shared as
//! an `Arc` by every concurrent tagging flow. Appends are mutex-guarded and
//! buffered; buffers are written as JSON lines every `flush_every` entries
//! and on an explicit [`Telemetry::flush`].
//!
//! Nothing here is on the classification path: callers report failures and
//! carry on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use taxotag_core::defaults;
use taxotag_core::{Error, Result};

/// Where and how often telemetry is written.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Directory receiving the JSONL files; created on first flush.
    pub dir: PathBuf,
    /// Buffered entries per stream before a write.
    pub flush_every: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::TELEMETRY_DIR),
            flush_every: defaults::TELEMETRY_FLUSH_EVERY,
        }
    }
}

impl TelemetryConfig {
    /// Read `TAXOTAG_TELEMETRY_DIR` and `TAXOTAG_TELEMETRY_FLUSH_EVERY`.
    pub fn from_env() -> Self {
        Self {
            dir: std::env::var("TAXOTAG_TELEMETRY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::TELEMETRY_DIR)),
            flush_every: std::env::var("TAXOTAG_TELEMETRY_FLUSH_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults::TELEMETRY_FLUSH_EVERY),
        }
    }
}

/// Token counts for one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub run_id: Uuid,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// True when counted locally rather than reported by the service.
    pub estimated: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Full record of one request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub run_id: Uuid,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub response: String,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Running totals over the whole run, flushed or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageTotals {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Process-scoped accumulator for token usage and interaction logs.
pub struct Telemetry {
    run_id: Uuid,
    config: TelemetryConfig,
    usage: Mutex<Vec<TokenUsage>>,
    interactions: Mutex<Vec<InteractionRecord>>,
    totals: Mutex<UsageTotals>,
}

impl Telemetry {
    /// Start a new run with a fresh time-ordered run id.
    pub fn new(config: TelemetryConfig) -> Self {
        let run_id = Uuid::now_v7();
        info!(
            subsystem = "telemetry",
            run_id = %run_id,
            dir = %config.dir.display(),
            flush_every = config.flush_every,
            "Telemetry run started"
        );
        Self {
            run_id,
            config,
            usage: Mutex::new(Vec::new()),
            interactions: Mutex::new(Vec::new()),
            totals: Mutex::new(UsageTotals::default()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(TelemetryConfig::from_env())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Token usage file shared across runs.
    pub fn usage_path(&self) -> PathBuf {
        self.config.dir.join(defaults::TOKEN_USAGE_FILE)
    }

    /// Interaction log for this run.
    pub fn interaction_path(&self) -> PathBuf {
        self.config
            .dir
            .join(format!("interactions_{}.jsonl", self.run_id))
    }

    /// Append a token usage entry, flushing the usage buffer when full.
    pub fn record_usage(
        &self,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        estimated: bool,
    ) -> Result<()> {
        {
            let mut totals = self.totals.lock().map_err(poisoned)?;
            totals.requests += 1;
            totals.prompt_tokens += u64::from(prompt_tokens);
            totals.completion_tokens += u64::from(completion_tokens);
        }

        let entry = TokenUsage {
            run_id: self.run_id,
            model: model.to_string(),
            prompt_tokens,
            completion_tokens,
            estimated,
            recorded_at: Utc::now(),
        };

        let ready = {
            let mut buf = self.usage.lock().map_err(poisoned)?;
            buf.push(entry);
            take_if_full(&mut buf, self.config.flush_every)
        };
        match ready {
            Some(batch) => write_or_restore(&self.usage, &self.usage_path(), batch),
            None => Ok(()),
        }
    }

    /// Append an interaction record, flushing the log buffer when full.
    pub fn record_interaction(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        response: &str,
        duration_ms: u64,
    ) -> Result<()> {
        let entry = InteractionRecord {
            run_id: self.run_id,
            model: model.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            duration_ms,
            recorded_at: Utc::now(),
        };

        let ready = {
            let mut buf = self.interactions.lock().map_err(poisoned)?;
            buf.push(entry);
            take_if_full(&mut buf, self.config.flush_every)
        };
        match ready {
            Some(batch) => write_or_restore(&self.interactions, &self.interaction_path(), batch),
            None => Ok(()),
        }
    }

    /// Write out everything still buffered.
    ///
    /// Both streams are attempted. Entries whose write fails stay buffered
    /// for the next flush, and the first error is returned.
    pub fn flush(&self) -> Result<()> {
        let usage = std::mem::take(&mut *self.usage.lock().map_err(poisoned)?);
        let interactions = std::mem::take(&mut *self.interactions.lock().map_err(poisoned)?);
        let (n_usage, n_interactions) = (usage.len(), interactions.len());

        let usage_res = if usage.is_empty() {
            Ok(())
        } else {
            write_or_restore(&self.usage, &self.usage_path(), usage)
        };
        let interactions_res = if interactions.is_empty() {
            Ok(())
        } else {
            write_or_restore(&self.interactions, &self.interaction_path(), interactions)
        };
        usage_res.and(interactions_res)?;

        debug!(
            subsystem = "telemetry",
            usage = n_usage,
            interactions = n_interactions,
            "Telemetry flushed"
        );
        Ok(())
    }

    /// [`Telemetry::flush`] on the blocking pool, for async callers finishing
    /// a run.
    pub async fn flush_blocking(self: &Arc<Self>) -> Result<()> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.flush())
            .await
            .map_err(|e| Error::Internal(format!("telemetry flush task failed: {}", e)))?
    }

    /// Totals recorded so far in this run.
    pub fn totals(&self) -> UsageTotals {
        self.totals.lock().map(|t| *t).unwrap_or_default()
    }

    /// Entries currently buffered, as `(usage, interactions)`.
    pub fn pending(&self) -> (usize, usize) {
        let usage = self.usage.lock().map(|b| b.len()).unwrap_or(0);
        let interactions = self.interactions.lock().map(|b| b.len()).unwrap_or(0);
        (usage, interactions)
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(subsystem = "telemetry", error = %e, "Final telemetry flush failed");
        }
    }
}

fn take_if_full<T>(buf: &mut Vec<T>, flush_every: usize) -> Option<Vec<T>> {
    if buf.len() >= flush_every.max(1) {
        Some(std::mem::take(buf))
    } else {
        None
    }
}

/// Write a drained batch. On failure the batch goes back in front of
/// anything buffered since, so a later flush retries it in order.
fn write_or_restore<T: Serialize>(
    buffer: &Mutex<Vec<T>>,
    path: &Path,
    batch: Vec<T>,
) -> Result<()> {
    let Err(e) = append_jsonl(path, &batch) else {
        return Ok(());
    };
    warn!(
        subsystem = "telemetry",
        path = %path.display(),
        entries = batch.len(),
        error = %e,
        "Telemetry write failed, keeping entries buffered"
    );
    let mut buf = buffer.lock().map_err(poisoned)?;
    let newer = std::mem::replace(&mut *buf, batch);
    buf.extend(newer);
    Err(e)
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Telemetry("telemetry buffer lock poisoned".to_string())
}

/// Synchronous append of one serialized batch. Called at most once per
/// `flush_every` entries per stream, so the classifier's workers block on
/// disk only at that cadence; end-of-run flushes go through
/// [`Telemetry::flush_blocking`].
fn append_jsonl<T: Serialize>(path: &Path, entries: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}
