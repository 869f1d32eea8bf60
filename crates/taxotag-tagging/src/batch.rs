//! Concurrent tagging of independent documents.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, Instrument};

use taxotag_core::defaults;
use taxotag_core::{PaperId, Taxonomy, TaggingResult};

use crate::descent::DescentController;

/// Configuration for the batch runner.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of documents tagged at once.
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::TAG_MAX_CONCURRENT,
        }
    }
}

impl BatchConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TAXOTAG_TAG_MAX_CONCURRENT` | `4` | Documents tagged concurrently |
    pub fn from_env() -> Self {
        let max_concurrent = std::env::var("TAXOTAG_TAG_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TAG_MAX_CONCURRENT)
            .max(1);
        Self { max_concurrent }
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }
}

/// One document to tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub paper_id: PaperId,
    pub document: String,
}

impl BatchItem {
    pub fn new(paper_id: impl Into<PaperId>, document: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            document: document.into(),
        }
    }
}

/// Fans independent tagging flows out over a bounded `JoinSet`.
pub struct BatchTagger {
    controller: Arc<DescentController>,
    taxonomy: Arc<Taxonomy>,
    config: BatchConfig,
}

impl BatchTagger {
    pub fn new(controller: DescentController, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            controller: Arc::new(controller),
            taxonomy,
            config: BatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Tag every item, returning results in input order.
    ///
    /// A flow that panics is logged and leaves an empty result for its item.
    #[instrument(skip(self, items), fields(subsystem = "tagging", component = "batch", op = "run", items = items.len(), max_concurrent = self.config.max_concurrent))]
    pub async fn run(&self, items: Vec<BatchItem>) -> Vec<(PaperId, TaggingResult)> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        let mut results: Vec<(PaperId, TaggingResult)> = items
            .iter()
            .map(|item| (item.paper_id.clone(), TaggingResult::empty()))
            .collect();

        for (idx, item) in items.into_iter().enumerate() {
            let controller = self.controller.clone();
            let taxonomy = self.taxonomy.clone();
            let semaphore = semaphore.clone();
            let span = tracing::info_span!("document", paper_id = %item.paper_id);
            tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (idx, TaggingResult::empty());
                    };
                    (idx, controller.tag(&item.document, &taxonomy).await)
                }
                .instrument(span),
            );
        }

        let mut panicked = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx].1 = result,
                Err(e) => {
                    panicked += 1;
                    error!(error = ?e, "Tagging task panicked");
                }
            }
        }

        let tagged = results.iter().filter(|(_, r)| !r.is_empty()).count();
        info!(
            total = results.len(),
            tagged,
            panicked,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch tagging complete"
        );
        results
    }
}
