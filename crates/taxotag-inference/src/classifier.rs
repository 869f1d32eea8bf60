//! Single-level classification against a set of sibling categories.
//!
//! One call renders the options into the prompt template, sends one request
//! to the generation backend and parses the reply into ranked candidates.
//! The result is total: service failures and unparseable replies both come
//! back as an empty [`LevelOutcome`].

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use tracing::{debug, instrument, trace, warn};

use taxotag_core::defaults;
use taxotag_core::{
    estimate_tokens, Candidate, Generation, GenerationBackend, Result, TaxonomyNode, Tokenizer,
};

use crate::response::parse_response;
use crate::telemetry::Telemetry;

/// System message template; `{max_candidates}` is substituted.
pub const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an expert document tagger. You are given a document and a fixed list of allowed categories.

TASK:
1. Read the document carefully.
2. Pick at most {max_candidates} categories from the allowed list, best first. For each give:
   - label: the category name exactly as listed
   - confidence: a number between 0 and 1
   - rationale: a few sentences on why this label, and only this label, fits
3. Only if none of the categories fit, answer with the single label "None" and a rationale.

FORMAT:
```json
{
  "candidates": [
    {
      "label": "<Category>",
      "confidence": 0.72,
      "rationale": "why <Category> matches this document"
    }
  ]
}
```"#;

/// Instruction sent as the system message for every level.
pub static SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    SYSTEM_PROMPT_TEMPLATE.replace("{max_candidates}", &defaults::MAX_CANDIDATES.to_string())
});

/// User message template; `{document}` and `{categories}` are substituted.
pub const USER_PROMPT: &str = "\nDocument:\n{document}\n\n\nAllowed categories.\n{categories}\n";

/// Render options one per line as `name : description`.
pub fn format_options(options: &[TaxonomyNode]) -> String {
    options
        .iter()
        .map(|opt| format!("{} : {}", opt.name, opt.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the user template with the document and rendered options.
pub fn build_prompt(document: &str, options: &[TaxonomyNode]) -> String {
    USER_PROMPT
        .replace("{categories}", &format_options(options))
        .replace("{document}", document)
}

/// What the model said about one level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelOutcome {
    /// Ranked candidates in model order; empty means halt.
    pub candidates: Vec<Candidate>,
    /// Reasoning segment of the reply, if the model emitted one.
    pub reasoning: Option<String>,
}

impl LevelOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Label of the first candidate.
    pub fn top_label(&self) -> Option<&str> {
        self.candidates.first().map(|c| c.label.as_str())
    }
}

/// Asks the backend to rank one level's options.
#[derive(Clone)]
pub struct LevelClassifier {
    backend: Arc<dyn GenerationBackend>,
    telemetry: Option<Arc<Telemetry>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl LevelClassifier {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            telemetry: None,
            tokenizer: None,
        }
    }

    /// Record usage and interactions into `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Count tokens with `tokenizer` when the backend reports no usage.
    ///
    /// Without one, counts fall back to [`estimate_tokens`].
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    pub fn telemetry(&self) -> Option<&Arc<Telemetry>> {
        self.telemetry.as_ref()
    }

    /// Rank `options` for `document` with one request to `model`.
    ///
    /// Never fails: an empty option set, a service error, or a reply without
    /// usable candidates all yield an empty outcome. Candidates labelled
    /// `None` are the model's "nothing fits" answer and are dropped.
    #[instrument(skip(self, document, options), fields(subsystem = "tagging", component = "classifier", op = "choose", model = %model, option_count = options.len()))]
    pub async fn choose(
        &self,
        document: &str,
        options: &[TaxonomyNode],
        model: &str,
    ) -> LevelOutcome {
        if options.is_empty() {
            return LevelOutcome::empty();
        }

        let prompt = build_prompt(document, options);
        trace!(prompt_len = prompt.len(), "Level prompt built");

        let start = Instant::now();
        let generation = match self
            .backend
            .generate_with_system(model, &SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(g) => g,
            Err(e) => {
                warn!(
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Generation failed, treating level as unclassified"
                );
                return LevelOutcome::empty();
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        // Each channel logs its own failure.
        let _ = self.record_telemetry(model, &prompt, &generation, duration_ms);

        let parsed = parse_response(&generation.content);
        let candidates: Vec<Candidate> = parsed
            .candidates()
            .into_iter()
            .filter(|c| !c.label.trim().eq_ignore_ascii_case(defaults::NONE_LABEL))
            .collect();

        debug!(
            response_len = generation.content.len(),
            candidate_count = candidates.len(),
            top = candidates.first().map(|c| c.label.as_str()).unwrap_or(""),
            has_reasoning = parsed.reasoning.is_some(),
            duration_ms,
            "Level classified"
        );

        LevelOutcome {
            candidates,
            reasoning: parsed.reasoning,
        }
    }

    fn record_telemetry(
        &self,
        model: &str,
        prompt: &str,
        generation: &Generation,
        duration_ms: u64,
    ) -> Result<()> {
        let Some(telemetry) = &self.telemetry else {
            return Ok(());
        };

        let (prompt_tokens, completion_tokens, estimated) = match generation.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens, false),
            None => {
                let input = format!("{}\n{}", SYSTEM_PROMPT.as_str(), prompt);
                (
                    self.count_tokens(&input),
                    self.count_tokens(&generation.content),
                    true,
                )
            }
        };

        // Independent channels: one failing must not suppress the other.
        let usage = telemetry.record_usage(model, prompt_tokens, completion_tokens, estimated);
        if let Err(e) = &usage {
            warn!(error = %e, "Failed to record token usage");
        }
        let interaction = telemetry.record_interaction(
            model,
            &SYSTEM_PROMPT,
            prompt,
            &generation.content,
            duration_ms,
        );
        if let Err(e) = &interaction {
            warn!(error = %e, "Failed to record interaction");
        }
        usage.and(interaction)
    }

    fn count_tokens(&self, text: &str) -> u32 {
        let n = match &self.tokenizer {
            Some(t) => t.count_tokens(text),
            None => estimate_tokens(text),
        };
        u32::try_from(n).unwrap_or(u32::MAX)
    }
}
