//! taxotag - hierarchical taxonomy tagging with an LLM.
//!
//! Usage:
//!   taxotag tag --taxonomy acm.json --input test.jsonl --output tagged.jsonl
//!   taxotag evaluate --predictions tagged.jsonl --ground-truth gold.jsonl --k 3
//!   taxotag split --input corpus.jsonl --size 100 --seed 108
//!   taxotag taxonomy show --taxonomy acm.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taxotag_core::defaults;
use taxotag_core::{GenerationBackend, Taxonomy, TiktokenTokenizer};
use taxotag_inference::{LevelClassifier, OpenAIBackend, OpenAIConfig, Telemetry, TelemetryConfig};
use taxotag_tagging::dataset::{read_jsonl, write_jsonl};
use taxotag_tagging::records::{self, TaggedRecord, DEFAULT_ID_FIELD};
use taxotag_tagging::{
    create_splits, BatchConfig, BatchItem, BatchTagger, DescentController, EvalReport,
    SplitConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "taxotag",
    version,
    about = "Tag documents against a hierarchical taxonomy using an LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tag every record of a JSONL corpus.
    Tag(TagArgs),
    /// Score predictions against ground truth.
    Evaluate(EvaluateArgs),
    /// Split a JSONL corpus into train/validation/test files.
    Split(SplitArgs),
    /// Inspect a taxonomy file.
    #[command(subcommand)]
    Taxonomy(TaxonomyCommand),
}

#[derive(Args, Debug)]
struct TagArgs {
    /// Taxonomy JSON file.
    #[arg(long)]
    taxonomy: PathBuf,

    /// Corpus JSONL file.
    #[arg(long)]
    input: PathBuf,

    /// Output JSONL file.
    #[arg(long)]
    output: PathBuf,

    /// Model identifier (default: TAXOTAG_MODEL or the built-in default).
    #[arg(long)]
    model: Option<String>,

    /// Documents tagged concurrently.
    #[arg(long, env = "TAXOTAG_TAG_MAX_CONCURRENT", default_value_t = defaults::TAG_MAX_CONCURRENT)]
    concurrency: usize,

    /// Field holding the document text (default: title + abstract).
    #[arg(long)]
    text_field: Option<String>,

    /// Field holding the document identifier.
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    id_field: String,

    /// Override TAXOTAG_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Override TAXOTAG_TELEMETRY_DIR.
    #[arg(long)]
    telemetry_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Predictions JSONL (flat records or `taxotag tag` output).
    #[arg(long)]
    predictions: PathBuf,

    /// Ground truth JSONL.
    #[arg(long)]
    ground_truth: PathBuf,

    #[arg(long, default_value_t = defaults::TOP_K)]
    k: usize,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Corpus JSONL file.
    #[arg(long)]
    input: PathBuf,

    /// Records kept after shuffling (0 keeps all).
    #[arg(long, default_value_t = defaults::SPLIT_SIZE)]
    size: usize,

    #[arg(long, default_value_t = defaults::SPLIT_SEED)]
    seed: u64,

    #[arg(long, default_value_t = defaults::SPLIT_TRAIN_FRAC)]
    train_frac: f64,

    #[arg(long, default_value_t = defaults::SPLIT_VAL_FRAC)]
    val_frac: f64,

    #[arg(long, default_value = defaults::SPLIT_OUT_DIR)]
    out_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum TaxonomyCommand {
    /// Print the tree and its depth.
    Show {
        #[arg(long)]
        taxonomy: PathBuf,

        /// Only print the subtree at this `/`-separated path.
        #[arg(long)]
        path: Option<String>,
    },
    /// Check depth consistency and sibling name uniqueness.
    Validate {
        #[arg(long)]
        taxonomy: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Tag(args) => tag(args).await,
        Commands::Evaluate(args) => evaluate(args),
        Commands::Split(args) => split(args),
        Commands::Taxonomy(cmd) => taxonomy(cmd),
    }
}

/// Initialize tracing on stderr, or a daily-rotated file when `LOG_FILE` is set.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional)
///   RUST_LOG    - standard env filter (default: "info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = Path::new(path);
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("taxotag.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        None
    }
}

async fn tag(args: TagArgs) -> Result<()> {
    let taxonomy = Taxonomy::load_from_file(&args.taxonomy)
        .with_context(|| format!("loading taxonomy {}", args.taxonomy.display()))?;
    taxonomy.validate().context("taxonomy is not well formed")?;

    let corpus = read_jsonl(&args.input)
        .with_context(|| format!("reading corpus {}", args.input.display()))?;

    let mut items = Vec::with_capacity(corpus.len());
    for (idx, record) in corpus.iter().enumerate() {
        let Some(document) = records::document_text(record, args.text_field.as_deref()) else {
            warn!(line = idx + 1, "Record has no document text, skipping");
            continue;
        };
        let paper_id = records::paper_id_or_line(record, &args.id_field, idx);
        items.push(BatchItem::new(paper_id, document));
    }

    let mut backend_config = OpenAIConfig::from_env();
    if let Some(base_url) = args.base_url {
        backend_config.base_url = base_url;
    }
    let backend = OpenAIBackend::new(backend_config)?;
    let model = args
        .model
        .unwrap_or_else(|| backend.default_model().to_string());

    let mut telemetry_config = TelemetryConfig::from_env();
    if let Some(dir) = args.telemetry_dir {
        telemetry_config.dir = dir;
    }
    let telemetry = Arc::new(Telemetry::new(telemetry_config));

    let mut classifier = LevelClassifier::new(Arc::new(backend)).with_telemetry(telemetry.clone());
    match TiktokenTokenizer::for_model(&model) {
        Ok(tokenizer) => classifier = classifier.with_tokenizer(Arc::new(tokenizer)),
        Err(e) => warn!(error = %e, "Tokenizer unavailable, estimating token counts"),
    }

    info!(
        run_id = %telemetry.run_id(),
        model = %model,
        documents = items.len(),
        taxonomy_depth = taxonomy.depth(),
        "Starting tagging run"
    );

    let controller = DescentController::new(classifier, model.clone());
    let tagger = BatchTagger::new(controller, Arc::new(taxonomy))
        .with_config(BatchConfig::default().with_max_concurrent(args.concurrency));
    let results = tagger.run(items).await;

    let lines: Vec<TaggedRecord> = results
        .into_iter()
        .map(|(paper_id, result)| TaggedRecord {
            paper_id,
            model: model.clone(),
            result,
        })
        .collect();
    write_jsonl(&args.output, &lines)
        .with_context(|| format!("writing {}", args.output.display()))?;

    if let Err(e) = telemetry.flush_blocking().await {
        warn!(error = %e, "Telemetry flush failed");
    }
    let totals = telemetry.totals();
    info!(
        output = %args.output.display(),
        records = lines.len(),
        requests = totals.requests,
        prompt_tokens = totals.prompt_tokens,
        completion_tokens = totals.completion_tokens,
        "Tagging run complete"
    );
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    if args.k == 0 {
        bail!("--k must be at least 1");
    }
    let predictions = records::load_predictions(read_jsonl(&args.predictions)?)
        .with_context(|| format!("reading predictions {}", args.predictions.display()))?;
    let ground_truth = records::load_ground_truth(read_jsonl(&args.ground_truth)?)
        .with_context(|| format!("reading ground truth {}", args.ground_truth.display()))?;

    let report = EvalReport::from_records(&predictions, &ground_truth, args.k);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn split(args: SplitArgs) -> Result<()> {
    let config = SplitConfig {
        size: args.size,
        seed: args.seed,
        train_frac: args.train_frac,
        val_frac: args.val_frac,
        out_dir: args.out_dir,
    };
    let summary = create_splits(&args.input, &config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn taxonomy(cmd: TaxonomyCommand) -> Result<()> {
    match cmd {
        TaxonomyCommand::Show { taxonomy, path } => {
            let t = Taxonomy::load_from_file(&taxonomy)?;
            match path {
                Some(path) => {
                    let names: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                    print!("{}", t.require_node(&names)?);
                }
                None => {
                    print!("{}", t);
                    println!("depth: {}  nodes: {}", t.depth(), t.len());
                }
            }
        }
        TaxonomyCommand::Validate { taxonomy } => {
            let t = Taxonomy::load_from_file(&taxonomy)?;
            t.validate()?;
            println!("ok: depth {}, {} nodes, {} leaves", t.depth(), t.len(), t.leaves().len());
        }
    }
    Ok(())
}
