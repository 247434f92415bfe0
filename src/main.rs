mod config;
mod detect;
mod evaluate;
mod http;
mod index;
mod lang;
mod normalize;
mod pipeline;
mod retrieval;
mod scoring;
mod translate;

pub const USER_AGENT: &str = concat!("polyglot-expand/", env!("CARGO_PKG_VERSION"));

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{error, info};

use config::{Config, ConfigError};
use detect::DetectLanguageClient;
use evaluate::EvaluateError;
use index::{IndexError, IndexRegistry};
use pipeline::{Pipeline, PipelineError, PipelineSettings};
use translate::{FanOutLimits, GoogleTranslateClient};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Expand a search query with domain-specific terms gathered from
/// multilingual retrieval, or measure what expansion does to retrieval
/// quality over a set of judged topics.
///
/// Configuration via environment variables:
/// - `LANGUAGE_DETECT_API_KEY` (required)
/// - `EXPAND_LANGUAGES`, `EXPAND_COMMON_LANGUAGE`, `EXPAND_CORPUS_DIR`,
///   `EXPAND_INDEX_DIR`, `EXPAND_CONCURRENCY`, `EXPAND_UNIT_TIMEOUT_SECS`
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Query to expand
    #[arg(required_unless_present = "topics", conflicts_with = "topics")]
    query: Option<String>,

    /// Documents retrieved per language
    #[arg(short = 'n', long, default_value_t = 10)]
    num_results: usize,

    /// Number of expansion terms appended to the query
    #[arg(short = 't', long, default_value_t = 10)]
    terms: usize,

    /// Print the selected terms (or per-topic scores) to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Evaluate over a topics file (`qid<TAB>query` per line) instead of
    /// expanding a single query
    #[arg(long, requires = "qrels")]
    topics: Option<PathBuf>,

    /// Relevance judgements for `--topics`, TREC or BEIR layout
    #[arg(long, requires = "topics")]
    qrels: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("evaluation failed: {0}")]
    Evaluate(#[from] EvaluateError),

    #[error("query must not be empty")]
    EmptyQuery,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("polyglot_expand=info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(expanded) => {
            println!("{expanded}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "query expansion failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<String, AppError> {
    let evaluation = cli.topics.as_deref().zip(cli.qrels.as_deref());
    let query = cli.query.as_deref().unwrap_or_default().trim();
    if evaluation.is_none() && query.is_empty() {
        return Err(AppError::EmptyQuery);
    }

    let config = Config::from_env()?;
    info!(languages = config.languages.len(), "starting query expansion");

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()?;
    let detector = DetectLanguageClient::new(http.clone(), config.api_key.clone());
    let translator = GoogleTranslateClient::new(http);

    let registry =
        IndexRegistry::open(&config.languages, &config.corpus_dir, &config.index_dir).await?;

    let settings = PipelineSettings {
        languages: config.languages.clone(),
        common_language: config.common_language.clone(),
        num_results: cli.num_results,
        term_count: cli.terms,
        limits: FanOutLimits {
            concurrency: config.concurrency,
            unit_timeout: config.unit_timeout,
        },
    };
    let pipeline = Pipeline::new(&detector, &translator, &registry, settings);

    if let Some((topics, qrels)) = evaluation {
        return run_evaluation(&pipeline, &registry, &config, topics, qrels, cli.verbose).await;
    }

    let expanded = pipeline
        .expand(query)
        .await
        .inspect_err(|e| error!(stage = %e.stage(), "pipeline aborted"))?;

    if cli.verbose {
        eprintln!("{query} -> {:?}", expanded.terms);
    }
    info!(terms = expanded.terms.len(), "expansion complete");
    Ok(expanded.to_string())
}

/// Ranks the topics against the common language's index with and without
/// expansion.
async fn run_evaluation(
    pipeline: &Pipeline<'_, DetectLanguageClient, GoogleTranslateClient>,
    registry: &IndexRegistry,
    config: &Config,
    topics: &Path,
    qrels: &Path,
    verbose: bool,
) -> Result<String, AppError> {
    let topics = evaluate::read_topics(topics)?;
    let qrels = evaluate::read_qrels(qrels)?;
    info!(topics = topics.len(), judged = qrels.len(), "judgements loaded");

    let language = &config.common_language;
    let report = evaluate::evaluate(
        pipeline,
        language,
        registry.get(language),
        &topics,
        &qrels,
        config.concurrency,
    )
    .await?;

    if verbose {
        for topic in &report.topics {
            eprintln!(
                "{}\t{:.4}\t{:.4}\t{}",
                topic.qid, topic.original_ap, topic.expanded_ap, topic.expanded
            );
        }
    }
    Ok(report.to_string())
}
