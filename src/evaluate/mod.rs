//! Retrieval evaluation: mean average precision of a set of topics against
//! one language's index, before and after expansion.

pub mod judgements;
pub mod metrics;

pub use judgements::{Qrels, Topic, read_qrels, read_topics};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::detect::Detector;
use crate::index::IndexHandle;
use crate::lang::LanguageCode;
use crate::pipeline::{Pipeline, PipelineError};
use crate::retrieval::sanitise_query;
use crate::translate::Translator;
use metrics::{average_precision, mean_average_precision};

/// Ranking depth per topic.
pub const EVAL_DEPTH: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("no index registered for '{0}'")]
    MissingIndex(LanguageCode),

    #[error("expanding topic '{qid}' failed: {source}")]
    Rewrite {
        qid: String,
        #[source]
        source: PipelineError,
    },

    #[error("ranking topic '{qid}' did not complete: {source}")]
    Join {
        qid: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("none of the topics has a relevant document in the judgements")]
    NoJudgedTopics,
}

/// Turns a topic's query into the query that is actually ranked.
pub trait QueryRewriter {
    async fn rewrite(&self, query: &str) -> Result<String, PipelineError>;
}

impl<D: Detector, T: Translator> QueryRewriter for Pipeline<'_, D, T> {
    async fn rewrite(&self, query: &str) -> Result<String, PipelineError> {
        Ok(self.expand(query).await?.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicResult {
    pub qid: String,
    pub expanded: String,
    pub original_ap: f64,
    pub expanded_ap: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub language: LanguageCode,
    pub topics: Vec<TopicResult>,
    pub original_map: f64,
    pub expanded_map: f64,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "topics: {} (index '{}')",
            self.topics.len(),
            self.language
        )?;
        writeln!(f, "map original: {:.4}", self.original_map)?;
        write!(f, "map expanded: {:.4}", self.expanded_map)
    }
}

fn ranked_ids(index: &IndexHandle, query: &str, depth: usize) -> Vec<String> {
    index
        .retrieve_top_k(&sanitise_query(query), depth)
        .into_iter()
        .map(|doc| doc.id)
        .collect()
}

/// Ranks every judged topic twice against `index`, once as written and once
/// rewritten, and compares mean average precision.
///
/// Topics run through a bounded stream of at most `concurrency` at a time;
/// ranking happens on the blocking pool. Topics without any relevant
/// document are skipped. The first failing topic aborts the evaluation.
pub async fn evaluate<R: QueryRewriter>(
    rewriter: &R,
    language: &LanguageCode,
    index: Option<&IndexHandle>,
    topics: &[Topic],
    qrels: &Qrels,
    concurrency: usize,
) -> Result<EvaluationReport, EvaluateError> {
    let index = index.ok_or_else(|| EvaluateError::MissingIndex(language.clone()))?;

    let judged: Vec<_> = topics
        .iter()
        .filter_map(|topic| match qrels.relevant(&topic.qid) {
            Some(relevant) => Some((topic, relevant)),
            None => {
                debug!(qid = %topic.qid, "topic has no relevant documents, skipped");
                None
            }
        })
        .collect();
    if judged.is_empty() {
        return Err(EvaluateError::NoJudgedTopics);
    }
    info!(topics = judged.len(), %language, "evaluating");

    let results: Vec<TopicResult> = stream::iter(judged)
        .map(|(topic, relevant)| async move {
            let expanded =
                rewriter
                    .rewrite(&topic.query)
                    .await
                    .map_err(|source| EvaluateError::Rewrite {
                        qid: topic.qid.clone(),
                        source,
                    })?;

            let handle = Arc::clone(index);
            let original = topic.query.clone();
            let rewritten = expanded.clone();
            let (original_ranking, expanded_ranking) = tokio::task::spawn_blocking(move || {
                (
                    ranked_ids(&handle, &original, EVAL_DEPTH),
                    ranked_ids(&handle, &rewritten, EVAL_DEPTH),
                )
            })
            .await
            .map_err(|source| EvaluateError::Join {
                qid: topic.qid.clone(),
                source,
            })?;

            let result = TopicResult {
                qid: topic.qid.clone(),
                expanded,
                original_ap: average_precision(&original_ranking, relevant),
                expanded_ap: average_precision(&expanded_ranking, relevant),
            };
            debug!(
                qid = %result.qid,
                original_ap = result.original_ap,
                expanded_ap = result.expanded_ap,
                "topic evaluated"
            );
            Ok::<_, EvaluateError>(result)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let original: Vec<f64> = results.iter().map(|r| r.original_ap).collect();
    let expanded: Vec<f64> = results.iter().map(|r| r.expanded_ap).collect();

    Ok(EvaluationReport {
        language: language.clone(),
        original_map: mean_average_precision(&original),
        expanded_map: mean_average_precision(&expanded),
        topics: results,
    })
}
