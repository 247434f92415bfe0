//! Query expansion pipeline.
//!
//! ```text
//! DETECT → TRANSLATE_QUERY → RETRIEVE → TRANSLATE_DOCUMENTS → SCORE → BUILD
//!            (per language)  (per lang)   (per document)
//! ```
//!
//! Every stage joins all of its units before the next one starts.

use std::fmt;

use tracing::{debug, info, warn};

use crate::detect::{DetectError, Detector};
use crate::index::IndexRegistry;
use crate::lang::{LanguageCode, Query};
use crate::retrieval::{RetrievalError, retrieve_all};
use crate::scoring::{ScoringError, score_terms};
use crate::translate::coordinator::{translate_documents, translate_query};
use crate::translate::{FanOutError, FanOutLimits, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    TranslateQuery,
    Retrieve,
    TranslateDocuments,
    Score,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Detect => "detect",
            Stage::TranslateQuery => "translate-query",
            Stage::Retrieve => "retrieve",
            Stage::TranslateDocuments => "translate-documents",
            Stage::Score => "score",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("detect stage failed: {0}")]
    Detect(#[from] DetectError),

    #[error("detect stage failed: detected language '{0}' is not supported")]
    UnsupportedLanguage(LanguageCode),

    #[error("{stage} stage failed: {source}")]
    Translate {
        stage: Stage,
        #[source]
        source: FanOutError,
    },

    #[error("retrieve stage failed: {0}")]
    Retrieve(#[from] RetrievalError),

    #[error("score stage failed: {0}")]
    Score(#[from] ScoringError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Detect(_) | Self::UnsupportedLanguage(_) => Stage::Detect,
            Self::Translate { stage, .. } => *stage,
            Self::Retrieve(_) => Stage::Retrieve,
            Self::Score(_) => Stage::Score,
        }
    }
}

impl From<FanOutError> for PipelineError {
    fn from(source: FanOutError) -> Self {
        let stage = match source {
            FanOutError::Query { .. } => Stage::TranslateQuery,
            FanOutError::Document { .. } => Stage::TranslateDocuments,
        };
        Self::Translate { stage, source }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub languages: Vec<LanguageCode>,
    pub common_language: LanguageCode,
    pub num_results: usize,
    pub term_count: usize,
    pub limits: FanOutLimits,
}

/// The original query followed by the selected terms, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedQuery {
    pub original: String,
    pub terms: Vec<String>,
}

impl fmt::Display for ExpandedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        Ok(())
    }
}

pub struct Pipeline<'a, D, T> {
    detector: &'a D,
    translator: &'a T,
    registry: &'a IndexRegistry,
    settings: PipelineSettings,
}

impl<'a, D: Detector, T: Translator> Pipeline<'a, D, T> {
    pub fn new(
        detector: &'a D,
        translator: &'a T,
        registry: &'a IndexRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            detector,
            translator,
            registry,
            settings,
        }
    }

    pub async fn expand(&self, query: &str) -> Result<ExpandedQuery, PipelineError> {
        let settings = &self.settings;

        let language = self.detector.detect(query).await?;
        if !settings.languages.contains(&language) {
            return Err(PipelineError::UnsupportedLanguage(language));
        }
        info!(%language, "detected query language");
        let original = Query::new(query, language);

        let translations = translate_query(
            self.translator,
            &original,
            &settings.languages,
            settings.limits,
        )
        .await?;
        for (language, text) in translations.iter() {
            debug!(%language, query = text, "query variant");
        }
        info!(languages = translations.len(), "query translated");

        let retrieved = retrieve_all(
            self.registry,
            &translations,
            &settings.languages,
            settings.num_results,
            settings.limits.concurrency,
        )
        .await
        .inspect_err(|e| warn!(language = %e.language(), error = %e, "retrieval failed"))?;
        let total: usize = retrieved.iter().map(|r| r.documents.len()).sum();
        info!(documents = total, "documents retrieved");

        let corpus = translate_documents(
            self.translator,
            &retrieved,
            &settings.common_language,
            settings.limits,
        )
        .await?;
        info!(documents = corpus.len(), target = %settings.common_language, "documents translated");

        let terms = score_terms(&corpus, settings.term_count)?;
        info!(terms = terms.len(), "terms selected");

        Ok(ExpandedQuery {
            original: original.text,
            terms,
        })
    }
}
