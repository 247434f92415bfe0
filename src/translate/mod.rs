//! Machine translation: the `Translator` seam, an HTTP client behind it, and
//! the fan-out/fan-in coordinator that drives many translations at once.

pub mod client;
pub mod coordinator;

pub use client::GoogleTranslateClient;
pub use coordinator::{FanOutError, FanOutLimits, QueryTranslationMap};

use std::time::Duration;

use crate::lang::LanguageCode;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translation API rate limit exceeded")]
    RateLimited,

    #[error("translation API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("malformed translation response: {0}")]
    MalformedResponse(String),

    #[error("translation timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Translates text between two languages.
/// Implemented by `GoogleTranslateClient`; tests use in-memory fakes.
pub trait Translator {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslateError>;
}
