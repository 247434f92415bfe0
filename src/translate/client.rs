use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{TranslateError, Translator};
use crate::http::{is_transient, snippet, with_retry};
use crate::lang::LanguageCode;

const API_BASE: &str = "https://translate.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// The public endpoint rejects payloads above this many characters.
const MAX_CHUNK_CHARS: usize = 5000;

/// Client for the public Google Translate `translate_a/single` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslateClient {
    http: Client,
    base_url: String,
}

impl GoogleTranslateClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    async fn translate_chunk(
        &self,
        chunk: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslateError> {
        let url = format!("{}/translate_a/single", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.as_str()),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", chunk),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(%source, %target, "translation API rate limited");
            return Err(TranslateError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {}", snippet(&text)),
            });
        }

        let body: Value = response.json().await?;
        parse_translation(&body)
    }
}

impl Translator for GoogleTranslateClient {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslateError> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let mut translated = Vec::new();
        for chunk in chunk_text(text, MAX_CHUNK_CHARS) {
            let part =
                with_retry(|| self.translate_chunk(chunk, source, target), is_retriable).await?;
            translated.push(part);
        }

        debug!(%source, %target, chars = text.len(), "translated");
        Ok(translated.join(" "))
    }
}

fn is_retriable(e: &TranslateError) -> bool {
    match e {
        TranslateError::Network(source) => is_transient(source),
        other => matches!(
            other,
            TranslateError::RateLimited
                | TranslateError::Api {
                    code: 500..=599,
                    ..
                }
        ),
    }
}

/// Joins the translated segments from `[[["segment", "original", ...], ...], ...]`.
fn parse_translation(body: &Value) -> Result<String, TranslateError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::MalformedResponse("missing segment list".to_string()))?;

    let mut out = String::new();
    for segment in segments {
        let text = segment
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| TranslateError::MalformedResponse(format!("bad segment: {segment}")))?;
        out.push_str(text);
    }
    Ok(out)
}

/// Splits `text` into pieces of at most `max_chars` characters, cutting at
/// whitespace where possible.
fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let hard_end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest);
                break;
            }
        };
        let end = if rest[hard_end..].starts_with(char::is_whitespace) {
            hard_end
        } else {
            match rest[..hard_end].rfind(char::is_whitespace) {
                Some(ws) if ws > 0 => ws,
                _ => hard_end,
            }
        };
        chunks.push(rest[..end].trim_end());
        rest = rest[end..].trim_start();
    }

    chunks
}
