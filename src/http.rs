//! Shared plumbing for the HTTP-backed collaborators: retry with jitter,
//! credential redaction and error body snippets.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const SNIPPET_CHARS: usize = 200;

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Runs `op` up to `MAX_RETRIES` times while `is_retriable` accepts the error.
pub async fn with_retry<T, E, F, Fut>(mut op: F, is_retriable: impl Fn(&E) -> bool) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retriable(&e) && attempt + 1 < MAX_RETRIES => {
                let delay_ms = jittered_backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connection failures and timeouts; anything else reqwest reports
/// (decoding, redirects, builder errors) will not go away on retry.
pub fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

/// First `SNIPPET_CHARS` characters of a response body, for error messages.
pub fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
