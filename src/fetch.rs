//! Rate-limited HTTP fetching with retry and backoff.
//!
//! All outbound traffic goes through one [`Fetcher`] built from an immutable
//! [`RequestConfig`]: fixed identification headers, a bounded retry loop, and
//! a fixed pause after every completed request to keep the request rate
//! polite toward the origin server.
//!
//! # Retry Strategy
//!
//! - Terminal status codes (403, 404 by default) return immediately without
//!   retry; the site genuinely lacks the resource.
//! - Transient failures (timeouts, other non-200 codes, connection errors)
//!   retry with exponential backoff starting at `backoff_base`, capped at
//!   `backoff_cap`, with random jitter (0-250ms) added to each delay.
//! - After `max_attempts` tries the last observed status or error is returned.

use rand::{rng, Rng};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Immutable request configuration passed to the [`Fetcher`].
///
/// Defaults match what the target sites are known to accept; override fields
/// before constructing the fetcher if a run needs different pacing.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// `Accept-Language` header sent with every request.
    pub accept_language: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Fixed pause applied after every completed request, whatever the outcome.
    pub pause: Duration,
    /// Total tries per URL, first attempt included.
    pub max_attempts: usize,
    /// Initial retry delay; doubles with each attempt.
    pub backoff_base: Duration,
    /// Upper bound on a single retry delay.
    pub backoff_cap: Duration,
    /// Status codes returned immediately without retry.
    pub terminal_statuses: Vec<u16>,
    /// Fan-out width for one discovery batch.
    pub max_concurrency: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            timeout: Duration::from_secs(20),
            pause: Duration::from_millis(800),
            max_attempts: 4,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            terminal_statuses: vec![403, 404],
            max_concurrency: 8,
        }
    }
}

/// Backoff delay for a just-failed attempt (1-based), jitter excluded.
fn backoff_delay(config: &RequestConfig, attempt: usize) -> Duration {
    let delay = config.backoff_base.saturating_mul(1u32 << (attempt - 1).min(16));
    delay.min(config.backoff_cap)
}

/// A successfully fetched page body with its response metadata.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Whether the payload is gzip, by declared content type or magic bytes.
    /// Sitemaps are sometimes served compressed even under an `.xml` URL.
    pub fn looks_gzipped(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.ends_with("gzip"))
            || self.bytes.starts_with(&[0x1f, 0x8b])
    }
}

/// Failure after the retry policy has run its course.
#[derive(Debug)]
pub enum FetchError {
    /// A terminal status code; not retried.
    Terminal { status: u16 },
    /// All attempts exhausted; tagged with the last observed status or error.
    Exhausted {
        attempts: usize,
        last_status: Option<u16>,
        last_error: Option<String>,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Terminal { status } => write!(f, "terminal status {status}"),
            FetchError::Exhausted {
                attempts,
                last_status,
                last_error,
            } => {
                write!(f, "exhausted {attempts} attempts")?;
                if let Some(s) = last_status {
                    write!(f, ", last status {s}")?;
                }
                if let Some(e) = last_error {
                    write!(f, ", last error: {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for FetchError {}

/// HTTP client wrapper enforcing the retry policy and inter-request pause.
pub struct Fetcher {
    client: Client,
    config: RequestConfig,
}

impl Fetcher {
    pub fn new(config: RequestConfig) -> Result<Self, Box<dyn Error>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Fetch one URL under the retry policy.
    ///
    /// Returns the page on a 200, [`FetchError::Terminal`] immediately on a
    /// terminal status, and [`FetchError::Exhausted`] once attempts run out.
    /// The configured pause is awaited before returning, whatever the outcome.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;

        let outcome = loop {
            attempt += 1;
            match self.try_get(url).await {
                Ok(page) if page.status == 200 => break Ok(page),
                Ok(page) if self.config.terminal_statuses.contains(&page.status) => {
                    debug!(url, status = page.status, "Terminal status; not retrying");
                    break Err(FetchError::Terminal { status: page.status });
                }
                Ok(page) => {
                    last_status = Some(page.status);
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            if attempt >= self.config.max_attempts {
                break Err(FetchError::Exhausted {
                    attempts: attempt,
                    last_status,
                    last_error: last_error.take(),
                });
            }

            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = backoff_delay(&self.config, attempt) + Duration::from_millis(jitter_ms);
            warn!(
                url,
                attempt,
                max = self.config.max_attempts,
                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                ?delay,
                last_status,
                "Request attempt failed; backing off"
            );
            sleep(delay).await;
        };

        sleep(self.config.pause).await;
        outcome
    }

    async fn try_get(&self, url: &str) -> Result<FetchedPage, reqwest::Error> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        Ok(FetchedPage {
            status,
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_identification_headers() {
        let config = RequestConfig::default();
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.accept_language.starts_with("es-ES"));
        assert_eq!(config.terminal_statuses, vec![403, 404]);
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn backoff_grows_per_attempt_and_caps() {
        let config = RequestConfig::default();
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 6), Duration::from_secs(30));
        assert_eq!(backoff_delay(&config, 40), Duration::from_secs(30));
    }

    #[test]
    fn gzip_detection_checks_header_and_magic() {
        let by_header = FetchedPage {
            status: 200,
            bytes: b"<urlset/>".to_vec(),
            content_type: Some("application/x-gzip".to_string()),
        };
        assert!(by_header.looks_gzipped());

        let by_magic = FetchedPage {
            status: 200,
            bytes: vec![0x1f, 0x8b, 0x08, 0x00],
            content_type: Some("application/xml".to_string()),
        };
        assert!(by_magic.looks_gzipped());

        let plain = FetchedPage {
            status: 200,
            bytes: b"<urlset/>".to_vec(),
            content_type: Some("application/xml".to_string()),
        };
        assert!(!plain.looks_gzipped());
    }

    #[test]
    fn fetch_error_display_tags_last_status() {
        let e = FetchError::Exhausted {
            attempts: 4,
            last_status: Some(500),
            last_error: None,
        };
        assert_eq!(e.to_string(), "exhausted 4 attempts, last status 500");
        assert_eq!(
            FetchError::Terminal { status: 404 }.to_string(),
            "terminal status 404"
        );
    }
}
