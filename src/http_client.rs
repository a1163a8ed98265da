use crate::error::{ScrapeError, ScrapeResult};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER};
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;

/// User agents to rotate through to avoid bot detection
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
];

/// Source of listing pages and artifact bytes.
///
/// The pipeline only talks to the network through this trait, so crawls can be
/// driven from canned responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> ScrapeResult<String>;
    async fn fetch_bytes(&self, url: &str) -> ScrapeResult<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
    pub referer: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8000,
            enable_cookies: true,
            enable_gzip: true,
            referer: None,
        }
    }
}

/// HTTP client with browser-like headers and retry on transient failures
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl EnhancedHttpClient {
    pub fn new() -> ScrapeResult<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| ScrapeError::config(format!("invalid referer {:?}: {}", referer, e)))?;
            headers.insert(REFERER, value);
        }

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(Self::random_user_agent())
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    /// Exponential backoff with ±25% jitter
    fn calculate_retry_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.config.initial_retry_delay_ms;
        let max_delay = self.config.max_retry_delay_ms;

        let delay_ms = base_delay
            .saturating_mul(2u64.saturating_pow(attempt as u32))
            .min(max_delay);

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0.75..=1.25);
        Duration::from_millis((delay_ms as f64 * jitter) as u64)
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(
            status.as_u16(),
            // Rate limiting
            429 |
            // Server errors
            500 | 502 | 503 | 504 |
            // Cloudflare errors
            520..=524
        )
    }

    /// GET with retry. Non-retryable error statuses are returned as-is.
    pub async fn get_with_retry(&self, url: &str) -> ScrapeResult<Response> {
        let mut attempt = 0;
        loop {
            let request = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, Self::random_user_agent());

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) && attempt < self.config.max_retries {
                        log::warn!(
                            "Received retryable status {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let should_retry = e.is_timeout() || e.is_connect() || e.is_request();
                    if should_retry && attempt < self.config.max_retries {
                        log::warn!(
                            "Request failed for {}, attempt {}/{}: {}",
                            url,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    pub async fn get_text(&self, url: &str) -> ScrapeResult<String> {
        let response = self.get_with_retry(url).await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn get_bytes(&self, url: &str) -> ScrapeResult<Vec<u8>> {
        let response = self.get_with_retry(url).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetcher for EnhancedHttpClient {
    async fn fetch_text(&self, url: &str) -> ScrapeResult<String> {
        self.get_text(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> ScrapeResult<Vec<u8>> {
        self.get_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        assert!(EnhancedHttpClient::new().is_ok());
    }

    #[test]
    fn test_random_user_agent() {
        let ua = EnhancedHttpClient::random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[tokio::test]
    async fn test_invalid_referer_rejected() {
        let config = HttpClientConfig {
            referer: Some("bad\nreferer".to_string()),
            ..HttpClientConfig::default()
        };
        assert!(matches!(
            EnhancedHttpClient::with_config(config),
            Err(ScrapeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_delay_calculation() {
        let client = EnhancedHttpClient::new().unwrap();

        let delay0 = client.calculate_retry_delay(0);
        let delay3 = client.calculate_retry_delay(3);
        let capped = client.calculate_retry_delay(30);

        assert!(delay0.as_millis() >= 375 && delay0.as_millis() <= 625);
        assert!(delay3.as_millis() >= 3000);
        assert!(capped.as_millis() <= 10_000);
    }

    #[test]
    fn test_retryable_status() {
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::FORBIDDEN));
    }
}
