//! The fetch client: robots consult, politeness delay, classified retries.

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

use stagesignal_core::AppConfig;

use crate::error::{ErrorCategory, FetchError};
use crate::retry::RetryPolicy;
use crate::robots::{RobotsCache, RobotsPolicy};

/// A successful fetch with metadata about the work it took.
#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    /// Request attempts made, including the successful one.
    pub attempts: u32,
    /// Cumulative politeness + backoff wait, milliseconds.
    pub total_wait_ms: u64,
}

impl FetchResponse {
    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] with category [`ErrorCategory::Parse`] when
    /// the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError {
            category: ErrorCategory::Parse,
            message: format!("response body did not parse: {e}"),
            attempts: self.attempts,
            total_wait_ms: self.total_wait_ms,
        })
    }
}

/// HTTP client with ethical-scraping safeguards.
///
/// One instance owns one robots.txt cache; build it once per pipeline run
/// and share it across collectors.
pub struct FetchClient {
    client: reqwest::Client,
    user_agent: String,
    politeness_ms: (u64, u64),
    policy: RetryPolicy,
    robots: RobotsCache,
    check_robots: bool,
}

impl FetchClient {
    /// Creates a client with explicit knobs. `politeness_ms` is the
    /// `(min, max)` randomized pre-request delay window.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCategory::Unknown`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        user_agent: &str,
        timeout_secs: u64,
        politeness_ms: (u64, u64),
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        // An inverted window would panic when sampling the delay.
        let politeness_ms = if politeness_ms.0 > politeness_ms.1 {
            (politeness_ms.1, politeness_ms.0)
        } else {
            politeness_ms
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError {
                category: ErrorCategory::Unknown,
                message: format!("failed to build HTTP client: {e}"),
                attempts: 0,
                total_wait_ms: 0,
            })?;

        Ok(Self {
            client,
            user_agent: user_agent.to_owned(),
            politeness_ms,
            policy,
            robots: RobotsCache::new(),
            check_robots: true,
        })
    }

    /// Creates a client from the application config.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.fetch_user_agent,
            config.fetch_timeout_secs,
            (config.politeness_min_ms, config.politeness_max_ms),
            RetryPolicy {
                max_attempts: config.fetch_max_attempts,
                backoff_base_ms: config.fetch_backoff_base_ms,
                max_backoff_ms: config.fetch_max_backoff_ms,
            },
        )
    }

    /// Disable the robots.txt consult. Only for sources whose published API
    /// terms sanction programmatic access (e.g. the Wikimedia REST API).
    #[must_use]
    pub fn without_robots(mut self) -> Self {
        self.check_robots = false;
        self
    }

    /// Preload a robots policy for an origin, bypassing the network fetch.
    /// Used by tests for deterministic cache state.
    pub async fn preload_robots(&self, origin: &str, policy: RobotsPolicy) {
        self.robots.insert(origin.to_owned(), Some(policy)).await;
    }

    /// Fetch `url` with robots consult, politeness delay, and retries.
    ///
    /// 2xx returns a [`FetchResponse`]. 429 and 5xx are retried per the
    /// policy and surface as `RateLimited` / `ServerError` once exhausted;
    /// other 4xx fail immediately as `ClientError`; timeouts and connection
    /// errors are retried as `Timeout` / `Network`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] carrying the category, attempts made, and
    /// cumulative wait.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        if self.check_robots && !self.robots_allowed(url).await {
            tracing::warn!(url, "blocked by robots.txt");
            return Err(FetchError::blocked(url));
        }

        let mut attempts = 0u32;
        let mut total_wait_ms = 0u64;
        let max_attempts = self.policy.max_attempts.max(1);

        loop {
            total_wait_ms += self.politeness_sleep().await;
            attempts += 1;

            let (category, message) = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                tracing::debug!(url, status = status.as_u16(), attempts, "fetch ok");
                                return Ok(FetchResponse {
                                    status: status.as_u16(),
                                    body,
                                    attempts,
                                    total_wait_ms,
                                });
                            }
                            // The connection can drop mid-body; that is a
                            // retriable network failure, not an empty 2xx.
                            Err(e) => (ErrorCategory::Network, format!("body read failed: {e}")),
                        }
                    } else {
                        let category = if status.as_u16() == 429 {
                            ErrorCategory::RateLimited
                        } else if status.is_server_error() {
                            ErrorCategory::ServerError
                        } else {
                            ErrorCategory::ClientError
                        };
                        (category, format!("HTTP {} from {url}", status.as_u16()))
                    }
                }
                Err(e) => {
                    let category = if e.is_timeout() {
                        ErrorCategory::Timeout
                    } else if e.is_connect() || e.is_request() {
                        ErrorCategory::Network
                    } else {
                        ErrorCategory::Unknown
                    };
                    (category, e.to_string())
                }
            };

            if !category.is_retriable() || attempts >= max_attempts {
                return Err(FetchError {
                    category,
                    message,
                    attempts,
                    total_wait_ms,
                });
            }

            let delay_ms = self.policy.backoff_ms(attempts - 1);
            tracing::warn!(
                url,
                attempt = attempts,
                max_attempts,
                delay_ms,
                category = %category,
                "transient fetch error; retrying after backoff"
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            total_wait_ms += delay_ms;
        }
    }

    /// Like [`FetchClient::fetch`], but swallows the failure and returns
    /// `None`. For optional sources where a miss should not stop the run.
    pub async fn fetch_safe(&self, url: &str) -> Option<FetchResponse> {
        match self.fetch(url).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(url, error = %e, "fetch failed (suppressed)");
                None
            }
        }
    }

    /// Consult the cached robots policy for the URL's origin, fetching and
    /// caching robots.txt on first contact. Unreachable robots.txt is
    /// recorded as "no policy" and treated as allowed.
    async fn robots_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            // Unparseable URLs fail later in fetch with a clearer error.
            return true;
        };
        let origin = parsed.origin().ascii_serialization();
        let path = parsed.path().to_owned();

        let cached = self.robots.get(&origin).await;
        let policy = match cached {
            Some(policy) => policy,
            None => {
                let policy = self.fetch_robots(&origin).await;
                self.robots.insert(origin.clone(), policy.clone()).await;
                policy
            }
        };

        policy.is_none_or(|p| p.is_allowed(&self.user_agent, &path))
    }

    async fn fetch_robots(&self, origin: &str) -> Option<RobotsPolicy> {
        let robots_url = format!("{origin}/robots.txt");
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await.ok()?;
                tracing::debug!(robots_url, "loaded robots.txt");
                Some(RobotsPolicy::parse(&text))
            }
            Ok(response) => {
                tracing::debug!(
                    robots_url,
                    status = response.status().as_u16(),
                    "robots.txt not available; assuming allowed"
                );
                None
            }
            Err(e) => {
                tracing::warn!(robots_url, error = %e, "could not fetch robots.txt; assuming allowed");
                None
            }
        }
    }

    async fn politeness_sleep(&self) -> u64 {
        let (min, max) = self.politeness_ms;
        if max == 0 {
            return 0;
        }
        let delay_ms = rand::rng().random_range(min..=max);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        delay_ms
    }
}
