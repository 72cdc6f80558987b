//! HTTP fetch layer: courtesy delay, bounded retries on transient failures,
//! and a content hash in the log for every download.

use std::future::Future;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;

/// Anything that can turn a URL into bytes.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the random delay added to `base_delay`.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Large downloads: 4 attempts, 0.8 s plus up to 1 s between them.
    pub fn download() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(800),
            jitter: Duration::from_secs(1),
        }
    }

    /// Small JSON API calls: 2 attempts, 0.5 s apart.
    pub fn api() -> Self {
        Self {
            attempts: 2,
            base_delay: Duration::from_millis(500),
            jitter: Duration::ZERO,
        }
    }

    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    fn delay(&self) -> Duration {
        self.base_delay + self.jitter.mul_f64(rand::random::<f64>())
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts run out.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.delay();
                    warn!(attempt, attempts, ?delay, error = %err, "transient fetch failure, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::download()
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    rate_limit: Duration,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            rate_limit: config.rate_limit(),
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn get_once(&self, url: &str, attempt: u32) -> Result<Vec<u8>, FetchError> {
        // Rate limit: wait before request
        sleep(self.rate_limit).await;
        debug!(url, attempt, "GET");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(bytes.to_vec())
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self.policy.run(|attempt| self.get_once(url, attempt)).await?;
        let content_hash = format!("sha256:{:x}", Sha256::digest(&bytes));
        info!(url, size = bytes.len(), hash = %content_hash, "downloaded");
        Ok(bytes)
    }
}
