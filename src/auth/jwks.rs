use std::time::Duration;

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use thiserror::Error;
use tracing::debug;

use super::throttle::FetchThrottle;

const CACHE_CAPACITY: u64 = 10;
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const FETCHES_PER_WINDOW: u32 = 10;
const FETCH_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set fetch limit reached")]
    Throttled,

    #[error("key set request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("no key with id {0} in key set")]
    UnknownKey(String),

    #[error("unusable key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

/// Resolves token key ids to verification keys from a JSON Web Key Set endpoint.
///
/// Keys are cached per `kid` (at most 10, for 24 hours). A miss fetches the
/// whole set; concurrent misses for the same `kid` share one fetch, and
/// fetches are limited to 10 per minute. Readers of already-cached keys never
/// wait on a fetch in progress.
pub struct JwksClient {
    url: String,
    http: reqwest::Client,
    cache: Cache<String, DecodingKey>,
    throttle: FetchThrottle,
}

impl JwksClient {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
            throttle: FetchThrottle::new(FETCHES_PER_WINDOW, FETCH_WINDOW),
        }
    }

    /// Override how many key-set fetches are allowed per window.
    pub fn with_fetch_limit(mut self, limit: u32, window: Duration) -> Self {
        self.throttle = FetchThrottle::new(limit, window);
        self
    }

    /// The verification key for `kid`, from cache or from the endpoint.
    pub async fn key(&self, kid: &str) -> Result<DecodingKey, std::sync::Arc<KeySetError>> {
        self.cache.try_get_with(kid.to_owned(), self.fetch(kid)).await
    }

    async fn fetch(&self, kid: &str) -> Result<DecodingKey, KeySetError> {
        if !self.throttle.try_acquire() {
            return Err(KeySetError::Throttled);
        }

        debug!(url = %self.url, kid, "fetching json web key set");
        let set: JwkSet = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwk = set
            .find(kid)
            .ok_or_else(|| KeySetError::UnknownKey(kid.to_owned()))?;
        Ok(DecodingKey::from_jwk(jwk)?)
    }
}
