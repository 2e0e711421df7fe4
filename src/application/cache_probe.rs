use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::ports::ObjectStore;
use crate::domain::product::CacheKey;

pub const METRIC_IMAGE_CACHE_HIT: &str = "leafline_image_cache_hit_total";
pub const METRIC_IMAGE_CACHE_MISS: &str = "leafline_image_cache_miss_total";

/// Looks up previously generated images in object storage.
#[derive(Clone)]
pub struct CacheProber {
    store: Arc<dyn ObjectStore>,
}

impl CacheProber {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Returns the public address of the artifact stored under `key`, if any.
    ///
    /// A miss is a normal outcome. Probe failures are logged and reported as a
    /// miss so that generation stays available.
    pub async fn probe(&self, key: &CacheKey) -> Option<String> {
        let url = self.store.public_url(key);
        match self.store.exists(&url).await {
            Ok(true) => {
                counter!(METRIC_IMAGE_CACHE_HIT).increment(1);
                debug!(target = "leafline::images::cache", key = %key, "generated image cached");
                Some(url)
            }
            Ok(false) => {
                counter!(METRIC_IMAGE_CACHE_MISS).increment(1);
                debug!(target = "leafline::images::cache", key = %key, "generated image not cached");
                None
            }
            Err(err) => {
                counter!(METRIC_IMAGE_CACHE_MISS).increment(1);
                warn!(
                    target = "leafline::images::cache",
                    key = %key,
                    url = %url,
                    error = %err,
                    "cache probe failed; treating as miss",
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::StorageError;

    struct FixedStore {
        answer: Result<bool, &'static str>,
        probed: Mutex<Vec<String>>,
    }

    impl FixedStore {
        fn new(answer: Result<bool, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                probed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ObjectStore for FixedStore {
        fn public_url(&self, key: &CacheKey) -> String {
            format!("https://cdn.test/product-images/{key}")
        }

        async fn exists(&self, url: &str) -> Result<bool, StorageError> {
            self.probed.lock().expect("lock").push(url.to_string());
            self.answer
                .map_err(|message| StorageError::Transport(message.to_string()))
        }
    }

    #[tokio::test]
    async fn hit_returns_resolved_address() {
        let store = FixedStore::new(Ok(true));
        let prober = CacheProber::new(store.clone());
        let key = CacheKey::derive("abcdef1234", "Haze");

        let found = prober.probe(&key).await;

        assert_eq!(
            found.as_deref(),
            Some("https://cdn.test/product-images/haze-abcdef12.png")
        );
        assert_eq!(store.probed.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let prober = CacheProber::new(FixedStore::new(Ok(false)));
        assert!(prober.probe(&CacheKey::derive("id", "Haze")).await.is_none());
    }

    #[tokio::test]
    async fn transport_failure_fails_open() {
        let prober = CacheProber::new(FixedStore::new(Err("connection reset")));
        assert!(prober.probe(&CacheKey::derive("id", "Haze")).await.is_none());
    }
}
