//! Public object storage holding generated product images.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::application::ports::{ObjectStore, StorageError};
use crate::domain::product::CacheKey;

use super::error::InfraError;

/// Object store reached through its public HTTP interface.
#[derive(Debug, Clone)]
pub struct PublicObjectStore {
    client: Client,
    base: String,
    bucket: String,
}

impl PublicObjectStore {
    pub fn new(base: &Url, bucket: &str, probe_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(super::user_agent())
            .timeout(probe_timeout)
            .build()?;
        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for PublicObjectStore {
    fn public_url(&self, key: &CacheKey) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base, self.bucket, key
        )
    }

    async fn exists(&self, url: &str) -> Result<bool, StorageError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn store(server: &MockServer) -> PublicObjectStore {
        let base = Url::parse(&server.base_url()).expect("base url");
        PublicObjectStore::new(&base, "product-images", Duration::from_secs(5)).expect("store")
    }

    #[test]
    fn public_url_is_built_without_io() {
        let base = Url::parse("https://project.example.co/").expect("url");
        let store = PublicObjectStore::new(&base, "product-images", Duration::from_secs(5))
            .expect("store");
        let key = CacheKey::derive("abcdef1234", "Blue Dream");

        assert_eq!(
            store.public_url(&key),
            "https://project.example.co/storage/v1/object/public/product-images/blue-dream-abcdef12.png"
        );
    }

    #[tokio::test]
    async fn head_success_means_present() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("HEAD")
                    .path("/storage/v1/object/public/product-images/haze-abc.png");
                then.status(200);
            })
            .await;

        let store = store(&server);
        let url = store.public_url(&CacheKey::derive("abc", "Haze"));

        assert!(store.exists(&url).await.expect("probe"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_means_absent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("HEAD");
                then.status(404);
            })
            .await;

        let store = store(&server);
        let url = store.public_url(&CacheKey::derive("abc", "Haze"));

        assert!(!store.exists(&url).await.expect("probe"));
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        let base = Url::parse("http://127.0.0.1:9/").expect("url");
        let store = PublicObjectStore::new(&base, "product-images", Duration::from_secs(2))
            .expect("store");
        let url = store.public_url(&CacheKey::derive("abc", "Haze"));

        assert!(matches!(
            store.exists(&url).await,
            Err(StorageError::Transport(_))
        ));
    }
}
