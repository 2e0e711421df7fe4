//! Port traits describing the remote services the workflows depend on.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::product::{CacheKey, ProductImageRequest};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(String),
}

/// Object storage holding generated images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Public address of `key`. Pure; performs no I/O.
    fn public_url(&self, key: &CacheKey) -> String;

    /// Metadata-only existence probe of a public address.
    async fn exists(&self, url: &str) -> Result<bool, StorageError>;
}

/// Body returned by the generation job. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status.
    #[error("generation gateway returned status {status}")]
    Rejected { status: u16, message: Option<String> },
    /// The call never produced a usable response.
    #[error("generation gateway unreachable")]
    Unreachable { message: Option<String> },
}

/// Remote job gateway running `generate-product-image`.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn invoke(&self, request: &ProductImageRequest)
    -> Result<GenerationResponse, GatewayError>;
}

/// A signed, read-only partner request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub path: &'static str,
    /// Literal query string, sent byte-for-byte as signed.
    pub query: &'static str,
    pub api_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerResponse {
    pub status: u16,
    pub body: String,
}

impl PartnerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum PartnerError {
    #[error("{0}")]
    Transport(String),
}

/// Partner read API.
#[async_trait]
pub trait PartnerApi: Send + Sync {
    async fn get(&self, request: &SignedRequest) -> Result<PartnerResponse, PartnerError>;
}
