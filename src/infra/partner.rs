//! HTTP client for the partner read API.

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use url::Url;

use crate::application::ports::{PartnerApi, PartnerError, PartnerResponse, SignedRequest};

use super::error::InfraError;

pub const API_KEY_HEADER: &str = "x-auth-apikey";
pub const SIGNATURE_HEADER: &str = "x-auth-signature";

#[derive(Debug, Clone)]
pub struct HttpPartnerApi {
    client: Client,
    base: String,
}

impl HttpPartnerApi {
    /// The probe bounds each call itself, so the client carries no timeout.
    pub fn new(base: &Url) -> Result<Self, InfraError> {
        let client = Client::builder().user_agent(super::user_agent()).build()?;
        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// The query string is appended verbatim so the bytes match the signature.
    fn url(&self, request: &SignedRequest) -> String {
        format!("{}{}?{}", self.base, request.path, request.query)
    }
}

#[async_trait]
impl PartnerApi for HttpPartnerApi {
    async fn get(&self, request: &SignedRequest) -> Result<PartnerResponse, PartnerError> {
        let response = self
            .client
            .get(self.url(request))
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, request.api_key.as_str())
            .header(SIGNATURE_HEADER, request.signature.as_str())
            .send()
            .await
            .map_err(|err| PartnerError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| PartnerError::Transport(err.to_string()))?;
        Ok(PartnerResponse { status, body })
    }
}
