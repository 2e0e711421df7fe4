//! HTTP client for the hosted function that generates product images.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::AUTHORIZATION};
use serde::Deserialize;
use url::Url;

use crate::application::ports::{GatewayError, GenerationGateway, GenerationResponse};
use crate::domain::product::ProductImageRequest;

use super::error::InfraError;

/// Error body returned by the function host on non-success statuses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FailureBody {
    error: Option<String>,
    message: Option<String>,
}

/// Invokes `{base}/functions/v1/{function}` with the product as JSON.
#[derive(Debug, Clone)]
pub struct FunctionsGateway {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl FunctionsGateway {
    pub fn new(
        base: &Url,
        function: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(super::user_agent())
            .timeout(timeout)
            .build()?;
        let endpoint = format!(
            "{}/functions/v1/{}",
            base.as_str().trim_end_matches('/'),
            function
        );
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationGateway for FunctionsGateway {
    async fn invoke(
        &self,
        request: &ProductImageRequest,
    ) -> Result<GenerationResponse, GatewayError> {
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(token) = self.token.as_deref() {
            call = call.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = call.send().await.map_err(|err| GatewayError::Unreachable {
            message: Some(err.to_string()),
        })?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Unreachable {
                message: Some(err.to_string()),
            })?;

        if !status.is_success() {
            let body: FailureBody = serde_json::from_slice(&bytes).unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: body.error.or(body.message),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| GatewayError::Unreachable {
            message: Some(format!("failed to parse generation response: {err}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn gateway(server: &MockServer, token: Option<&str>) -> FunctionsGateway {
        let base = Url::parse(&server.base_url()).expect("base url");
        FunctionsGateway::new(
            &base,
            "generate-product-image",
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .expect("gateway")
    }

    fn request() -> ProductImageRequest {
        ProductImageRequest::new("abc12345", "Haze", Some("https://img/haze.jpg".into()))
    }

    #[tokio::test]
    async fn posts_product_and_reads_image_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/functions/v1/generate-product-image")
                    .header("authorization", "Bearer anon-token")
                    .json_body(json!({
                        "productId": "abc12345",
                        "productName": "Haze",
                        "originalImageUrl": "https://img/haze.jpg",
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"imageUrl": "https://cdn/haze.png"}));
            })
            .await;

        let response = gateway(&server, Some("anon-token"))
            .invoke(&request())
            .await
            .expect("invoke");

        assert_eq!(response.image_url.as_deref(), Some("https://cdn/haze.png"));
        assert!(response.error.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn business_error_is_passed_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).json_body(json!({"error": "quota exceeded"}));
            })
            .await;

        let response = gateway(&server, None).invoke(&request()).await.expect("invoke");
        assert_eq!(response.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected_with_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(500).json_body(json!({"message": "function crashed"}));
            })
            .await;

        let err = gateway(&server, None)
            .invoke(&request())
            .await
            .expect_err("500 is rejected");

        match err {
            GatewayError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.as_deref(), Some("function crashed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_failure_has_no_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = gateway(&server, None)
            .invoke(&request())
            .await
            .expect_err("502 is rejected");

        assert!(matches!(
            err,
            GatewayError::Rejected {
                status: 502,
                message: None
            }
        ));
    }

    #[tokio::test]
    async fn malformed_success_body_is_unreachable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).body("not json");
            })
            .await;

        let err = gateway(&server, None)
            .invoke(&request())
            .await
            .expect_err("unparsable body");
        assert!(matches!(err, GatewayError::Unreachable { message: Some(_) }));
    }
}
