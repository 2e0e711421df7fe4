use std::sync::Arc;

use metrics::counter;
use tracing::{error, info};

use crate::application::ports::{GatewayError, GenerationGateway, GenerationResponse};
use crate::domain::error::DomainError;
use crate::domain::product::ProductImageRequest;

pub const METRIC_IMAGE_GENERATION: &str = "leafline_image_generation_total";

/// Used when the gateway fails with a status but no message.
pub const GATEWAY_FAILURE_MESSAGE: &str = "Failed to generate image";
/// Used when the call fails without any message.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";
/// Used when the job reports success without an image address.
pub const EMPTY_RESPONSE_MESSAGE: &str = "Image generation returned no image";

/// Result of one generation job, before it is collapsed into a display error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    /// The job ran and reported a business error.
    BusinessError(String),
    /// The job could not be reached or answered unusably.
    TransportError(String),
}

impl GenerationOutcome {
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Success(url) => Ok(url),
            Self::BusinessError(message) | Self::TransportError(message) => Err(message),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::BusinessError(_) => "business_error",
            Self::TransportError(_) => "transport_error",
        }
    }
}

/// Triggers the remote image-generation job for a product.
#[derive(Clone)]
pub struct GenerationInvoker {
    gateway: Arc<dyn GenerationGateway>,
}

impl GenerationInvoker {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }

    /// Runs one generation job. Only input validation fails the call; every
    /// remote failure is folded into the returned outcome.
    pub async fn invoke(
        &self,
        request: &ProductImageRequest,
    ) -> Result<GenerationOutcome, DomainError> {
        request.validate()?;

        let outcome = classify(self.gateway.invoke(request).await);
        counter!(METRIC_IMAGE_GENERATION, "outcome" => outcome.label()).increment(1);

        match &outcome {
            GenerationOutcome::Success(url) => info!(
                target = "leafline::images::generation",
                product_id = %request.product_id,
                image_url = %url,
                "image generated",
            ),
            GenerationOutcome::BusinessError(message) | GenerationOutcome::TransportError(message) => {
                error!(
                    target = "leafline::images::generation",
                    product_id = %request.product_id,
                    outcome = outcome.label(),
                    error = %message,
                    "image generation failed",
                )
            }
        }

        Ok(outcome)
    }
}

fn classify(result: Result<GenerationResponse, GatewayError>) -> GenerationOutcome {
    match result {
        Ok(response) => {
            if let Some(message) = non_empty(response.error) {
                GenerationOutcome::BusinessError(message)
            } else if let Some(url) = non_empty(response.image_url) {
                GenerationOutcome::Success(url)
            } else {
                GenerationOutcome::TransportError(EMPTY_RESPONSE_MESSAGE.to_string())
            }
        }
        Err(GatewayError::Rejected { message, .. }) => GenerationOutcome::TransportError(
            non_empty(message).unwrap_or_else(|| GATEWAY_FAILURE_MESSAGE.to_string()),
        ),
        Err(GatewayError::Unreachable { message }) => GenerationOutcome::TransportError(
            non_empty(message).unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        ),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
