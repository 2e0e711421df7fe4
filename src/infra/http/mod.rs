mod health;
mod images;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    middleware as axum_middleware,
    routing::{any, get, post},
};

use crate::application::generated_image::ImageWorkflow;
use crate::application::health::HealthCheck;

use self::middleware::{log_responses, set_request_context};

pub use self::middleware::{REQUEST_ID_HEADER, RequestContext};

/// Health endpoint dependencies.
#[derive(Clone)]
pub struct HealthState {
    pub probe: Arc<dyn HealthCheck>,
}

/// Image surface dependencies.
#[derive(Clone)]
pub struct ImageState {
    pub workflow: Arc<ImageWorkflow>,
    /// Default for `?auto=` when the query leaves it out.
    pub auto_generate: bool,
}

#[derive(Clone)]
pub struct RouterState {
    pub health: HealthState,
    pub images: ImageState,
}

impl FromRef<RouterState> for HealthState {
    fn from_ref(state: &RouterState) -> Self {
        state.health.clone()
    }
}

impl FromRef<RouterState> for ImageState {
    fn from_ref(state: &RouterState) -> Self {
        state.images.clone()
    }
}

pub fn build_router(state: RouterState) -> Router {
    Router::new()
        .route("/health", any(health::health))
        .route("/images/{product_id}", get(images::show_image))
        .route("/images/{product_id}/generate", post(images::generate_image))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
