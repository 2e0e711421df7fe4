#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Response};
use http_body_util::BodyExt;
use leafline::application::generated_image::ImageWorkflow;
use leafline::application::health::{HealthCheck, HealthProbe, PartnerCredentials};
use leafline::application::ports::{
    GatewayError, GenerationGateway, GenerationResponse, ObjectStore, PartnerApi, PartnerError,
    PartnerResponse, SignedRequest, StorageError,
};
use leafline::domain::product::{CacheKey, ProductImageRequest};
use leafline::infra::http::{HealthState, ImageState, RouterState, build_router};
use serde_json::Value;

pub const STORAGE_BASE: &str = "https://storage.test/storage/v1/object/public/product-images";

/// Object store backed by a set of present keys.
#[derive(Default)]
pub struct MemoryStore {
    present: Mutex<HashSet<String>>,
    probes: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_key(key: &CacheKey) -> Self {
        let store = Self::default();
        store.insert(key);
        store
    }

    pub fn insert(&self, key: &CacheKey) {
        lock(&self.present).insert(format!("{STORAGE_BASE}/{key}"));
    }

    pub fn probes(&self) -> usize {
        *lock(&self.probes)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn public_url(&self, key: &CacheKey) -> String {
        format!("{STORAGE_BASE}/{key}")
    }

    async fn exists(&self, url: &str) -> Result<bool, StorageError> {
        *lock(&self.probes) += 1;
        Ok(lock(&self.present).contains(url))
    }
}

/// Gateway that answers every call with the same response.
pub struct ScriptedGateway {
    response: Result<GenerationResponse, Option<String>>,
    calls: Mutex<Vec<ProductImageRequest>>,
}

impl ScriptedGateway {
    pub fn image(url: &str) -> Self {
        Self::new(Ok(GenerationResponse {
            image_url: Some(url.to_string()),
            error: None,
        }))
    }

    pub fn business_error(message: &str) -> Self {
        Self::new(Ok(GenerationResponse {
            image_url: None,
            error: Some(message.to_string()),
        }))
    }

    pub fn unreachable(message: &str) -> Self {
        Self::new(Err(Some(message.to_string())))
    }

    /// Transport failure carrying no message at all.
    pub fn silent_failure() -> Self {
        Self::new(Err(None))
    }

    fn new(response: Result<GenerationResponse, Option<String>>) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProductImageRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn invoke(
        &self,
        request: &ProductImageRequest,
    ) -> Result<GenerationResponse, GatewayError> {
        lock(&self.calls).push(request.clone());
        self.response
            .clone()
            .map_err(|message| GatewayError::Unreachable { message })
    }
}

/// Partner API returning a fixed status and body.
pub struct StubPartner {
    status: u16,
    body: String,
    requests: Mutex<Vec<SignedRequest>>,
}

impl StubPartner {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SignedRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PartnerApi for StubPartner {
    async fn get(&self, request: &SignedRequest) -> Result<PartnerResponse, PartnerError> {
        lock(&self.requests).push(request.clone());
        Ok(PartnerResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub partner: Arc<StubPartner>,
}

pub fn app(
    store: MemoryStore,
    gateway: ScriptedGateway,
    partner: StubPartner,
    credentials: PartnerCredentials,
    auto_generate: bool,
) -> TestApp {
    let store = Arc::new(store);
    let gateway = Arc::new(gateway);
    let partner = Arc::new(partner);

    let state = RouterState {
        health: HealthState {
            probe: Arc::new(HealthProbe::new(partner.clone(), credentials)),
        },
        images: ImageState {
            workflow: Arc::new(ImageWorkflow::new(store.clone(), gateway.clone())),
            auto_generate,
        },
    };

    TestApp {
        router: build_router(state),
        store,
        gateway,
        partner,
    }
}

/// Router whose health endpoint is served by `health` instead of a real probe.
pub fn router_with_health(health: Arc<dyn HealthCheck>) -> Router {
    let workflow = ImageWorkflow::new(
        Arc::new(MemoryStore::default()),
        Arc::new(ScriptedGateway::image("unused")),
    );
    build_router(RouterState {
        health: HealthState { probe: health },
        images: ImageState {
            workflow: Arc::new(workflow),
            auto_generate: false,
        },
    })
}

pub fn credentials() -> PartnerCredentials {
    PartnerCredentials::new(Some("api-key".into()), Some("private-key".into()))
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be json")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}
