//! Generated-image session: cache check, optional generation, manual trigger.
//!
//! A session owns one [`GeneratedImageState`] published through a
//! `tokio::sync::watch` channel. Every transition runs inside the channel's
//! write lock together with the session's epoch and liveness checks, so a
//! result computed for a previous product (or after [`ImageSession::unmount`])
//! is dropped instead of applied.
//!
//! ```text
//! Init -> CheckingCache -> Ready(cached)
//!                       -> Idle --trigger--> Generating -> Ready(generated)
//!                       -> Generating (auto)            -> Failed
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{Instrument, debug, info_span};

use crate::application::cache_probe::CacheProber;
use crate::application::generation::GenerationInvoker;
use crate::application::ports::{GenerationGateway, ObjectStore};
use crate::domain::product::ProductImageRequest;

/// Observable state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageState {
    pub image_url: Option<String>,
    pub is_loading: bool,
    pub is_generating: bool,
    pub error: Option<String>,
}

impl GeneratedImageState {
    fn checking_cache() -> Self {
        Self {
            image_url: None,
            is_loading: true,
            is_generating: false,
            error: None,
        }
    }

    pub fn phase(&self) -> ImagePhase {
        if self.is_loading {
            ImagePhase::CheckingCache
        } else if self.is_generating {
            ImagePhase::Generating
        } else if self.image_url.is_some() {
            ImagePhase::Ready
        } else if self.error.is_some() {
            ImagePhase::Failed
        } else {
            ImagePhase::Idle
        }
    }
}

/// Coarse phase derived from a [`GeneratedImageState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePhase {
    CheckingCache,
    Idle,
    Generating,
    Ready,
    Failed,
}

/// Shared collaborators used by every session.
#[derive(Clone)]
pub struct ImageWorkflow {
    prober: CacheProber,
    invoker: GenerationInvoker,
}

impl ImageWorkflow {
    pub fn new(store: Arc<dyn ObjectStore>, gateway: Arc<dyn GenerationGateway>) -> Self {
        Self {
            prober: CacheProber::new(store),
            invoker: GenerationInvoker::new(gateway),
        }
    }

    pub fn prober(&self) -> &CacheProber {
        &self.prober
    }

    pub fn invoker(&self) -> &GenerationInvoker {
        &self.invoker
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Cache miss with auto-generation enabled; leaves `CheckingCache`.
    Auto,
    /// Explicit caller request; only valid outside `CheckingCache`.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Started,
    /// Validation failed; the error is already in state.
    Rejected,
    Refused,
}

struct Control {
    epoch: u64,
    alive: bool,
    request: ProductImageRequest,
}

struct SessionInner {
    workflow: Arc<ImageWorkflow>,
    auto_generate: bool,
    control: Mutex<Control>,
    state: watch::Sender<GeneratedImageState>,
}

/// One mounted generated-image view.
#[derive(Clone)]
pub struct ImageSession {
    inner: Arc<SessionInner>,
}

impl ImageSession {
    /// Creates a session in `CheckingCache` without starting any work.
    pub fn new(
        workflow: Arc<ImageWorkflow>,
        request: ProductImageRequest,
        auto_generate: bool,
    ) -> Self {
        let (state, _) = watch::channel(GeneratedImageState::checking_cache());
        Self {
            inner: Arc::new(SessionInner {
                workflow,
                auto_generate,
                control: Mutex::new(Control {
                    epoch: 0,
                    alive: true,
                    request,
                }),
                state,
            }),
        }
    }

    /// Creates a session and starts the cache check on the current runtime.
    pub fn mount(
        workflow: Arc<ImageWorkflow>,
        request: ProductImageRequest,
        auto_generate: bool,
    ) -> Self {
        let session = Self::new(workflow, request, auto_generate);
        session.spawn_load();
        session
    }

    pub fn state(&self) -> GeneratedImageState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GeneratedImageState> {
        self.inner.state.subscribe()
    }

    pub fn request(&self) -> ProductImageRequest {
        self.control().request.clone()
    }

    /// Runs the cache check (and auto-generation on a miss) for the current product.
    pub async fn load(&self) {
        if let Some((epoch, request)) = self.snapshot() {
            self.run_load(epoch, request).await;
        }
    }

    /// Manual trigger. Ignored while the cache check or a generation is running.
    pub async fn generate(&self) {
        if let Some((epoch, request)) = self.snapshot() {
            self.run_generate(epoch, request, Trigger::Manual).await;
        }
    }

    /// Switches the session to another product.
    ///
    /// A different id or name restarts the workflow from the cache check and
    /// discards anything still in flight for the previous product. Returns
    /// whether a restart happened.
    pub fn set_request(&self, request: ProductImageRequest) -> bool {
        let mut restarted = false;
        self.inner.state.send_if_modified(|view| {
            let mut control = self.control();
            if !control.alive {
                return false;
            }
            if control.request.same_identity(&request) {
                control.request = request;
                return false;
            }
            control.epoch += 1;
            control.request = request;
            *view = GeneratedImageState::checking_cache();
            restarted = true;
            true
        });

        if restarted {
            self.spawn_load();
        }
        restarted
    }

    /// Stops publishing updates. Work already in flight runs to completion.
    pub fn unmount(&self) {
        self.inner.state.send_if_modified(|_| {
            self.control().alive = false;
            false
        });
    }

    fn spawn_load(&self) {
        let Some((epoch, request)) = self.snapshot() else {
            return;
        };
        let span = info_span!("image_session", product_id = %request.product_id, epoch);
        let session = self.clone();
        tokio::spawn(async move { session.run_load(epoch, request).await }.instrument(span));
    }

    async fn run_load(&self, epoch: u64, request: ProductImageRequest) {
        let cached = if request.product_id.is_empty() {
            None
        } else {
            self.inner
                .workflow
                .prober()
                .probe(&request.cache_key())
                .await
        };

        match cached {
            Some(url) => {
                self.apply(epoch, |view| {
                    view.image_url = Some(url);
                    view.is_loading = false;
                });
            }
            None if self.inner.auto_generate => {
                self.run_generate(epoch, request, Trigger::Auto).await;
            }
            None => {
                self.apply(epoch, |view| view.is_loading = false);
            }
        }
    }

    async fn run_generate(&self, epoch: u64, request: ProductImageRequest, trigger: Trigger) {
        match self.begin_generation(epoch, &request, trigger) {
            Admission::Started => {}
            Admission::Rejected => return,
            Admission::Refused => {
                debug!(
                    target = "leafline::images::session",
                    product_id = %request.product_id,
                    "generation trigger ignored",
                );
                return;
            }
        }

        let result = match self.inner.workflow.invoker().invoke(&request).await {
            Ok(outcome) => outcome.into_result(),
            Err(err) => Err(err.message().to_string()),
        };

        self.apply(epoch, |view| {
            view.is_generating = false;
            match result {
                Ok(url) => {
                    view.image_url = Some(url);
                    view.error = None;
                }
                Err(message) => view.error = Some(message),
            }
        });
    }

    /// Atomically enters `Generating`.
    ///
    /// Re-entrant and premature triggers are refused before the request is
    /// validated, so they leave the state untouched.
    fn begin_generation(
        &self,
        epoch: u64,
        request: &ProductImageRequest,
        trigger: Trigger,
    ) -> Admission {
        let mut admission = Admission::Refused;
        self.inner.state.send_if_modified(|view| {
            if !self.is_current(epoch) || view.is_generating {
                return false;
            }
            if view.is_loading && trigger == Trigger::Manual {
                return false;
            }
            if trigger == Trigger::Auto {
                view.is_loading = false;
            }
            if let Err(err) = request.validate() {
                view.error = Some(err.message().to_string());
                admission = Admission::Rejected;
                return true;
            }
            view.is_loading = false;
            view.is_generating = true;
            view.error = None;
            admission = Admission::Started;
            true
        });
        admission
    }

    /// Applies `update` only if the session is alive and still on `epoch`.
    fn apply(&self, epoch: u64, update: impl FnOnce(&mut GeneratedImageState)) -> bool {
        let applied = self.inner.state.send_if_modified(|view| {
            if !self.is_current(epoch) {
                return false;
            }
            update(view);
            true
        });
        if !applied {
            debug!(
                target = "leafline::images::session",
                epoch, "discarding stale session update",
            );
        }
        applied
    }

    fn is_current(&self, epoch: u64) -> bool {
        let control = self.control();
        control.alive && control.epoch == epoch
    }

    fn snapshot(&self) -> Option<(u64, ProductImageRequest)> {
        let control = self.control();
        control
            .alive
            .then(|| (control.epoch, control.request.clone()))
    }

    fn control(&self) -> std::sync::MutexGuard<'_, Control> {
        self.inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
