//! Signed, single-shot health probe against the partner API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::application::ports::{PartnerApi, PartnerResponse, SignedRequest};
use crate::domain::error::DomainError;
use crate::domain::health::{CheckResult, HealthChecks, HealthVerdict};
use crate::domain::signature::sign_payload;

pub const METRIC_HEALTH_PROBE_MS: &str = "leafline_health_probe_ms";

pub const CHECK_CREDENTIALS: &str = "credentials";
pub const CHECK_API_CONNECTIVITY: &str = "api_connectivity";

/// Read-only endpoint hit by the probe.
pub const PROBE_PATH: &str = "/strains";
/// Canonical query string. Signed and sent exactly as written.
pub const PROBE_QUERY: &str = "orderBy=desc&take=1&page=1";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const BODY_PREVIEW_CHARS: usize = 100;
const MISSING_CREDENTIALS_MESSAGE: &str =
    "Missing API credentials (DRGREEN_API_KEY or DRGREEN_PRIVATE_KEY)";

/// Partner secrets. Empty values count as missing.
#[derive(Clone, Default)]
pub struct PartnerCredentials {
    pub api_key: Option<String>,
    pub private_key: Option<String>,
}

impl PartnerCredentials {
    pub fn new(api_key: Option<String>, private_key: Option<String>) -> Self {
        Self {
            api_key,
            private_key,
        }
    }

    fn pair(&self) -> Option<(&str, &str)> {
        let api_key = self.api_key.as_deref().filter(|value| !value.is_empty())?;
        let private_key = self
            .private_key
            .as_deref()
            .filter(|value| !value.is_empty())?;
        Some((api_key, private_key))
    }
}

impl fmt::Debug for PartnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthVerdict,
    pub checks: HealthChecks,
    /// Milliseconds spent on the whole probe.
    pub total_duration: u64,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Something that can produce a [`HealthReport`] on demand.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<HealthReport, HealthError>;
}

pub struct HealthProbe {
    api: Arc<dyn PartnerApi>,
    credentials: PartnerCredentials,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(api: Arc<dyn PartnerApi>, credentials: PartnerCredentials) -> Self {
        Self {
            api,
            credentials,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs every check once. Missing credentials short-circuit before any I/O.
    pub async fn run(&self) -> Result<HealthReport, HealthError> {
        let started = Instant::now();
        let mut checks = HealthChecks::new();

        let Some((api_key, private_key)) = self.credentials.pair() else {
            checks.insert(
                CHECK_CREDENTIALS.to_string(),
                CheckResult::error(MISSING_CREDENTIALS_MESSAGE),
            );
            return self.finish(checks, started);
        };
        checks.insert(
            CHECK_CREDENTIALS.to_string(),
            CheckResult::ok("API credentials configured"),
        );

        let connectivity = self.check_connectivity(api_key, private_key).await?;
        checks.insert(CHECK_API_CONNECTIVITY.to_string(), connectivity);

        self.finish(checks, started)
    }

    async fn check_connectivity(
        &self,
        api_key: &str,
        private_key: &str,
    ) -> Result<CheckResult, HealthError> {
        let started = Instant::now();
        let request = SignedRequest {
            path: PROBE_PATH,
            query: PROBE_QUERY,
            api_key: api_key.to_string(),
            signature: sign_payload(private_key, PROBE_QUERY)?,
        };

        let outcome = tokio::time::timeout(self.timeout, self.api.get(&request)).await;
        let elapsed = elapsed_ms(started);

        let check = match outcome {
            Err(_) => CheckResult::error(format!(
                "API unreachable: request aborted after {}ms timeout",
                self.timeout.as_millis()
            )),
            Ok(Err(err)) => CheckResult::error(format!("API unreachable: {err}")),
            Ok(Ok(response)) => classify_response(&response),
        };
        Ok(check.timed(elapsed))
    }

    fn finish(&self, checks: HealthChecks, started: Instant) -> Result<HealthReport, HealthError> {
        let status = HealthVerdict::from_checks(&checks);
        let total_duration = elapsed_ms(started);
        histogram!(METRIC_HEALTH_PROBE_MS).record(total_duration as f64);

        if status == HealthVerdict::Healthy {
            info!(
                target = "leafline::health",
                total_duration, "health probe passed"
            );
        } else {
            warn!(
                target = "leafline::health",
                status = status.as_str(),
                total_duration,
                checks = ?checks,
                "health probe reported problems",
            );
        }

        Ok(HealthReport {
            status,
            checks,
            total_duration,
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
        })
    }
}

#[async_trait]
impl HealthCheck for HealthProbe {
    async fn check(&self) -> Result<HealthReport, HealthError> {
        self.run().await
    }
}

fn classify_response(response: &PartnerResponse) -> CheckResult {
    if !response.is_success() {
        return CheckResult::warning(format!(
            "API returned {}: {}",
            response.status,
            preview(&response.body)
        ));
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Array(items)) => {
            CheckResult::ok(format!("API reachable, returned {} strains", items.len()))
        }
        Ok(_) => CheckResult::ok("API reachable, returned data"),
        Err(err) => CheckResult::error(format!("API unreachable: invalid JSON payload: {err}")),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::PartnerError;
    use crate::domain::health::CheckStatus;

    enum Reply {
        Respond(u16, String),
        Fail(&'static str),
        Hang,
    }

    struct FakePartner {
        reply: Reply,
        seen: Mutex<Vec<SignedRequest>>,
    }

    impl FakePartner {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl PartnerApi for FakePartner {
        async fn get(&self, request: &SignedRequest) -> Result<PartnerResponse, PartnerError> {
            self.seen.lock().expect("lock").push(request.clone());
            match &self.reply {
                Reply::Respond(status, body) => Ok(PartnerResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Reply::Fail(message) => Err(PartnerError::Transport(message.to_string())),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn credentials() -> PartnerCredentials {
        PartnerCredentials::new(Some("api-key".into()), Some("private-key".into()))
    }

    #[tokio::test]
    async fn missing_private_key_short_circuits() {
        let partner = FakePartner::new(Reply::Respond(200, "[]".into()));
        let probe = HealthProbe::new(
            partner.clone(),
            PartnerCredentials::new(Some("api-key".into()), None),
        );

        let report = probe.run().await.expect("report");

        assert_eq!(report.status, HealthVerdict::Unhealthy);
        assert_eq!(report.status.http_status(), 503);
        assert_eq!(report.checks[CHECK_CREDENTIALS].status, CheckStatus::Error);
        assert!(!report.checks.contains_key(CHECK_API_CONNECTIVITY));
        assert_eq!(partner.calls(), 0);
    }

    #[tokio::test]
    async fn empty_api_key_counts_as_missing() {
        let partner = FakePartner::new(Reply::Respond(200, "[]".into()));
        let probe = HealthProbe::new(
            partner.clone(),
            PartnerCredentials::new(Some(String::new()), Some("private-key".into())),
        );

        let report = probe.run().await.expect("report");
        assert_eq!(report.status, HealthVerdict::Unhealthy);
        assert_eq!(partner.calls(), 0);
    }

    #[tokio::test]
    async fn successful_probe_is_healthy_and_signed() {
        let partner = FakePartner::new(Reply::Respond(200, r#"[{"id":"s1"}]"#.into()));
        let probe = HealthProbe::new(partner.clone(), credentials());

        let report = probe.run().await.expect("report");

        assert_eq!(report.status, HealthVerdict::Healthy);
        let connectivity = &report.checks[CHECK_API_CONNECTIVITY];
        assert_eq!(connectivity.status, CheckStatus::Ok);
        assert_eq!(connectivity.message, "API reachable, returned 1 strains");
        assert!(connectivity.duration.is_some());

        let seen = partner.seen.lock().expect("lock");
        assert_eq!(seen[0].query, "orderBy=desc&take=1&page=1");
        assert_eq!(seen[0].api_key, "api-key");
        assert_eq!(
            seen[0].signature,
            sign_payload("private-key", PROBE_QUERY).expect("sign")
        );
    }

    #[tokio::test]
    async fn object_payload_is_still_ok() {
        let probe = HealthProbe::new(
            FakePartner::new(Reply::Respond(200, r#"{"data":[]}"#.into())),
            credentials(),
        );
        let report = probe.run().await.expect("report");
        assert_eq!(
            report.checks[CHECK_API_CONNECTIVITY].message,
            "API reachable, returned data"
        );
    }

    #[tokio::test]
    async fn non_success_status_degrades_with_truncated_body() {
        let probe = HealthProbe::new(
            FakePartner::new(Reply::Respond(401, "x".repeat(250))),
            credentials(),
        );

        let report = probe.run().await.expect("report");

        assert_eq!(report.status, HealthVerdict::Degraded);
        assert_eq!(report.status.http_status(), 200);
        let connectivity = &report.checks[CHECK_API_CONNECTIVITY];
        assert_eq!(connectivity.status, CheckStatus::Warning);
        assert_eq!(connectivity.message, format!("API returned 401: {}", "x".repeat(100)));
    }

    #[tokio::test]
    async fn transport_error_is_unhealthy() {
        let probe = HealthProbe::new(
            FakePartner::new(Reply::Fail("connection refused")),
            credentials(),
        );
        let report = probe.run().await.expect("report");
        assert_eq!(report.status, HealthVerdict::Unhealthy);
        assert_eq!(
            report.checks[CHECK_API_CONNECTIVITY].message,
            "API unreachable: connection refused"
        );
    }

    #[tokio::test]
    async fn unparsable_success_body_is_an_error() {
        let probe = HealthProbe::new(
            FakePartner::new(Reply::Respond(200, "<html>".into())),
            credentials(),
        );
        let report = probe.run().await.expect("report");
        assert_eq!(
            report.checks[CHECK_API_CONNECTIVITY].status,
            CheckStatus::Error
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_is_aborted_after_timeout() {
        let probe = HealthProbe::new(FakePartner::new(Reply::Hang), credentials());

        let report = probe.run().await.expect("report");

        assert_ne!(report.status, HealthVerdict::Healthy);
        let connectivity = &report.checks[CHECK_API_CONNECTIVITY];
        assert_eq!(connectivity.status, CheckStatus::Error);
        assert!(connectivity.message.contains("aborted"));
        assert!(connectivity.message.contains("timeout"));
        assert!(connectivity.duration.expect("duration") >= 10_000);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("private-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
