use axum::{
    Json,
    extract::State,
    http::{
        HeaderValue, Method, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::error;

use crate::application::error::ErrorReport;

use super::HealthState;

const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

#[derive(Debug, Serialize)]
struct ProbeFailure {
    status: &'static str,
    message: String,
    timestamp: String,
}

/// `/health` for every method; preflight short-circuits before the probe.
pub(super) async fn health(State(state): State<HealthState>, method: Method) -> Response {
    if method == Method::OPTIONS {
        return with_cors(StatusCode::OK.into_response());
    }

    let response = match state.probe.check().await {
        Ok(report) => {
            let status = StatusCode::from_u16(report.status.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(report)).into_response()
        }
        Err(err) => {
            error!(
                target = "leafline::http::health",
                error = %err,
                "health probe failed"
            );
            let body = ProbeFailure {
                status: "error",
                message: err.to_string(),
                timestamp: OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .unwrap_or_default(),
            };
            let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    };

    with_cors(response)
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
    response
}
