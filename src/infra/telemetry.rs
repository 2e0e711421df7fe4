use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    cache_probe::{METRIC_IMAGE_CACHE_HIT, METRIC_IMAGE_CACHE_MISS},
    generation::METRIC_IMAGE_GENERATION,
    health::METRIC_HEALTH_PROBE_MS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_IMAGE_CACHE_HIT,
            Unit::Count,
            "Generated-image lookups answered from object storage."
        );
        describe_counter!(
            METRIC_IMAGE_CACHE_MISS,
            Unit::Count,
            "Generated-image lookups that found nothing (including failed probes)."
        );
        describe_counter!(
            METRIC_IMAGE_GENERATION,
            Unit::Count,
            "Image generation jobs, labelled by outcome."
        );
        describe_histogram!(
            METRIC_HEALTH_PROBE_MS,
            Unit::Milliseconds,
            "Partner health probe latency in milliseconds."
        );
    });
}
