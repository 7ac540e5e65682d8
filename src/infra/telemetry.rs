use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::engagement::{
    METRIC_AGGREGATION, METRIC_AGGREGATION_FAILED, METRIC_AGGREGATION_JOINED,
    METRIC_AGGREGATION_MS, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
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
            METRIC_CACHE_HIT,
            Unit::Count,
            "Requests answered from a fresh cached engagement."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Requests whose cached engagement was missing or stale."
        );
        describe_counter!(
            METRIC_AGGREGATION,
            Unit::Count,
            "Aggregations run against the provider."
        );
        describe_counter!(
            METRIC_AGGREGATION_JOINED,
            Unit::Count,
            "Requests that waited on an aggregation already in flight."
        );
        describe_counter!(
            METRIC_AGGREGATION_FAILED,
            Unit::Count,
            "Aggregations that ended in a provider or persistence failure."
        );
        describe_histogram!(
            METRIC_AGGREGATION_MS,
            Unit::Milliseconds,
            "Provider aggregation latency in milliseconds."
        );
    });
}
