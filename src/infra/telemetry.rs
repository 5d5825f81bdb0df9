use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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
        describe_histogram!(
            "murmur_fetch_page_ms",
            Unit::Milliseconds,
            "Feed page fetch latency in milliseconds."
        );
        describe_counter!(
            "murmur_fetch_discarded_total",
            Unit::Count,
            "Pages dropped because their view was unsubscribed or reset mid-fetch."
        );
        describe_counter!(
            "murmur_patch_applied_total",
            Unit::Count,
            "Optimistic patches applied to live views."
        );
        describe_counter!(
            "murmur_mutation_reconciled_total",
            Unit::Count,
            "Mutations whose optimistic guess was corrected by the server."
        );
        describe_counter!(
            "murmur_mutation_reverted_total",
            Unit::Count,
            "Mutations rolled back after a failed request."
        );
        describe_gauge!(
            "murmur_live_views",
            Unit::Count,
            "Currently registered feed views."
        );
        describe_counter!(
            "murmur_http_requests_total",
            Unit::Count,
            "Requests served by the development server."
        );
    });
}
