use std::{io, sync::Once};

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        convert::METRIC_CONVERT_TOTAL, export::METRIC_EXPORT_ARTIFACTS,
        render::METRIC_RENDER_DEGRADED,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

pub(crate) const METRIC_HTTP_RESPONSES: &str = "mdpress_http_responses_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to standard error so command output on standard output stays clean.
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
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CONVERT_TOTAL,
            Unit::Count,
            "Markdown conversions by target and result."
        );
        describe_counter!(
            METRIC_RENDER_DEGRADED,
            Unit::Count,
            "Formulas or diagrams replaced by a visible error marker."
        );
        describe_counter!(
            METRIC_EXPORT_ARTIFACTS,
            Unit::Count,
            "Image and document artifacts handed to an export sink."
        );
        describe_counter!(
            METRIC_HTTP_RESPONSES,
            Unit::Count,
            "HTTP responses by status class."
        );
    });
}
