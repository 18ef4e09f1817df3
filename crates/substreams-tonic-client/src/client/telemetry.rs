//! # Telemetry Features
//!
//! Logs are always written to stderr through `tracing_subscriber::fmt`
//! (stdout is reserved for streamed responses). The verbosity follows
//! `RUST_LOG` and defaults to `info`; `RUST_LOG=debug` also shows module logs
//! carried in block data.
//!
//! On top of that, the client can export OpenTelemetry data over OTLP/gRPC.
//!
//! ## Feature matrix
//!
//! - `tracing`: Enables OpenTelemetry distributed tracing (via spans).
//! - `metrics`: Enables OpenTelemetry metrics (responses, errors, session
//!   duration).
//! - `otlp`: Enables the OTLP/gRPC exporter. The collector endpoint, headers
//!   and compression are read from the standard `OTEL_EXPORTER_OTLP_*`
//!   environment variables.
//!
//! ## Feature constraints
//!
//! - The `otlp` exporter requires at least one of: `tracing` or `metrics`.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features tracing,metrics,otlp -- run ./pkg.spkg --modules graph_out --start-block 1
//! ```

// Disallow using `otlp` without `tracing` or `metrics`
#[cfg(all(feature = "otlp", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'tracing' or 'metrics' to be enabled.");

// Core imports - always needed
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Exporter-specific imports
#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "tracing")))]
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
#[cfg(all(feature = "otlp", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "tracing")))]
use tonic::transport::ClientTlsConfig;

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

// Either
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

// Tracing-specific imports
#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "substreams-client";

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Flushes and shuts the exporters down. Errors are reported on stderr only;
/// they never change the exit status of a run.
#[allow(clippy::needless_pass_by_value)]
pub fn shutdown_telemetry(_providers: TelemetryProviders) {
    #[cfg(feature = "tracing")]
    {
        if let Err(err) = _providers.tracer_provider.force_flush() {
            eprintln!("Error flushing traces: {:#?}", err);
        }
        if let Err(err) = _providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer: {:#?}", err);
        }
    }

    #[cfg(feature = "metrics")]
    {
        if let Err(err) = _providers.meter_provider.force_flush() {
            eprintln!("Error flushing metrics: {:#?}", err);
        }
        if let Err(err) = _providers.meter_provider.shutdown() {
            eprintln!("Error shutting down meter: {:#?}", err);
        }
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_timeout(std::time::Duration::from_secs(10))
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_timeout(std::time::Duration::from_secs(10))
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;

        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();

        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}

/// Instrument names registered on the meter when `metrics` is enabled.
pub mod metric_names {
    pub const SESSIONS: &str = "sessions";
    pub const RESPONSES: &str = "responses";
    pub const STREAM_ERRORS: &str = "stream_errors";
    pub const SESSION_DURATION: &str = "session_duration";
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static SESSIONS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RESPONSES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static SESSION_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = SESSIONS.set(
        meter
            .u64_counter(metric_names::SESSIONS)
            .with_description("Stream sessions started")
            .build(),
    );

    let _ = RESPONSES.set(
        meter
            .u64_counter(metric_names::RESPONSES)
            .with_description("Stream responses rendered")
            .build(),
    );

    let _ = STREAM_ERRORS.set(
        meter
            .u64_counter(metric_names::STREAM_ERRORS)
            .with_description("Failed sessions")
            .build(),
    );

    let _ = SESSION_DURATION_MS.set(
        meter
            .f64_histogram(metric_names::SESSION_DURATION)
            .with_unit("ms")
            .with_description("End-to-end session duration")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_sessions() {
    if let Some(counter) = SESSIONS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_sessions() {}

#[cfg(feature = "metrics")]
pub fn increment_responses() {
    if let Some(counter) = RESPONSES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_responses() {}

#[cfg(feature = "metrics")]
pub fn increment_stream_errors() {
    if let Some(counter) = STREAM_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_stream_errors() {}

#[cfg(feature = "metrics")]
pub fn record_session_duration(duration_ms: f64) {
    if let Some(histogram) = SESSION_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_session_duration(_duration_ms: f64) {}

#[cfg(test)]
mod tests {
    use super::metric_names;

    #[test]
    fn instrument_names_match_helpers() {
        assert_eq!(metric_names::SESSIONS, "sessions");
        assert_eq!(metric_names::RESPONSES, "responses");
        assert_eq!(metric_names::STREAM_ERRORS, "stream_errors");
        assert_eq!(metric_names::SESSION_DURATION, "session_duration");
    }
}
