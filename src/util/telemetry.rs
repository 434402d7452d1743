use std::time::Duration;

use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::constants::{SERVICE_NAME, TRACER_NAME};
use crate::util::env::Config;

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracing/metrics/log pipeline for the process.
///
/// With `OTEL_EXPORTER_OTLP_ENDPOINT` set, everything is shipped to the
/// collector over grpc alongside the console fmt layer. Without it the
/// console layer stands alone (optionally with stdout span dumps for
/// development).
pub struct Telemetry {
    providers: Option<Providers>,
}

struct Providers {
    tracer: SdkTracerProvider,
    logger: Option<SdkLoggerProvider>,
    meter: Option<SdkMeterProvider>,
}

impl Telemetry {
    pub fn init(config: &Config) -> Result<Self> {
        let resource = base_attrs(SERVICE_NAME, env!("CARGO_PKG_VERSION"));

        let providers = match &config.otlp_endpoint {
            Some(url) => Some(Providers {
                tracer: build_tracer_provider(url, resource.clone())?,
                logger: Some(build_logger_provider(url, resource.clone())?),
                meter: Some(build_meter_provider(url, resource)?),
            }),
            None if config.otel_stdout => Some(Providers {
                tracer: build_stdout_tracer_provider(),
                logger: None,
                meter: None,
            }),
            None => None,
        };

        if let Some(p) = &providers {
            global::set_tracer_provider(p.tracer.clone());
        }

        let trace_layer = providers.as_ref().map(|_| {
            let tracer = global::tracer(TRACER_NAME);
            tracing_opentelemetry::layer().with_tracer(tracer)
        });
        let log_layer = providers
            .as_ref()
            .and_then(|p| p.logger.as_ref())
            .map(OpenTelemetryTracingBridge::new);
        let meter_layer = providers
            .as_ref()
            .and_then(|p| p.meter.as_ref())
            .map(|m| tracing_opentelemetry::MetricsLayer::new(m.clone()));

        tracing_subscriber::registry()
            .with(trace_layer)
            .with(log_layer)
            .with(meter_layer)
            .with(EnvFilter::new("totobot=debug,sqlx=info,info"))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .init();

        Ok(Self { providers })
    }

    /// Flush and tear down the providers. Errors go to stderr since the
    /// subscriber may already be unusable at this point.
    pub fn shutdown(self) {
        let Some(p) = self.providers else {
            return;
        };

        if let Some(meter) = p.meter
            && let Err(e) = meter.shutdown()
        {
            eprintln!("error during metering shutdown: {e:?}");
        }

        if let Some(logger) = p.logger
            && let Err(e) = logger.shutdown()
        {
            eprintln!("error during logging shutdown: {e:?}");
        }

        if let Err(e) = p.tracer.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        }
    }
}

fn build_logger_provider(collector_url: &str, resource: Resource) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(exporter_url(collector_url, "logs"))
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn build_tracer_provider(collector_url: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(exporter_url(collector_url, "traces"))
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build())
}

fn build_meter_provider(collector_url: &str, resource: Resource) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(exporter_url(collector_url, "metrics"))
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Span dumps to the console, for development without a collector.
fn build_stdout_tracer_provider() -> SdkTracerProvider {
    let exporter = opentelemetry_stdout::SpanExporter::default();
    SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_id_generator(RandomIdGenerator::default())
        .with_sampler(Sampler::AlwaysOn)
        .build()
}

fn base_attrs(name: &'static str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}

fn exporter_url(collector_url: &str, signal: &str) -> String {
    format!("{}/v1/{signal}", collector_url.trim_end_matches('/'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exporter_urls_join_cleanly() {
        assert_eq!(
            exporter_url("http://otel:4317/", "traces"),
            "http://otel:4317/v1/traces"
        );
        assert_eq!(
            exporter_url("http://otel:4317", "logs"),
            "http://otel:4317/v1/logs"
        );
    }
}
