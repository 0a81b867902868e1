//! Logging and trace-export initialisation.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | `EnvFilter` directives, `info` when unset. |
//! | `FREEFLOOR_LOG_FORMAT` | `json` for one JSON object per line, compact text otherwise. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Collector URL, e.g. `http://localhost:4318`. Spans are exported over OTLP/HTTP only when set and non-blank. |
//!
//! ```rust,no_run
//! let _telemetry = freefloor_runtime::telemetry::init_tracing("freefloor");
//! // … run the pipeline; spans are flushed when `_telemetry` drops.
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Selects the log formatter; `json` or anything else for compact text.
pub const LOG_FORMAT_ENV: &str = "FREEFLOOR_LOG_FORMAT";

/// Collector URL variable.  Unset or blank disables span export.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Install the process-wide subscriber: env filter, console formatter and,
/// with a collector configured, an OpenTelemetry layer that receives the
/// `floor_cycle` span of every detection cycle.
///
/// Keep the returned [`TracerProviderGuard`] alive until exit.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = if std::env::var(LOG_FORMAT_ENV).as_deref() == Ok("json") {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };

    // No subscriber exists yet, so exporter failures can only go to stderr.
    let provider = collector_endpoint().and_then(|endpoint| {
        cycle_span_exporter(service_name, &endpoint)
            .map_err(|e| eprintln!("{service_name}: span export to {endpoint} disabled ({e})"))
            .ok()
    });
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string()))
    });

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init();

    TracerProviderGuard {
        service: service_name.to_string(),
        provider,
    }
}

/// Flushes the detection-cycle spans on drop when export is enabled.
pub struct TracerProviderGuard {
    service: String,
    provider: Option<SdkTracerProvider>,
}

impl TracerProviderGuard {
    pub fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("{}: last cycle spans may be lost ({e})", self.service);
        }
    }
}

fn collector_endpoint() -> Option<String> {
    std::env::var(OTLP_ENDPOINT_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

fn cycle_span_exporter(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider, String> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| e.to_string())?;
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Spans close on the detection thread, which has no Tokio runtime, so
    // export happens synchronously.
    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_simple_exporter(exporter)
        .build())
}
