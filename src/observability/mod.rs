// src/observability/mod.rs
//! Logging and metrics setup
//!
//! - **Tracing**: `tracing-subscriber` registry with an `EnvFilter`
//!   (`RUST_LOG` overrides the configured level) and a plain or JSON layer
//! - **Metrics**: `metrics` facade backed by the Prometheus exporter,
//!   optionally serving `/metrics` over HTTP
//!
//! Library code only emits through the facades; installing a subscriber or
//! recorder is left to the binary (or the host), once per process.

pub mod metrics;

use crate::utils::errors::{CoreError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,

    /// Serve Prometheus metrics on this address (recorder only when unset)
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_listen: None,
        }
    }
}

static PROMETHEUS: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

/// Install the global tracing subscriber
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| CoreError::Observability(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_thread_names(true))
            .try_init()
    };

    installed.map_err(|e| CoreError::Observability(e.to_string()))
}

/// Install the Prometheus metrics recorder
///
/// Idempotent: later calls are no-ops and return `Ok`.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let mut failure = None;

    PROMETHEUS.get_or_init(|| {
        let installed = match config.metrics_listen {
            Some(addr) => PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map(|_| {
                    info!("Serving Prometheus metrics on {}", addr);
                    None
                }),
            None => PrometheusBuilder::new().install_recorder().map(Some),
        };

        match installed {
            Ok(handle) => {
                metrics::describe_all();
                handle
            }
            Err(e) => {
                failure = Some(e.to_string());
                None
            }
        }
    });

    match failure {
        Some(msg) => Err(CoreError::Observability(msg)),
        None => Ok(()),
    }
}

/// Render the current metrics when running recorder-only
pub fn render_metrics() -> Option<String> {
    PROMETHEUS
        .get()
        .and_then(|handle| handle.as_ref())
        .map(|handle| handle.render())
}
