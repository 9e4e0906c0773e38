//! ---
//! hil_section: "01-core-functionality"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Shared primitives and utilities for the HIL harness."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "HIL_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Available log formats for harness output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Pretty,
    StructuredJson,
}

/// Initialize the tracing subscriber for a test session.
///
/// * `HIL_LOG` overrides the filter (e.g. `debug`, `hil_session=trace`).
///   When unset `RUST_LOG` is honoured, then the configured directive,
///   finally `info`.
/// * Repeated calls are harmless; only the first subscriber is installed,
///   which lets every test call this unconditionally.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let fallback = config.directive.as_deref().unwrap_or(DEFAULT_DIRECTIVE);
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to {}",
                LOG_ENV, err, fallback
            );
            EnvFilter::new(fallback)
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };

    let fmt_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_test_writer()
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_test_writer()
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        info!(format = ?config.format, "tracing initialised");
    }
    Ok(())
}
