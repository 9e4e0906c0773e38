//! ---
//! hil_section: "02-wire-format"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Message schema helpers and protocol codecs."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use tracing::debug;

use crate::codec::WireChannel;

/// Direction of a datagram, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Datagram sent to the target.
    Outbound,
    /// Datagram received and decoded.
    Inbound,
    /// Datagram received but discarded.
    Discarded,
}

/// Emit a structured log entry for datagram activity.
pub fn log_frame(direction: MessageDirection, channel: WireChannel, tag: &str, bytes: usize) {
    debug!(
        channel = channel.as_str(),
        tag,
        bytes,
        direction = ?direction,
        "wire activity"
    );
}

/// Prometheus metric handles for wire activity.
pub struct WireMetricsExporter {
    sent: IntCounter,
    received: IntCounter,
    dropped: IntCounter,
    decode_failures: IntCounter,
    handshake_latency: Histogram,
}

impl WireMetricsExporter {
    /// Register wire metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let sent = IntCounter::with_opts(Opts::new(
            "hil_datagrams_sent_total",
            "Datagrams handed to the UDP sockets",
        ))?;
        let received = IntCounter::with_opts(Opts::new(
            "hil_datagrams_received_total",
            "Datagrams decoded from the UDP sockets",
        ))?;
        let dropped = IntCounter::with_opts(Opts::new(
            "hil_datagrams_dropped_total",
            "Datagrams that failed to send",
        ))?;
        let decode_failures = IntCounter::with_opts(Opts::new(
            "hil_decode_failures_total",
            "Received datagrams that could not be decoded",
        ))?;
        let handshake_latency = Histogram::with_opts(HistogramOpts::new(
            "hil_handshake_latency_seconds",
            "Time between sending identity and receiving the target identity",
        ))?;

        registry.register(Box::new(sent.clone()))?;
        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(handshake_latency.clone()))?;

        Ok(Self {
            sent,
            received,
            dropped,
            decode_failures,
            handshake_latency,
        })
    }

    /// Record a sent datagram.
    pub fn observe_sent(&self) {
        self.sent.inc();
    }

    /// Record a decoded datagram.
    pub fn observe_received(&self) {
        self.received.inc();
    }

    /// Record a failed send.
    pub fn observe_dropped(&self) {
        self.dropped.inc();
    }

    /// Record an undecodable datagram.
    pub fn observe_decode_failure(&self) {
        self.decode_failures.inc();
    }

    /// Record a completed handshake.
    pub fn observe_handshake(&self, duration: Duration) {
        self.handshake_latency.observe(duration.as_secs_f64());
    }
}
