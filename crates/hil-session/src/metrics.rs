//! ---
//! hil_section: "04-session-client"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Flight computer session over UDP."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hil_msg::WireMetricsExporter;
use once_cell::sync::OnceCell;

/// Snapshot of session activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Datagrams handed to either socket, heartbeats included.
    pub sent: u64,
    /// Datagrams decoded from the data socket.
    pub received: u64,
    /// Datagrams the sockets refused to send.
    pub dropped: u64,
    /// Datagrams received but rejected by the decoder.
    pub decode_failures: u64,
    /// Heartbeats sent by the background thread.
    pub heartbeats_sent: u64,
}

/// Counters shared between the client and its heartbeat thread.
///
/// An optional prometheus exporter mirrors every increment.
#[derive(Default)]
pub struct SessionCounters {
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
    decode_failures: AtomicU64,
    heartbeats_sent: AtomicU64,
    exporter: OnceCell<Arc<WireMetricsExporter>>,
}

impl std::fmt::Debug for SessionCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCounters")
            .field("metrics", &self.snapshot())
            .field("exported", &self.exporter.get().is_some())
            .finish()
    }
}

impl SessionCounters {
    /// Attach an exporter. Returns `false` if one was already attached.
    pub fn attach_exporter(&self, exporter: Arc<WireMetricsExporter>) -> bool {
        self.exporter.set(exporter).is_ok()
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = self.exporter.get() {
            exporter.observe_sent();
        }
    }

    pub(crate) fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
        self.record_sent();
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = self.exporter.get() {
            exporter.observe_received();
        }
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = self.exporter.get() {
            exporter.observe_dropped();
        }
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = self.exporter.get() {
            exporter.observe_decode_failure();
        }
    }

    pub(crate) fn record_handshake(&self, elapsed: Duration) {
        if let Some(exporter) = self.exporter.get() {
            exporter.observe_handshake(elapsed);
        }
    }

    /// Current values.
    pub fn snapshot(&self) -> SessionMetrics {
        SessionMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn heartbeats_count_as_sent() {
        let counters = SessionCounters::default();
        counters.record_heartbeat();
        counters.record_sent();
        counters.record_decode_failure();
        let metrics = counters.snapshot();
        assert_eq!(metrics.sent, 2);
        assert_eq!(metrics.heartbeats_sent, 1);
        assert_eq!(metrics.decode_failures, 1);
        assert_eq!(metrics.received, 0);
    }

    #[test]
    fn exporter_mirrors_counters() {
        let registry = Registry::new();
        let exporter = Arc::new(WireMetricsExporter::register(&registry).expect("register"));
        let counters = SessionCounters::default();
        assert!(counters.attach_exporter(Arc::clone(&exporter)));
        assert!(!counters.attach_exporter(exporter));

        counters.record_sent();
        counters.record_received();
        counters.record_dropped();
        counters.record_handshake(Duration::from_millis(3));

        let families = registry.gather();
        let value = |name: &str| {
            families
                .iter()
                .find(|family| family.get_name() == name)
                .map(|family| family.get_metric()[0].get_counter().get_value())
        };
        assert_eq!(value("hil_datagrams_sent_total"), Some(1.0));
        assert_eq!(value("hil_datagrams_received_total"), Some(1.0));
        assert_eq!(value("hil_datagrams_dropped_total"), Some(1.0));
    }
}
