//! ---
//! hil_section: "04-session-client"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Flight computer session over UDP."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! Background heartbeat sender.
//!
//! The thread sends one `flight_heartbeat` immediately and then one per
//! interval until stopped. Stopping is a channel message, so the thread
//! notices within one interval at worst and usually at once.

use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hil_msg::{log_frame, DataMessage, MessageDirection, WireChannel, WireMessage};
use tracing::{debug, warn};

use crate::metrics::SessionCounters;
use crate::Result;

/// Handle to a running heartbeat thread.
#[derive(Debug)]
pub struct Heartbeat {
    stop_tx: Option<mpsc::Sender<()>>,
    done_rx: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Start sending heartbeats to `target` over `socket`.
    pub fn spawn(
        socket: Arc<UdpSocket>,
        target: SocketAddr,
        interval: Duration,
        counters: Arc<SessionCounters>,
    ) -> Result<Self> {
        let payload = DataMessage::flight_heartbeat().encode()?;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("hil-heartbeat".to_string())
            .spawn(move || {
                debug!(%target, ?interval, "heartbeat thread started");
                loop {
                    match socket.send_to(&payload, target) {
                        Ok(_) => {
                            counters.record_heartbeat();
                            log_frame(
                                MessageDirection::Outbound,
                                WireChannel::Data,
                                "flight_heartbeat",
                                payload.len(),
                            );
                        }
                        Err(err) => {
                            // next cycle retries
                            warn!(%target, error = %err, "heartbeat send failed");
                            counters.record_dropped();
                        }
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(%target, "heartbeat thread stopped");
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait up to `grace` for it to exit.
    ///
    /// Returns `false` if the thread did not finish in time; it is then
    /// detached and exits on its own at the end of its current cycle.
    pub fn stop(mut self, grace: Duration) -> bool {
        self.signal();
        match self.done_rx.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("heartbeat thread panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?grace, "heartbeat thread did not stop in time; detaching");
                self.handle.take();
                false
            }
        }
    }

    fn signal(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.signal();
    }
}
