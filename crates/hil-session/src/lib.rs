//! ---
//! hil_section: "04-session-client"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Flight computer session over UDP."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! Emulated flight computer talking to a board under test over two UDP
//! sockets.
//!
//! The client owns a data socket (identity, heartbeat, telemetry) and a
//! command socket (valve commands). After a successful
//! [`handshake`](FlightComputerClient::handshake) a background thread keeps
//! the target alive with `flight_heartbeat` messages until the client is
//! closed.
//!
//! Only [`FlightComputerClient::new`] returns an error. Every other operation
//! reports transport and decode faults as `false` or `None`; a timeout looks
//! the same as an unreachable target because UDP gives no way to tell them
//! apart.
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod heartbeat;
pub mod metrics;

use hil_msg::WireError;

/// Shared result type for session setup.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures that can occur while setting up or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A local socket could not be bound.
    #[error("failed to bind {channel} socket on {addr}: {source}")]
    Bind {
        /// Which socket failed (`data` or `command`).
        channel: &'static str,
        /// Address that was requested.
        addr: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The target host did not resolve to an address usable by the socket.
    #[error("unable to resolve target {host}:{port}")]
    Resolve {
        /// Host that was looked up.
        host: String,
        /// Port that was looked up.
        port: u16,
    },
    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Encode or decode failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub use client::{FlightComputerClient, SessionState};
pub use config::SessionConfig;
pub use heartbeat::Heartbeat;
pub use metrics::{SessionCounters, SessionMetrics};
