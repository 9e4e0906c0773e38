//! ---
//! hil_section: "04-session-client"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Flight computer session over UDP."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::net::{SocketAddr, ToSocketAddrs};

use hil_common::{HilConfig, SessionTimings};

use crate::{Result, SessionError};

/// Addresses and timings for one client.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host of the board under test.
    pub target_host: String,
    /// Target port for identity, heartbeat and telemetry.
    pub target_data_port: u16,
    /// Target port for commands.
    pub target_command_port: u16,
    /// Local interface to bind both sockets on.
    pub bind_host: String,
    /// Local data port; `0` picks an ephemeral port.
    pub local_data_port: u16,
    /// Local command port; `0` picks an ephemeral port.
    pub local_command_port: u16,
    /// Poll, heartbeat and buffer settings.
    pub timings: SessionTimings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&HilConfig::default())
    }
}

impl From<&HilConfig> for SessionConfig {
    fn from(config: &HilConfig) -> Self {
        Self {
            target_host: config.target.host.clone(),
            target_data_port: config.target.data_port,
            target_command_port: config.target.command_port,
            bind_host: config.local.bind_host.clone(),
            local_data_port: config.local.data_port,
            local_command_port: config.local.command_port,
            timings: config.session.clone(),
        }
    }
}

impl SessionConfig {
    /// Client on ephemeral loopback ports talking to a target on loopback.
    pub fn loopback(target_data_port: u16, target_command_port: u16) -> Self {
        Self {
            target_host: "127.0.0.1".to_string(),
            target_data_port,
            target_command_port,
            bind_host: "127.0.0.1".to_string(),
            local_data_port: 0,
            local_command_port: 0,
            timings: SessionTimings::default(),
        }
    }

    /// Replace the timing block.
    pub fn with_timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }
}

/// Resolve `host:port` to an address of the same family as the local socket.
///
/// `localhost` may list `::1` first; an IPv4 bind must still get `127.0.0.1`.
/// A host with no address in the socket's family is unreachable from it.
pub(crate) fn resolve_target(host: &str, port: u16, want_ipv4: bool) -> Result<SocketAddr> {
    let unresolved = || SessionError::Resolve {
        host: host.to_string(),
        port,
    };
    (host, port)
        .to_socket_addrs()
        .map_err(|_| unresolved())?
        .find(|addr| addr.is_ipv4() == want_ipv4)
        .ok_or_else(unresolved)
}
