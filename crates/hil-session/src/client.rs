//! ---
//! hil_section: "04-session-client"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Flight computer session over UDP."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hil_common::time::{deadline_after, remaining, sleep_until_or};
use hil_msg::{
    log_frame, ChannelType, DataMessage, DataPoint, MessageDirection, MessageKind,
    SamControlMessage, WireChannel, WireMessage, WireMetricsExporter,
};
use tracing::{debug, info, trace, warn};

use crate::config::{resolve_target, SessionConfig};
use crate::heartbeat::Heartbeat;
use crate::metrics::{SessionCounters, SessionMetrics};
use crate::{Result, SessionError};

/// Bounded wait for the heartbeat thread during [`FlightComputerClient::close`].
const HEARTBEAT_JOIN_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Sockets bound, no handshake yet or the last one failed.
    Disconnected,
    /// Identity sent, waiting for the reply.
    Handshaking,
    /// Handshake complete; heartbeats are running.
    Connected,
    /// Sockets released. Terminal.
    Closed,
}

impl SessionState {
    /// Lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Handshaking => "handshaking",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        }
    }
}

enum Poll {
    Message(DataMessage),
    Empty,
    Discarded,
}

/// Emulated flight computer.
///
/// Receive operations take `&self`; [`close`](Self::close) takes `&mut self`,
/// so a close cannot race a receive on the same client.
#[derive(Debug)]
pub struct FlightComputerClient {
    config: SessionConfig,
    data_socket: Option<Arc<UdpSocket>>,
    command_socket: Option<UdpSocket>,
    data_target: SocketAddr,
    command_target: SocketAddr,
    state: SessionState,
    board_id: Option<String>,
    heartbeat: Option<Heartbeat>,
    counters: Arc<SessionCounters>,
}

impl FlightComputerClient {
    /// Bind both local sockets and resolve the target.
    ///
    /// No datagram is sent until [`handshake`](Self::handshake).
    pub fn new(config: SessionConfig) -> Result<Self> {
        let data_socket = bind(&config.bind_host, config.local_data_port, "data")?;
        let command_socket = bind(&config.bind_host, config.local_command_port, "command")?;

        let want_ipv4 = data_socket.local_addr()?.is_ipv4();
        let data_target = resolve_target(&config.target_host, config.target_data_port, want_ipv4)?;
        let command_target =
            resolve_target(&config.target_host, config.target_command_port, want_ipv4)?;

        info!(
            local_data = %data_socket.local_addr()?,
            local_command = %command_socket.local_addr()?,
            %data_target,
            %command_target,
            "flight computer client ready"
        );

        Ok(Self {
            config,
            data_socket: Some(Arc::new(data_socket)),
            command_socket: Some(command_socket),
            data_target,
            command_target,
            state: SessionState::Disconnected,
            board_id: None,
            heartbeat: None,
            counters: Arc::new(SessionCounters::default()),
        })
    }

    /// Mirror counters into a prometheus exporter. Only the first exporter
    /// attached to a client is used.
    pub fn with_exporter(self, exporter: Arc<WireMetricsExporter>) -> Self {
        if !self.counters.attach_exporter(exporter) {
            debug!("metrics exporter already attached");
        }
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a handshake succeeded and the client is not closed.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Board id used in the last successful handshake.
    pub fn board_id(&self) -> Option<&str> {
        self.board_id.as_deref()
    }

    /// Local address of the data socket, `None` once closed.
    pub fn local_data_addr(&self) -> Option<SocketAddr> {
        self.data_socket.as_ref()?.local_addr().ok()
    }

    /// Local address of the command socket, `None` once closed.
    pub fn local_command_addr(&self) -> Option<SocketAddr> {
        self.command_socket.as_ref()?.local_addr().ok()
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> SessionMetrics {
        self.counters.snapshot()
    }

    /// Announce `board_id` and wait up to `timeout` for the target's identity.
    ///
    /// Other message kinds, malformed datagrams and transient socket errors
    /// are skipped. On success the heartbeat thread starts. A client that is
    /// already connected returns `true` without sending anything; a closed
    /// client returns `false`.
    pub fn handshake(&mut self, board_id: &str, timeout: Duration) -> bool {
        match self.state {
            SessionState::Connected => {
                debug!(board_id, "handshake skipped; already connected");
                return true;
            }
            SessionState::Closed => {
                warn!(board_id, "handshake on closed client");
                return false;
            }
            SessionState::Disconnected | SessionState::Handshaking => {}
        }
        let Some(socket) = self.data_socket.clone() else {
            return false;
        };

        self.state = SessionState::Handshaking;
        let started = Instant::now();
        let identity = DataMessage::identity(board_id);
        if self.send_on(&socket, self.data_target, &identity, WireChannel::Data) {
            debug!(board_id, target = %self.data_target, ?timeout, "identity sent");
        } else {
            debug!(board_id, "identity send failed; polling until timeout");
        }

        let deadline = deadline_after(timeout);
        let mut buf = vec![0u8; self.config.timings.recv_buffer_bytes];
        loop {
            match self.poll_once(&socket, &mut buf) {
                Poll::Message(DataMessage::Identity { board_id: peer, .. }) => {
                    return self.finish_handshake(&socket, board_id, peer, started);
                }
                Poll::Message(other) => {
                    trace!(kind = %other.kind(), "ignoring message during handshake");
                }
                Poll::Discarded => {}
                Poll::Empty => sleep_until_or(deadline, self.config.timings.poll_interval_ms),
            }
            if remaining(deadline).is_zero() {
                break;
            }
        }

        warn!(board_id, elapsed = ?started.elapsed(), "handshake timed out");
        self.state = SessionState::Disconnected;
        false
    }

    /// [`handshake`](Self::handshake) bounded by the configured
    /// `handshake_timeout_ms`.
    pub fn connect(&mut self, board_id: &str) -> bool {
        let timeout = self.config.timings.handshake_timeout_ms;
        self.handshake(board_id, timeout)
    }

    fn finish_handshake(
        &mut self,
        socket: &Arc<UdpSocket>,
        board_id: &str,
        peer: Option<String>,
        started: Instant,
    ) -> bool {
        let heartbeat = Heartbeat::spawn(
            Arc::clone(socket),
            self.data_target,
            self.config.timings.heartbeat_interval_ms,
            Arc::clone(&self.counters),
        );
        match heartbeat {
            Ok(heartbeat) => {
                let elapsed = started.elapsed();
                self.counters.record_handshake(elapsed);
                self.heartbeat = Some(heartbeat);
                self.board_id = Some(board_id.to_string());
                self.state = SessionState::Connected;
                info!(board_id, peer = ?peer, ?elapsed, "handshake complete");
                true
            }
            Err(err) => {
                warn!(board_id, error = %err, "failed to start heartbeat");
                self.state = SessionState::Disconnected;
                false
            }
        }
    }

    /// Send a command to the target's command port.
    pub fn send_command(&self, command: &SamControlMessage) -> bool {
        let Some(socket) = self.command_socket.as_ref() else {
            debug!(command = command.tag(), "send_command on closed client");
            return false;
        };
        if self.state != SessionState::Connected {
            debug!(state = self.state.as_str(), "sending command without a handshake");
        }
        self.send_on(socket, self.command_target, command, WireChannel::Control)
    }

    /// Send a data message to the target's data port.
    pub fn send_data(&self, message: &DataMessage) -> bool {
        let Some(socket) = self.data_socket.as_ref() else {
            debug!(kind = %message.kind(), "send_data on closed client");
            return false;
        };
        self.send_on(socket, self.data_target, message, WireChannel::Data)
    }

    /// Next decodable data message arriving within `timeout`.
    ///
    /// Malformed datagrams are skipped and counted. A zero timeout makes a
    /// single read attempt.
    pub fn receive_data(&self, timeout: Duration) -> Option<DataMessage> {
        let socket = self.data_socket.as_ref()?;
        let deadline = deadline_after(timeout);
        let mut buf = vec![0u8; self.config.timings.recv_buffer_bytes];
        loop {
            match self.poll_once(socket, &mut buf) {
                Poll::Message(message) => return Some(message),
                Poll::Discarded => {}
                Poll::Empty => sleep_until_or(deadline, self.config.timings.poll_interval_ms),
            }
            if remaining(deadline).is_zero() {
                return None;
            }
        }
    }

    /// [`receive_data`](Self::receive_data) bounded by the configured
    /// `receive_timeout_ms`.
    pub fn next_data(&self) -> Option<DataMessage> {
        self.receive_data(self.config.timings.receive_timeout_ms)
    }

    /// First message of kind `expected` within `timeout`; others are consumed
    /// and discarded.
    pub fn wait_for_data(&self, expected: MessageKind, timeout: Duration) -> Option<DataMessage> {
        if self.data_socket.is_none() {
            return None;
        }
        let deadline = deadline_after(timeout);
        loop {
            let slice = self.config.timings.wait_slice_ms.min(remaining(deadline));
            if let Some(message) = self.receive_data(slice) {
                if message.kind() == expected {
                    return Some(message);
                }
                trace!(expected = %expected, got = %message.kind(), "discarding message");
            }
            if remaining(deadline).is_zero() {
                debug!(expected = %expected, "no matching message before deadline");
                return None;
            }
        }
    }

    /// Reading stamped with the current wall-clock time.
    pub fn create_test_datapoint(
        &self,
        channel: u32,
        value: f64,
        channel_type: ChannelType,
    ) -> DataPoint {
        DataPoint::now(value, channel, channel_type)
    }

    /// Stop the heartbeat and release both sockets. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop(HEARTBEAT_JOIN_GRACE);
        }
        self.data_socket = None;
        self.command_socket = None;
        self.state = SessionState::Closed;
        info!(board_id = ?self.board_id, metrics = ?self.counters.snapshot(), "flight computer client closed");
    }

    fn send_on<M: WireMessage>(
        &self,
        socket: &UdpSocket,
        target: SocketAddr,
        message: &M,
        channel: WireChannel,
    ) -> bool {
        let bytes = match message.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(tag = message.tag(), error = %err, "failed to encode message");
                return false;
            }
        };
        match socket.send_to(&bytes, target) {
            Ok(_) => {
                self.counters.record_sent();
                log_frame(MessageDirection::Outbound, channel, message.tag(), bytes.len());
                true
            }
            Err(err) => {
                warn!(%target, tag = message.tag(), error = %err, "send failed");
                self.counters.record_dropped();
                false
            }
        }
    }

    fn poll_once(&self, socket: &UdpSocket, buf: &mut [u8]) -> Poll {
        let (len, from) = match socket.recv_from(buf) {
            Ok(received) => received,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                trace!("no datagram ready");
                return Poll::Empty;
            }
            Err(err) => {
                debug!(error = %err, "receive failed");
                return Poll::Empty;
            }
        };
        match DataMessage::decode(&buf[..len]) {
            Ok(message) => {
                self.counters.record_received();
                log_frame(MessageDirection::Inbound, WireChannel::Data, message.tag(), len);
                Poll::Message(message)
            }
            Err(err) => {
                self.counters.record_decode_failure();
                log_frame(MessageDirection::Discarded, WireChannel::Data, "invalid", len);
                debug!(%from, error = %err, "discarding undecodable datagram");
                Poll::Discarded
            }
        }
    }
}

impl Drop for FlightComputerClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn bind(host: &str, port: u16, channel: &'static str) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((host, port)).map_err(|source| SessionError::Bind {
        channel,
        addr: format!("{host}:{port}"),
        source,
    })?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}
