//! ---
//! hil_section: "05-test-harness"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Scripted UDP target for session tests."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! Scripted stand-in for the board under test.
//!
//! [`ScriptedTarget`] binds a data and a command socket on loopback, answers
//! identity announcements according to a [`TargetScript`] and records every
//! datagram it receives so tests can assert on heartbeats and commands.
//!
//! ```no_run
//! use hil_testharness::{ScriptedTarget, TargetScript};
//!
//! # fn example() -> anyhow::Result<()> {
//! let target = ScriptedTarget::spawn(TargetScript::answering("sam-01"))?;
//! let (data_port, command_port) = (target.data_port(), target.command_port());
//! // point a client at the two ports, then inspect target.frames()
//! # Ok(())
//! # }
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use hil_msg::{DataMessage, MessageKind, SamControlMessage, WireMessage};
use parking_lot::Mutex;
use tracing::{debug, trace};

const READ_TIMEOUT: Duration = Duration::from_millis(10);
const POLL_STEP: Duration = Duration::from_millis(5);

/// How the target reacts to an identity announcement.
#[derive(Debug, Clone, Default)]
pub struct TargetScript {
    identity_reply: Option<String>,
    reply_delay: Duration,
    noise: Vec<Vec<u8>>,
    preamble: Vec<DataMessage>,
}

impl TargetScript {
    /// Never answer identity; the handshake will time out.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Answer every identity with an identity for `board_id`.
    pub fn answering(board_id: impl Into<String>) -> Self {
        Self {
            identity_reply: Some(board_id.into()),
            ..Self::default()
        }
    }

    /// Wait before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Send raw bytes ahead of the identity reply.
    pub fn with_noise(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.noise.push(bytes.into());
        self
    }

    /// Send a well-formed message ahead of the identity reply.
    pub fn with_preamble(mut self, message: DataMessage) -> Self {
        self.preamble.push(message);
        self
    }
}

/// Data-channel message recorded by the target.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// Arrival time.
    pub at: Instant,
    /// Sender address.
    pub from: SocketAddr,
    /// Decoded message.
    pub message: DataMessage,
}

#[derive(Default)]
struct Recorded {
    frames: Mutex<Vec<ReceivedFrame>>,
    commands: Mutex<Vec<SamControlMessage>>,
    rejected: AtomicU64,
}

/// Loopback UDP peer playing the board under test.
pub struct ScriptedTarget {
    data: UdpSocket,
    data_addr: SocketAddr,
    command_addr: SocketAddr,
    recorded: Arc<Recorded>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedTarget {
    /// Bind both sockets on `127.0.0.1` ephemeral ports and start responding.
    pub fn spawn(script: TargetScript) -> Result<Self> {
        let data = UdpSocket::bind("127.0.0.1:0").context("bind target data socket")?;
        let command = UdpSocket::bind("127.0.0.1:0").context("bind target command socket")?;
        data.set_read_timeout(Some(READ_TIMEOUT))?;
        command.set_read_timeout(Some(READ_TIMEOUT))?;
        let data_addr = data.local_addr()?;
        let command_addr = command.local_addr()?;

        let recorded = Arc::new(Recorded::default());
        let stop = Arc::new(AtomicBool::new(false));
        let responder = Responder {
            data: data.try_clone().context("clone target data socket")?,
            command,
            script,
            recorded: Arc::clone(&recorded),
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name("hil-scripted-target".to_string())
            .spawn(move || responder.run())
            .context("spawn scripted target")?;
        debug!(%data_addr, %command_addr, "scripted target listening");

        Ok(Self {
            data,
            data_addr,
            command_addr,
            recorded,
            stop,
            handle: Some(handle),
        })
    }

    /// Data socket address.
    pub fn data_addr(&self) -> SocketAddr {
        self.data_addr
    }

    /// Command socket address.
    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    /// Data socket port.
    pub fn data_port(&self) -> u16 {
        self.data_addr.port()
    }

    /// Command socket port.
    pub fn command_port(&self) -> u16 {
        self.command_addr.port()
    }

    /// Every decoded data-channel message so far.
    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.recorded.frames.lock().clone()
    }

    /// Every decoded command so far.
    pub fn commands(&self) -> Vec<SamControlMessage> {
        self.recorded.commands.lock().clone()
    }

    /// Datagrams on either socket that failed to decode.
    pub fn rejected(&self) -> u64 {
        self.recorded.rejected.load(Ordering::Relaxed)
    }

    /// Heartbeats received so far.
    pub fn heartbeat_count(&self) -> usize {
        self.count_kind(MessageKind::FlightHeartbeat, |_| true)
    }

    /// Heartbeats that arrived within `[from, to)`.
    pub fn heartbeats_between(&self, from: Instant, to: Instant) -> usize {
        self.count_kind(MessageKind::FlightHeartbeat, |at| at >= from && at < to)
    }

    fn count_kind(&self, kind: MessageKind, window: impl Fn(Instant) -> bool) -> usize {
        self.recorded
            .frames
            .lock()
            .iter()
            .filter(|frame| frame.message.kind() == kind && window(frame.at))
            .count()
    }

    /// Block until `count` commands have arrived or `timeout` passes.
    pub fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<SamControlMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            let commands = self.commands();
            if commands.len() >= count || Instant::now() >= deadline {
                return commands;
            }
            thread::sleep(POLL_STEP);
        }
    }

    /// Block until a frame of `kind` has arrived or `timeout` passes.
    pub fn wait_for_frame(&self, kind: MessageKind, timeout: Duration) -> Option<ReceivedFrame> {
        let deadline = Instant::now() + timeout;
        loop {
            let found = self
                .recorded
                .frames
                .lock()
                .iter()
                .find(|frame| frame.message.kind() == kind)
                .cloned();
            if found.is_some() || Instant::now() >= deadline {
                return found;
            }
            thread::sleep(POLL_STEP);
        }
    }

    /// Send a data message from the target's data socket.
    pub fn send_data(&self, message: &DataMessage, to: SocketAddr) -> Result<()> {
        let bytes = message.encode()?;
        self.send_raw(&bytes, to)
    }

    /// Send raw bytes from the target's data socket.
    pub fn send_raw(&self, bytes: &[u8], to: SocketAddr) -> Result<()> {
        self.data
            .send_to(bytes, to)
            .with_context(|| format!("send {} bytes to {to}", bytes.len()))?;
        Ok(())
    }

    /// Stop the responder thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScriptedTarget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Responder {
    data: UdpSocket,
    command: UdpSocket,
    script: TargetScript,
    recorded: Arc<Recorded>,
    stop: Arc<AtomicBool>,
}

impl Responder {
    fn run(self) {
        let mut buf = vec![0u8; 4096];
        while !self.stop.load(Ordering::Relaxed) {
            if let Ok((len, from)) = self.data.recv_from(&mut buf) {
                self.on_data(&buf[..len], from);
            }
            if let Ok((len, from)) = self.command.recv_from(&mut buf) {
                self.on_command(&buf[..len], from);
            }
        }
        trace!("scripted target stopped");
    }

    fn on_data(&self, bytes: &[u8], from: SocketAddr) {
        let message = match DataMessage::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                trace!(%from, error = %err, "target rejected data datagram");
                self.recorded.rejected.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let is_identity = message.kind() == MessageKind::Identity;
        self.recorded.frames.lock().push(ReceivedFrame {
            at: Instant::now(),
            from,
            message,
        });
        if is_identity {
            self.answer_identity(from);
        }
    }

    fn answer_identity(&self, to: SocketAddr) {
        let Some(board_id) = self.script.identity_reply.as_deref() else {
            return;
        };
        if !self.script.reply_delay.is_zero() {
            thread::sleep(self.script.reply_delay);
        }
        for noise in &self.script.noise {
            let _ = self.data.send_to(noise, to);
        }
        for message in &self.script.preamble {
            if let Ok(bytes) = message.encode() {
                let _ = self.data.send_to(&bytes, to);
            }
        }
        if let Ok(bytes) = DataMessage::identity(board_id).encode() {
            let _ = self.data.send_to(&bytes, to);
            debug!(%to, board_id, "target answered identity");
        }
    }

    fn on_command(&self, bytes: &[u8], from: SocketAddr) {
        match SamControlMessage::decode(bytes) {
            Ok(command) => self.recorded.commands.lock().push(command),
            Err(err) => {
                trace!(%from, error = %err, "target rejected command datagram");
                self.recorded.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
