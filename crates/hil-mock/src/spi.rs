//! ---
//! hil_section: "03-hardware-mocks"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "GPIO and SPI mock registry."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

/// One recorded SPI bus operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum SpiTransaction {
    /// Full-duplex transfer with the bytes clocked out.
    Transfer(Vec<u8>),
}

impl SpiTransaction {
    /// Operation name, matching the serialized `operation` tag.
    pub fn operation(&self) -> &'static str {
        match self {
            SpiTransaction::Transfer(_) => "transfer",
        }
    }

    /// Bytes associated with the operation.
    pub fn payload(&self) -> &[u8] {
        match self {
            SpiTransaction::Transfer(bytes) => bytes,
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    is_open: bool,
    transactions: Vec<SpiTransaction>,
}

/// Handle to a mock SPI bus. Clones share the same bus.
#[derive(Debug, Clone)]
pub struct SpiBus {
    bus: u32,
    state: Arc<Mutex<BusState>>,
}

impl SpiBus {
    pub(crate) fn new(bus: u32) -> Self {
        Self {
            bus,
            state: Arc::new(Mutex::new(BusState::default())),
        }
    }

    /// Bus id.
    pub fn bus(&self) -> u32 {
        self.bus
    }

    /// Whether both handles refer to the same logical bus.
    pub fn same_bus(&self, other: &SpiBus) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Open the bus.
    pub fn open(&self) {
        self.state.lock().is_open = true;
        debug!(bus = self.bus, "spi bus opened");
    }

    /// Close the bus.
    pub fn close(&self) {
        self.state.lock().is_open = false;
        debug!(bus = self.bus, "spi bus closed");
    }

    /// Whether the bus is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_open
    }

    /// Record a transfer and answer with as many zero bytes as were sent.
    ///
    /// Only the response length is meaningful; the mock has no device on the
    /// other end of the bus. Transfers on a closed bus are still recorded.
    pub fn transfer(&self, data: &[u8]) -> Vec<u8> {
        let mut state = self.state.lock();
        if !state.is_open {
            trace!(bus = self.bus, "transfer on closed spi bus");
        }
        state.transactions.push(SpiTransaction::Transfer(data.to_vec()));
        vec![0u8; data.len()]
    }

    /// Copy of the transaction history.
    pub fn transactions(&self) -> Vec<SpiTransaction> {
        self.state.lock().transactions.clone()
    }

    pub(crate) fn clear_history(&self) {
        self.state.lock().transactions.clear();
    }
}
