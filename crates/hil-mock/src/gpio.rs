//! ---
//! hil_section: "03-hardware-mocks"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "GPIO and SPI mock registry."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

/// Direction a pin has been configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    /// Pin drives its line.
    Output,
    /// Pin samples its line.
    Input,
}

/// Logic level on a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinValue {
    /// Logic low.
    Low,
    /// Logic high.
    High,
}

impl From<bool> for PinValue {
    fn from(high: bool) -> Self {
        if high {
            PinValue::High
        } else {
            PinValue::Low
        }
    }
}

/// One recorded call against a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "value", rename_all = "snake_case")]
pub enum PinCall {
    /// `set_mode` with the requested mode.
    Mode(PinMode),
    /// `digital_write` with the written level.
    DigitalWrite(PinValue),
    /// `digital_read` with the level it returned.
    DigitalRead(Option<PinValue>),
}

impl PinCall {
    /// Operation name, matching the serialized `operation` tag.
    pub fn operation(&self) -> &'static str {
        match self {
            PinCall::Mode(_) => "mode",
            PinCall::DigitalWrite(_) => "digital_write",
            PinCall::DigitalRead(_) => "digital_read",
        }
    }
}

/// Point-in-time copy of a pin, detached from later mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinSnapshot {
    /// Last configured mode, if any.
    pub mode: Option<PinMode>,
    /// Last written level, if any.
    pub value: Option<PinValue>,
    /// Calls in the order they were made.
    pub calls: Vec<PinCall>,
}

#[derive(Debug, Default)]
struct PinState {
    mode: Option<PinMode>,
    value: Option<PinValue>,
    calls: Vec<PinCall>,
}

/// Handle to a mock GPIO pin. Clones share the same pin.
#[derive(Debug, Clone)]
pub struct Pin {
    controller_id: u32,
    pin_num: u32,
    state: Arc<Mutex<PinState>>,
}

impl Pin {
    fn new(controller_id: u32, pin_num: u32) -> Self {
        Self {
            controller_id,
            pin_num,
            state: Arc::new(Mutex::new(PinState::default())),
        }
    }

    /// Pin number on its controller.
    pub fn pin_num(&self) -> u32 {
        self.pin_num
    }

    /// Owning controller id.
    pub fn controller_id(&self) -> u32 {
        self.controller_id
    }

    /// Whether both handles refer to the same logical pin.
    pub fn same_pin(&self, other: &Pin) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Configure the pin direction.
    pub fn set_mode(&self, mode: PinMode) {
        let mut state = self.state.lock();
        state.mode = Some(mode);
        state.calls.push(PinCall::Mode(mode));
        trace!(controller = self.controller_id, pin = self.pin_num, ?mode, "pin mode");
    }

    /// Drive the pin to `value`.
    pub fn digital_write(&self, value: PinValue) {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.calls.push(PinCall::DigitalWrite(value));
        trace!(controller = self.controller_id, pin = self.pin_num, ?value, "pin write");
    }

    /// Last written level, or `None` if the pin was never written.
    pub fn digital_read(&self) -> Option<PinValue> {
        let mut state = self.state.lock();
        let value = state.value;
        state.calls.push(PinCall::DigitalRead(value));
        value
    }

    /// Last configured mode without recording a call.
    pub fn mode(&self) -> Option<PinMode> {
        self.state.lock().mode
    }

    /// Last written level without recording a call.
    pub fn value(&self) -> Option<PinValue> {
        self.state.lock().value
    }

    /// Copy of the call history.
    pub fn call_history(&self) -> Vec<PinCall> {
        self.state.lock().calls.clone()
    }

    /// Copy of the full pin state.
    pub fn snapshot(&self) -> PinSnapshot {
        let state = self.state.lock();
        PinSnapshot {
            mode: state.mode,
            value: state.value,
            calls: state.calls.clone(),
        }
    }

    pub(crate) fn clear_history(&self) {
        self.state.lock().calls.clear();
    }
}

#[derive(Debug, Default)]
struct ControllerInner {
    initialized: AtomicBool,
    pins: Mutex<BTreeMap<u32, Pin>>,
}

/// Handle to a mock GPIO controller. Clones share the same controller.
#[derive(Debug, Clone)]
pub struct GpioController {
    id: u32,
    inner: Arc<ControllerInner>,
}

impl GpioController {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            inner: Arc::new(ControllerInner::default()),
        }
    }

    /// Controller id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether both handles refer to the same logical controller.
    pub fn same_controller(&self, other: &GpioController) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Mark the controller as initialised.
    pub fn initialize(&self) {
        self.inner.initialized.store(true, Ordering::SeqCst);
        debug!(controller = self.id, "gpio controller initialised");
    }

    /// Whether [`initialize`](Self::initialize) has been called.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Pin `pin_num`, created on first access.
    pub fn get_pin(&self, pin_num: u32) -> Pin {
        let mut pins = self.inner.pins.lock();
        pins.entry(pin_num)
            .or_insert_with(|| {
                debug!(controller = self.id, pin = pin_num, "creating mock pin");
                Pin::new(self.id, pin_num)
            })
            .clone()
    }

    /// Handles to every pin created so far, ordered by pin number.
    pub fn pins(&self) -> Vec<Pin> {
        self.inner.pins.lock().values().cloned().collect()
    }

    pub(crate) fn clear_history(&self) {
        for pin in self.inner.pins.lock().values() {
            pin.clear_history();
        }
    }
}
