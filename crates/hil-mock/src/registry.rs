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

use hil_common::HardwareMode;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::gpio::{GpioController, Pin, PinSnapshot};
use crate::spi::{SpiBus, SpiTransaction};

/// Registry of mock GPIO controllers and SPI buses.
///
/// Entities are created on first access and live as long as the registry.
/// The hardware mode is fixed at construction; in [`HardwareMode::Real`] the
/// registry still answers lookups but nothing routes driver calls to it.
#[derive(Debug)]
pub struct HardwareMock {
    mode: HardwareMode,
    controllers: Mutex<BTreeMap<u32, GpioController>>,
    buses: Mutex<BTreeMap<u32, SpiBus>>,
}

impl Default for HardwareMock {
    fn default() -> Self {
        Self::new(HardwareMode::Mock)
    }
}

impl HardwareMock {
    /// Registry with an explicit hardware mode.
    pub fn new(mode: HardwareMode) -> Self {
        info!(mode = mode.as_str(), "hardware registry created");
        Self {
            mode,
            controllers: Mutex::new(BTreeMap::new()),
            buses: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registry whose mode is read once from `HIL_MODE`.
    pub fn from_env() -> Self {
        Self::new(HardwareMode::from_env())
    }

    /// Mode selected at construction.
    pub fn mode(&self) -> HardwareMode {
        self.mode
    }

    /// Whether driver calls should be served by this registry.
    pub fn is_mock_mode(&self) -> bool {
        self.mode.is_mock()
    }

    /// Controller `controller_id`, created on first access.
    pub fn get_gpio_controller(&self, controller_id: u32) -> GpioController {
        let mut controllers = self.controllers.lock();
        controllers
            .entry(controller_id)
            .or_insert_with(|| {
                debug!(controller = controller_id, "creating mock gpio controller");
                GpioController::new(controller_id)
            })
            .clone()
    }

    /// Shorthand for `get_gpio_controller(controller_id).get_pin(pin_num)`.
    pub fn get_pin(&self, controller_id: u32, pin_num: u32) -> Pin {
        self.get_gpio_controller(controller_id).get_pin(pin_num)
    }

    /// SPI bus `bus`, created on first access.
    pub fn get_spi_bus(&self, bus: u32) -> SpiBus {
        let mut buses = self.buses.lock();
        buses
            .entry(bus)
            .or_insert_with(|| {
                debug!(bus, "creating mock spi bus");
                SpiBus::new(bus)
            })
            .clone()
    }

    /// Clear every pin call history and bus transaction history.
    ///
    /// Controllers, pins and buses stay registered, and pin mode/value and bus
    /// open state are untouched.
    pub fn reset_all(&self) {
        for controller in self.controllers.lock().values() {
            controller.clear_history();
        }
        for bus in self.buses.lock().values() {
            bus.clear_history();
        }
        debug!("hardware mock histories cleared");
    }

    /// Snapshot of every pin keyed by `(controller_id, pin_num)`.
    pub fn get_all_pin_states(&self) -> BTreeMap<(u32, u32), PinSnapshot> {
        let controllers: Vec<GpioController> = self.controllers.lock().values().cloned().collect();
        controllers
            .iter()
            .flat_map(|controller| {
                controller
                    .pins()
                    .into_iter()
                    .map(move |pin| ((controller.id(), pin.pin_num()), pin.snapshot()))
            })
            .collect()
    }

    /// Snapshot of every bus transaction history keyed by bus id.
    pub fn get_all_spi_transactions(&self) -> BTreeMap<u32, Vec<SpiTransaction>> {
        self.buses
            .lock()
            .iter()
            .map(|(id, bus)| (*id, bus.transactions()))
            .collect()
    }
}
