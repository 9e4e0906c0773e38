//! ---
//! hil_section: "03-hardware-mocks"
//! hil_subsection: "integration-tests"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "GPIO and SPI mock registry."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use hil_mock::{HardwareMock, PinCall, PinMode, PinValue, SpiTransaction};

/// Minimal stand-in for a board-side valve driver wired to the registry.
struct ValveDriver<'a> {
    hw: &'a HardwareMock,
    controller: u32,
}

impl<'a> ValveDriver<'a> {
    fn new(hw: &'a HardwareMock, controller: u32) -> Self {
        hw.get_gpio_controller(controller).initialize();
        Self { hw, controller }
    }

    fn actuate(&self, channel: u32, powered: bool) {
        let pin = self.hw.get_pin(self.controller, channel);
        if pin.mode().is_none() {
            pin.set_mode(PinMode::Output);
        }
        pin.digital_write(PinValue::from(powered));
    }
}

#[test]
fn driver_calls_are_observable_through_snapshots() {
    let hw = HardwareMock::new(hil_mock::HardwareMode::Mock);
    let driver = ValveDriver::new(&hw, 0);
    driver.actuate(1, true);
    driver.actuate(2, true);
    driver.actuate(1, false);

    assert!(hw.get_gpio_controller(0).is_initialized());
    let states = hw.get_all_pin_states();
    assert_eq!(
        states[&(0, 1)].calls,
        vec![
            PinCall::Mode(PinMode::Output),
            PinCall::DigitalWrite(PinValue::High),
            PinCall::DigitalWrite(PinValue::Low),
        ]
    );
    assert_eq!(states[&(0, 2)].value, Some(PinValue::High));
}

#[test]
fn state_survives_between_cases_but_history_does_not() {
    let hw = HardwareMock::default();
    let driver = ValveDriver::new(&hw, 0);

    driver.actuate(3, true);
    hw.reset_all();

    // second test case re-uses the registry
    driver.actuate(3, false);
    let pin = hw.get_pin(0, 3);
    assert_eq!(pin.call_history(), vec![PinCall::DigitalWrite(PinValue::Low)]);
    assert_eq!(pin.mode(), Some(PinMode::Output));
}

#[test]
fn shared_registry_keeps_identity_across_threads() {
    let hw = Arc::new(HardwareMock::default());
    let workers: Vec<_> = (0..4u32)
        .map(|worker| {
            let hw = Arc::clone(&hw);
            thread::spawn(move || {
                let pin = hw.get_pin(0, worker);
                for i in 0..50 {
                    pin.digital_write(PinValue::from(i % 2 == 0));
                }
                hw.get_spi_bus(0).transfer(&[worker as u8]);
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    let states = hw.get_all_pin_states();
    assert_eq!(states.len(), 4);
    for worker in 0..4u32 {
        let calls = &states[&(0, worker)].calls;
        assert_eq!(calls.len(), 50);
        assert_eq!(calls[0], PinCall::DigitalWrite(PinValue::High));
        assert_eq!(calls[49], PinCall::DigitalWrite(PinValue::Low));
    }

    let transfers = &hw.get_all_spi_transactions()[&0];
    assert_eq!(transfers.len(), 4);
    let mut seen: Vec<u8> = transfers
        .iter()
        .map(|t| match t {
            SpiTransaction::Transfer(bytes) => bytes[0],
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);
}

#[test]
fn snapshots_serialize_for_failure_reports() {
    let hw = HardwareMock::default();
    let pin = hw.get_pin(1, 0);
    pin.set_mode(PinMode::Input);
    let _ = pin.digital_read();

    let snapshot = &hw.get_all_pin_states()[&(1, 0)];
    let json = serde_json::to_value(snapshot).expect("serialize snapshot");
    assert_eq!(
        json,
        serde_json::json!({
            "mode": "input",
            "value": null,
            "calls": [
                {"operation": "mode", "value": "input"},
                {"operation": "digital_read", "value": null}
            ]
        })
    );
}
