//! ---
//! hil_section: "03-hardware-mocks"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "GPIO and SPI mock registry."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! In-memory stand-ins for the GPIO and SPI resources a board driver touches.
//!
//! A [`HardwareMock`] is constructed per test session, reset between test
//! cases with [`HardwareMock::reset_all`], and dropped at the end. Handles
//! returned by the registry are cheap clones sharing state, so the same key
//! always resolves to the same logical entity.
#![warn(missing_docs)]

pub mod gpio;
pub mod registry;
pub mod spi;

pub use gpio::{GpioController, Pin, PinCall, PinMode, PinSnapshot, PinValue};
pub use hil_common::HardwareMode;
pub use registry::HardwareMock;
pub use spi::{SpiBus, SpiTransaction};
