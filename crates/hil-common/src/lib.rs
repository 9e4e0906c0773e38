//! ---
//! hil_section: "01-core-functionality"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Shared primitives and utilities for the HIL harness."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! Shared primitives for the HIL flight computer workspace.
//! This crate exposes configuration loading, hardware mode selection,
//! tracing setup, and deadline helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    HardwareConfig, HardwareMode, HilConfig, LocalConfig, LoggingConfig, SessionTimings,
    TargetConfig,
};
pub use logging::{init_tracing, LogFormat};
