//! ---
//! hil_section: "06-testing"
//! hil_subsection: "integration-tests"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "End-to-end scenarios for the HIL flight computer emulator."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use anyhow::Result;
use hil_common::{init_tracing, HardwareMode, HilConfig};
use hil_mock::HardwareMock;
use hil_session::{FlightComputerClient, SessionConfig};
use hil_testharness::{ScriptedTarget, TargetScript};

fn bench_config(data_port: u16, command_port: u16) -> String {
    format!(
        r#"
[target]
host = "sam-bench.invalid"
data_port = {data_port}
command_port = {command_port}

[local]
bind_host = "127.0.0.1"
data_port = 0
command_port = 0

[session]
heartbeat_interval_ms = 200
handshake_timeout_ms = 1500

[hardware]
mode = "real"

[logging]
format = "pretty"
"#
    )
}

#[test]
fn file_config_with_env_overrides_drives_a_session() -> Result<()> {
    let target = ScriptedTarget::spawn(TargetScript::answering("sam-01"))?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hil.toml");
    fs::write(&path, bench_config(target.data_port(), target.command_port()))?;

    let mut config = HilConfig::from_path(&path)?;
    config.apply_overrides_from(|key| match key {
        "SAM_TARGET" => Some("127.0.0.1".to_string()),
        "HIL_MODE" => Some("mock".to_string()),
        _ => None,
    })?;
    init_tracing(&config.logging)?;

    assert_eq!(config.hardware.mode, HardwareMode::Mock);
    let hw = HardwareMock::new(config.hardware.mode);
    assert!(hw.is_mock_mode());

    let mut client = FlightComputerClient::new(SessionConfig::from(&config))?;
    // bounded by handshake_timeout_ms from the file
    assert!(client.connect("flight-01"));

    let before = target.heartbeat_count();
    std::thread::sleep(Duration::from_millis(700));
    // 200ms interval configured in the file
    assert!(target.heartbeat_count() - before >= 2);

    client.close();
    Ok(())
}

#[test]
fn missing_candidates_are_reported() {
    if std::env::var(HilConfig::ENV_CONFIG_PATH).is_ok() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let err = HilConfig::load(&[&missing]).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn first_existing_candidate_wins() -> Result<()> {
    if std::env::var(HilConfig::ENV_CONFIG_PATH).is_ok() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("present.toml");
    fs::write(&present, bench_config(4573, 8378))?;

    let loaded = HilConfig::load_with_source(&[&missing, &present])?;
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.hardware.mode, HardwareMode::Real);
    assert_eq!(loaded.config.session.heartbeat_interval_ms, Duration::from_millis(200));
    Ok(())
}

#[test]
fn real_mode_registry_still_answers_lookups() {
    let hw = HardwareMock::new(HardwareMode::Real);
    assert!(!hw.is_mock_mode());
    let pin = hw.get_pin(0, 1);
    assert!(pin.same_pin(&hw.get_pin(0, 1)));
    assert_eq!(hw.get_spi_bus(0).transfer(&[1, 2]), vec![0, 0]);
}
