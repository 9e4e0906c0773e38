//! ---
//! hil_section: "01-core-functionality"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Shared primitives and utilities for the HIL harness."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Environment variable selecting mock or real hardware backing.
pub const ENV_HIL_MODE: &str = "HIL_MODE";
/// Environment variable overriding the target host.
pub const ENV_SAM_TARGET: &str = "SAM_TARGET";

fn default_target_host() -> String {
    "localhost".to_owned()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_data_port() -> u16 {
    4573
}

const fn default_command_port() -> u16 {
    8378
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_receive_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_wait_slice() -> Duration {
    Duration::from_millis(100)
}

const fn default_recv_buffer_bytes() -> usize {
    2048
}

/// Primary configuration object for a HIL session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HilConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub session: SessionTimings,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`HilConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHilConfig {
    pub config: HilConfig,
    pub source: PathBuf,
}

impl HilConfig {
    pub const ENV_CONFIG_PATH: &str = "HIL_CONFIG";

    /// Load configuration from disk, respecting the `HIL_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHilConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHilConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedHilConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<HilConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HIL_MODE` and `SAM_TARGET` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_HIL_MODE).filter(|v| !v.trim().is_empty()) {
            self.hardware.mode = mode.parse().map_err(|err: String| anyhow!(err))?;
        }
        if let Some(host) = lookup(ENV_SAM_TARGET).filter(|v| !v.trim().is_empty()) {
            self.target.host = host.trim().to_owned();
        }
        self.validate()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.target.host.trim().is_empty() {
            return Err(anyhow!("target host cannot be empty"));
        }
        if self.local.bind_host.trim().is_empty() {
            return Err(anyhow!("local bind host cannot be empty"));
        }
        self.session.validate()
    }
}

impl std::str::FromStr for HilConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HilConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Remote endpoints exposed by the board under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_host")]
    pub host: String,
    #[serde(default = "default_data_port")]
    pub data_port: u16,
    #[serde(default = "default_command_port")]
    pub command_port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_target_host(),
            data_port: default_data_port(),
            command_port: default_command_port(),
        }
    }
}

/// Local socket bindings used by the emulated flight computer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_data_port")]
    pub data_port: u16,
    #[serde(default = "default_command_port")]
    pub command_port: u16,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            data_port: default_data_port(),
            command_port: default_command_port(),
        }
    }
}

/// Timing knobs for the session client.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimings {
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub heartbeat_interval_ms: Duration,
    #[serde(default = "default_handshake_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub handshake_timeout_ms: Duration,
    #[serde(default = "default_receive_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub receive_timeout_ms: Duration,
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval_ms: Duration,
    #[serde(default = "default_wait_slice")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub wait_slice_ms: Duration,
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            handshake_timeout_ms: default_handshake_timeout(),
            receive_timeout_ms: default_receive_timeout(),
            poll_interval_ms: default_poll_interval(),
            wait_slice_ms: default_wait_slice(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
        }
    }
}

impl SessionTimings {
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms.is_zero() {
            return Err(anyhow!("session heartbeat interval must be non-zero"));
        }
        if self.poll_interval_ms > self.heartbeat_interval_ms {
            return Err(anyhow!(
                "poll interval ({:?}) must not exceed heartbeat interval ({:?})",
                self.poll_interval_ms,
                self.heartbeat_interval_ms
            ));
        }
        if self.recv_buffer_bytes == 0 {
            return Err(anyhow!("receive buffer must hold at least one byte"));
        }
        Ok(())
    }
}

/// Backing used for GPIO/SPI access.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    #[default]
    Mock,
    Real,
}

impl HardwareMode {
    /// Read `HIL_MODE`, defaulting to mock when unset or unrecognised.
    pub fn from_env() -> Self {
        match std::env::var(ENV_HIL_MODE) {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "ignoring invalid {}", ENV_HIL_MODE);
                HardwareMode::Mock
            }),
            Err(_) => HardwareMode::Mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, HardwareMode::Mock)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareMode::Mock => "mock",
            HardwareMode::Real => "real",
        }
    }
}

impl std::str::FromStr for HardwareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(HardwareMode::Mock),
            "real" => Ok(HardwareMode::Real),
            other => Err(format!("unknown hardware mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub mode: HardwareMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when neither `HIL_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub directive: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_target_ports() {
        let config = HilConfig::default();
        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.data_port, 4573);
        assert_eq!(config.target.command_port, 8378);
        assert_eq!(config.local.data_port, 4573);
        assert_eq!(config.session.heartbeat_interval_ms, Duration::from_millis(500));
        assert_eq!(config.session.recv_buffer_bytes, 2048);
        assert!(config.hardware.mode.is_mock());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn parses_partial_toml() {
        let config: HilConfig = r#"
            [target]
            host = "10.0.0.21"

            [session]
            heartbeat_interval_ms = 250
            handshake_timeout_ms = 1500

            [hardware]
            mode = "real"
        "#
        .parse()
        .expect("valid config");

        assert_eq!(config.target.host, "10.0.0.21");
        assert_eq!(config.target.command_port, 8378);
        assert_eq!(config.session.heartbeat_interval_ms, Duration::from_millis(250));
        assert_eq!(config.session.handshake_timeout_ms, Duration::from_millis(1500));
        assert_eq!(config.session.poll_interval_ms, Duration::from_millis(10));
        assert_eq!(config.hardware.mode, HardwareMode::Real);
    }

    #[test]
    fn rejects_zero_heartbeat() {
        let err = "[session]\nheartbeat_interval_ms = 0\n"
            .parse::<HilConfig>()
            .expect_err("zero heartbeat rejected");
        assert!(err.to_string().contains("heartbeat"));
    }

    #[test]
    fn rejects_poll_slower_than_heartbeat() {
        let mut config = HilConfig::default();
        config.session.poll_interval_ms = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_apply_mode_and_host() {
        let vars: HashMap<&str, &str> =
            [(ENV_HIL_MODE, "REAL"), (ENV_SAM_TARGET, " sam-bench.local ")]
                .into_iter()
                .collect();
        let mut config = HilConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .expect("overrides valid");
        assert_eq!(config.hardware.mode, HardwareMode::Real);
        assert_eq!(config.target.host, "sam-bench.local");
    }

    #[test]
    fn invalid_mode_override_is_an_error() {
        let mut config = HilConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == ENV_HIL_MODE).then(|| "simulated".to_string())
        });
        assert!(result.is_err());
        assert!(config.hardware.mode.is_mock());
    }

    #[test]
    fn load_picks_first_existing_candidate() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[target]\ndata_port = 5000").expect("write config");
        let missing = PathBuf::from("/definitely/not/here.toml");
        let loaded = HilConfig::load_with_source(&[missing, file.path().to_path_buf()])
            .expect("load succeeds");
        assert_eq!(loaded.source, file.path());
        assert_eq!(loaded.config.target.data_port, 5000);
    }

    #[test]
    fn load_reports_inspected_paths() {
        let err = HilConfig::load(&["/nope/a.toml", "/nope/b.toml"]).expect_err("no files");
        let text = err.to_string();
        assert!(text.contains("/nope/a.toml"));
        assert!(text.contains("/nope/b.toml"));
    }

    #[test]
    fn hardware_mode_parsing() {
        assert_eq!("Mock".parse::<HardwareMode>(), Ok(HardwareMode::Mock));
        assert_eq!(" real ".parse::<HardwareMode>(), Ok(HardwareMode::Real));
        assert!("bench".parse::<HardwareMode>().is_err());
        assert_eq!(HardwareMode::Real.as_str(), "real");
    }
}
