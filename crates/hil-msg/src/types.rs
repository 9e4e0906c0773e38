//! ---
//! hil_section: "02-wire-format"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Message schema helpers and protocol codecs."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError};

/// Tolerance applied when comparing timestamps that crossed the wire.
pub const TIMESTAMP_TOLERANCE_SECS: f64 = 1e-3;

/// Physical unit attached to a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Current, in amperes.
    Amps,
    /// Pressure, in pounds per square inch.
    Psi,
    /// Temperature, in Kelvin.
    Kelvin,
    /// Force, in pounds.
    Pounds,
    /// Electric potential, in volts.
    Volts,
}

/// Kind of channel a data point was sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Pressure transducer on a 4-20 mA loop.
    CurrentLoop,
    /// Voltage present on a valve driver pin.
    ValveVoltage,
    /// Current through a valve driver pin.
    ValveCurrent,
    /// Board power rail voltage.
    RailVoltage,
    /// Board power rail current.
    RailCurrent,
    /// Load cell signal carried by a differential pair.
    DifferentialSignal,
    /// Resistance thermometer.
    Rtd,
    /// Thermocouple.
    Tc,
}

impl ChannelType {
    /// Every channel type, in declaration order.
    pub const ALL: [ChannelType; 8] = [
        ChannelType::CurrentLoop,
        ChannelType::ValveVoltage,
        ChannelType::ValveCurrent,
        ChannelType::RailVoltage,
        ChannelType::RailCurrent,
        ChannelType::DifferentialSignal,
        ChannelType::Rtd,
        ChannelType::Tc,
    ];

    /// Unit of readings taken on this channel type.
    pub fn unit(&self) -> Unit {
        match self {
            ChannelType::CurrentLoop => Unit::Psi,
            ChannelType::ValveVoltage => Unit::Volts,
            ChannelType::ValveCurrent => Unit::Amps,
            ChannelType::RailVoltage => Unit::Volts,
            ChannelType::RailCurrent => Unit::Amps,
            ChannelType::DifferentialSignal => Unit::Pounds,
            ChannelType::Rtd => Unit::Kelvin,
            ChannelType::Tc => Unit::Kelvin,
        }
    }
}

/// Single timestamped reading from one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    value: f64,
    timestamp: f64,
    channel: u32,
    channel_type: ChannelType,
}

impl DataPoint {
    /// Construct a data point with an explicit timestamp (seconds since epoch).
    pub fn new(value: f64, timestamp: f64, channel: u32, channel_type: ChannelType) -> Self {
        Self {
            value,
            timestamp,
            channel,
            channel_type,
        }
    }

    /// Construct a data point stamped with the current wall-clock time.
    pub fn now(value: f64, channel: u32, channel_type: ChannelType) -> Self {
        Self::new(value, epoch_seconds(), channel, channel_type)
    }

    /// Sampled value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Seconds since the Unix epoch at sampling time.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Channel index on the producing board.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Channel classification.
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Unit derived from the channel type.
    pub fn unit(&self) -> Unit {
        self.channel_type.unit()
    }

    /// Equality with timestamps compared within [`TIMESTAMP_TOLERANCE_SECS`].
    pub fn same_reading(&self, other: &DataPoint) -> bool {
        self.value == other.value
            && self.channel == other.channel
            && self.channel_type == other.channel_type
            && (self.timestamp - other.timestamp).abs() < TIMESTAMP_TOLERANCE_SECS
    }
}

fn epoch_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Discriminator values of [`DataMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Handshake identity announcement.
    Identity,
    /// Flight computer liveness signal.
    FlightHeartbeat,
    /// SAM board telemetry.
    Sam,
    /// Battery management telemetry.
    Bms,
    /// Attitude and heading reference telemetry.
    Ahrs,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 5] = [
        MessageKind::Identity,
        MessageKind::FlightHeartbeat,
        MessageKind::Sam,
        MessageKind::Bms,
        MessageKind::Ahrs,
    ];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Identity => "identity",
            MessageKind::FlightHeartbeat => "flight_heartbeat",
            MessageKind::Sam => "sam",
            MessageKind::Bms => "bms",
            MessageKind::Ahrs => "ahrs",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown message type: {}", s))
    }
}

/// Data channel message, tagged by `message_type`.
///
/// Payload fields are optional on decode: a peer that omits `board_id`, or
/// sends it with the wrong JSON type, still produces a message of the right
/// kind with the field absent.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum DataMessage {
    /// Identity announcement used by the handshake.
    Identity {
        /// Board identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        board_id: Option<String>,
    },
    /// Flight computer heartbeat; carries no payload.
    FlightHeartbeat {},
    /// SAM telemetry batch.
    Sam {
        /// Board identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        board_id: Option<String>,
        /// Readings in sampling order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        datapoints: Option<Vec<DataPoint>>,
    },
    /// BMS telemetry carrying a single reading.
    Bms {
        /// Board identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        board_id: Option<String>,
        /// The reading.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        datapoint: Option<DataPoint>,
    },
    /// AHRS telemetry batch.
    Ahrs {
        /// Board identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        board_id: Option<String>,
        /// Readings in sampling order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        datapoints: Option<Vec<DataPoint>>,
    },
}

impl DataMessage {
    /// Identity handshake message.
    pub fn identity(board_id: impl Into<String>) -> Self {
        DataMessage::Identity {
            board_id: Some(board_id.into()),
        }
    }

    /// Flight computer heartbeat.
    pub fn flight_heartbeat() -> Self {
        DataMessage::FlightHeartbeat {}
    }

    /// SAM telemetry message.
    pub fn sam_data(board_id: impl Into<String>, datapoints: Vec<DataPoint>) -> Self {
        DataMessage::Sam {
            board_id: Some(board_id.into()),
            datapoints: Some(datapoints),
        }
    }

    /// BMS telemetry message.
    pub fn bms_data(board_id: impl Into<String>, datapoint: DataPoint) -> Self {
        DataMessage::Bms {
            board_id: Some(board_id.into()),
            datapoint: Some(datapoint),
        }
    }

    /// AHRS telemetry message.
    pub fn ahrs_data(board_id: impl Into<String>, datapoints: Vec<DataPoint>) -> Self {
        DataMessage::Ahrs {
            board_id: Some(board_id.into()),
            datapoints: Some(datapoints),
        }
    }

    /// Discriminator of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            DataMessage::Identity { .. } => MessageKind::Identity,
            DataMessage::FlightHeartbeat {} => MessageKind::FlightHeartbeat,
            DataMessage::Sam { .. } => MessageKind::Sam,
            DataMessage::Bms { .. } => MessageKind::Bms,
            DataMessage::Ahrs { .. } => MessageKind::Ahrs,
        }
    }

    /// Board identifier, when the variant carries one and it was present.
    pub fn board_id(&self) -> Option<&str> {
        match self {
            DataMessage::Identity { board_id }
            | DataMessage::Sam { board_id, .. }
            | DataMessage::Bms { board_id, .. }
            | DataMessage::Ahrs { board_id, .. } => board_id.as_deref(),
            DataMessage::FlightHeartbeat {} => None,
        }
    }

    /// Readings carried by the message; BMS yields its single reading.
    pub fn datapoints(&self) -> &[DataPoint] {
        match self {
            DataMessage::Sam { datapoints, .. } | DataMessage::Ahrs { datapoints, .. } => {
                datapoints.as_deref().unwrap_or(&[])
            }
            DataMessage::Bms { datapoint, .. } => match datapoint {
                Some(point) => std::slice::from_ref(point),
                None => &[],
            },
            DataMessage::Identity { .. } | DataMessage::FlightHeartbeat {} => &[],
        }
    }
}

/// Discriminator values of [`SamControlMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Energise or de-energise a valve channel.
    ActuateValve,
}

impl CommandKind {
    /// Every command kind.
    pub const ALL: [CommandKind; 1] = [CommandKind::ActuateValve];

    /// Wire tag for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::ActuateValve => "actuate_valve",
        }
    }
}

/// Command sent from the flight computer to the SAM board, tagged by `command_type`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum SamControlMessage {
    /// Drive a valve channel.
    ActuateValve {
        /// Valve channel index.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        channel: Option<u32>,
        /// Whether the valve should be powered.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde_as(as = "DefaultOnError")]
        powered: Option<bool>,
    },
}

impl SamControlMessage {
    /// Valve actuation command.
    pub fn actuate_valve(channel: u32, powered: bool) -> Self {
        SamControlMessage::ActuateValve {
            channel: Some(channel),
            powered: Some(powered),
        }
    }

    /// Discriminator of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            SamControlMessage::ActuateValve { .. } => CommandKind::ActuateValve,
        }
    }

    /// Channel targeted by the command, when present.
    pub fn channel(&self) -> Option<u32> {
        match self {
            SamControlMessage::ActuateValve { channel, .. } => *channel,
        }
    }

    /// Requested power state, when present.
    pub fn powered(&self) -> Option<bool> {
        match self {
            SamControlMessage::ActuateValve { powered, .. } => *powered,
        }
    }
}
