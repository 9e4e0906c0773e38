//! ---
//! hil_section: "02-wire-format"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Message schema helpers and protocol codecs."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod codec;
pub mod logging;
pub mod types;

/// Shared result type for wire format operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Failures raised while turning datagrams into messages and back.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The datagram was not valid UTF-8 text.
    #[error("datagram is not valid utf-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
    /// The text was not JSON, or not a JSON object.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The JSON object did not carry its discriminator key.
    #[error("message is missing the `{0}` discriminator")]
    MissingTag(&'static str),
    /// The discriminator named a variant this build does not know.
    #[error("unknown {field} `{tag}`")]
    UnknownTag {
        /// Discriminator key that was inspected.
        field: &'static str,
        /// Value found under the discriminator key.
        tag: String,
    },
    /// Serialization failed; only reachable through a programming error.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

pub use codec::{decode_as, WireChannel, WireFrame, WireMessage};
pub use logging::{log_frame, MessageDirection, WireMetricsExporter};
pub use types::{
    ChannelType, CommandKind, DataMessage, DataPoint, MessageKind, SamControlMessage, Unit,
    TIMESTAMP_TOLERANCE_SECS,
};
