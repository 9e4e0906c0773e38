//! ---
//! hil_section: "02-wire-format"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Message schema helpers and protocol codecs."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
//! One JSON object per datagram, discriminated by a string key.
//!
//! Decoding checks the discriminator before handing the object to serde so
//! that a missing or unknown tag is reported as such rather than as a generic
//! shape mismatch.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::types::{CommandKind, DataMessage, MessageKind, SamControlMessage};
use crate::{Result, WireError};

/// A message type that can cross the UDP boundary.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Key holding the variant tag.
    const DISCRIMINATOR: &'static str;

    /// Whether `tag` names a variant of this message type.
    fn is_known_tag(tag: &str) -> bool;

    /// Wire tag of this value.
    fn tag(&self) -> &'static str;

    /// Encode into UTF-8 JSON bytes.
    fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    /// Decode from UTF-8 JSON bytes.
    fn decode(bytes: &[u8]) -> Result<Self> {
        decode_tagged::<Self>(bytes)
    }
}

impl WireMessage for DataMessage {
    const DISCRIMINATOR: &'static str = "message_type";

    fn is_known_tag(tag: &str) -> bool {
        tag.parse::<MessageKind>().is_ok()
    }

    fn tag(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl WireMessage for SamControlMessage {
    const DISCRIMINATOR: &'static str = "command_type";

    fn is_known_tag(tag: &str) -> bool {
        CommandKind::ALL.iter().any(|kind| kind.as_str() == tag)
    }

    fn tag(&self) -> &'static str {
        self.kind().as_str()
    }
}

fn decode_tagged<M: WireMessage>(bytes: &[u8]) -> Result<M> {
    let text = std::str::from_utf8(bytes)?;
    let value: JsonValue = serde_json::from_str(text).map_err(WireError::Malformed)?;
    let tag = match value.as_object().map(|object| object.get(M::DISCRIMINATOR)) {
        None => {
            return Err(WireError::Malformed(serde::de::Error::custom(
                "expected a JSON object",
            )))
        }
        Some(None) => return Err(WireError::MissingTag(M::DISCRIMINATOR)),
        Some(Some(tag)) => tag,
    };
    let Some(tag) = tag.as_str() else {
        return Err(WireError::UnknownTag {
            field: M::DISCRIMINATOR,
            tag: tag.to_string(),
        });
    };
    if !M::is_known_tag(tag) {
        return Err(WireError::UnknownTag {
            field: M::DISCRIMINATOR,
            tag: tag.to_owned(),
        });
    }
    serde_json::from_value(value).map_err(WireError::Malformed)
}

/// Logical channel a datagram arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireChannel {
    /// Telemetry, identity and heartbeat traffic.
    Data,
    /// Flight computer commands.
    Control,
}

impl WireChannel {
    /// Short name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireChannel::Data => "data",
            WireChannel::Control => "control",
        }
    }
}

/// Any message decodable from one of the two channels.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    /// Decoded from the data channel.
    Data(DataMessage),
    /// Decoded from the command channel.
    Control(SamControlMessage),
}

/// Decode a datagram according to the channel it was read from.
pub fn decode_as(bytes: &[u8], channel: WireChannel) -> Result<WireFrame> {
    match channel {
        WireChannel::Data => DataMessage::decode(bytes).map(WireFrame::Data),
        WireChannel::Control => SamControlMessage::decode(bytes).map(WireFrame::Control),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelType, DataPoint};

    fn assert_messages_match(a: &DataMessage, b: &DataMessage) {
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.board_id(), b.board_id());
        assert_eq!(a.datapoints().len(), b.datapoints().len());
        for (left, right) in a.datapoints().iter().zip(b.datapoints()) {
            assert!(left.same_reading(right), "{:?} != {:?}", left, right);
        }
    }

    #[test]
    fn every_data_variant_survives_the_wire() {
        let points = vec![
            DataPoint::now(3.3, 2, ChannelType::ValveVoltage),
            DataPoint::now(101.325, 0, ChannelType::CurrentLoop),
        ];
        let messages = [
            DataMessage::identity("sam-test-01"),
            DataMessage::flight_heartbeat(),
            DataMessage::sam_data("sam-test-01", points.clone()),
            DataMessage::bms_data("bms-01", points[0]),
            DataMessage::ahrs_data("ahrs-01", points),
            DataMessage::Sam {
                board_id: Some("partial".into()),
                datapoints: None,
            },
        ];
        for message in &messages {
            let bytes = message.encode().expect("encode");
            let decoded = DataMessage::decode(&bytes).expect("decode");
            assert_messages_match(message, &decoded);
            assert_eq!(&decoded, message);
        }
    }

    fn encoded_text<M: WireMessage>(message: &M) -> String {
        String::from_utf8(message.encode().expect("encode")).expect("utf8")
    }

    #[test]
    fn encoded_shapes_are_stable() {
        let point = DataPoint::new(3.3, 1_700_000_000.25, 2, ChannelType::ValveVoltage);
        insta::assert_snapshot!(
            encoded_text(&DataMessage::flight_heartbeat()),
            @r#"{"message_type":"flight_heartbeat"}"#
        );
        insta::assert_snapshot!(
            encoded_text(&DataMessage::identity("sam-01")),
            @r#"{"message_type":"identity","board_id":"sam-01"}"#
        );
        insta::assert_snapshot!(
            encoded_text(&DataMessage::sam_data("sam-01", vec![point])),
            @r#"{"message_type":"sam","board_id":"sam-01","datapoints":[{"value":3.3,"timestamp":1700000000.25,"channel":2,"channel_type":"valve_voltage"}]}"#
        );
        insta::assert_snapshot!(
            encoded_text(&DataMessage::bms_data("bms-01", point)),
            @r#"{"message_type":"bms","board_id":"bms-01","datapoint":{"value":3.3,"timestamp":1700000000.25,"channel":2,"channel_type":"valve_voltage"}}"#
        );
        insta::assert_snapshot!(
            encoded_text(&DataMessage::ahrs_data("ahrs-01", Vec::new())),
            @r#"{"message_type":"ahrs","board_id":"ahrs-01","datapoints":[]}"#
        );
        insta::assert_snapshot!(
            encoded_text(&SamControlMessage::actuate_valve(1, true)),
            @r#"{"command_type":"actuate_valve","channel":1,"powered":true}"#
        );
    }

    #[test]
    fn absent_command_fields_are_omitted() {
        let cmd = SamControlMessage::ActuateValve {
            channel: Some(3),
            powered: None,
        };
        let text = encoded_text(&cmd);
        insta::assert_snapshot!(text, @r#"{"command_type":"actuate_valve","channel":3}"#);
        assert_eq!(SamControlMessage::decode(text.as_bytes()).expect("decode"), cmd);
    }

    #[test]
    fn null_command_fields_decode_as_absent() {
        let cmd = SamControlMessage::decode(
            br#"{"command_type":"actuate_valve","channel":null,"powered":null}"#,
        )
        .expect("decode");
        assert_eq!(cmd.channel(), None);
        assert_eq!(cmd.powered(), None);
    }

    #[test]
    fn missing_payload_fields_decode_as_absent() {
        let message = DataMessage::decode(br#"{"message_type":"identity"}"#).expect("decode");
        assert_eq!(message, DataMessage::Identity { board_id: None });

        let bms = DataMessage::decode(br#"{"message_type":"bms","board_id":"b"}"#)
            .expect("decode");
        assert_eq!(bms.kind(), MessageKind::Bms);
        assert!(bms.datapoints().is_empty());
    }

    #[test]
    fn unexpected_extra_keys_are_ignored() {
        let message =
            DataMessage::decode(br#"{"message_type":"flight_heartbeat","seq":7}"#).expect("decode");
        assert_eq!(message, DataMessage::flight_heartbeat());
    }

    #[test]
    fn missing_discriminator_is_rejected() {
        let err = DataMessage::decode(br#"{"board_id":"sam-01"}"#).expect_err("no tag");
        assert!(matches!(err, WireError::MissingTag("message_type")));

        let err = SamControlMessage::decode(br#"{"channel":1}"#).expect_err("no tag");
        assert!(matches!(err, WireError::MissingTag("command_type")));
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let err = DataMessage::decode(br#"{"message_type":"gps","board_id":"x"}"#)
            .expect_err("unknown tag");
        match err {
            WireError::UnknownTag { field, tag } => {
                assert_eq!(field, "message_type");
                assert_eq!(tag, "gps");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = DataMessage::decode(br#"{"message_type":5}"#).expect_err("numeric tag");
        assert!(matches!(err, WireError::UnknownTag { .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            DataMessage::decode(&[0xff, 0xfe, 0x00]),
            Err(WireError::InvalidText(_))
        ));
        assert!(matches!(
            DataMessage::decode(b"{not json"),
            Err(WireError::Malformed(_))
        ));
        assert!(matches!(
            DataMessage::decode(b"[1,2,3]"),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn wrongly_typed_payload_fields_decode_as_absent() {
        let sam = DataMessage::decode(
            br#"{"message_type":"sam","board_id":"sam-01","datapoints":"nope"}"#,
        )
        .expect("decode");
        assert_eq!(
            sam,
            DataMessage::Sam {
                board_id: Some("sam-01".into()),
                datapoints: None,
            }
        );

        let identity =
            DataMessage::decode(br#"{"message_type":"identity","board_id":42}"#).expect("decode");
        assert_eq!(identity, DataMessage::Identity { board_id: None });

        let bms = DataMessage::decode(
            br#"{"message_type":"bms","board_id":"b","datapoint":{"value":"high"}}"#,
        )
        .expect("decode");
        assert_eq!(bms.board_id(), Some("b"));
        assert!(bms.datapoints().is_empty());

        let cmd = SamControlMessage::decode(
            br#"{"command_type":"actuate_valve","channel":"three","powered":true}"#,
        )
        .expect("decode");
        assert_eq!(cmd.channel(), None);
        assert_eq!(cmd.powered(), Some(true));
    }

    #[test]
    fn decode_as_routes_by_channel() {
        let data = DataMessage::identity("sam-01").encode().expect("encode");
        let control = SamControlMessage::actuate_valve(1, true)
            .encode()
            .expect("encode");

        assert!(matches!(
            decode_as(&data, WireChannel::Data),
            Ok(WireFrame::Data(DataMessage::Identity { .. }))
        ));
        assert!(matches!(
            decode_as(&control, WireChannel::Control),
            Ok(WireFrame::Control(_))
        ));
        assert!(decode_as(&data, WireChannel::Control).is_err());
    }
}
