use core::fmt;

use heapless::String;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    codec::{push_hex, u8_from_hex_nibbles},
    encode_fields,
    extended::ExtendedMessage,
    message::reduce,
    registry::{lookup, lookup_mnemonic, OpcodeSpec},
    Args, CanHeader, CanHeaderConfig, CodecConfig, EncodeError, FieldError, Message, RangePolicy,
    MAX_CAN_ID, MAX_FRAME_SIZE, MAX_MAJOR_PRIORITY, MAX_MINOR_PRIORITY, STANDARD_ID_SIZE,
};

/// A wire-ready frame such as `:SB780N10;`
pub type Frame = String<MAX_FRAME_SIZE>;

const MIN_STANDARD_LENGTH: usize = 9;
const MIN_EXTENDED_LENGTH: usize = 11;
const OPCODE_INDEX: usize = 2 + STANDARD_ID_SIZE + 1;

/// The type marker following the leading `:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IdKind {
    #[default]
    Standard = b'S',
    Extended = b'X',
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdType {
    Standard,
    Extended,
    Unknown,
}

impl IdType {
    /// `Standard`, `Extended`, or empty for frames that could not be classified
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Extended => "Extended",
            Self::Unknown => "",
        }
    }
}

/// Result of decoding any frame. Decoding never fails; frames that cannot be
/// classified come back as [`Decoded::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    Standard(Message<'a>),
    Extended(ExtendedMessage<'a>),
    Unknown(&'a str),
}

impl<'a> Decoded<'a> {
    pub fn id_type(&self) -> IdType {
        match self {
            Self::Standard(_) => IdType::Standard,
            Self::Extended(_) => IdType::Extended,
            Self::Unknown(_) => IdType::Unknown,
        }
    }

    pub fn encoded(&self) -> &'a str {
        match self {
            Self::Standard(message) => message.encoded(),
            Self::Extended(message) => message.encoded(),
            Self::Unknown(encoded) => encoded,
        }
    }

    pub fn as_standard(&self) -> Option<&Message<'a>> {
        match self {
            Self::Standard(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_extended(&self) -> Option<&ExtendedMessage<'a>> {
        match self {
            Self::Extended(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for Decoded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(message) => fmt::Display::fmt(message, f),
            Self::Extended(message) => fmt::Display::fmt(message, f),
            Self::Unknown(_) => f.write_str("Unsupported message"),
        }
    }
}

/// Decodes one frame of either shape
pub fn decode(frame: &str) -> Decoded<'_> {
    let bytes = frame.as_bytes();

    match bytes.get(1).map(|marker| IdKind::try_from(*marker)) {
        Some(Ok(IdKind::Standard)) if bytes.len() >= MIN_STANDARD_LENGTH => decode_standard(frame),
        Some(Ok(IdKind::Extended)) if bytes.len() >= MIN_EXTENDED_LENGTH => {
            Decoded::Extended(ExtendedMessage::decode(frame))
        }
        _ => {
            log::debug!("unsupported frame {}", frame);
            Decoded::Unknown(frame)
        }
    }
}

fn decode_standard(frame: &str) -> Decoded<'_> {
    let bytes = frame.as_bytes();

    let opcode = match u8_from_hex_nibbles(&[bytes[OPCODE_INDEX], bytes[OPCODE_INDEX + 1]]) {
        Ok(opcode) => opcode,
        Err(e) => {
            log::debug!("frame {} has no readable opcode: {}", frame, e);
            return Decoded::Unknown(frame);
        }
    };

    let header = <&[u8; STANDARD_ID_SIZE]>::try_from(&bytes[2..2 + STANDARD_ID_SIZE])
        .ok()
        .and_then(|id| CanHeader::from_hex(id).ok());

    let payload = frame.get(OPCODE_INDEX + 2..).unwrap_or("");

    Decoded::Standard(Message::decode(frame, header, opcode, payload))
}

/// Header values an encode call may override. Anything left as `None` comes
/// from the codec's [`CanHeaderConfig`] or the opcode's default minor priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaderOptions {
    pub major_priority: Option<u8>,
    pub minor_priority: Option<u8>,
    pub can_id: Option<u8>,
}

/// Encodes and decodes standard frames using a stored header default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn header_defaults(&self) -> CanHeaderConfig {
        self.config.header
    }

    /// Updates whichever defaults are given, reducing them into range
    pub fn set_header_defaults(&mut self, major_priority: Option<u8>, can_id: Option<u8>) {
        let current = self.config.header;

        self.config.header = CanHeaderConfig::new(
            major_priority.unwrap_or(current.major_priority()),
            can_id.unwrap_or(current.can_id()),
        );
    }

    pub fn decode<'a>(&self, frame: &'a str) -> Decoded<'a> {
        decode(frame)
    }

    /// Encodes `mnemonic` (any case) with the stored header defaults
    pub fn encode(&self, mnemonic: &str, args: &Args<'_, '_>) -> Result<Frame, EncodeError> {
        self.encode_with(mnemonic, HeaderOptions::default(), args)
    }

    pub fn encode_with(
        &self,
        mnemonic: &str,
        options: HeaderOptions,
        args: &Args<'_, '_>,
    ) -> Result<Frame, EncodeError> {
        let spec = lookup_mnemonic(mnemonic).ok_or(EncodeError::UnknownMnemonic)?;

        self.encode_spec(spec, options, args)
    }

    pub fn encode_opcode(&self, opcode: u8, args: &Args<'_, '_>) -> Result<Frame, EncodeError> {
        let spec = lookup(opcode).ok_or(EncodeError::UnknownOpcode(opcode))?;

        self.encode_spec(spec, HeaderOptions::default(), args)
    }

    pub fn encode_spec(
        &self,
        spec: &OpcodeSpec,
        options: HeaderOptions,
        args: &Args<'_, '_>,
    ) -> Result<Frame, EncodeError> {
        let header = self.header_for(spec, options)?;
        let mut frame = Frame::new();

        header.write_prefix(&mut frame)?;
        push_hex(&mut frame, spec.opcode as u32, 2)?;
        encode_fields(spec, args, self.config.range_policy, &mut frame)?;
        frame.push(';').map_err(|_| FieldError::BufferFull)?;

        log::trace!("encoded {} as {}", spec.mnemonic, frame);

        Ok(frame)
    }

    /// Resolves the header for `spec`, checking explicit values against the
    /// range policy
    pub fn header_for(&self, spec: &OpcodeSpec, options: HeaderOptions) -> Result<CanHeader, EncodeError> {
        let defaults = self.config.header;
        let policy = self.config.range_policy;

        let major_priority = options
            .major_priority
            .unwrap_or(defaults.major_priority());
        let minor_priority = options.minor_priority.unwrap_or(spec.minor_priority);
        let can_id = options.can_id.unwrap_or(defaults.can_id());

        if policy == RangePolicy::Reject {
            reduce(policy, "majorPriority", major_priority as u32, MAX_MAJOR_PRIORITY as u32)?;
            reduce(policy, "minorPriority", minor_priority as u32, MAX_MINOR_PRIORITY as u32)?;
            reduce(policy, "canId", can_id as u32, MAX_CAN_ID as u32)?;
        }

        Ok(CanHeader::new(major_priority, minor_priority, can_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        CanHeaderConfig, Codec, CodecConfig, Decoded, Direction, EncodeError, FieldValue,
        HeaderOptions, IdType, RangePolicy, UNSUPPORTED,
    };

    use super::decode;

    #[test]
    fn classification() {
        assert_eq!(decode(":SB780N10;").id_type(), IdType::Standard);
        assert_eq!(decode(":X00080004N").id_type(), IdType::Extended);

        for frame in ["", ":", ":SB780N1", ":X0008000N", ":TB780N10;", "\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}"] {
            let decoded = decode(frame);

            assert_eq!(decoded, Decoded::Unknown(frame));
            assert_eq!(decoded.id_type().as_str(), "");
            assert_eq!(decoded.encoded(), frame);
        }
    }

    #[test]
    fn unreadable_opcode() {
        assert_eq!(decode(":SB780NZZ;"), Decoded::Unknown(":SB780NZZ;"));
        assert_eq!(format_decoded(":SB780NZZ;").as_str(), "Unsupported message");
    }

    #[test]
    fn rqnp_test_vector() {
        let codec = Codec::new(CodecConfig::default().with_header(CanHeaderConfig::new(2, 60)));

        assert_eq!(codec.encode("RQNP", &[]).unwrap().as_str(), ":SB780N10;");
        assert_eq!(codec.encode_opcode(0x10, &[]).unwrap().as_str(), ":SB780N10;");
    }

    #[test]
    fn header_defaults_and_overrides() {
        let mut codec = Codec::default();

        assert_eq!(codec.header_defaults(), CanHeaderConfig::new(2, 60));

        codec.set_header_defaults(Some(3), None);
        assert_eq!(codec.header_defaults().major_priority(), 2);

        codec.set_header_defaults(None, Some(128));
        assert_eq!(codec.header_defaults().can_id(), 0);
        assert_eq!(codec.encode("ACK", &[]).unwrap().as_str(), ":SA000N00;");

        codec.set_header_defaults(Some(0), Some(1));
        let frame = codec
            .encode_with(
                "HLT",
                HeaderOptions {
                    minor_priority: Some(4),
                    ..Default::default()
                },
                &[],
            )
            .unwrap();
        assert_eq!(frame.as_str(), ":S0020N02;");

        let frame = codec
            .encode_with(
                "HLT",
                HeaderOptions {
                    major_priority: Some(1),
                    minor_priority: Some(1),
                    can_id: Some(127),
                },
                &[],
            )
            .unwrap();
        assert_eq!(frame.as_str(), ":S5FE0N02;");
    }

    #[test]
    fn rejecting_codec() {
        let codec = Codec::new(CodecConfig::default().with_range_policy(RangePolicy::Reject));

        assert_eq!(
            codec.encode_with(
                "ACK",
                HeaderOptions {
                    major_priority: Some(3),
                    ..Default::default()
                },
                &[]
            ),
            Err(EncodeError::OutOfRange {
                field: "majorPriority",
                value: 3,
                max: 2
            })
        );

        assert_eq!(
            codec.encode(
                "DSPD",
                &[
                    ("session", FieldValue::Int(1)),
                    ("speed", FieldValue::Int(128)),
                    ("direction", FieldValue::Direction(Direction::Forward)),
                ]
            ),
            Err(EncodeError::OutOfRange {
                field: "speed",
                value: 128,
                max: 127
            })
        );
    }

    #[test]
    fn unknown_mnemonics_and_opcodes() {
        let codec = Codec::default();

        assert_eq!(codec.encode("NOPE", &[]), Err(EncodeError::UnknownMnemonic));
        assert_eq!(codec.encode_opcode(0x0B, &[]), Err(EncodeError::UnknownOpcode(0x0B)));
    }

    #[test]
    fn standard_decode() {
        let decoded = decode(":SB780N9000010002;");
        let message = decoded.as_standard().unwrap();

        assert_eq!(message.mnemonic(), "ACON");
        assert_eq!(message.opcode(), 0x90);
        assert_eq!(message.int("nodeNumber"), Some(1));
        assert_eq!(message.int("eventNumber"), Some(2));
        assert_eq!(message.header().unwrap().can_id(), 60);
        assert_eq!(message.header().unwrap().minor_priority(), 3);
        assert_eq!(
            format_decoded(":SB780N9000010002;").as_str(),
            "ACON (90) nodeNumber 1 eventNumber 2"
        );
        assert!(message.error().is_none());
        assert!(message.event_data().is_none());
    }

    #[test]
    fn lowercase_hex_is_accepted() {
        let decoded = decode(":Sb780Ne2414243444546ff;");
        let message = decoded.as_standard().unwrap();

        assert_eq!(message.mnemonic(), "NAME");
        assert_eq!(message.get("name").unwrap().as_str(), Some("ABCDEF?"));
    }

    #[test]
    fn unsupported_opcode() {
        let decoded = decode(":SB780N0B;");
        let message = decoded.as_standard().unwrap();

        assert_eq!(message.mnemonic(), UNSUPPORTED);
        assert_eq!(message.opcode(), 0x0B);
        assert_eq!(message.encoded(), ":SB780N0B;");
        assert!(!message.is_supported());
    }

    #[test]
    fn truncated_payload_keeps_leading_fields() {
        let decoded = decode(":SB780N900001;");
        let message = decoded.as_standard().unwrap();

        assert_eq!(message.mnemonic(), "ACON");
        assert_eq!(message.int("nodeNumber"), Some(1));
        assert_eq!(message.int("eventNumber"), None);
        assert!(message.error().is_some());
    }

    #[test]
    fn wire_vectors() {
        let codec = Codec::default();

        let vectors: [(&str, &str, &[(&str, FieldValue<'static>)]); 6] = [
            (
                "ACON",
                ":SB780N901234ABCD;",
                &[("nodeNumber", FieldValue::Int(0x1234)), ("eventNumber", FieldValue::Int(0xABCD))],
            ),
            (
                "DSPD",
                ":SA780N4701FF;",
                &[
                    ("session", FieldValue::Int(1)),
                    ("speed", FieldValue::Int(127)),
                    ("direction", FieldValue::Direction(Direction::Forward)),
                ],
            ),
            (
                "FCLK",
                ":SB780NCF1E0A37030FF6;",
                &[
                    ("minutes", FieldValue::Int(30)),
                    ("hours", FieldValue::Int(10)),
                    ("wdmon", FieldValue::Int(0x37)),
                    ("div", FieldValue::Int(3)),
                    ("mday", FieldValue::Int(15)),
                    ("temp", FieldValue::Signed(-10)),
                ],
            ),
            ("NAME", ":SB780NE243414E50414E20;", &[("name", FieldValue::Text(crate::name_from_str("CANPAN")))]),
            (
                "ENRSP",
                ":SB780NF20100DEADBEEF09;",
                &[
                    ("nodeNumber", FieldValue::Int(256)),
                    ("eventIdentifier", FieldValue::Hex("DEADBEEF")),
                    ("eventIndex", FieldValue::Int(9)),
                ],
            ),
            (
                "ESD",
                ":SB780NE700010203040506;",
                &[
                    ("nodeNumber", FieldValue::Int(1)),
                    ("serviceIndex", FieldValue::Int(2)),
                    ("data1", FieldValue::Int(3)),
                    ("data2", FieldValue::Int(4)),
                    ("data3", FieldValue::Int(5)),
                    ("data4", FieldValue::Int(6)),
                ],
            ),
        ];

        for (mnemonic, frame, args) in vectors {
            assert_eq!(codec.encode(mnemonic, args).unwrap().as_str(), frame);

            let decoded = decode(frame);
            let message = decoded.as_standard().unwrap();

            assert_eq!(message.mnemonic(), mnemonic);
            assert!(message.error().is_none(), "{frame}");
            for (name, value) in args {
                assert_eq!(message.get(name), Some(value), "{frame} {name}");
            }
        }
    }

    #[test]
    fn all_seven_service_bytes() {
        assert_eq!(
            format_decoded(":SB780NE700010203040506;").as_str(),
            "ESD (E7) nodeNumber 1 serviceIndex 2 data1 3 data2 4 data3 5 data4 6"
        );

        let decoded = decode(":SB780NE7000102030405;");
        let message = decoded.as_standard().unwrap();
        assert_eq!(message.int("data3"), Some(5));
        assert_eq!(message.int("data4"), None);
        assert!(message.error().is_some());
    }

    #[test]
    fn extended_dispatch() {
        let decoded = decode(":X00080004N000000000D040000;");

        assert_eq!(decoded.id_type(), IdType::Extended);
        assert_eq!(
            format_decoded(":X00080004N000000000D040000;").as_str(),
            "PUT CONTROL address 000000 RESVD 0 CTLBT 13 SPCMD 4 CPDTL 0 CPDTH 0"
        );
    }

    fn format_decoded(frame: &str) -> heapless::String<128> {
        use core::fmt::Write;

        let mut out = heapless::String::new();
        write!(out, "{}", decode(frame)).unwrap();
        out
    }
}
