use cbus_gridconnect::{
    registry::{OpcodeSpec, DIRECTION, REGISTRY},
    Codec, CodecConfig, Direction, FieldKind, FieldValue, RangePolicy,
};
use proptest::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds arguments for every field of `spec` from per-field raw values,
/// keeping each value inside its field's range
fn build_args<'h>(
    spec: &OpcodeSpec,
    raw: &[u32],
    forward: bool,
    hex: &'h [String],
) -> Vec<(&'static str, FieldValue<'h>)> {
    let mut args = Vec::new();

    for (i, field) in spec.fields.iter().enumerate() {
        let value = raw[i];

        match field.kind {
            FieldKind::Int(bytes) => {
                let mask = if bytes >= 4 { u32::MAX } else { (1 << (bytes * 8)) - 1 };
                args.push((field.name, FieldValue::Int(value & mask)));
            }
            FieldKind::Signed => args.push((field.name, FieldValue::Signed(value as u8 as i8))),
            FieldKind::SpeedDirection => {
                let direction = if forward {
                    Direction::Forward
                } else {
                    Direction::Reverse
                };

                args.push((field.name, FieldValue::Int(value & 0x7F)));
                args.push((DIRECTION, FieldValue::Direction(direction)));
            }
            FieldKind::WeekdayMonth => args.push((field.name, FieldValue::Int(value & 0xFF))),
            FieldKind::Text => {
                let text: String = value
                    .to_be_bytes()
                    .iter()
                    .map(|b| (b' ' + b % 95) as char)
                    .collect();
                args.push((field.name, FieldValue::text(&text)));
            }
            FieldKind::Hex(_) => args.push((field.name, FieldValue::Hex(&hex[i]))),
        }
    }

    args
}

fn hex_texts(spec: &OpcodeSpec, raw: &[u32]) -> Vec<String> {
    spec.fields
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{:0width$X}", raw[i], width = field.kind.nybbles()))
        .collect()
}

fn assert_round_trip(codec: &Codec, spec: &OpcodeSpec, raw: &[u32], forward: bool) {
    let hex = hex_texts(spec, raw);
    let args = build_args(spec, raw, forward, &hex);

    let frame = codec
        .encode(spec.mnemonic, &args)
        .unwrap_or_else(|e| panic!("{} failed to encode: {e}", spec.mnemonic));

    let decoded = codec.decode(&frame);
    let message = decoded
        .as_standard()
        .unwrap_or_else(|| panic!("{frame} did not decode as a standard frame"));

    assert_eq!(message.mnemonic(), spec.mnemonic);
    assert_eq!(message.opcode(), spec.opcode);
    assert!(message.error().is_none(), "{frame}: {:?}", message.error());

    for (name, value) in &args {
        assert_eq!(message.get(name), Some(value), "{} field {name} in {frame}", spec.mnemonic);
    }
}

#[test]
fn every_opcode_round_trips_at_its_boundaries() {
    init_logging();

    let codec = Codec::new(CodecConfig::default().with_range_policy(RangePolicy::Reject));

    for spec in REGISTRY {
        for raw in [0, 1, u32::MAX] {
            assert_round_trip(&codec, spec, &[raw; 7], raw != 0);
        }
    }
}

#[test]
fn frames_have_the_expected_length() {
    let codec = Codec::default();

    for spec in REGISTRY {
        let hex = hex_texts(spec, &[0; 7]);
        let frame = codec.encode(spec.mnemonic, &build_args(spec, &[0; 7], false, &hex)).unwrap();

        // ":S" + identifier + "N" + opcode + payload + ";"
        assert_eq!(frame.len(), 2 + 4 + 1 + 2 + spec.data_length() * 2 + 1, "{frame}");
    }
}

proptest! {
    #[test]
    fn arbitrary_values_round_trip(
        index in 0..REGISTRY.len(),
        raw in prop::collection::vec(any::<u32>(), 7),
        forward in any::<bool>(),
        major_priority in 0u8..=2,
        can_id in 0u8..=127,
    ) {
        let mut codec = Codec::default();
        codec.set_header_defaults(Some(major_priority), Some(can_id));

        let spec = &REGISTRY[index];
        assert_round_trip(&codec, spec, &raw, forward);

        let hex = hex_texts(spec, &raw);
        let frame = codec.encode(spec.mnemonic, &build_args(spec, &raw, forward, &hex)).unwrap();
        let decoded = codec.decode(&frame);
        let header = decoded.as_standard().unwrap().header().unwrap();

        prop_assert_eq!(header.major_priority(), major_priority);
        prop_assert_eq!(header.minor_priority(), spec.minor_priority);
        prop_assert_eq!(header.can_id(), can_id);
    }

    #[test]
    fn decoding_never_panics(frame in "\\PC{0,40}") {
        let _ = cbus_gridconnect::decode(&frame);
    }

    #[test]
    fn decoding_standard_shaped_noise_never_panics(
        id in "[0-9A-Fa-f]{4}",
        opcode in "[0-9A-Fa-f]{2}",
        payload in "[0-9A-Fa-fXZ;]{0,16}",
    ) {
        let frame = format!(":S{id}N{opcode}{payload};");
        let decoded = cbus_gridconnect::decode(&frame);

        prop_assert_eq!(decoded.encoded(), frame.as_str());
        prop_assert!(decoded.as_standard().is_some());
    }
}
