use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::{
    codec::{
        int_from_hex, is_hex, name_from_hex, name_from_str, push_bytes_hex, push_hex,
        speed_direction_from_byte, speed_direction_to_byte, Direction, FieldError, Name,
        WeekdayMonth, MAX_SPEED,
    },
    registry::{FieldKind, OpcodeSpec, DIRECTION, MONTH, WEEKDAY},
    CanHeader, RangePolicy,
};

/// Most named entries any opcode decodes to (`FCLK`)
pub const MAX_FIELDS: usize = 8;
/// Trailing data bytes of an accessory event
pub const MAX_EVENT_DATA: usize = 3;
pub const MAX_TEXT_SIZE: usize = 320;

/// Mnemonic reported for opcodes missing from the registry
pub const UNSUPPORTED: &str = "UNSUPPORTED";

/// The value of one named field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Int(u32),
    Signed(i8),
    Direction(Direction),
    Text(Name),
    Hex(&'a str),
}

impl<'a> FieldValue<'a> {
    /// A module name, padded or truncated to 7 bytes
    pub fn text(text: &str) -> Self {
        Self::Text(name_from_str(text))
    }

    pub fn hex(text: &'a str) -> Self {
        Self::Hex(text)
    }

    pub fn as_int(&self) -> Option<u32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_direction(&self) -> Option<Direction> {
        match self {
            Self::Direction(direction) => Some(*direction),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Hex(text) => Some(text),
            _ => None,
        }
    }
}

impl From<u32> for FieldValue<'_> {
    fn from(value: u32) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for FieldValue<'_> {
    fn from(value: u16) -> Self {
        Self::Int(value as u32)
    }
}

impl From<u8> for FieldValue<'_> {
    fn from(value: u8) -> Self {
        Self::Int(value as u32)
    }
}

impl From<i8> for FieldValue<'_> {
    fn from(value: i8) -> Self {
        Self::Signed(value)
    }
}

impl From<Direction> for FieldValue<'_> {
    fn from(direction: Direction) -> Self {
        Self::Direction(direction)
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Signed(value) => write!(f, "{value}"),
            Self::Direction(direction) => write!(f, "{direction}"),
            Self::Text(text) => f.write_str(text),
            Self::Hex(text) => f.write_str(text),
        }
    }
}

/// Named entries of a decoded message, in layout order
pub type Fields<'a> = Vec<(&'static str, FieldValue<'a>), MAX_FIELDS>;

/// Named arguments of an encode call. Order does not matter.
pub type Args<'a, 'v> = [(&'a str, FieldValue<'v>)];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    #[error("No opcode is registered under that mnemonic")]
    UnknownMnemonic,
    #[error("Opcode ({0:#04X}) is not registered")]
    UnknownOpcode(u8),
    #[error("Missing a value for field `{0}`")]
    MissingField(&'static str),
    #[error("Field `{0}` was given a value of the wrong kind")]
    WrongFieldType(&'static str),
    #[error("Field `{0}` expects hex digits")]
    InvalidHex(&'static str),
    #[error("Field `{0}` holds more than {1} hex digits")]
    HexTooLong(&'static str, usize),
    #[error("Field `{field}` value ({value}) is above its maximum ({max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("Failed to encode field content")]
    Field(#[from] FieldError),
}

/* Decoding */

/// Walks `spec`'s layout over `payload` (the text following the opcode),
/// pushing one or more entries per field. Stops at the first field that is
/// missing or malformed, leaving the entries decoded so far in `fields`.
pub fn decode_fields<'a>(
    payload: &'a str,
    spec: &OpcodeSpec,
    fields: &mut Fields<'a>,
) -> Result<(), FieldError> {
    let hex = payload.as_bytes();
    let mut position = 0;

    let mut push = |name: &'static str, value: FieldValue<'a>| {
        fields
            .push((name, value))
            .map_err(|_| FieldError::BufferFull)
    };

    for field in spec.fields {
        let width = field.kind.nybbles();
        let digits = hex
            .get(position..position + width)
            .ok_or(FieldError::Truncated(
                field.name,
                width,
                hex.len().saturating_sub(position),
            ))?;

        match field.kind {
            FieldKind::Int(_) => push(field.name, FieldValue::Int(int_from_hex(digits)?))?,
            FieldKind::Signed => push(
                field.name,
                FieldValue::Signed(int_from_hex(digits)? as u8 as i8),
            )?,
            FieldKind::SpeedDirection => {
                let (speed, direction) = speed_direction_from_byte(int_from_hex(digits)? as u8);

                push(field.name, FieldValue::Int(speed as u32))?;
                push(DIRECTION, FieldValue::Direction(direction))?;
            }
            FieldKind::WeekdayMonth => {
                let byte = int_from_hex(digits)? as u8;
                let wdmon = WeekdayMonth::from_byte(byte);

                push(field.name, FieldValue::Int(byte as u32))?;
                push(WEEKDAY, FieldValue::Int(wdmon.weekday as u32))?;
                push(MONTH, FieldValue::Int(wdmon.month as u32))?;
            }
            FieldKind::Text => push(field.name, FieldValue::Text(name_from_hex(digits)?))?,
            FieldKind::Hex(_) => {
                if let Some(bad) = digits.iter().find(|b| !b.is_ascii_hexdigit()) {
                    return Err(FieldError::IllegalHexDigit(*bad));
                }

                // All ASCII, so both ends are char boundaries
                let text = payload
                    .get(position..position + width)
                    .ok_or(FieldError::IllegalHexDigit(digits[0]))?;

                push(field.name, FieldValue::Hex(text))?
            }
        }

        position += width;
    }

    Ok(())
}

/* Encoding */

fn arg<'r, 'v>(args: &'r Args<'_, 'v>, name: &'static str) -> Result<&'r FieldValue<'v>, EncodeError> {
    args.iter()
        .find(|(arg_name, _)| *arg_name == name)
        .map(|(_, value)| value)
        .ok_or(EncodeError::MissingField(name))
}

fn int_arg(args: &Args<'_, '_>, name: &'static str) -> Result<u32, EncodeError> {
    arg(args, name)?
        .as_int()
        .ok_or(EncodeError::WrongFieldType(name))
}

pub(crate) fn reduce(
    policy: RangePolicy,
    field: &'static str,
    value: u32,
    max: u32,
) -> Result<u32, EncodeError> {
    match policy {
        _ if value <= max => Ok(value),
        RangePolicy::Reduce => Ok(value & max),
        RangePolicy::Reject => Err(EncodeError::OutOfRange { field, value, max }),
    }
}

const fn max_for_bytes(bytes: usize) -> u32 {
    if bytes >= 4 {
        u32::MAX
    } else {
        (1 << (bytes * 8)) - 1
    }
}

/// Appends the payload for `spec`, taking each field's value from `args` by
/// name. Speed/direction fields also read the [`DIRECTION`] argument.
pub fn encode_fields<const N: usize>(
    spec: &OpcodeSpec,
    args: &Args<'_, '_>,
    policy: RangePolicy,
    out: &mut String<N>,
) -> Result<(), EncodeError> {
    for field in spec.fields {
        let nybbles = field.kind.nybbles();

        match field.kind {
            FieldKind::Int(bytes) => {
                let value = reduce(policy, field.name, int_arg(args, field.name)?, max_for_bytes(bytes))?;
                push_hex(out, value, nybbles)?;
            }
            FieldKind::Signed => match arg(args, field.name)? {
                FieldValue::Signed(value) => push_hex(out, *value as u8 as u32, nybbles)?,
                _ => return Err(EncodeError::WrongFieldType(field.name)),
            },
            FieldKind::SpeedDirection => {
                let speed = reduce(policy, field.name, int_arg(args, field.name)?, MAX_SPEED as u32)?;
                let direction = arg(args, DIRECTION)?
                    .as_direction()
                    .ok_or(EncodeError::WrongFieldType(DIRECTION))?;

                push_hex(out, speed_direction_to_byte(speed as u8, direction) as u32, nybbles)?;
            }
            FieldKind::WeekdayMonth => {
                let value = reduce(policy, field.name, int_arg(args, field.name)?, 0xFF)?;
                push_hex(out, value, nybbles)?;
            }
            FieldKind::Text => match arg(args, field.name)? {
                FieldValue::Text(text) => push_bytes_hex(out, name_from_str(text).as_bytes())?,
                _ => return Err(EncodeError::WrongFieldType(field.name)),
            },
            FieldKind::Hex(_) => {
                let text = match arg(args, field.name)? {
                    FieldValue::Hex(text) => *text,
                    _ => return Err(EncodeError::WrongFieldType(field.name)),
                };

                push_hex_text(out, field.name, text, nybbles, policy)?;
            }
        }
    }

    Ok(())
}

/// Copies hex digits through unchanged apart from case, left-padding with
/// zeroes. Longer input keeps its trailing digits when reducing.
fn push_hex_text<const N: usize>(
    out: &mut String<N>,
    field: &'static str,
    text: &str,
    nybbles: usize,
    policy: RangePolicy,
) -> Result<(), EncodeError> {
    if !is_hex(text) {
        return Err(EncodeError::InvalidHex(field));
    }

    let text = match text.len().checked_sub(nybbles) {
        Some(0) | None => text,
        Some(excess) => match policy {
            RangePolicy::Reduce => &text[excess..],
            RangePolicy::Reject => return Err(EncodeError::HexTooLong(field, nybbles)),
        },
    };

    for _ in text.len()..nybbles {
        out.push('0').map_err(|_| FieldError::BufferFull)?;
    }

    for c in text.chars() {
        out.push(c.to_ascii_uppercase())
            .map_err(|_| FieldError::BufferFull)?;
    }

    Ok(())
}

/* Decoded messages */

/// Opaque trailing bytes of an accessory event such as `ACON2`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventData {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    data: Vec<u8, MAX_EVENT_DATA>,
}

impl EventData {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn hex(&self) -> String<{ MAX_EVENT_DATA * 2 }> {
        let mut hex = String::new();
        // Capacity is exactly two digits per byte
        push_bytes_hex(&mut hex, &self.data).ok();
        hex
    }

    fn from_fields(fields: &Fields<'_>) -> Self {
        // Node and event (or device) number come first
        let data = fields
            .iter()
            .skip(2)
            .filter_map(|(_, value)| value.as_int())
            .map(|value| value as u8)
            .take(MAX_EVENT_DATA)
            .collect();

        Self { data }
    }
}

/// A decoded standard frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    encoded: &'a str,
    header: Option<CanHeader>,
    opcode: u8,
    spec: Option<&'static OpcodeSpec>,
    fields: Fields<'a>,
    event_data: Option<EventData>,
    error: Option<FieldError>,
}

impl<'a> Message<'a> {
    pub(crate) fn decode(
        encoded: &'a str,
        header: Option<CanHeader>,
        opcode: u8,
        payload: &'a str,
    ) -> Self {
        let spec = crate::registry::lookup(opcode);
        let mut fields = Fields::new();
        let mut error = None;
        let mut event_data = None;

        match spec {
            Some(spec) => {
                if let Err(e) = decode_fields(payload, spec, &mut fields) {
                    log::warn!("{} ({:02X}) payload could not be decoded: {}", spec.mnemonic, opcode, e);
                    error = Some(e);
                }

                if spec.event_data && error.is_none() {
                    event_data = Some(EventData::from_fields(&fields));
                }
            }
            None => log::debug!("unsupported opcode {:02X} in {}", opcode, encoded),
        }

        Self {
            encoded,
            header,
            opcode,
            spec,
            fields,
            event_data,
            error,
        }
    }

    /// The frame text this message was decoded from
    pub fn encoded(&self) -> &'a str {
        self.encoded
    }

    /// The arbitration header, if its hex digits were valid
    pub fn header(&self) -> Option<CanHeader> {
        self.header
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn spec(&self) -> Option<&'static OpcodeSpec> {
        self.spec
    }

    pub fn is_supported(&self) -> bool {
        self.spec.is_some()
    }

    /// The registered mnemonic, or [`UNSUPPORTED`]
    pub fn mnemonic(&self) -> &'static str {
        self.spec.map_or(UNSUPPORTED, |spec| spec.mnemonic)
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue<'a>)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue<'a>> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn int(&self, name: &str) -> Option<u32> {
        self.get(name).and_then(FieldValue::as_int)
    }

    pub fn event_data(&self) -> Option<&EventData> {
        self.event_data.as_ref()
    }

    /// Set when the payload was too short or held a bad hex digit. The fields
    /// before the faulty one are still available.
    pub fn error(&self) -> Option<&FieldError> {
        self.error.as_ref()
    }

    /// Human readable summary, e.g. `ACON (90) nodeNumber 1 eventNumber 2`
    pub fn text(&self) -> String<MAX_TEXT_SIZE> {
        let mut text = String::new();
        // A mnemonic and eight named fields always fit in MAX_TEXT_SIZE
        write!(text, "{self}").ok();
        text
    }
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:02X})", self.mnemonic(), self.opcode)?;

        for (name, value) in self.fields.iter() {
            write!(f, " {name} {value}")?;
        }

        Ok(())
    }
}
