use core::fmt;

use heapless::String;

/// Fixed width of the ASCII module name carried by `NAME`
pub const NAME_LENGTH: usize = 7;

/// A module name, always exactly [`NAME_LENGTH`] bytes once built through
/// [`name_from_str`] or decoded from a frame
pub type Name = String<NAME_LENGTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldError {
    #[error("Tried to decode a hex digit but it was out of range ({0:?})")]
    IllegalHexDigit(u8),
    #[error("Field `{0}` needs {1} hex digits but only {2} remain")]
    Truncated(&'static str, usize, usize),
    #[error("Encoded output does not fit in the frame buffer")]
    BufferFull,
}

/* Encoding */

pub fn to_hex_digit(value: u32) -> u8 {
    const HEX_LUT: &[u8] = "0123456789ABCDEF".as_bytes();

    HEX_LUT[(value & 0xF) as usize]
}

/// Appends the low `nybbles` hex digits of `value`, most significant first
pub fn push_hex<const N: usize>(
    out: &mut String<N>,
    value: u32,
    nybbles: usize,
) -> Result<(), FieldError> {
    for shift in (0..nybbles).rev() {
        let digit = to_hex_digit(value >> (shift * 4)) as char;
        out.push(digit).map_err(|_| FieldError::BufferFull)?;
    }

    Ok(())
}

/// Appends each byte of `data` as two hex digits
pub fn push_bytes_hex<const N: usize>(out: &mut String<N>, data: &[u8]) -> Result<(), FieldError> {
    data.iter()
        .try_for_each(|byte| push_hex(out, *byte as u32, 2))
}

/* Decoding */

pub fn hex_digit_to_u8(byte: u8) -> Result<u8, FieldError> {
    Ok(match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => return Err(FieldError::IllegalHexDigit(byte)),
    })
}

pub fn u8_from_hex_nibbles(hex_nibbles: &[u8; 2]) -> Result<u8, FieldError> {
    let msn = hex_digit_to_u8(hex_nibbles[0])?;
    let lsn = hex_digit_to_u8(hex_nibbles[1])?;

    Ok((msn << 4) | lsn)
}

/// Parses up to 8 hex digits into an integer
pub fn int_from_hex(hex_nibbles: &[u8]) -> Result<u32, FieldError> {
    let mut value = 0u32;

    for nibble in hex_nibbles.iter() {
        value <<= 4;
        value |= hex_digit_to_u8(*nibble)? as u32;
    }

    Ok(value)
}

/* Speed & direction */

/// Direction of travel, carried in bit 7 of a DCC speed byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Reverse,
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Reverse => f.write_str("Reverse"),
            Direction::Forward => f.write_str("Forward"),
        }
    }
}

pub const MAX_SPEED: u8 = 127;

/// Packs a 7-bit speed step with the direction flag. Speeds above 127 wrap.
pub fn speed_direction_to_byte(speed: u8, direction: Direction) -> u8 {
    let speed = speed & MAX_SPEED;

    match direction {
        Direction::Forward => speed | 0x80,
        Direction::Reverse => speed,
    }
}

pub fn speed_direction_from_byte(byte: u8) -> (u8, Direction) {
    let direction = if byte > MAX_SPEED {
        Direction::Forward
    } else {
        Direction::Reverse
    };

    (byte & MAX_SPEED, direction)
}

/* Weekday & month */

/// The `FCLK` weekday/month byte: weekday in the low nibble (1 = Sunday),
/// month in the high nibble (1 = January)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WeekdayMonth {
    pub weekday: u8,
    pub month: u8,
}

impl WeekdayMonth {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            weekday: byte & 0x0F,
            month: byte >> 4,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.month & 0x0F) << 4) | (self.weekday & 0x0F)
    }
}

/* ASCII names */

/// Builds a [`Name`] by truncating `text` to at most [`NAME_LENGTH`] bytes on a
/// char boundary and right-padding with spaces
pub fn name_from_str(text: &str) -> Name {
    let mut name = Name::new();

    for c in text.chars() {
        if name.push(c).is_err() {
            break;
        }
    }

    while name.push(' ').is_ok() {}

    name
}

/// Decodes [`NAME_LENGTH`] hex-encoded bytes into a name. Nothing is trimmed;
/// if the bytes are not valid UTF-8 every non-ASCII byte becomes `?`.
pub fn name_from_hex(hex_nibbles: &[u8]) -> Result<Name, FieldError> {
    let mut bytes = [0u8; NAME_LENGTH];

    for (byte, pair) in bytes.iter_mut().zip(hex_nibbles.chunks_exact(2)) {
        *byte = u8_from_hex_nibbles(&[pair[0], pair[1]])?;
    }

    let mut name = Name::new();

    match core::str::from_utf8(&bytes) {
        Ok(text) => name.push_str(text).map_err(|_| FieldError::BufferFull)?,
        Err(_) => {
            for byte in bytes {
                let c = if byte.is_ascii() { byte as char } else { '?' };
                name.push(c).map_err(|_| FieldError::BufferFull)?;
            }
        }
    }

    Ok(name)
}

/// Returns true if `text` is non-empty and only holds hex digits (either case)
pub fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}
