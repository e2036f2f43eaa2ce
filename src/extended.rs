//! The 29-bit identifier sub-protocol used by the CBUS bootloader for
//! firmware download.
//!
//! Only one identifier range is used, written in PIC register order as
//! `:X00080004N` to `:X00080007N`. The last identifier digit selects the
//! transfer:
//!
//! ```text
//! bit 2: always set
//! bit 1: GET (1) / PUT (0)
//! bit 0: DATA (1) / CONTROL (0)
//! ```

use core::fmt;

use embedded_can::ExtendedId;
use heapless::String;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    codec::{hex_digit_to_u8, int_from_hex, push_bytes_hex, push_hex, u8_from_hex_nibbles},
    FieldError, Frame, EXTENDED_ID_SIZE,
};

/// Frame prefix shared by all bootloader CONTROL and DATA transfers
pub const BOOT_PREFIX: &str = ":X0008000";
/// PIC-ordered identifier the bootloader answers with
pub const RESPONSE_ID: u32 = 0x8008_0004;

const SELECTOR_INDEX: usize = 9;
const BOOT_SELECTOR: u8 = 0b100;
const PAYLOAD_INDEX: usize = 2 + EXTENDED_ID_SIZE + 1;
const PAYLOAD_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtendedError {
    #[error("Tried to decode a bootloader special command but it was invalid ({0:?})")]
    UnknownSpecialCommand(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Operation {
    Put = 0,
    Get = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Data = 1,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Put => "PUT",
            Self::Get => "GET",
        })
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "CONTROL",
            Self::Data => "DATA",
        })
    }
}

/// Bootloader SPCMD values
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = ExtendedError, constructor = ExtendedError::UnknownSpecialCommand))]
#[repr(u8)]
pub enum SpecialCommand {
    Nop = 0,
    Reset = 1,
    ResetChecksum = 2,
    CheckRun = 3,
    BootTest = 4,
}

/// Bootloader CTLBT flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlBits(pub u8);

impl ControlBits {
    pub const WRITE_UNLOCK: u8 = 1 << 0;
    pub const ERASE_ONLY: u8 = 1 << 1;
    pub const AUTO_ERASE: u8 = 1 << 2;
    pub const AUTO_INCREMENT: u8 = 1 << 3;
    pub const ACK: u8 = 1 << 4;

    fn is_set(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn write_unlock(&self) -> bool {
        self.is_set(Self::WRITE_UNLOCK)
    }

    pub fn erase_only(&self) -> bool {
        self.is_set(Self::ERASE_ONLY)
    }

    pub fn auto_erase(&self) -> bool {
        self.is_set(Self::AUTO_ERASE)
    }

    pub fn auto_increment(&self) -> bool {
        self.is_set(Self::AUTO_INCREMENT)
    }

    pub fn ack(&self) -> bool {
        self.is_set(Self::ACK)
    }
}

/// Payload of a CONTROL transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootControl {
    /// 24-bit program memory address
    pub address: u32,
    pub reserved: u8,
    pub ctlbt: u8,
    pub spcmd: u8,
    pub cpdtl: u8,
    pub cpdth: u8,
}

impl BootControl {
    pub fn control_bits(&self) -> ControlBits {
        ControlBits(self.ctlbt)
    }

    pub fn special_command(&self) -> Result<SpecialCommand, ExtendedError> {
        self.spcmd.try_into()
    }

    /// Checksum carried in CPDTH:CPDTL
    pub fn checksum(&self) -> u16 {
        ((self.cpdth as u16) << 8) | self.cpdtl as u16
    }

    /// The address as six hex digits, most significant first
    pub fn address_hex(&self) -> String<6> {
        let mut hex = String::new();
        // Capacity is exactly six digits
        push_hex(&mut hex, self.address, 6).ok();
        hex
    }

    fn from_payload(payload: &[u8; PAYLOAD_SIZE]) -> Self {
        Self {
            // Low, mid, high on the wire
            address: payload[0] as u32 | (payload[1] as u32) << 8 | (payload[2] as u32) << 16,
            reserved: payload[3],
            ctlbt: payload[4],
            spcmd: payload[5],
            cpdtl: payload[6],
            cpdth: payload[7],
        }
    }

    fn to_payload(self) -> [u8; PAYLOAD_SIZE] {
        [
            self.address as u8,
            (self.address >> 8) as u8,
            (self.address >> 16) as u8,
            self.reserved,
            self.ctlbt,
            self.spcmd,
            self.cpdtl,
            self.cpdth,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtendedKind {
    Control {
        operation: Operation,
        control: BootControl,
    },
    Data {
        operation: Operation,
        data: [u8; PAYLOAD_SIZE],
    },
    /// Single status byte sent back by the bootloader
    Response(u8),
    Unknown,
}

/// A decoded extended frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedMessage<'a> {
    encoded: &'a str,
    kind: ExtendedKind,
}

impl<'a> ExtendedMessage<'a> {
    pub fn decode(frame: &'a str) -> Self {
        let kind = decode_kind(frame.as_bytes()).unwrap_or_else(|e| {
            log::warn!("extended frame {} could not be decoded: {}", frame, e);
            ExtendedKind::Unknown
        });

        Self {
            encoded: frame,
            kind,
        }
    }

    pub fn encoded(&self) -> &'a str {
        self.encoded
    }

    pub fn kind(&self) -> &ExtendedKind {
        &self.kind
    }

    pub fn operation(&self) -> Option<Operation> {
        match self.kind {
            ExtendedKind::Control { operation, .. } | ExtendedKind::Data { operation, .. } => {
                Some(operation)
            }
            _ => None,
        }
    }

    pub fn transfer_type(&self) -> Option<TransferType> {
        match self.kind {
            ExtendedKind::Control { .. } => Some(TransferType::Control),
            ExtendedKind::Data { .. } => Some(TransferType::Data),
            _ => None,
        }
    }

    /// The identifier as written on the wire (PIC register order)
    pub fn identifier(&self) -> Option<u32> {
        let digits = self.encoded.as_bytes().get(2..2 + EXTENDED_ID_SIZE)?;
        int_from_hex(digits).ok()
    }

    /// The 29-bit CAN identifier
    pub fn id(&self) -> Option<ExtendedId> {
        self.identifier().and_then(extended_id_from_pic)
    }
}

fn decode_kind(frame: &[u8]) -> Result<ExtendedKind, FieldError> {
    if frame.starts_with(BOOT_PREFIX.as_bytes()) {
        let selector = frame
            .get(SELECTOR_INDEX)
            .ok_or(FieldError::Truncated("identifier", EXTENDED_ID_SIZE, SELECTOR_INDEX - 2))
            .and_then(|digit| hex_digit_to_u8(*digit))?;
        let operation = if selector & 0b10 != 0 {
            Operation::Get
        } else {
            Operation::Put
        };

        let mut payload = [0u8; PAYLOAD_SIZE];
        let hex = frame
            .get(PAYLOAD_INDEX..PAYLOAD_INDEX + PAYLOAD_SIZE * 2)
            .ok_or(FieldError::Truncated(
                "payload",
                PAYLOAD_SIZE * 2,
                frame.len().saturating_sub(PAYLOAD_INDEX),
            ))?;

        for (byte, pair) in payload.iter_mut().zip(hex.chunks_exact(2)) {
            *byte = u8_from_hex_nibbles(&[pair[0], pair[1]])?;
        }

        return Ok(if selector & 0b01 != 0 {
            ExtendedKind::Data {
                operation,
                data: payload,
            }
        } else {
            ExtendedKind::Control {
                operation,
                control: BootControl::from_payload(&payload),
            }
        });
    }

    match frame.get(PAYLOAD_INDEX..PAYLOAD_INDEX + 2) {
        Some(&[msn, lsn]) => Ok(ExtendedKind::Response(u8_from_hex_nibbles(&[msn, lsn])?)),
        _ => Ok(ExtendedKind::Unknown),
    }
}

impl fmt::Display for ExtendedMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExtendedKind::Control { operation, control } => write!(
                f,
                "{operation} CONTROL address {} RESVD {} CTLBT {} SPCMD {} CPDTL {} CPDTH {}",
                control.address_hex(),
                control.reserved,
                control.ctlbt,
                control.spcmd,
                control.cpdtl,
                control.cpdth
            ),
            ExtendedKind::Data { operation, data } => {
                write!(f, "{operation} DATA")?;
                data.iter().try_for_each(|byte| write!(f, " {byte:02X}"))
            }
            ExtendedKind::Response(response) => write!(f, "response {response}"),
            ExtendedKind::Unknown => f.write_str("UNKNOWN MESSAGE"),
        }
    }
}

/* Identifiers */

/// Converts a PIC `SIDH:SIDL:EID8:EID0` register value into a 29-bit identifier
pub fn extended_id_from_pic(raw: u32) -> Option<ExtendedId> {
    let sidh = raw >> 24;
    let sidl = (raw >> 16) & 0xFF;
    let sid = (sidh << 3) | (sidl >> 5);

    ExtendedId::new((sid << 18) | ((sidl & 0x3) << 16) | (raw & 0xFFFF))
}

/// Inverse of [`extended_id_from_pic`], with the EXIDE bit set
pub fn extended_id_to_pic(id: ExtendedId) -> u32 {
    let raw = id.as_raw();
    let sid = raw >> 18;
    let sidl = ((sid & 0x7) << 5) | 0x08 | ((raw >> 16) & 0x3);

    ((sid >> 3) << 24) | (sidl << 16) | (raw & 0xFFFF)
}

/* Encoding */

fn push_boot_prefix(frame: &mut Frame, operation: Operation, transfer: TransferType) -> Result<(), FieldError> {
    let selector = BOOT_SELECTOR | (u8::from(operation) << 1) | u8::from(transfer);

    frame.push_str(BOOT_PREFIX).map_err(|_| FieldError::BufferFull)?;
    push_hex(frame, selector as u32, 1)?;
    frame.push('N').map_err(|_| FieldError::BufferFull)
}

pub fn encode_control(operation: Operation, control: &BootControl) -> Result<Frame, FieldError> {
    let mut frame = Frame::new();

    push_boot_prefix(&mut frame, operation, TransferType::Control)?;
    push_bytes_hex(&mut frame, &control.to_payload())?;
    frame.push(';').map_err(|_| FieldError::BufferFull)?;

    Ok(frame)
}

pub fn encode_data(operation: Operation, data: &[u8; PAYLOAD_SIZE]) -> Result<Frame, FieldError> {
    let mut frame = Frame::new();

    push_boot_prefix(&mut frame, operation, TransferType::Data)?;
    push_bytes_hex(&mut frame, data)?;
    frame.push(';').map_err(|_| FieldError::BufferFull)?;

    Ok(frame)
}

pub fn encode_put_control(control: &BootControl) -> Result<Frame, FieldError> {
    encode_control(Operation::Put, control)
}

pub fn encode_put_data(data: &[u8; PAYLOAD_SIZE]) -> Result<Frame, FieldError> {
    encode_data(Operation::Put, data)
}

/// The bootloader's one byte reply, e.g. `:X80080004N01;`
pub fn encode_response(response: u8) -> Result<Frame, FieldError> {
    let mut frame = Frame::new();

    frame.push_str(":X").map_err(|_| FieldError::BufferFull)?;
    push_hex(&mut frame, RESPONSE_ID, EXTENDED_ID_SIZE)?;
    frame.push('N').map_err(|_| FieldError::BufferFull)?;
    push_hex(&mut frame, response as u32, 2)?;
    frame.push(';').map_err(|_| FieldError::BufferFull)?;

    Ok(frame)
}
