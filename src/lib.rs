#![no_std]

mod codec;
mod config;
pub mod extended;
mod frame;
mod header;
mod message;
pub mod registry;

// Standard, MjPri 2, MinPri 3, CAN id 60, ACON3 with all 7 data bytes
// : S B780 N F0 00010002AABBCC ;

/// Hex digits in a standard identifier (PIC SIDH:SIDL)
pub const STANDARD_ID_SIZE: usize = 4;
/// Hex digits in an extended identifier (PIC SIDH:SIDL:EID8:EID0)
pub const EXTENDED_ID_SIZE: usize = 8;

/// CBUS data bytes following the opcode in a standard frame
pub const MAX_PAYLOAD_SIZE: usize = 7;

/// Large enough for either frame shape including the `:` and `;` delimiters
pub const MAX_FRAME_SIZE: usize = 32;

pub use codec::*;
pub use config::*;
pub use extended::{ExtendedKind, ExtendedMessage};
pub use frame::*;
pub use header::*;
pub use message::*;
pub use registry::{FieldKind, FieldSpec, OpcodeSpec};

pub use embedded_can::{ExtendedId, StandardId};
