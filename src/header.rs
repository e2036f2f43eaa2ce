use embedded_can::StandardId;
use heapless::String;

use crate::{
    codec::{int_from_hex, push_hex},
    FieldError, MAX_CAN_ID, MAX_MAJOR_PRIORITY, MAX_MINOR_PRIORITY, STANDARD_ID_SIZE,
};

/// The CBUS arbitration header of a standard frame.
///
/// On the wire the 11-bit identifier is written as it sits in the PIC
/// `SIDH:SIDL` register pair, i.e. shifted left by 5:
///
/// ```text
/// 15 14 | 13 12 | 11 ... 5 | 4 ... 0
/// MjPri | MinPri |  CAN id  | unused
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanHeader {
    major_priority: u8,
    minor_priority: u8,
    can_id: u8,
}

impl CanHeader {
    /// Builds a header, reducing every input into range: major priority is
    /// clamped to 2, minor priority is taken mod 4 and the CAN id mod 128
    pub fn new(major_priority: u8, minor_priority: u8, can_id: u8) -> Self {
        Self {
            major_priority: major_priority.min(MAX_MAJOR_PRIORITY),
            minor_priority: minor_priority & MAX_MINOR_PRIORITY,
            can_id: can_id & MAX_CAN_ID,
        }
    }

    pub fn major_priority(&self) -> u8 {
        self.major_priority
    }

    pub fn minor_priority(&self) -> u8 {
        self.minor_priority
    }

    pub fn can_id(&self) -> u8 {
        self.can_id
    }

    /// The 16-bit register value written between `:S` and `N`
    pub fn raw(&self) -> u16 {
        ((self.major_priority as u16) << 14)
            | ((self.minor_priority as u16) << 12)
            | ((self.can_id as u16) << 5)
    }

    /// Splits a register value back into its parts. The low 5 bits are ignored,
    /// and a major priority of 3 is reported as-is since it describes what was
    /// received.
    pub fn from_raw(raw: u16) -> Self {
        Self {
            major_priority: (raw >> 14) as u8 & 0x3,
            minor_priority: (raw >> 12) as u8 & 0x3,
            can_id: (raw >> 5) as u8 & MAX_CAN_ID,
        }
    }

    pub fn standard_id(&self) -> StandardId {
        StandardId::new(self.raw() >> 5).expect("header packs at most 11 bits")
    }

    pub fn from_standard_id(id: StandardId) -> Self {
        Self::from_raw(id.as_raw() << 5)
    }

    pub fn from_hex(hex_nibbles: &[u8; STANDARD_ID_SIZE]) -> Result<Self, FieldError> {
        Ok(Self::from_raw(int_from_hex(hex_nibbles)? as u16))
    }

    /// Appends the `:S<id>N` frame prefix
    pub fn write_prefix<const N: usize>(&self, out: &mut String<N>) -> Result<(), FieldError> {
        out.push_str(":S").map_err(|_| FieldError::BufferFull)?;
        push_hex(out, self.raw() as u32, STANDARD_ID_SIZE)?;
        out.push('N').map_err(|_| FieldError::BufferFull)
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::StandardId;
    use heapless::String;

    use super::CanHeader;

    fn prefix(header: CanHeader) -> String<16> {
        let mut out = String::new();
        header.write_prefix(&mut out).unwrap();
        out
    }

    #[test]
    fn header_packing() {
        assert_eq!(CanHeader::new(2, 3, 60).raw(), 0xB780);
        assert_eq!(prefix(CanHeader::new(2, 3, 60)).as_str(), ":SB780N");
        assert_eq!(prefix(CanHeader::new(0, 0, 0)).as_str(), ":S0000N");
        assert_eq!(prefix(CanHeader::new(2, 3, 127)).as_str(), ":SBFE0N");
    }

    #[test]
    fn header_inputs_are_reduced() {
        assert_eq!(CanHeader::new(3, 0, 0).major_priority(), 2);
        assert_eq!(CanHeader::new(0, 4, 0).minor_priority(), 0);
        assert_eq!(CanHeader::new(0, 0, 128).can_id(), 0);
        assert_eq!(CanHeader::new(255, 7, 255), CanHeader::new(2, 3, 127));
    }

    #[test]
    fn header_parsing() {
        let header = CanHeader::from_hex(b"B780").unwrap();

        assert_eq!(header.major_priority(), 2);
        assert_eq!(header.minor_priority(), 3);
        assert_eq!(header.can_id(), 60);

        assert_eq!(CanHeader::from_hex(b"b79f").unwrap(), header);
        assert!(CanHeader::from_hex(b"B7G0").is_err());
    }

    #[test]
    fn standard_id_conversion() {
        let header = CanHeader::new(2, 3, 60);

        assert_eq!(header.standard_id(), StandardId::new(0x5BC).unwrap());
        assert_eq!(CanHeader::from_standard_id(header.standard_id()), header);
        assert_eq!(
            CanHeader::from_standard_id(StandardId::MAX),
            CanHeader::from_raw(0xFFE0)
        );
    }
}
