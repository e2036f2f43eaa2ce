/// Highest major priority the codec will emit. A value of 3 would put seven
/// recessive bits at the start of the identifier, which CAN framing forbids.
pub const MAX_MAJOR_PRIORITY: u8 = 2;
pub const MAX_MINOR_PRIORITY: u8 = 3;
pub const MAX_CAN_ID: u8 = 127;

/// Header values used when an encode call does not supply its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanHeaderConfig {
    major_priority: u8,
    can_id: u8,
}

impl Default for CanHeaderConfig {
    fn default() -> Self {
        Self {
            major_priority: 2,
            can_id: 60,
        }
    }
}

impl CanHeaderConfig {
    /// Major priority is clamped to [`MAX_MAJOR_PRIORITY`] and the CAN id is
    /// taken mod 128
    pub fn new(major_priority: u8, can_id: u8) -> Self {
        Self {
            major_priority: major_priority.min(MAX_MAJOR_PRIORITY),
            can_id: can_id & MAX_CAN_ID,
        }
    }

    pub fn major_priority(&self) -> u8 {
        self.major_priority
    }

    pub fn can_id(&self) -> u8 {
        self.can_id
    }

    pub fn with_major_priority(self, major_priority: u8) -> Self {
        Self::new(major_priority, self.can_id)
    }

    pub fn with_can_id(self, can_id: u8) -> Self {
        Self::new(self.major_priority, can_id)
    }
}

/// What to do with encode inputs that do not fit their field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangePolicy {
    /// Wrap integers to the field width and clamp the major priority, the way
    /// existing CBUS tooling does
    #[default]
    Reduce,
    /// Refuse the frame with [`EncodeError::OutOfRange`](crate::EncodeError::OutOfRange)
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecConfig {
    pub header: CanHeaderConfig,
    pub range_policy: RangePolicy,
}

impl CodecConfig {
    pub fn with_header(mut self, header: CanHeaderConfig) -> Self {
        self.header = header;
        self
    }

    pub fn with_range_policy(mut self, range_policy: RangePolicy) -> Self {
        self.range_policy = range_policy;
        self
    }
}
