//! The CBUS opcode table.
//!
//! Every opcode has a fixed layout: an ordered list of fields, each a fixed
//! number of hex digits, packed back to back after the opcode. The table below
//! is the only place those layouts are described; the field engine in
//! [`crate::decode_fields`] / [`crate::encode_fields`] walks it generically.

/// Name of the extra entry produced by [`FieldKind::SpeedDirection`]
pub const DIRECTION: &str = "direction";
/// Names of the extra entries produced by [`FieldKind::WeekdayMonth`]
pub const WEEKDAY: &str = "weekDay";
pub const MONTH: &str = "month";

/// How a field's hex digits are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldKind {
    /// Big-endian unsigned integer of the given number of bytes
    Int(usize),
    /// Two's complement byte
    Signed,
    /// Speed step in bits 0-6, direction in bit 7. Decodes to the field's own
    /// entry (speed) plus a [`DIRECTION`] entry.
    SpeedDirection,
    /// Weekday/month byte. Decodes to the raw byte plus [`WEEKDAY`] and
    /// [`MONTH`] entries; encodes from the raw byte.
    WeekdayMonth,
    /// Space padded 7-byte ASCII name
    Text,
    /// Bytes kept as their hex text
    Hex(usize),
}

impl FieldKind {
    pub const fn nybbles(&self) -> usize {
        match self {
            Self::Int(bytes) | Self::Hex(bytes) => *bytes * 2,
            Self::Signed | Self::SpeedDirection | Self::WeekdayMonth => 2,
            Self::Text => crate::NAME_LENGTH * 2,
        }
    }

    /// Number of named entries this field contributes to a decoded message
    pub const fn entries(&self) -> usize {
        match self {
            Self::SpeedDirection => 2,
            Self::WeekdayMonth => 3,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn int(name: &'static str, bytes: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Int(bytes),
        }
    }

    pub const fn byte(name: &'static str) -> Self {
        Self::int(name, 1)
    }

    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpcodeSpec {
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Minor priority used when the caller does not give one
    pub minor_priority: u8,
    pub fields: &'static [FieldSpec],
    /// Accessory events whose bytes after node and event number are opaque
    /// event data
    pub event_data: bool,
}

impl OpcodeSpec {
    /// Total hex digits of the payload following the opcode
    pub fn payload_nybbles(&self) -> usize {
        self.fields.iter().map(|field| field.kind.nybbles()).sum()
    }

    /// Data length encoded by CBUS in the top three bits of the opcode
    pub const fn data_length(&self) -> usize {
        (self.opcode >> 5) as usize
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Looks up an opcode byte. `None` for reserved and unassigned opcodes.
pub fn lookup(opcode: u8) -> Option<&'static OpcodeSpec> {
    REGISTRY
        .binary_search_by_key(&opcode, |spec| spec.opcode)
        .ok()
        .map(|index| &REGISTRY[index])
}

/// Looks up a mnemonic, ignoring ASCII case
pub fn lookup_mnemonic(mnemonic: &str) -> Option<&'static OpcodeSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.mnemonic.eq_ignore_ascii_case(mnemonic))
}

/* Fields */

const NODE_NUMBER: FieldSpec = FieldSpec::int("nodeNumber", 2);
const EVENT_NUMBER: FieldSpec = FieldSpec::int("eventNumber", 2);
const DEVICE_NUMBER: FieldSpec = FieldSpec::int("deviceNumber", 2);
const SESSION: FieldSpec = FieldSpec::byte("session");
const ADDRESS: FieldSpec = FieldSpec::int("address", 2);
const SPEED: FieldSpec = FieldSpec::new("speed", FieldKind::SpeedDirection);
const FLAGS: FieldSpec = FieldSpec::byte("flags");
const STATUS: FieldSpec = FieldSpec::byte("status");
const MODE: FieldSpec = FieldSpec::byte("mode");
const CV: FieldSpec = FieldSpec::int("CV", 2);
const VALUE: FieldSpec = FieldSpec::byte("value");
const CONSIST_ADDRESS: FieldSpec = FieldSpec::byte("consistAddress");
const FUNCTION_NUMBER: FieldSpec = FieldSpec::byte("functionNumber");
const FN1: FieldSpec = FieldSpec::byte("Fn1");
const FN2: FieldSpec = FieldSpec::byte("Fn2");
const FN3: FieldSpec = FieldSpec::byte("Fn3");
const ERROR_NUMBER: FieldSpec = FieldSpec::byte("errorNumber");
const NV_INDEX: FieldSpec = FieldSpec::byte("nodeVariableIndex");
const NV_VALUE: FieldSpec = FieldSpec::byte("nodeVariableValue");
const EVENT_INDEX: FieldSpec = FieldSpec::byte("eventIndex");
const EV_INDEX: FieldSpec = FieldSpec::byte("eventVariableIndex");
const EV_VALUE: FieldSpec = FieldSpec::byte("eventVariableValue");
const EVENT_IDENTIFIER: FieldSpec = FieldSpec::new("eventIdentifier", FieldKind::Hex(4));
const PARAMETER_INDEX: FieldSpec = FieldSpec::byte("parameterIndex");
const PARAMETER_VALUE: FieldSpec = FieldSpec::byte("parameterValue");
const SERVICE_INDEX: FieldSpec = FieldSpec::byte("serviceIndex");
const SERVICE_TYPE: FieldSpec = FieldSpec::byte("serviceType");
const DIAGNOSTIC_CODE: FieldSpec = FieldSpec::byte("diagnosticCode");
const REPETITIONS: FieldSpec = FieldSpec::byte("repetitions");
const EXT_OPCODE: FieldSpec = FieldSpec::byte("extOpcode");
const NAME: FieldSpec = FieldSpec::new("name", FieldKind::Text);

const DATA1: FieldSpec = FieldSpec::byte("data1");
const DATA2: FieldSpec = FieldSpec::byte("data2");
const DATA3: FieldSpec = FieldSpec::byte("data3");
const DATA4: FieldSpec = FieldSpec::byte("data4");
const DATA5: FieldSpec = FieldSpec::byte("data5");

const BYTE1: FieldSpec = FieldSpec::byte("byte1");
const BYTE2: FieldSpec = FieldSpec::byte("byte2");
const BYTE3: FieldSpec = FieldSpec::byte("byte3");
const BYTE4: FieldSpec = FieldSpec::byte("byte4");
const BYTE5: FieldSpec = FieldSpec::byte("byte5");
const BYTE6: FieldSpec = FieldSpec::byte("byte6");

const PARAM1: FieldSpec = FieldSpec::byte("param1");
const PARAM2: FieldSpec = FieldSpec::byte("param2");
const PARAM3: FieldSpec = FieldSpec::byte("param3");
const PARAM4: FieldSpec = FieldSpec::byte("param4");
const PARAM5: FieldSpec = FieldSpec::byte("param5");
const PARAM6: FieldSpec = FieldSpec::byte("param6");
const PARAM7: FieldSpec = FieldSpec::byte("param7");

const CON_ID: FieldSpec = FieldSpec::byte("conID");
const INDEX: FieldSpec = FieldSpec::byte("index");
const ALLOCATION_CODE: FieldSpec = FieldSpec::byte("allocationCode");
const EV_SPACE: FieldSpec = FieldSpec::byte("EVSPC");
const EVENT_COUNT: FieldSpec = FieldSpec::byte("eventCount");
const CAN_ID: FieldSpec = FieldSpec::byte("CAN_ID");
const MODE_NUMBER: FieldSpec = FieldSpec::byte("modeNumber");
const SEQUENCE: FieldSpec = FieldSpec::byte("sequenceCnt");
const STATUS_BITS: FieldSpec = FieldSpec::byte("statusBits");
const SERVICE_VERSION: FieldSpec = FieldSpec::byte("serviceVersion");
const REQUEST_OPCODE: FieldSpec = FieldSpec::byte("requestOpCode");
const RESULT: FieldSpec = FieldSpec::byte("result");
const MANUFACTURER_ID: FieldSpec = FieldSpec::byte("manufacturerId");
const MODULE_ID: FieldSpec = FieldSpec::byte("moduleId");
const DAT_CODE: FieldSpec = FieldSpec::byte("datcode");
const ASPECT1: FieldSpec = FieldSpec::byte("aspect1");
const ASPECT2: FieldSpec = FieldSpec::byte("aspect2");
const CAB_SPEED: FieldSpec = FieldSpec::byte("speed");
const DIAGNOSTIC_VALUE: FieldSpec = FieldSpec::int("diagnosticValue", 2);
const MINUTES: FieldSpec = FieldSpec::byte("minutes");
const HOURS: FieldSpec = FieldSpec::byte("hours");
const WDMON: FieldSpec = FieldSpec::new("wdmon", FieldKind::WeekdayMonth);
const DIV: FieldSpec = FieldSpec::byte("div");
const MDAY: FieldSpec = FieldSpec::byte("mday");
const TEMP: FieldSpec = FieldSpec::new("temp", FieldKind::Signed);
const CS_NUMBER: FieldSpec = FieldSpec::byte("CS");
const MAJOR_REV: FieldSpec = FieldSpec::byte("majorRev");
const MINOR_REV: FieldSpec = FieldSpec::byte("minorRev");
const BUILD_NO: FieldSpec = FieldSpec::byte("buildNo");
const ACK_OPCODE: FieldSpec = FieldSpec::byte("ackOpCode");

macro_rules! opcodes {
    (@event) => { false };
    (@event event) => { true };
    ($($opcode:literal $mnemonic:ident $priority:literal [$($field:ident),* $(,)?] $($event:ident)?;)*) => {
        /// Every known opcode, sorted by opcode byte
        pub static REGISTRY: &[OpcodeSpec] = &[
            $(OpcodeSpec {
                opcode: $opcode,
                mnemonic: stringify!($mnemonic),
                minor_priority: $priority,
                fields: &[$($field),*],
                event_data: opcodes!(@event $($event)?),
            },)*
        ];
    };
}

opcodes! {
    // 0 data bytes
    0x00 ACK 2 [];
    0x01 NAK 2 [];
    0x02 HLT 0 [];
    0x03 BON 1 [];
    0x04 TOF 1 [];
    0x05 TON 1 [];
    0x06 ESTOP 1 [];
    0x07 ARST 0 [];
    0x08 RTOF 1 [];
    0x09 RTON 1 [];
    0x0A RESTP 0 [];
    0x0C RSTAT 2 [];
    0x0D QNN 3 [];
    0x10 RQNP 3 [];
    0x11 RQMN 2 [];

    // 1 data byte
    0x21 KLOC 2 [SESSION];
    0x22 QLOC 2 [SESSION];
    0x23 DKEEP 2 [SESSION];
    0x30 DBG1 2 [STATUS];
    0x3F EXTC 3 [EXT_OPCODE];

    // 2 data bytes
    0x40 RLOC 2 [ADDRESS];
    0x41 QCON 2 [CON_ID, INDEX];
    0x42 SNN 3 [NODE_NUMBER];
    0x43 ALOC 2 [SESSION, ALLOCATION_CODE];
    0x44 STMOD 2 [SESSION, MODE];
    0x45 PCON 2 [SESSION, CONSIST_ADDRESS];
    0x46 KCON 2 [SESSION, CONSIST_ADDRESS];
    0x47 DSPD 2 [SESSION, SPEED];
    0x48 DFLG 2 [SESSION, FLAGS];
    0x49 DFNON 2 [SESSION, FUNCTION_NUMBER];
    0x4A DFNOF 2 [SESSION, FUNCTION_NUMBER];
    0x4C SSTAT 3 [SESSION, STATUS];
    0x4F NNRSM 3 [NODE_NUMBER];
    0x50 RQNN 3 [NODE_NUMBER];
    0x51 NNREL 3 [NODE_NUMBER];
    0x52 NNACK 3 [NODE_NUMBER];
    0x53 NNLRN 3 [NODE_NUMBER];
    0x54 NNULN 3 [NODE_NUMBER];
    0x55 NNCLR 3 [NODE_NUMBER];
    0x56 NNEVN 3 [NODE_NUMBER];
    0x57 NERD 3 [NODE_NUMBER];
    0x58 RQEVN 3 [NODE_NUMBER];
    0x59 WRACK 3 [NODE_NUMBER];
    0x5A RQDAT 3 [NODE_NUMBER];
    0x5B RQDDS 3 [DEVICE_NUMBER];
    0x5C BOOTM 3 [NODE_NUMBER];
    0x5D ENUM 3 [NODE_NUMBER];
    0x5E NNRST 3 [NODE_NUMBER];
    0x5F EXTC1 3 [EXT_OPCODE, BYTE1];

    // 3 data bytes
    0x60 DFUN 2 [SESSION, FN1, FN2];
    0x61 GLOC 2 [ADDRESS, FLAGS];
    0x63 ERR 2 [DATA1, DATA2, ERROR_NUMBER];
    0x6F CMDERR 3 [NODE_NUMBER, ERROR_NUMBER];
    0x70 EVNLF 3 [NODE_NUMBER, EV_SPACE];
    0x71 NVRD 3 [NODE_NUMBER, NV_INDEX];
    0x72 NENRD 3 [NODE_NUMBER, EVENT_INDEX];
    0x73 RQNPN 3 [NODE_NUMBER, PARAMETER_INDEX];
    0x74 NUMEV 3 [NODE_NUMBER, EVENT_COUNT];
    0x75 CANID 3 [NODE_NUMBER, CAN_ID];
    0x76 MODE 3 [NODE_NUMBER, MODE_NUMBER];
    0x78 RQSD 3 [NODE_NUMBER, SERVICE_INDEX];
    0x7F EXTC2 3 [EXT_OPCODE, BYTE1, BYTE2];

    // 4 data bytes
    0x80 RDCC3 2 [REPETITIONS, BYTE1, BYTE2, BYTE3];
    0x82 WCVO 2 [SESSION, CV, VALUE];
    0x83 WCVB 2 [SESSION, CV, VALUE];
    0x84 QCVS 2 [SESSION, CV, MODE];
    0x85 PCVS 2 [SESSION, CV, VALUE];
    0x87 RDGN 3 [NODE_NUMBER, SERVICE_INDEX, DIAGNOSTIC_CODE];
    0x8E NVSETRD 3 [NODE_NUMBER, NV_INDEX, NV_VALUE];
    0x90 ACON 3 [NODE_NUMBER, EVENT_NUMBER];
    0x91 ACOF 3 [NODE_NUMBER, EVENT_NUMBER];
    0x92 AREQ 3 [NODE_NUMBER, EVENT_NUMBER];
    0x93 ARON 3 [NODE_NUMBER, EVENT_NUMBER];
    0x94 AROF 3 [NODE_NUMBER, EVENT_NUMBER];
    0x95 EVULN 3 [NODE_NUMBER, EVENT_NUMBER];
    0x96 NVSET 3 [NODE_NUMBER, NV_INDEX, NV_VALUE];
    0x97 NVANS 3 [NODE_NUMBER, NV_INDEX, NV_VALUE];
    0x98 ASON 3 [NODE_NUMBER, DEVICE_NUMBER];
    0x99 ASOF 3 [NODE_NUMBER, DEVICE_NUMBER];
    0x9A ASRQ 3 [NODE_NUMBER, DEVICE_NUMBER];
    0x9B PARAN 3 [NODE_NUMBER, PARAMETER_INDEX, PARAMETER_VALUE];
    0x9C REVAL 3 [NODE_NUMBER, EVENT_INDEX, EV_INDEX];
    0x9D ARSON 3 [NODE_NUMBER, DEVICE_NUMBER];
    0x9E ARSOF 3 [NODE_NUMBER, DEVICE_NUMBER];
    0x9F EXTC3 3 [EXT_OPCODE, BYTE1, BYTE2, BYTE3];

    // 5 data bytes
    0xA0 RDCC4 2 [REPETITIONS, BYTE1, BYTE2, BYTE3, BYTE4];
    0xA2 WCVS 2 [SESSION, CV, MODE, VALUE];
    0xAB HEARTB 3 [NODE_NUMBER, SEQUENCE, STATUS, STATUS_BITS];
    0xAC SD 3 [NODE_NUMBER, SERVICE_INDEX, SERVICE_TYPE, SERVICE_VERSION];
    0xAF GRSP 3 [NODE_NUMBER, REQUEST_OPCODE, SERVICE_TYPE, RESULT];
    0xB0 ACON1 3 [NODE_NUMBER, EVENT_NUMBER, DATA1] event;
    0xB1 ACOF1 3 [NODE_NUMBER, EVENT_NUMBER, DATA1] event;
    0xB2 REQEV 3 [NODE_NUMBER, EVENT_NUMBER, EV_INDEX];
    0xB3 ARON1 3 [NODE_NUMBER, EVENT_NUMBER, DATA1] event;
    0xB4 AROF1 3 [NODE_NUMBER, EVENT_NUMBER, DATA1] event;
    0xB5 NEVAL 3 [NODE_NUMBER, EVENT_INDEX, EV_INDEX, EV_VALUE];
    0xB6 PNN 3 [NODE_NUMBER, MANUFACTURER_ID, MODULE_ID, FLAGS];
    0xB8 ASON1 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1] event;
    0xB9 ASOF1 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1] event;
    0xBD ARSON1 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1] event;
    0xBE ARSOF1 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1] event;
    0xBF EXTC4 3 [EXT_OPCODE, BYTE1, BYTE2, BYTE3, BYTE4];

    // 6 data bytes
    0xC0 RDCC5 2 [REPETITIONS, BYTE1, BYTE2, BYTE3, BYTE4, BYTE5];
    0xC1 WCVOA 2 [ADDRESS, CV, MODE, VALUE];
    0xC2 CABDAT 2 [ADDRESS, DAT_CODE, ASPECT1, ASPECT2, CAB_SPEED];
    0xC7 DGN 3 [NODE_NUMBER, SERVICE_INDEX, DIAGNOSTIC_CODE, DIAGNOSTIC_VALUE];
    0xCF FCLK 3 [MINUTES, HOURS, WDMON, DIV, MDAY, TEMP];
    0xD0 ACON2 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2] event;
    0xD1 ACOF2 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2] event;
    0xD2 EVLRN 3 [NODE_NUMBER, EVENT_NUMBER, EV_INDEX, EV_VALUE];
    0xD3 EVANS 3 [NODE_NUMBER, EVENT_NUMBER, EV_INDEX, EV_VALUE];
    0xD4 ARON2 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2] event;
    0xD5 AROF2 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2] event;
    0xD8 ASON2 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2] event;
    0xD9 ASOF2 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2] event;
    0xDD ARSON2 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2] event;
    0xDE ARSOF2 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2] event;
    0xDF EXTC5 3 [EXT_OPCODE, BYTE1, BYTE2, BYTE3, BYTE4, BYTE5];

    // 7 data bytes
    0xE0 RDCC6 2 [REPETITIONS, BYTE1, BYTE2, BYTE3, BYTE4, BYTE5, BYTE6];
    0xE1 PLOC 2 [SESSION, ADDRESS, SPEED, FN1, FN2, FN3];
    0xE2 NAME 3 [NAME];
    0xE3 STAT 2 [NODE_NUMBER, CS_NUMBER, FLAGS, MAJOR_REV, MINOR_REV, BUILD_NO];
    0xE6 ENACK 3 [NODE_NUMBER, ACK_OPCODE, EVENT_IDENTIFIER];
    0xE7 ESD 3 [NODE_NUMBER, SERVICE_INDEX, DATA1, DATA2, DATA3, DATA4];
    0xEF PARAMS 3 [PARAM1, PARAM2, PARAM3, PARAM4, PARAM5, PARAM6, PARAM7];
    0xF0 ACON3 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2, DATA3] event;
    0xF1 ACOF3 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2, DATA3] event;
    0xF2 ENRSP 3 [NODE_NUMBER, EVENT_IDENTIFIER, EVENT_INDEX];
    0xF3 ARON3 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2, DATA3] event;
    0xF4 AROF3 3 [NODE_NUMBER, EVENT_NUMBER, DATA1, DATA2, DATA3] event;
    0xF5 EVLRNI 3 [NODE_NUMBER, EVENT_NUMBER, EVENT_INDEX, EV_INDEX, EV_VALUE];
    0xF6 ACDAT 3 [NODE_NUMBER, DATA1, DATA2, DATA3, DATA4, DATA5];
    0xF7 ARDAT 3 [NODE_NUMBER, DATA1, DATA2, DATA3, DATA4, DATA5];
    0xF8 ASON3 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2, DATA3] event;
    0xF9 ASOF3 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2, DATA3] event;
    0xFA DDES 3 [DEVICE_NUMBER, DATA1, DATA2, DATA3, DATA4, DATA5];
    0xFB DDRS 3 [DEVICE_NUMBER, DATA1, DATA2, DATA3, DATA4, DATA5];
    0xFC DDWS 3 [DEVICE_NUMBER, DATA1, DATA2, DATA3, DATA4, DATA5];
    0xFD ARSON3 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2, DATA3] event;
    0xFE ARSOF3 3 [NODE_NUMBER, DEVICE_NUMBER, DATA1, DATA2, DATA3] event;
    0xFF EXTC6 3 [EXT_OPCODE, BYTE1, BYTE2, BYTE3, BYTE4, BYTE5, BYTE6];
}
