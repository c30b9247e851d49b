//! Communications Device Class functional descriptors
//!
//! # References
//!
//! - Universal Serial Bus Class Definitions for Communications Devices, Revision 1.2
//! - PSTN Subclass, Revision 1.2

/// Communications and CDC Control class code
pub const USB_CLASS_CDC: u8 = 0x02;
/// CDC-Data class code
pub const USB_CLASS_CDC_DATA: u8 = 0x0A;

const CS_INTERFACE: u8 = 0x24;

const SUBTYPE_HEADER: u8 = 0x00;
const SUBTYPE_CALL_MANAGEMENT: u8 = 0x01;
const SUBTYPE_ACM: u8 = 0x02;
const SUBTYPE_UNION: u8 = 0x06;

/// Communications Devices specification release number
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum bcdCDC {
    /// 1.10
    V11 = 0x01_10,
}

/// Header functional descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Communications Devices specification release number
    pub bcdCDC: bcdCDC,
}

impl Header {
    /// Size of this descriptor on the wire
    pub const SIZE: u8 = 5;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        let bcd = (self.bcdCDC as u16).to_le_bytes();
        [Self::SIZE, CS_INTERFACE, SUBTYPE_HEADER, bcd[0], bcd[1]]
    }
}

/// Abstract Control Management capabilities
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcmCapabilities {
    /// Device supports `{Set,Clear,Get}_Comm_Feature`
    pub comm_features: bool,
    /// Device supports `{Set,Get}_Line_Coding`, `Set_Control_Line_State` and `Serial_State`
    pub line_serial: bool,
    /// Device supports `Send_Break`
    pub send_break: bool,
    /// Device supports `Network_Connection`
    pub network_connection: bool,
}

impl AcmCapabilities {
    /// No class-specific requests supported
    pub const NONE: Self = AcmCapabilities {
        comm_features: false,
        line_serial: false,
        send_break: false,
        network_connection: false,
    };

    /// Line coding and line state requests supported
    pub const LINE_SERIAL: Self = AcmCapabilities {
        comm_features: false,
        line_serial: true,
        send_break: false,
        network_connection: false,
    };

    fn byte(&self) -> u8 {
        let mut byte = 0;
        if self.comm_features {
            byte |= 1 << 0;
        }
        if self.line_serial {
            byte |= 1 << 1;
        }
        if self.send_break {
            byte |= 1 << 2;
        }
        if self.network_connection {
            byte |= 1 << 3;
        }
        byte
    }
}

/// Abstract Control Management functional descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acm {
    /// Capabilities
    pub bmCapabilities: AcmCapabilities,
}

impl Acm {
    /// Size of this descriptor on the wire
    pub const SIZE: u8 = 4;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        [
            Self::SIZE,
            CS_INTERFACE,
            SUBTYPE_ACM,
            self.bmCapabilities.byte(),
        ]
    }
}

/// Union Interface functional descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Union {
    /// Controlling interface
    pub bControlInterface: u8,
    /// Subordinate interface
    pub bSubordinateInterface0: u8,
}

impl Union {
    /// Size of this descriptor on the wire
    pub const SIZE: u8 = 5;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        [
            Self::SIZE,
            CS_INTERFACE,
            SUBTYPE_UNION,
            self.bControlInterface,
            self.bSubordinateInterface0,
        ]
    }
}

/// Call Management capabilities
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCapabilities {
    /// Device handles call management itself
    pub call_management: bool,
    /// Device can send/receive call management information over a Data Class interface
    pub data_class: bool,
}

impl CallCapabilities {
    fn byte(&self) -> u8 {
        let mut byte = 0;
        if self.call_management {
            byte |= 1 << 0;
        }
        if self.data_class {
            byte |= 1 << 1;
        }
        byte
    }
}

/// Call Management functional descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallManagement {
    /// Capabilities
    pub bmCapabilities: CallCapabilities,
    /// Interface number of the Data Class interface
    pub bDataInterface: u8,
}

impl CallManagement {
    /// Size of this descriptor on the wire
    pub const SIZE: u8 = 5;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        [
            Self::SIZE,
            CS_INTERFACE,
            SUBTYPE_CALL_MANAGEMENT,
            self.bmCapabilities.byte(),
            self.bDataInterface,
        ]
    }
}

/// The class-specific block that follows the communications interface descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionalDescriptors {
    /// Header, always first
    pub header: Header,
    /// Abstract Control Management
    pub acm: Acm,
    /// Union linking the control and data interfaces
    pub union: Union,
    /// Call Management
    pub call_management: CallManagement,
}

impl FunctionalDescriptors {
    /// Size of the whole block on the wire
    pub const SIZE: u8 = Header::SIZE + Acm::SIZE + Union::SIZE + CallManagement::SIZE;

    /// Returns the wire representation of the block, in declaration order
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        let mut out = [0; Self::SIZE as usize];
        let mut at = 0;
        for part in [
            &self.header.bytes()[..],
            &self.acm.bytes()[..],
            &self.union.bytes()[..],
            &self.call_management.bytes()[..],
        ]
        .iter()
        {
            out[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        out
    }
}
