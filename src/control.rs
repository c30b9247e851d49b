//! Control Request Dispatcher
//!
//! Standard requests never reach this module; the driver's control pipeline
//! answers them. What arrives here are the class requests the driver routed
//! to the communications interface because they matched a registered
//! [`RequestFilter`].

use log::{debug, warn};
use usb_device::control::{Recipient, RequestType};
use usb_device::UsbDirection;

use crate::config::ControlPolicy;

/// `SET_LINE_CODING` request code
pub const REQ_SET_LINE_CODING: u8 = 0x20;
/// `GET_LINE_CODING` request code
pub const REQ_GET_LINE_CODING: u8 = 0x21;
/// `SET_CONTROL_LINE_STATE` request code
pub const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

/// The SETUP stage of a control transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetupPacket {
    /// Direction of the data stage
    pub direction: UsbDirection,
    /// Standard, class or vendor request
    pub request_type: RequestType,
    /// Device, interface, endpoint or other
    pub recipient: Recipient,
    /// `bRequest`
    pub request: u8,
    /// `wValue`
    pub value: u16,
    /// `wIndex`
    pub index: u16,
    /// `wLength`
    pub length: u16,
}

impl SetupPacket {
    /// Size of a SETUP packet
    pub const SIZE: usize = 8;

    /// Parses the eight bytes of a SETUP packet
    ///
    /// Recipient codes 4 to 31 all parse as `Recipient::Reserved`, so
    /// [`bytes`](Self::bytes) writes them back as 31.
    pub fn parse(bytes: &[u8; Self::SIZE]) -> Self {
        let rt = bytes[0];

        SetupPacket {
            direction: if rt & 0x80 != 0 {
                UsbDirection::In
            } else {
                UsbDirection::Out
            },
            request_type: match (rt >> 5) & 0b11 {
                0 => RequestType::Standard,
                1 => RequestType::Class,
                2 => RequestType::Vendor,
                _ => RequestType::Reserved,
            },
            recipient: match rt & 0b1_1111 {
                0 => Recipient::Device,
                1 => Recipient::Interface,
                2 => Recipient::Endpoint,
                3 => Recipient::Other,
                _ => Recipient::Reserved,
            },
            request: bytes[1],
            value: u16::from_le_bytes([bytes[2], bytes[3]]),
            index: u16::from_le_bytes([bytes[4], bytes[5]]),
            length: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Returns the `bmRequestType` byte. `Recipient::Reserved` encodes as 31.
    pub fn request_type_byte(&self) -> u8 {
        let ty: u8 = match self.request_type {
            RequestType::Standard => 0,
            RequestType::Class => 1,
            RequestType::Vendor => 2,
            RequestType::Reserved => 3,
        };
        let recipient: u8 = match self.recipient {
            Recipient::Device => 0,
            Recipient::Interface => 1,
            Recipient::Endpoint => 2,
            Recipient::Other => 3,
            Recipient::Reserved => 0b1_1111,
        };
        (self.direction as u8) | ty << 5 | recipient
    }

    /// Returns the wire representation of this packet
    pub fn bytes(&self) -> [u8; Self::SIZE] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type_byte(),
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }
}

/// Selects which control requests the driver hands to a function
///
/// A request matches when both its type and its recipient are equal to the
/// filter's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestFilter {
    /// Request type to match
    pub request_type: RequestType,
    /// Recipient to match
    pub recipient: Recipient,
}

impl RequestFilter {
    /// Class requests sent to an interface
    pub const CLASS_INTERFACE: Self = RequestFilter {
        request_type: RequestType::Class,
        recipient: Recipient::Interface,
    };

    /// Returns `true` if `setup` should be routed through this filter
    pub fn matches(&self, setup: &SetupPacket) -> bool {
        setup.request_type == self.request_type && setup.recipient == self.recipient
    }
}

/// Data stage of a control transfer
///
/// For OUT requests `len` bytes of `buf` hold what the host sent. For IN
/// requests the handler writes its reply into `buf` and sets `len`.
#[derive(Debug)]
pub struct ControlData<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> ControlData<'a> {
    /// Wraps a data stage buffer holding `len` valid bytes
    pub fn new(buf: &'a mut [u8], len: usize) -> Self {
        let len = core::cmp::min(len, buf.len());
        ControlData { buf, len }
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the data stage is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes
    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Replaces the payload with `data`, truncated to the buffer size
    pub fn reply(&mut self, data: &[u8]) {
        let n = core::cmp::min(data.len(), self.buf.len());
        self.buf[..n].copy_from_slice(&data[..n]);
        self.len = n;
    }
}

/// Routing decision of a control handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The request was consumed; the driver completes the transfer
    Handled,
    /// The request was not for us; the driver tries its next handler
    NotHandled,
}

/// Number of stop bits for LineCoding
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopBits {
    /// 1 stop bit
    One = 0,
    /// 1.5 stop bits
    OnePointFive = 1,
    /// 2 stop bits
    Two = 2,
}

impl From<u8> for StopBits {
    fn from(value: u8) -> Self {
        match value {
            1 => StopBits::OnePointFive,
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// Parity for LineCoding
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParityType {
    /// No parity
    None = 0,
    /// Odd parity
    Odd = 1,
    /// Even parity
    Even = 2,
    /// Parity bit always set
    Mark = 3,
    /// Parity bit always clear
    Space = 4,
}

impl From<u8> for ParityType {
    fn from(value: u8) -> Self {
        match value {
            1 => ParityType::Odd,
            2 => ParityType::Even,
            3 => ParityType::Mark,
            4 => ParityType::Space,
            _ => ParityType::None,
        }
    }
}

/// Line coding parameters
///
/// The host sets these but the data stream does not depend on them; they
/// only matter when bytes are forwarded to a real UART.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineCoding {
    stop_bits: StopBits,
    data_bits: u8,
    parity_type: ParityType,
    data_rate: u32,
}

impl LineCoding {
    /// Size of the wire representation
    pub const SIZE: usize = 7;

    /// Gets the number of stop bits for UART communication.
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    /// Gets the number of data bits for UART communication.
    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    /// Gets the parity type for UART communication.
    pub fn parity_type(&self) -> ParityType {
        self.parity_type
    }

    /// Gets the data rate in bits per second for UART communication.
    pub fn data_rate(&self) -> u32 {
        self.data_rate
    }

    /// Parses the `dwDTERate`, `bCharFormat`, `bParityType`, `bDataBits` structure
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }

        Some(LineCoding {
            data_rate: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            stop_bits: bytes[4].into(),
            parity_type: bytes[5].into(),
            data_bits: bytes[6],
        })
    }

    /// Returns the wire representation
    pub fn bytes(&self) -> [u8; Self::SIZE] {
        let rate = self.data_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits as u8,
            self.parity_type as u8,
            self.data_bits,
        ]
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        LineCoding {
            stop_bits: StopBits::One,
            data_bits: 8,
            parity_type: ParityType::None,
            data_rate: 8_000,
        }
    }
}

/// Modem control signals set by the host
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlLineState {
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl From<u16> for ControlLineState {
    fn from(value: u16) -> Self {
        ControlLineState {
            dtr: value & (1 << 0) != 0,
            rts: value & (1 << 1) != 0,
        }
    }
}

/// ACM requests understood by the dispatcher
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcmRequest {
    /// Host to device, 7 bytes of line coding
    SetLineCoding,
    /// Device to host, 7 bytes of line coding
    GetLineCoding,
    /// Host sets DTR and RTS through `wValue`
    SetControlLineState(ControlLineState),
    /// Anything else, with its request code
    Unrecognized(u8),
}

impl AcmRequest {
    /// Classifies `setup`; requests with the wrong direction are unrecognized
    pub fn classify(setup: &SetupPacket) -> Self {
        match (setup.request, setup.direction) {
            (REQ_SET_LINE_CODING, UsbDirection::Out) => AcmRequest::SetLineCoding,
            (REQ_GET_LINE_CODING, UsbDirection::In) => AcmRequest::GetLineCoding,
            (REQ_SET_CONTROL_LINE_STATE, UsbDirection::Out) => {
                AcmRequest::SetControlLineState(setup.value.into())
            }
            (request, _) => AcmRequest::Unrecognized(request),
        }
    }
}

/// Answers class requests addressed to the communications interface
#[derive(Debug)]
pub struct Dispatcher {
    policy: ControlPolicy,
    interface: u8,
    line_coding: LineCoding,
    line_state: ControlLineState,
}

impl Dispatcher {
    /// Creates a dispatcher for the communications interface `interface`
    pub fn new(policy: ControlPolicy, interface: u8) -> Self {
        Dispatcher {
            policy,
            interface,
            line_coding: LineCoding::default(),
            line_state: ControlLineState::default(),
        }
    }

    /// The last line coding set by the host
    pub fn line_coding(&self) -> &LineCoding {
        &self.line_coding
    }

    /// The last control line state set by the host
    pub fn line_state(&self) -> ControlLineState {
        self.line_state
    }

    /// Forgets everything the host has set
    pub fn reset(&mut self) {
        self.line_coding = LineCoding::default();
        self.line_state = ControlLineState::default();
    }

    /// Handles one control request
    pub fn dispatch(&mut self, setup: &SetupPacket, data: &mut ControlData<'_>) -> ControlOutcome {
        if self.policy == ControlPolicy::ClaimAll {
            debug!("claiming request {:#04x}", setup.request);
            return ControlOutcome::Handled;
        }

        if setup.request_type != RequestType::Class
            || setup.recipient != Recipient::Interface
            || setup.index != u16::from(self.interface)
        {
            return ControlOutcome::NotHandled;
        }

        match AcmRequest::classify(setup) {
            AcmRequest::SetLineCoding => match LineCoding::parse(data.payload()) {
                Some(coding) => {
                    debug!("SET_LINE_CODING {:?}", coding);
                    self.line_coding = coding;
                    ControlOutcome::Handled
                }
                None => {
                    warn!("SET_LINE_CODING with {} byte payload", data.len());
                    ControlOutcome::NotHandled
                }
            },

            AcmRequest::GetLineCoding => {
                debug!("GET_LINE_CODING");
                let coding = self.line_coding.bytes();
                let n = core::cmp::min(coding.len(), usize::from(setup.length));
                data.reply(&coding[..n]);
                ControlOutcome::Handled
            }

            AcmRequest::SetControlLineState(state) => {
                debug!("SET_CONTROL_LINE_STATE dtr={} rts={}", state.dtr, state.rts);
                self.line_state = state;
                ControlOutcome::Handled
            }

            AcmRequest::Unrecognized(request) => {
                debug!("passing on request {:#04x}", request);
                ControlOutcome::NotHandled
            }
        }
    }
}
