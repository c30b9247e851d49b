//! USB 2.0 standard descriptors
//!
//! # References
//!
//! - Universal Serial Bus Specification Revision 2.0, section 9.6

use usb_device::descriptor::descriptor_type;
use usb_device::endpoint::{EndpointAddress, EndpointType};
use usb_device::UsbDirection;

pub mod cdc;

/// USB specification release version
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum bcdUSB {
    /// 2.0
    V20 = 0x0200,
}

/// Maximum packet size of the default control endpoint
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum bMaxPacketSize0 {
    /// 8 bytes
    B8 = 8,
    /// 16 bytes
    B16 = 16,
    /// 32 bytes
    B32 = 32,
    /// 64 bytes
    B64 = 64,
}

/// Standard Device Descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    // bLength: u8,
    // bDescriptorType: u8,
    /// USB specification release version
    pub bcdUSB: bcdUSB,
    /// Device class
    pub bDeviceClass: u8,
    /// Device subclass
    pub bDeviceSubClass: u8,
    /// Device protocol
    pub bDeviceProtocol: u8,
    /// Maximum packet size of endpoint zero
    pub bMaxPacketSize0: bMaxPacketSize0,
    /// Vendor ID
    pub idVendor: u16,
    /// Product ID
    pub idProduct: u16,
    /// Device release number
    pub bcdDevice: u16,
    /// Manufacturer string index
    pub iManufacturer: u8,
    /// Product string index
    pub iProduct: u8,
    /// Serial number string index
    pub iSerialNumber: u8,
    /// Number of configurations
    pub bNumConfigurations: u8,
}

impl DeviceDescriptor {
    /// The size of this descriptor on the wire
    pub const SIZE: u8 = 18;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        let bcd_usb = (self.bcdUSB as u16).to_le_bytes();
        let vendor = self.idVendor.to_le_bytes();
        let product = self.idProduct.to_le_bytes();
        let release = self.bcdDevice.to_le_bytes();
        [
            Self::SIZE,
            descriptor_type::DEVICE,
            bcd_usb[0],
            bcd_usb[1],
            self.bDeviceClass,
            self.bDeviceSubClass,
            self.bDeviceProtocol,
            self.bMaxPacketSize0 as u8,
            vendor[0],
            vendor[1],
            product[0],
            product[1],
            release[0],
            release[1],
            self.iManufacturer,
            self.iProduct,
            self.iSerialNumber,
            self.bNumConfigurations,
        ]
    }
}

/// Configuration attributes
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct bmAttributes {
    /// The device has a local power source
    pub self_powered: bool,
    /// The device can signal remote wakeup
    pub remote_wakeup: bool,
}

impl bmAttributes {
    fn byte(&self) -> u8 {
        // D7 is reserved and must be set
        let mut byte = 1 << 7;
        if self.self_powered {
            byte |= 1 << 6;
        }
        if self.remote_wakeup {
            byte |= 1 << 5;
        }
        byte
    }
}

/// Configuration Descriptor
///
/// `wTotalLength` is not part of this value; it depends on everything that
/// follows the descriptor and is filled in by whoever serializes the tree.
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    // bLength: u8,
    // bDescriptorType: u8,
    // wTotalLength: u16,
    /// Number of interfaces
    pub bNumInterfaces: u8,
    /// Value used by SET_CONFIGURATION to select this configuration
    pub bConfigurationValue: u8,
    /// Configuration string descriptor index
    pub iConfiguration: u8,
    /// Attributes
    pub bmAttributes: bmAttributes,
    /// Maximum power consumption in 2 mA units
    pub bMaxPower: u8,
}

impl ConfigurationDescriptor {
    /// The size of this descriptor on the wire
    pub const SIZE: u8 = 9;

    /// Returns the wire representation of this descriptor with the given total length
    pub fn bytes(&self, total_length: u16) -> [u8; Self::SIZE as usize] {
        let total = total_length.to_le_bytes();
        [
            Self::SIZE,
            descriptor_type::CONFIGURATION,
            total[0],
            total[1],
            self.bNumInterfaces,
            self.bConfigurationValue,
            self.iConfiguration,
            self.bmAttributes.byte(),
            self.bMaxPower,
        ]
    }
}

/// Interface class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceClass {
    /// Communications and CDC Control
    Communications {
        /// Subclass
        subclass: CommunicationsSubclass,
    },
    /// CDC-Data
    CdcData,
}

impl InterfaceClass {
    fn byte(&self) -> u8 {
        match self {
            InterfaceClass::Communications { .. } => cdc::USB_CLASS_CDC,
            InterfaceClass::CdcData => cdc::USB_CLASS_CDC_DATA,
        }
    }

    fn subclass_byte(&self) -> u8 {
        match self {
            InterfaceClass::Communications { subclass } => *subclass as u8,
            InterfaceClass::CdcData => 0,
        }
    }
}

/// Communications subclass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommunicationsSubclass {
    /// Abstract Control Model
    Acm = 0x02,
}

/// Interface Descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    // bLength: u8,
    // bDescriptorType: u8,
    /// Interface number
    pub bInterfaceNumber: u8,
    /// Alternate setting
    pub bAlternateSetting: u8,
    /// Number of endpoints, excluding endpoint zero
    pub bNumEndpoints: u8,
    /// Interface class and subclass
    pub bInterfaceClass: InterfaceClass,
    /// Interface protocol
    pub bInterfaceProtocol: u8,
    /// Interface string descriptor index
    pub iInterface: u8,
}

impl InterfaceDescriptor {
    /// The size of this descriptor on the wire
    pub const SIZE: u8 = 9;

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        [
            Self::SIZE,
            descriptor_type::INTERFACE,
            self.bInterfaceNumber,
            self.bAlternateSetting,
            self.bNumEndpoints,
            self.bInterfaceClass.byte(),
            self.bInterfaceClass.subclass_byte(),
            self.bInterfaceProtocol,
            self.iInterface,
        ]
    }
}

/// Endpoint address as it appears in a descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address {
    /// Endpoint number
    pub number: u8,
    /// Endpoint direction
    pub direction: UsbDirection,
}

impl Address {
    /// Returns the `bEndpointAddress` byte
    pub fn byte(&self) -> u8 {
        (self.number & 0b1111) | self.direction as u8
    }
}

impl From<Address> for EndpointAddress {
    fn from(address: Address) -> Self {
        EndpointAddress::from(address.byte())
    }
}

/// Endpoint Descriptor
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    // bLength: u8,
    // bDescriptorType: u8,
    /// Endpoint address
    pub bEndpointAddress: Address,
    /// Transfer type
    pub bmAttributes: EndpointType,
    /// Maximum packet size
    pub wMaxPacketSize: u16,
    /// Polling interval in frames
    pub bInterval: u8,
}

impl EndpointDescriptor {
    /// The size of this descriptor on the wire
    pub const SIZE: u8 = 7;

    /// Returns the address of this endpoint as the driver sees it
    pub fn address(&self) -> EndpointAddress {
        self.bEndpointAddress.into()
    }

    /// Returns the wire representation of this descriptor
    pub fn bytes(&self) -> [u8; Self::SIZE as usize] {
        // packet sizes above 1023 bytes need the high-speed encoding, which we don't do
        let size = (self.wMaxPacketSize & ((1 << 11) - 1)).to_le_bytes();
        [
            Self::SIZE,
            descriptor_type::ENDPOINT,
            self.bEndpointAddress.byte(),
            transfer_type_bits(self.bmAttributes),
            size[0],
            size[1],
            self.bInterval,
        ]
    }
}

fn transfer_type_bits(ty: EndpointType) -> u8 {
    match ty {
        EndpointType::Control => 0b00,
        EndpointType::Isochronous { .. } => 0b01,
        EndpointType::Bulk => 0b10,
        EndpointType::Interrupt => 0b11,
    }
}

/// A malformed descriptor record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Malformed {
    /// `bLength` is smaller than the two-byte record header
    TooShort {
        /// Offset of the record in the stream
        offset: usize,
    },
    /// `bLength` runs past the end of the stream
    Truncated {
        /// Offset of the record in the stream
        offset: usize,
    },
}

/// Walks a descriptor byte stream one record at a time
///
/// Yields `(bDescriptorType, record)` pairs, where `record` includes the two
/// header bytes. Iteration stops after the first malformed record.
pub struct DescriptorIter<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> DescriptorIter<'a> {
    /// Creates a walker over `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        DescriptorIter {
            bytes,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Result<(u8, &'a [u8]), Malformed>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.bytes[offset..];
        let len = rest[0] as usize;

        if len < 2 {
            self.failed = true;
            return Some(Err(Malformed::TooShort { offset }));
        }

        if len > rest.len() {
            self.failed = true;
            return Some(Err(Malformed::Truncated { offset }));
        }

        self.offset += len;
        Some(Ok((rest[1], &rest[..len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_address_byte() {
        let ep = Address {
            number: 2,
            direction: UsbDirection::In,
        };
        assert_eq!(ep.byte(), 0x82);

        let ep = Address {
            number: 1,
            direction: UsbDirection::Out,
        };
        assert_eq!(ep.byte(), 0x01);
        assert_eq!(u8::from(EndpointAddress::from(ep)), 0x01);
    }

    #[test]
    fn interrupt_endpoint() {
        let desc = EndpointDescriptor {
            bEndpointAddress: Address {
                number: 2,
                direction: UsbDirection::In,
            },
            bmAttributes: EndpointType::Interrupt,
            wMaxPacketSize: 64,
            bInterval: 1,
        };

        assert_eq!(desc.bytes(), [7, 5, 0x82, 0x03, 64, 0, 1]);
    }

    #[test]
    fn configuration_attributes() {
        let desc = ConfigurationDescriptor {
            bNumInterfaces: 2,
            bConfigurationValue: 1,
            iConfiguration: 0,
            bmAttributes: bmAttributes {
                self_powered: true,
                remote_wakeup: false,
            },
            bMaxPower: 50,
        };

        assert_eq!(desc.bytes(0x0143), [9, 2, 0x43, 0x01, 2, 1, 0, 0xC0, 50]);
    }

    #[test]
    fn data_interface() {
        let desc = InterfaceDescriptor {
            bInterfaceNumber: 1,
            bAlternateSetting: 0,
            bNumEndpoints: 2,
            bInterfaceClass: InterfaceClass::CdcData,
            bInterfaceProtocol: 0,
            iInterface: 0,
        };

        assert_eq!(desc.bytes(), [9, 4, 1, 0, 2, 0x0A, 0, 0, 0]);
    }

    #[test]
    fn walk() {
        let stream = [4, 0x24, 2, 0, 3, 0x24, 6];
        let mut it = DescriptorIter::new(&stream);

        assert_eq!(it.next(), Some(Ok((0x24, &stream[..4]))));
        assert_eq!(it.next(), Some(Ok((0x24, &stream[4..]))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn walk_malformed() {
        let mut it = DescriptorIter::new(&[0, 4]);
        assert_eq!(it.next(), Some(Err(Malformed::TooShort { offset: 0 })));
        assert_eq!(it.next(), None);

        let mut it = DescriptorIter::new(&[2, 4, 9, 4, 0]);
        assert!(matches!(it.next(), Some(Ok((4, _)))));
        assert_eq!(it.next(), Some(Err(Malformed::Truncated { offset: 2 })));
        assert_eq!(it.next(), None);
    }
}
