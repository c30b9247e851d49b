use core::cmp;

use log::{info, warn};
use usb_device::descriptor::descriptor_type;
use usb_device::endpoint::{EndpointAddress, EndpointType};
use usb_device::UsbDirection;

use crate::config::{Config, ControlPolicy};
use crate::control::{ControlData, ControlLineState, ControlOutcome, Dispatcher, LineCoding};
use crate::control::{RequestFilter, SetupPacket};
use crate::descriptor::cdc::{self, AcmCapabilities, CallCapabilities, FunctionalDescriptors};
use crate::descriptor::{bMaxPacketSize0, bcdUSB, bmAttributes, Address};
use crate::descriptor::{CommunicationsSubclass, InterfaceClass};
use crate::descriptor::{ConfigurationDescriptor, DeviceDescriptor};
use crate::descriptor::{EndpointDescriptor, InterfaceDescriptor};
use crate::transport::{EndpointSetup, Handler};

/// Maximum packet size of all three endpoints
pub const PACKET_SIZE: usize = 64;

/// Largest IN packet the serial port ever sends
pub const WRITE_CAPACITY: usize = PACKET_SIZE - 1;

/// Value selecting the only configuration
pub const CONFIGURATION_VALUE: u8 = 1;

/// Interface number of the communications interface
pub const COMM_INTERFACE: u8 = 0;

/// Interface number of the data interface
pub const DATA_INTERFACE: u8 = 1;

/// Bulk IN endpoint carrying device-to-host data
pub const DATA_IN: Address = Address {
    number: 1,
    direction: UsbDirection::In,
};

/// Bulk OUT endpoint carrying host-to-device data
pub const DATA_OUT: Address = Address {
    number: 1,
    direction: UsbDirection::Out,
};

/// Interrupt IN endpoint for serial state notifications (never written)
pub const NOTIFICATION_IN: Address = Address {
    number: 2,
    direction: UsbDirection::In,
};

// polling interval in frames (1 ms at full speed)
const INTERVAL: u8 = 1;

/// Length of the configuration descriptor including everything below it
pub const CONFIGURATION_TOTAL_LENGTH: usize = ConfigurationDescriptor::SIZE as usize
    + InterfaceDescriptor::SIZE as usize
    + FunctionalDescriptors::SIZE as usize
    + EndpointDescriptor::SIZE as usize
    + InterfaceDescriptor::SIZE as usize
    + 2 * EndpointDescriptor::SIZE as usize;

/// Descriptor tree of the virtual serial port
///
/// ```text
/// device
/// └── configuration 1
///     ├── interface 0: communications / ACM
///     │   ├── header, ACM, union, call management functional descriptors
///     │   └── endpoint 0x82: interrupt IN (notifications)
///     └── interface 1: CDC data
///         ├── endpoint 0x81: bulk IN
///         └── endpoint 0x01: bulk OUT
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptors {
    /// Device descriptor
    pub device: DeviceDescriptor,
    /// The only configuration
    pub configuration: ConfigurationDescriptor,
    /// Communications interface
    pub comm_interface: InterfaceDescriptor,
    /// Functional descriptors attached to the communications interface
    pub functional: FunctionalDescriptors,
    /// Notification endpoint of the communications interface
    pub notification_in: EndpointDescriptor,
    /// Data interface
    pub data_interface: InterfaceDescriptor,
    /// Bulk IN endpoint of the data interface
    pub data_in: EndpointDescriptor,
    /// Bulk OUT endpoint of the data interface
    pub data_out: EndpointDescriptor,
}

/// Descriptors built from [`Config::DEFAULT`]
pub static DESCRIPTORS: Descriptors = Descriptors::new(&Config::DEFAULT);

impl Descriptors {
    /// Builds the tree for `config`
    pub const fn new(config: &Config) -> Self {
        Descriptors {
            device: DeviceDescriptor {
                bcdUSB: bcdUSB::V20,
                bDeviceClass: config.device_class.byte(),
                bDeviceSubClass: 0,
                bDeviceProtocol: 0,
                // smaller sizes keep some hosts from enumerating the device
                bMaxPacketSize0: bMaxPacketSize0::B32,
                idVendor: config.vendor_id,
                idProduct: config.product_id,
                bcdDevice: config.device_release,
                iManufacturer: 0,
                iProduct: 0,
                iSerialNumber: 0,
                bNumConfigurations: 1,
            },
            configuration: ConfigurationDescriptor {
                bNumInterfaces: 2,
                bConfigurationValue: CONFIGURATION_VALUE,
                iConfiguration: 0,
                bmAttributes: bmAttributes {
                    self_powered: config.self_powered,
                    remote_wakeup: false,
                },
                bMaxPower: config.max_power_units(),
            },
            comm_interface: InterfaceDescriptor {
                bInterfaceNumber: COMM_INTERFACE,
                bAlternateSetting: 0,
                bNumEndpoints: 1,
                bInterfaceClass: InterfaceClass::Communications {
                    subclass: CommunicationsSubclass::Acm,
                },
                bInterfaceProtocol: 0,
                iInterface: 0,
            },
            functional: FunctionalDescriptors {
                header: cdc::Header {
                    bcdCDC: cdc::bcdCDC::V11,
                },
                acm: cdc::Acm {
                    bmCapabilities: match config.control {
                        ControlPolicy::AcmRequests => AcmCapabilities::LINE_SERIAL,
                        ControlPolicy::ClaimAll => AcmCapabilities::NONE,
                    },
                },
                union: cdc::Union {
                    bControlInterface: COMM_INTERFACE,
                    bSubordinateInterface0: DATA_INTERFACE,
                },
                call_management: cdc::CallManagement {
                    bmCapabilities: CallCapabilities {
                        call_management: false,
                        data_class: false,
                    },
                    bDataInterface: DATA_INTERFACE,
                },
            },
            notification_in: EndpointDescriptor {
                bEndpointAddress: NOTIFICATION_IN,
                bmAttributes: EndpointType::Interrupt,
                wMaxPacketSize: PACKET_SIZE as u16,
                bInterval: INTERVAL,
            },
            data_interface: InterfaceDescriptor {
                bInterfaceNumber: DATA_INTERFACE,
                bAlternateSetting: 0,
                bNumEndpoints: 2,
                bInterfaceClass: InterfaceClass::CdcData,
                bInterfaceProtocol: 0,
                iInterface: 0,
            },
            data_in: EndpointDescriptor {
                bEndpointAddress: DATA_IN,
                bmAttributes: EndpointType::Bulk,
                wMaxPacketSize: PACKET_SIZE as u16,
                bInterval: INTERVAL,
            },
            data_out: EndpointDescriptor {
                bEndpointAddress: DATA_OUT,
                bmAttributes: EndpointType::Bulk,
                wMaxPacketSize: PACKET_SIZE as u16,
                bInterval: INTERVAL,
            },
        }
    }

    /// The string table. No strings are declared, so every string index in
    /// the tree is 0.
    pub fn strings(&self) -> &'static [&'static str] {
        &[]
    }

    /// The endpoints in provisioning order: notification, data IN, data OUT
    pub fn endpoints(&self) -> [EndpointDescriptor; 3] {
        [self.notification_in, self.data_in, self.data_out]
    }

    /// How the dispatcher answers class requests, as advertised by the ACM
    /// functional descriptor
    pub fn control_policy(&self) -> ControlPolicy {
        if self.functional.acm.bmCapabilities.line_serial {
            ControlPolicy::AcmRequests
        } else {
            ControlPolicy::ClaimAll
        }
    }

    /// Wire representation of the device descriptor
    pub fn device_bytes(&self) -> [u8; DeviceDescriptor::SIZE as usize] {
        self.device.bytes()
    }

    /// Wire representation of the configuration descriptor followed by all
    /// interface, functional and endpoint descriptors, with `wTotalLength`
    /// filled in
    pub fn configuration_bytes(&self) -> [u8; CONFIGURATION_TOTAL_LENGTH] {
        let mut out = [0; CONFIGURATION_TOTAL_LENGTH];
        let mut at = 0;
        for part in [
            &self
                .configuration
                .bytes(CONFIGURATION_TOTAL_LENGTH as u16)[..],
            &self.comm_interface.bytes()[..],
            &self.functional.bytes()[..],
            &self.notification_in.bytes()[..],
            &self.data_interface.bytes()[..],
            &self.data_in.bytes()[..],
            &self.data_out.bytes()[..],
        ]
        .iter()
        {
            out[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        out
    }

    /// Answers GET_DESCRIPTOR for descriptor type `kind` at `index`
    ///
    /// Copies at most `buf.len()` bytes (the host's `wLength`) and returns how
    /// many, or `None` if there is no such descriptor.
    pub fn write_descriptor(&self, kind: u8, index: u8, buf: &mut [u8]) -> Option<usize> {
        fn copy(src: &[u8], dst: &mut [u8]) -> usize {
            let n = cmp::min(src.len(), dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        }

        match (kind, index) {
            (descriptor_type::DEVICE, 0) => Some(copy(&self.device_bytes(), buf)),
            (descriptor_type::CONFIGURATION, 0) => Some(copy(&self.configuration_bytes(), buf)),
            // no strings means no language ID table at index 0 either
            _ => None,
        }
    }
}

/// Configuration state of the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    /// No configuration selected; no endpoints provisioned by us
    Unconfigured,
    /// The host selected a configuration and the endpoints are live
    Configured {
        /// The selected `bConfigurationValue`
        value: u8,
    },
}

/// The CDC-ACM function: reacts to configuration changes and answers class
/// requests
pub struct CdcAcmFunction {
    descriptors: &'static Descriptors,
    state: DeviceState,
    dispatcher: Dispatcher,
    // set when the function leaves the Configured state; cleared by whoever
    // owns the data buffers
    deconfigured: bool,
}

impl CdcAcmFunction {
    /// Creates an unconfigured function described by `descriptors`
    pub fn new(descriptors: &'static Descriptors) -> Self {
        CdcAcmFunction {
            descriptors,
            state: DeviceState::Unconfigured,
            dispatcher: Dispatcher::new(descriptors.control_policy(), COMM_INTERFACE),
            deconfigured: false,
        }
    }

    /// The descriptor tree
    pub fn descriptors(&self) -> &'static Descriptors {
        self.descriptors
    }

    /// Current state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Returns `true` once the host has selected the configuration
    pub fn is_configured(&self) -> bool {
        matches!(self.state, DeviceState::Configured { .. })
    }

    /// Gets the current line coding.
    pub fn line_coding(&self) -> &LineCoding {
        self.dispatcher.line_coding()
    }

    /// Gets the DTR and RTS state.
    pub fn line_state(&self) -> ControlLineState {
        self.dispatcher.line_state()
    }

    /// Returns `true`, once, after the function has left the Configured state
    pub fn take_deconfigured(&mut self) -> bool {
        core::mem::replace(&mut self.deconfigured, false)
    }

    fn deconfigure(&mut self) {
        if self.is_configured() {
            info!("moving to the Unconfigured state");
            self.deconfigured = true;
        }
        self.state = DeviceState::Unconfigured;
        self.dispatcher.reset();
    }
}

impl Handler for CdcAcmFunction {
    fn set_configuration(&mut self, endpoints: &mut dyn EndpointSetup, value: u16) {
        if value == 0 {
            self.deconfigure();
            return;
        }

        if value != u16::from(self.descriptors.configuration.bConfigurationValue) {
            warn!("requested configuration {} is not supported", value);
            return;
        }

        for endpoint in self.descriptors.endpoints().iter() {
            endpoints.setup_endpoint(endpoint);
        }
        endpoints.register_control(RequestFilter::CLASS_INTERFACE);

        if !self.is_configured() {
            info!("moving to the Configured state");
        }
        self.state = DeviceState::Configured { value: value as u8 };
    }

    fn control_request(
        &mut self,
        setup: &SetupPacket,
        data: &mut ControlData<'_>,
    ) -> ControlOutcome {
        self.dispatcher.dispatch(setup, data)
    }

    fn reset(&mut self) {
        self.deconfigure();
    }
}

/// Address of the bulk IN endpoint as the driver sees it
pub(crate) fn data_in() -> EndpointAddress {
    DATA_IN.into()
}

/// Address of the bulk OUT endpoint as the driver sees it
pub(crate) fn data_out() -> EndpointAddress {
    DATA_OUT.into()
}
