//! Contract with the USB peripheral driver
//!
//! The driver owns the hardware, runs enumeration and the standard part of
//! the control pipeline, and moves whole packets. This crate only talks to it
//! through the traits below.

use usb_device::endpoint::EndpointAddress;

use crate::control::{ControlData, ControlOutcome, RequestFilter, SetupPacket};
use crate::descriptor::EndpointDescriptor;

/// Endpoint provisioning, available to handlers while the driver is polling
pub trait EndpointSetup {
    /// Activates an endpoint with the attributes from its descriptor
    fn setup_endpoint(&mut self, endpoint: &EndpointDescriptor);

    /// Asks the driver to route control requests matching `filter` to
    /// [`Handler::control_request`]
    fn register_control(&mut self, filter: RequestFilter);
}

/// Callbacks the driver invokes from inside [`Transport::poll`]
pub trait Handler {
    /// The host sent SET_CONFIGURATION with `value`
    fn set_configuration(&mut self, endpoints: &mut dyn EndpointSetup, value: u16);

    /// A control request matched one of the registered filters
    fn control_request(
        &mut self,
        setup: &SetupPacket,
        data: &mut ControlData<'_>,
    ) -> ControlOutcome;

    /// The bus was reset; every endpoint and registration is gone
    fn reset(&mut self);
}

/// Non-blocking packet I/O
pub trait Transport: EndpointSetup {
    /// Services pending bus activity, calling into `handler` as needed.
    /// Returns `true` if anything happened.
    fn poll(&mut self, handler: &mut dyn Handler) -> bool;

    /// Copies the next packet received on `endpoint` into `buf` and returns
    /// its length, or 0 if nothing is pending.
    fn read_packet(&mut self, endpoint: EndpointAddress, buf: &mut [u8]) -> usize;

    /// Queues `buf` as one packet on `endpoint` and returns its length, or 0
    /// if the endpoint is busy.
    ///
    /// A zero-length packet also returns 0, so its success can't be told from
    /// failure.
    fn write_packet(&mut self, endpoint: EndpointAddress, buf: &[u8]) -> usize;
}
