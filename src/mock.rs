//! Scripted stand-in for the USB driver and the host behind it

use std::collections::VecDeque;
use std::vec::Vec;

use usb_device::endpoint::EndpointAddress;

use crate::control::{ControlData, ControlOutcome, RequestFilter, SetupPacket};
use crate::descriptor::EndpointDescriptor;
use crate::transport::{EndpointSetup, Handler, Transport};

/// Something the host does, consumed one per poll
#[derive(Debug)]
pub enum HostEvent {
    /// Nothing happens during this poll
    Idle,
    /// A packet arrives on an OUT endpoint
    Packet(EndpointAddress, Vec<u8>),
    /// SET_CONFIGURATION with the given value
    SetConfiguration(u16),
    /// A control transfer; `data` is the OUT payload or the IN buffer size
    Control(SetupPacket, Vec<u8>),
    /// Bus reset
    Reset,
}

/// A finished control transfer
#[derive(Debug)]
pub struct ControlRecord {
    pub setup: SetupPacket,
    pub outcome: ControlOutcome,
    pub reply: Vec<u8>,
}

#[derive(Default)]
pub struct MockTransport {
    pub events: VecDeque<HostEvent>,
    pub polls: usize,
    pub endpoints: Vec<EndpointDescriptor>,
    pub filters: Vec<RequestFilter>,
    pub pending: VecDeque<(EndpointAddress, Vec<u8>)>,
    /// Length of every `write_packet` call, accepted or not
    pub write_attempts: Vec<usize>,
    /// Packets the host received
    pub written: Vec<(EndpointAddress, Vec<u8>)>,
    /// Number of upcoming writes to reject
    pub busy_writes: usize,
    pub controls: Vec<ControlRecord>,
}

impl MockTransport {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    /// A transport whose host selects configuration 1 on the first poll
    pub fn configured() -> Self {
        let mut transport = Self::new();
        transport.push(HostEvent::SetConfiguration(1));
        transport
    }

    pub fn push(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    /// Schedules a packet on `endpoint` after `idle` uneventful polls
    pub fn send_after(&mut self, idle: usize, endpoint: EndpointAddress, data: &[u8]) {
        for _ in 0..idle {
            self.push(HostEvent::Idle);
        }
        self.push(HostEvent::Packet(endpoint, data.to_vec()));
    }

    /// All bytes the host received on `endpoint`, in order
    pub fn received(&self, endpoint: EndpointAddress) -> Vec<u8> {
        self.written
            .iter()
            .filter(|(ep, _)| *ep == endpoint)
            .flat_map(|(_, data)| data.iter().copied())
            .collect()
    }

    fn is_live(&self, endpoint: EndpointAddress) -> bool {
        self.endpoints.iter().any(|ep| ep.address() == endpoint)
    }
}

impl EndpointSetup for MockTransport {
    fn setup_endpoint(&mut self, endpoint: &EndpointDescriptor) {
        self.endpoints.retain(|ep| ep.address() != endpoint.address());
        self.endpoints.push(*endpoint);
    }

    fn register_control(&mut self, filter: RequestFilter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }
}

impl Transport for MockTransport {
    fn poll(&mut self, handler: &mut dyn Handler) -> bool {
        self.polls += 1;

        let event = match self.events.pop_front() {
            Some(event) => event,
            None => return false,
        };

        match event {
            HostEvent::Idle => return false,
            HostEvent::Packet(endpoint, data) => self.pending.push_back((endpoint, data)),
            HostEvent::SetConfiguration(value) => {
                if value == 0 {
                    self.endpoints.clear();
                    self.filters.clear();
                }
                handler.set_configuration(self, value)
            }
            HostEvent::Control(setup, data) => {
                let mut buf = [0; 64];
                let len = data.len();
                buf[..len].copy_from_slice(&data);

                let outcome = if self.filters.iter().any(|f| f.matches(&setup)) {
                    let mut data = ControlData::new(&mut buf, len);
                    let outcome = handler.control_request(&setup, &mut data);
                    let len = data.len();
                    (outcome, buf[..len].to_vec())
                } else {
                    (ControlOutcome::NotHandled, Vec::new())
                };

                self.controls.push(ControlRecord {
                    setup,
                    outcome: outcome.0,
                    reply: outcome.1,
                });
            }
            HostEvent::Reset => {
                self.endpoints.clear();
                self.filters.clear();
                self.pending.clear();
                handler.reset();
            }
        }

        true
    }

    fn read_packet(&mut self, endpoint: EndpointAddress, buf: &mut [u8]) -> usize {
        if !self.is_live(endpoint) {
            return 0;
        }

        let index = match self.pending.iter().position(|(ep, _)| *ep == endpoint) {
            Some(index) => index,
            None => return 0,
        };

        let (_, data) = self.pending.remove(index).unwrap();
        assert!(data.len() <= buf.len(), "packet larger than the read buffer");
        buf[..data.len()].copy_from_slice(&data);
        data.len()
    }

    fn write_packet(&mut self, endpoint: EndpointAddress, buf: &[u8]) -> usize {
        self.write_attempts.push(buf.len());

        if !self.is_live(endpoint) {
            return 0;
        }

        if self.busy_writes > 0 {
            self.busy_writes -= 1;
            return 0;
        }

        self.written.push((endpoint, buf.to_vec()));
        buf.len()
    }
}
