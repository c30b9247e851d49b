use core::convert::Infallible;

use log::trace;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::cdc_acm::{self, CdcAcmFunction, Descriptors, DESCRIPTORS};
use crate::control::{ControlLineState, LineCoding};
use crate::error::Error;
use crate::transport::Transport;

/// USB serial port (CDC-ACM) with byte-at-a-time, blocking I/O.
///
/// Owns the driver, the configuration state and one packet worth of buffer
/// in each direction. Three flavors of every operation are offered:
///
/// - blocking (`getchar`, `putchar`, `flush`, `wait_configured`) retry until
///   they succeed, polling the driver in between;
/// - non-blocking (`read_byte`, `write_byte`, `try_flush`, `poll_configured`)
///   make one attempt and return `WouldBlock`, so a scheduler can run other
///   work between attempts;
/// - bounded (`getchar_within`, `flush_within`, `wait_configured_within`) give
///   up with an [`Error`] after a number of attempts.
pub struct SerialPort<T: Transport> {
    transport: T,
    function: CdcAcmFunction,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
}

impl<T: Transport> SerialPort<T> {
    /// Creates a serial port described by the default descriptors.
    pub fn new(transport: T) -> SerialPort<T> {
        Self::with_descriptors(transport, &DESCRIPTORS)
    }

    /// Creates a serial port described by `descriptors`. The driver must
    /// answer enumeration with the same tree.
    pub fn with_descriptors(transport: T, descriptors: &'static Descriptors) -> SerialPort<T> {
        SerialPort {
            transport,
            function: CdcAcmFunction::new(descriptors),
            read_buf: ReadBuffer::new(),
            write_buf: WriteBuffer::new(),
        }
    }

    /// The descriptor tree this port enumerates with.
    pub fn descriptors(&self) -> &'static Descriptors {
        self.function.descriptors()
    }

    /// Returns `true` once the host has selected the configuration.
    pub fn is_configured(&self) -> bool {
        self.function.is_configured()
    }

    /// Gets the current line coding.
    pub fn line_coding(&self) -> &LineCoding {
        self.function.line_coding()
    }

    /// Gets the DTR (data terminal ready) state
    pub fn dtr(&self) -> bool {
        self.function.line_state().dtr
    }

    /// Gets the RTS (ready to send) state
    pub fn rts(&self) -> bool {
        self.function.line_state().rts
    }

    /// Gets both modem control signals.
    pub fn line_state(&self) -> ControlLineState {
        self.function.line_state()
    }

    /// Borrows the driver.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrows the driver.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Releases the driver. Buffered output that was not flushed is lost.
    pub fn free(self) -> T {
        self.transport
    }

    /// Lets the driver service the bus once. Returns `true` if anything
    /// happened.
    pub fn poll(&mut self) -> bool {
        let activity = self.transport.poll(&mut self.function);

        if self.function.take_deconfigured() {
            // whatever was in flight belongs to the previous session
            self.read_buf.clear();
            self.write_buf.clear();
        }

        activity
    }

    /// Returns `Ok` once the host has selected the configuration, polling
    /// the driver if it hasn't yet.
    pub fn poll_configured(&mut self) -> nb::Result<(), Infallible> {
        if self.is_configured() {
            return Ok(());
        }

        self.poll();

        if self.is_configured() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Blocks until the host has selected the configuration.
    pub fn wait_configured(&mut self) {
        block(|| self.poll_configured())
    }

    /// Like [`wait_configured`](Self::wait_configured), giving up after
    /// `attempts` polls.
    pub fn wait_configured_within(&mut self, attempts: u32) -> Result<(), Error> {
        self.retry(attempts, Self::poll_configured)
    }

    /// Returns the next received byte, or `WouldBlock` if no packet is
    /// pending after polling the driver once.
    pub fn read_byte(&mut self) -> nb::Result<u8, Infallible> {
        if self.read_buf.is_empty() {
            self.receive();
        }

        self.read_buf.pop().ok_or(nb::Error::WouldBlock)
    }

    // Polls once and replaces the (exhausted) read buffer with the next OUT
    // packet, if there is one.
    pub(crate) fn receive(&mut self) -> usize {
        self.poll();

        let transport = &mut self.transport;
        let count = self
            .read_buf
            .refill(|buf| transport.read_packet(cdc_acm::data_out(), buf));
        if count > 0 {
            trace!("received {} byte packet", count);
        }
        count
    }

    /// Blocks until a byte has been received and returns it.
    pub fn getchar(&mut self) -> u8 {
        block(|| self.read_byte())
    }

    /// Like [`getchar`](Self::getchar), giving up after `attempts` polls.
    pub fn getchar_within(&mut self, attempts: u32) -> Result<u8, Error> {
        self.retry(attempts, Self::read_byte)
    }

    /// Number of received bytes that can be read without polling.
    pub fn available_read(&self) -> usize {
        self.read_buf.available_read()
    }

    /// Reads buffered bytes into `data` without polling and returns how many.
    pub(crate) fn read_buffered(&mut self, data: &mut [u8]) -> usize {
        self.read_buf.read(data)
    }

    /// Hands the buffered output to the driver as one packet. On failure the
    /// driver is polled once and `WouldBlock` is returned; the data stays
    /// buffered.
    pub fn try_flush(&mut self) -> nb::Result<(), Infallible> {
        let pending = self.write_buf.filled();
        if pending.is_empty() {
            return Ok(());
        }

        let accepted = self.transport.write_packet(cdc_acm::data_in(), pending);
        if accepted > 0 {
            debug_assert_eq!(accepted, pending.len());
            trace!("sent {} byte packet", accepted);
            self.write_buf.clear();
            return Ok(());
        }

        trace!("driver busy, {} bytes still pending", pending.len());
        self.poll();
        Err(nb::Error::WouldBlock)
    }

    /// Blocks until the driver has accepted the buffered output. Does nothing
    /// if nothing is buffered.
    pub fn flush(&mut self) {
        block(|| self.try_flush())
    }

    /// Like [`flush`](Self::flush), giving up after `attempts` write attempts.
    pub fn flush_within(&mut self, attempts: u32) -> Result<(), Error> {
        self.retry(attempts, Self::try_flush)
    }

    /// Buffers one byte. A buffer that becomes full is flushed right away
    /// with a single attempt; `WouldBlock` is only returned when the buffer
    /// was already full and still can't be flushed, in which case `byte` was
    /// not taken.
    pub fn write_byte(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if self.write_buf.is_full() {
            self.try_flush()?;
        }

        self.write_buf.push(byte);

        if self.write_buf.is_full() {
            // the byte is buffered either way
            self.try_flush().ok();
        }

        Ok(())
    }

    /// Buffers one byte, blocking on a flush whenever the buffer fills up.
    pub fn putchar(&mut self, byte: u8) {
        if self.write_buf.is_full() {
            self.flush();
        }

        self.write_buf.push(byte);

        if self.write_buf.is_full() {
            self.flush();
        }
    }

    /// Number of bytes that can be buffered before the next flush.
    pub fn available_write(&self) -> usize {
        self.write_buf.capacity() - self.write_buf.filled().len()
    }

    fn retry<R>(
        &mut self,
        attempts: u32,
        mut op: impl FnMut(&mut Self) -> nb::Result<R, Infallible>,
    ) -> Result<R, Error> {
        for _ in 0..attempts {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }
        }

        Err(if self.is_configured() {
            Error::Timeout
        } else {
            Error::NotConfigured
        })
    }
}

fn block<R>(mut op: impl FnMut() -> nb::Result<R, Infallible>) -> R {
    loop {
        match op() {
            Ok(value) => return value,
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(never)) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::cdc_acm::{data_in, data_out, PACKET_SIZE, WRITE_CAPACITY};
    use crate::mock::{HostEvent, MockTransport};

    fn configured_port() -> SerialPort<MockTransport> {
        let mut port = SerialPort::new(MockTransport::configured());
        port.wait_configured();
        port
    }

    #[test]
    fn configuration_wait() {
        let mut transport = MockTransport::new();
        transport.push(HostEvent::Idle);
        transport.push(HostEvent::Idle);
        transport.push(HostEvent::SetConfiguration(1));
        let mut port = SerialPort::new(transport);

        assert!(!port.is_configured());
        assert!(port.transport().endpoints.is_empty());

        port.wait_configured();

        assert!(port.is_configured());
        assert_eq!(port.transport().polls, 3);
        assert_eq!(port.transport().endpoints.len(), 3);
    }

    #[test]
    fn read_single_packet() {
        let mut port = configured_port();
        let packet: Vec<u8> = (b'0'..=b'9').collect();
        port.transport_mut().send_after(0, data_out(), &packet);

        let read: Vec<u8> = (0..10).map(|_| port.getchar()).collect();
        assert_eq!(read, packet);

        // the eleventh read has to wait for the next packet
        let polls = port.transport().polls;
        port.transport_mut().send_after(5, data_out(), b"x");
        assert_eq!(port.getchar(), b'x');
        assert_eq!(port.transport().polls, polls + 6);
    }

    #[test]
    fn reads_preserve_packet_order() {
        let mut port = configured_port();
        let mut expected = Vec::new();

        for (i, len) in [1, 64, 17, 63, 2, 64].iter().enumerate() {
            let packet: Vec<u8> = (0..*len).map(|j| (i * 64 + j) as u8).collect();
            port.transport_mut().send_after(i % 3, data_out(), &packet);
            expected.extend_from_slice(&packet);
        }

        let read: Vec<u8> = (0..expected.len()).map(|_| port.getchar()).collect();
        assert_eq!(read, expected);
    }

    #[test]
    fn read_before_configuration_blocks() {
        let mut transport = MockTransport::new();
        transport.send_after(0, data_out(), b"early");
        let mut port = SerialPort::new(transport);

        // the OUT endpoint isn't live yet, so the packet stays with the host
        assert_eq!(port.getchar_within(4), Err(Error::NotConfigured));

        port.transport_mut().push(HostEvent::SetConfiguration(1));
        assert_eq!(port.getchar(), b'e');
    }

    #[test]
    fn flush_one_short_packet() {
        let mut port = configured_port();

        for byte in 0..WRITE_CAPACITY as u8 - 1 {
            port.putchar(byte);
        }
        assert!(port.transport().write_attempts.is_empty());

        port.putchar(0xFF);
        port.flush();

        assert_eq!(port.transport().write_attempts, [63]);
        assert_eq!(port.transport().written.len(), 1);
    }

    #[test]
    fn explicit_flush_of_partial_buffer() {
        let mut port = configured_port();

        for &byte in b"hello" {
            port.putchar(byte);
        }
        port.flush();

        assert_eq!(port.transport().write_attempts, [5]);
        assert_eq!(port.transport().received(data_in()), b"hello");
    }

    #[test]
    fn auto_flush_never_sends_full_packets() {
        let mut port = configured_port();

        for byte in 0..PACKET_SIZE as u8 {
            port.putchar(byte);
        }

        assert_eq!(port.transport().write_attempts, [63]);
        assert_eq!(port.available_write(), WRITE_CAPACITY - 1);

        port.flush();
        assert_eq!(port.transport().write_attempts, [63, 1]);
        assert_eq!(
            port.transport().received(data_in()),
            (0..PACKET_SIZE as u8).collect::<Vec<_>>()
        );
    }

    #[test]
    fn writes_preserve_order() {
        let mut port = configured_port();
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();

        for (i, &byte) in data.iter().enumerate() {
            port.putchar(byte);
            if i % 97 == 0 {
                port.flush();
            }
        }
        port.flush();

        let transport = port.transport();
        assert!(transport.written.iter().all(|(_, p)| !p.is_empty() && p.len() < PACKET_SIZE));
        assert_eq!(transport.received(data_in()), data);
    }

    #[test]
    fn flush_retries_until_accepted() {
        let mut port = configured_port();
        port.transport_mut().busy_writes = 3;

        port.putchar(b'a');
        let polls = port.transport().polls;
        port.flush();

        assert_eq!(port.transport().write_attempts, [1, 1, 1, 1]);
        assert_eq!(port.transport().polls, polls + 3);
        assert_eq!(port.transport().received(data_in()), b"a");
    }

    #[test]
    fn flush_of_empty_buffer_sends_nothing() {
        let mut port = configured_port();

        port.flush();
        assert_eq!(port.try_flush(), Ok(()));
        assert!(port.transport().write_attempts.is_empty());
    }

    #[test]
    fn bounded_flush_times_out() {
        let mut port = configured_port();
        port.transport_mut().busy_writes = 10;

        port.putchar(b'z');
        assert_eq!(port.flush_within(3), Err(Error::Timeout));
        assert_eq!(port.transport().write_attempts.len(), 3);

        // nothing was lost
        port.transport_mut().busy_writes = 0;
        assert_eq!(port.flush_within(1), Ok(()));
        assert_eq!(port.transport().received(data_in()), b"z");
    }

    #[test]
    fn bounded_read_times_out() {
        let mut port = configured_port();

        assert_eq!(port.getchar_within(0), Err(Error::Timeout));
        assert_eq!(port.getchar_within(5), Err(Error::Timeout));

        port.transport_mut().send_after(1, data_out(), b"k");
        assert_eq!(port.getchar_within(5), Ok(b'k'));
    }

    #[test]
    fn configuration_wait_gives_up() {
        let mut port = SerialPort::new(MockTransport::new());

        assert_eq!(port.wait_configured_within(10), Err(Error::NotConfigured));
        assert_eq!(port.transport().polls, 10);
    }

    #[test]
    fn non_blocking_write_keeps_byte_when_full() {
        let mut port = configured_port();
        port.transport_mut().busy_writes = usize::MAX;

        for byte in 0..WRITE_CAPACITY as u8 {
            assert_eq!(port.write_byte(byte), Ok(()));
        }
        assert_eq!(port.write_byte(0xAA), Err(nb::Error::WouldBlock));

        port.transport_mut().busy_writes = 0;
        assert_eq!(port.write_byte(0xAA), Ok(()));
        port.flush();

        let mut expected: Vec<u8> = (0..WRITE_CAPACITY as u8).collect();
        expected.push(0xAA);
        assert_eq!(port.transport().received(data_in()), expected);
    }

    #[test]
    fn reset_discards_buffers() {
        let mut port = configured_port();
        port.transport_mut().send_after(0, data_out(), b"stale");
        assert_eq!(port.getchar(), b's');
        port.putchar(b'q');

        port.transport_mut().push(HostEvent::Reset);
        port.transport_mut().push(HostEvent::SetConfiguration(1));
        port.transport_mut().send_after(0, data_out(), b"fresh");
        while port.poll() {}

        assert_eq!(port.available_read(), 0);
        assert_eq!(port.getchar(), b'f');
        assert!(port.is_configured());

        port.flush();
        assert!(port.transport().write_attempts.is_empty());
    }

    #[test]
    fn line_state_requests() {
        use crate::control::{SetupPacket, REQ_GET_LINE_CODING, REQ_SET_CONTROL_LINE_STATE};

        let mut port = configured_port();
        let set_state = SetupPacket::parse(&[0x21, REQ_SET_CONTROL_LINE_STATE, 0x03, 0, 0, 0, 0, 0]);
        let get_coding = SetupPacket::parse(&[0xA1, REQ_GET_LINE_CODING, 0, 0, 0, 0, 7, 0]);
        let vendor = SetupPacket::parse(&[0xC1, 0x01, 0, 0, 0, 0, 0, 0]);
        port.transport_mut().push(HostEvent::Control(set_state, Vec::new()));
        port.transport_mut().push(HostEvent::Control(get_coding, std::vec![0; 7]));
        port.transport_mut().push(HostEvent::Control(vendor, Vec::new()));

        while port.poll() {}

        assert!(port.dtr());
        assert!(port.rts());

        let controls = &port.transport().controls;
        assert_eq!(controls.len(), 3);
        assert_eq!(controls[1].reply, [0x40, 0x1F, 0, 0, 0, 0, 8]);
        // vendor requests are never routed to the function
        assert_eq!(controls[2].outcome, crate::control::ControlOutcome::NotHandled);
    }
}
