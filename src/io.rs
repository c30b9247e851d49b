use core::convert::Infallible;
use core::fmt;

use super::SerialPort;
use crate::transport::Transport;

impl<T: Transport> embedded_io::ErrorType for SerialPort<T> {
    type Error = Infallible;
}

impl<T: Transport> embedded_io::Read for SerialPort<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        // `embedded-io` requires blocking until at least one byte is read; the
        // rest of the current packet comes along without further polling.
        buf[0] = self.getchar();
        Ok(1 + self.read_buffered(&mut buf[1..]))
    }
}

impl<T: Transport> embedded_io::ReadReady for SerialPort<T> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.available_read() == 0 {
            self.receive();
        }
        Ok(self.available_read() != 0)
    }
}

impl<T: Transport> embedded_io::Write for SerialPort<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            self.putchar(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        <SerialPort<T>>::flush(self);
        Ok(())
    }
}

impl<T: Transport> embedded_io::WriteReady for SerialPort<T> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available_write() != 0)
    }
}

impl<T: Transport> embedded_hal::serial::Read<u8> for SerialPort<T> {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.read_byte()
    }
}

impl<T: Transport> embedded_hal::serial::Write<u8> for SerialPort<T> {
    type Error = Infallible;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.write_byte(word)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.try_flush()
    }
}

impl<T: Transport> fmt::Write for SerialPort<T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            self.putchar(byte);
        }
        Ok(())
    }
}
