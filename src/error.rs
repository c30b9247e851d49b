use core::fmt;

/// Why a bounded operation gave up
///
/// Only the `*_within` variants of the serial port operations return this;
/// the plain blocking operations retry forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The host never selected a configuration
    NotConfigured,
    /// The host is configured but did not accept or deliver a packet in time
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConfigured => f.write_str("USB host has not configured the device"),
            Error::Timeout => f.write_str("USB transfer did not complete in time"),
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::NotConfigured => embedded_io::ErrorKind::NotConnected,
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
        }
    }
}
