//! CDC-ACM virtual serial port with blocking, byte-at-a-time I/O.
//!
//! CDC-ACM is a USB class that's supported out of the box by most operating systems and used for
//! implementing modems and generic serial ports. This crate provides the pieces a microcontroller
//! needs to show up as one on top of a packet-oriented USB peripheral driver:
//!
//! - the descriptor tree ([`Descriptors`], [`DESCRIPTORS`]) the driver answers enumeration with;
//! - the function that provisions the endpoints when the host selects the configuration and
//!   answers the ACM class requests ([`CdcAcmFunction`]);
//! - a [`SerialPort`] that turns non-blocking packet I/O into `getchar` / `putchar` / `flush`
//!   for a command interpreter or similar application code.
//!
//! The driver is reached through the [`Transport`] trait.
//!
//! Example
//! =======
//!
//! ```no_run
//! # use usbd_acm_stream::Transport;
//! # fn dummy(driver: impl Transport) {
//! use usbd_acm_stream::SerialPort;
//!
//! let mut serial = SerialPort::new(driver);
//!
//! serial.wait_configured();
//!
//! loop {
//!     let byte = serial.getchar();
//!
//!     serial.putchar(byte);
//!     if byte == b'\r' {
//!         serial.flush();
//!     }
//! }
//! # }
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

mod buffer;
mod cdc_acm;
pub mod config;
pub mod control;
pub mod descriptor;
mod error;
mod io;
#[cfg(test)]
mod mock;
mod serial_port;
mod transport;

pub use crate::cdc_acm::*;
pub use crate::config::{Config, ControlPolicy, DeviceClass};
pub use crate::control::{ControlData, ControlOutcome, LineCoding, RequestFilter, SetupPacket};
pub use crate::error::Error;
pub use crate::serial_port::*;
pub use crate::transport::*;
pub use embedded_io;
pub use nb;
