use core::cmp;

use crate::cdc_acm::{PACKET_SIZE, WRITE_CAPACITY};

/// Holds at most one packet.
///
/// `pos` points at the next byte to read, `len` is the number of valid bytes.
///
/// invariants: 0 <= pos <= len <= N
pub struct PacketBuffer<const N: usize> {
    data: [u8; N],
    pos: usize,
    len: usize,
}

/// Receives one OUT packet at a time
pub type ReadBuffer = PacketBuffer<PACKET_SIZE>;

/// Collects bytes for one IN packet. One byte short of the packet size, so a
/// full buffer is still a short packet and never needs a zero-length packet
/// after it.
pub type WriteBuffer = PacketBuffer<WRITE_CAPACITY>;

impl<const N: usize> PacketBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            pos: 0,
            len: 0,
        }
    }

    // Drops all data
    pub fn clear(&mut self) {
        self.pos = 0;
        self.len = 0;
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    // Bytes not read yet
    pub fn available_read(&self) -> usize {
        self.len - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    // Takes the next unread byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        let byte = self.data[self.pos];
        self.pos += 1;
        Some(byte)
    }

    // Copies as many unread bytes as fit into `out` and returns the count
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = cmp::min(out.len(), self.available_read());
        out[..count].copy_from_slice(&self.data[self.pos..self.pos + count]);
        self.pos += count;
        count
    }

    // Replaces the contents wholesale with whatever `f` writes into the full
    // backing store. `f` returns the number of bytes it wrote.
    pub fn refill(&mut self, f: impl FnOnce(&mut [u8]) -> usize) -> usize {
        let count = cmp::min(f(&mut self.data), N);
        self.pos = 0;
        self.len = count;
        count
    }

    // Appends a byte; returns false if there is no room
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }

        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    // The bytes written since the last clear
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }
}
