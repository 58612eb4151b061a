//! RetroWave OPL3 over a USB serial character device
//!
//! Every register write becomes one framed packet. The framing stuffs a
//! marker bit after every 7 data bits: the packet is read as one
//! big-endian bit stream, cut into 7-bit groups, and each group lands in
//! bits 7..1 of an output byte whose bit 0 is always set.

use crate::device::{Device, UnsupportedCounter};
use crate::error::{Error, Result};
use crate::registers::{Bank, MAX_REGISTER};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Framing bytes
pub mod frame {
    /// Leading byte of every encoded frame
    pub const START: u8 = 0x00;
    /// Trailing byte of every encoded frame
    pub const END: u8 = 0x02;
    /// Bit set in every group byte
    pub const MARKER: u8 = 0x01;
}

/// Fixed header of a register-write command
const CMD_HEADER: [u8; 2] = [0x42, 0x12];
/// Command byte following the value pair
const CMD_LATCH: u8 = 0xFB;

/// Sub-register selectors for the two OPL3 ports
const PORT0_ADDRESS: u8 = 0xE1;
const PORT0_DATA: u8 = 0xE3;
const PORT1_ADDRESS: u8 = 0xE5;
const PORT1_DATA: u8 = 0xE7;

/// Build the 8-byte logical command for a register write.
pub fn command(reg: u16, val: u8) -> [u8; 8] {
    let (address_select, data_select) = match Bank::of(reg) {
        Bank::Primary => (PORT0_ADDRESS, PORT0_DATA),
        Bank::Secondary => (PORT1_ADDRESS, PORT1_DATA),
    };
    [
        CMD_HEADER[0],
        CMD_HEADER[1],
        address_select,
        (reg & 0xFF) as u8,
        data_select,
        val,
        CMD_LATCH,
        val,
    ]
}

/// Bit-stuff `bytes` into a frame.
pub fn encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + (bytes.len() * 8).div_ceil(7));
    out.push(frame::START);

    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 7 {
            bits -= 7;
            let group = (buffer >> bits) & 0x7F;
            out.push(((group as u8) << 1) | frame::MARKER);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        // left-align the leftover bits in the last group
        let group = (buffer << (7 - bits)) & 0x7F;
        out.push(((group as u8) << 1) | frame::MARKER);
    }

    out.push(frame::END);
    out
}

/// Undo [`encode`]. Returns `None` for anything that is not a well-formed frame.
pub fn decode(encoded: &[u8]) -> Option<Vec<u8>> {
    let (&first, rest) = encoded.split_first()?;
    let (&last, groups) = rest.split_last()?;
    if first != frame::START || last != frame::END {
        return None;
    }

    let mut out = Vec::with_capacity(groups.len() * 7 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &group in groups {
        if group & frame::MARKER == 0 {
            return None;
        }
        buffer = (buffer << 7) | (group >> 1) as u32;
        bits += 7;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    // leftover bits are padding
    Some(out)
}

/// RetroWave OPL3 device
pub struct RetroWaveDevice<W: Write = File> {
    port: W,
    unsupported: UnsupportedCounter,
}

impl RetroWaveDevice<File> {
    /// Open the character device at `path`.
    pub fn open(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidName("retrowave: needs a device path".into()));
        }
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(Path::new(path))
            .map_err(|e| Error::open(path, e))?;
        log::debug!("retrowave: opened {}", path);
        Ok(Self::with_port(port))
    }
}

impl<W: Write> RetroWaveDevice<W> {
    pub fn with_port(port: W) -> Self {
        Self {
            port,
            unsupported: UnsupportedCounter::new(),
        }
    }

    pub fn port(&self) -> &W {
        &self.port
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        // write_all retries short writes; a hard error abandons the frame
        self.port.write_all(frame).map_err(Error::Transport)?;
        self.port.flush().map_err(Error::Transport)
    }
}

impl<W: Write> Device for RetroWaveDevice<W> {
    fn name(&self) -> &'static str {
        "retrowave"
    }

    fn is_opl3(&self) -> bool {
        // every RetroWave board carries an OPL3
        true
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        if reg > MAX_REGISTER {
            self.unsupported.record(self.name(), reg, val);
            return Ok(());
        }
        let frame = encode(&command(reg, val));
        self.send(&frame)
    }

    fn unsupported_writes(&self) -> u64 {
        self.unsupported.count()
    }

    fn close(self: Box<Self>) -> Result<()> {
        log::debug!("retrowave: closed");
        Ok(())
    }
}
