//! IMF capture: records register writes to a Type-1 IMF file
//!
//! Layout: a 16-bit little-endian byte count of the packet data, then
//! 4-byte packets `reg, val, delay_lo, delay_hi`. A packet's delay is the
//! time until the next packet in ticks of the capture rate, so each write
//! is held back until the following one arrives. Delays longer than one
//! packet can carry are spread over filler packets writing register 0.

use crate::device::{Device, UnsupportedCounter};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::time::{Duration, Instant};

/// Largest packet data a Type-1 header can describe
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

const PACKET_SIZE: usize = 4;
const HEADER_SIZE: u64 = 2;
const MAX_DELAY: u64 = u16::MAX as u64;

/// Convert `elapsed` to ticks at `rate` Hz, rounding to the nearest tick.
pub fn ticks(elapsed: Duration, rate: u32) -> u64 {
    let nanos = elapsed.as_nanos() * rate as u128;
    ((nanos + 500_000_000) / 1_000_000_000) as u64
}

/// Split a delay into per-packet chunks. Always yields at least one.
fn split_delay(mut ticks: u64) -> Vec<u16> {
    let mut chunks = vec![ticks.min(MAX_DELAY) as u16];
    ticks -= ticks.min(MAX_DELAY);
    while ticks > 0 {
        let chunk = ticks.min(MAX_DELAY);
        chunks.push(chunk as u16);
        ticks -= chunk;
    }
    chunks
}

struct Pending {
    reg: u8,
    val: u8,
    at: Instant,
}

/// IMF capture device
pub struct ImfDevice<W: Write + Seek = BufWriter<File>> {
    out: W,
    rate: u32,
    data_len: usize,
    pending: Option<Pending>,
    unsupported: UnsupportedCounter,
}

impl ImfDevice<BufWriter<File>> {
    /// Create (or truncate) the capture file at `path`.
    pub fn create(path: &str, rate: u32) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidName("imfwrite: needs a file path".into()));
        }
        let file = File::create(path).map_err(|e| Error::open(path, e))?;
        log::debug!("imfwrite: capturing to {} at {} Hz", path, rate);
        Self::new(BufWriter::new(file), rate)
    }
}

impl<W: Write + Seek> ImfDevice<W> {
    pub fn new(mut out: W, rate: u32) -> Result<Self> {
        if rate == 0 {
            return Err(Error::Config("imfwrite: tick rate must be non-zero".into()));
        }
        // length placeholder, rewritten on close
        out.write_all(&[0, 0]).map_err(Error::Transport)?;
        Ok(Self {
            out,
            rate,
            data_len: 0,
            pending: None,
            unsupported: UnsupportedCounter::new(),
        })
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Packet bytes written so far, not counting the held-back packet
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn emit(&mut self, reg: u8, val: u8, delay: u16) -> Result<()> {
        let [lo, hi] = delay.to_le_bytes();
        self.out
            .write_all(&[reg, val, lo, hi])
            .map_err(Error::Transport)?;
        self.data_len += PACKET_SIZE;
        Ok(())
    }

    /// Record a write that happened at `now`.
    pub fn record(&mut self, reg: u8, val: u8, now: Instant) -> Result<()> {
        let delays = match &self.pending {
            Some(p) => split_delay(ticks(now.saturating_duration_since(p.at), self.rate)),
            None => Vec::new(),
        };
        // flushed packets plus the new held-back one
        let needed = self.data_len + (delays.len() + 1) * PACKET_SIZE;
        if needed > MAX_DATA_LEN {
            return Err(Error::Unsupported(format!(
                "imfwrite: capture would exceed {} bytes",
                MAX_DATA_LEN
            )));
        }

        if let Some(p) = self.pending.take() {
            let mut delays = delays.into_iter();
            self.emit(p.reg, p.val, delays.next().unwrap_or(0))?;
            for filler in delays {
                self.emit(0, 0, filler)?;
            }
        }
        self.pending = Some(Pending { reg, val, at: now });
        Ok(())
    }

    /// Write the held-back packet and the final length. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(p) = self.pending.take() {
            self.emit(p.reg, p.val, 0)?;
        }
        let len = self.data_len as u16;
        let end = HEADER_SIZE + self.data_len as u64;
        self.out
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.out.write_all(&len.to_le_bytes()))
            .and_then(|_| self.out.seek(SeekFrom::Start(end)))
            .and_then(|_| self.out.flush())
            .map_err(Error::Transport)?;
        Ok(())
    }
}

impl<W: Write + Seek> Device for ImfDevice<W> {
    fn name(&self) -> &'static str {
        "imfwrite"
    }

    fn is_opl3(&self) -> bool {
        false
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        if reg > 0xFF {
            self.unsupported.record(self.name(), reg, val);
            return Ok(());
        }
        self.record(reg as u8, val, Instant::now())
    }

    fn unsupported_writes(&self) -> u64 {
        self.unsupported.count()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.finish()?;
        log::debug!("imfwrite: {} bytes of packets", self.data_len);
        Ok(())
    }
}
