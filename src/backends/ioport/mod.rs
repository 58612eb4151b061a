//! OPL2/OPL3 on legacy I/O ports (AdLib, Sound Blaster FM)
//!
//! The chip decodes two ports per bank: address at base+0, data at base+1,
//! and on OPL3 the second bank at base+2/base+3.

pub mod port;

use crate::device::{Device, UnsupportedCounter};
use crate::error::{Error, Result};
use crate::registers::{Bank, BANK_SIZE, MAX_REGISTER};
use port::PortIo;
use std::time::Duration;

/// Legacy AdLib base address
pub const DEFAULT_BASE: u16 = 0x388;

/// Ports claimed from the base address
pub const PORT_SPAN: u16 = 4;

/// Minimum time after an address write before the data write
pub const ADDRESS_DELAY: Duration = Duration::from_micros(10);

/// Minimum time after a data write before the next access
pub const DATA_DELAY: Duration = Duration::from_micros(30);

/// Status bits that read back set on an OPL2 and clear on an OPL3
const STATUS_OPL2_BITS: u8 = 0x06;

/// Parse the hexadecimal base address of an `ioport:` name.
///
/// Empty or zero selects [`DEFAULT_BASE`].
pub fn parse_base(name: &str) -> Result<u16> {
    let digits = name.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    if digits.is_empty() {
        return Ok(DEFAULT_BASE);
    }
    let base = u16::from_str_radix(digits, 16)
        .map_err(|_| Error::InvalidName(format!("ioport:{} is not a hex I/O address", name)))?;
    match base {
        0 => Ok(DEFAULT_BASE),
        b if b > u16::MAX - PORT_SPAN + 1 => Err(Error::InvalidName(format!(
            "ioport:{} leaves no room for {} ports",
            name, PORT_SPAN
        ))),
        b => Ok(b),
    }
}

/// Open the chip at the base address named by `name`.
pub fn open(name: &str) -> Result<IoPortDevice<Box<dyn PortIo>>> {
    let base = parse_base(name)?;
    let ports = port::acquire(base, PORT_SPAN)?;
    IoPortDevice::with_ports(ports, base)
}

/// Chip driven directly through its I/O ports
pub struct IoPortDevice<P: PortIo> {
    ports: P,
    base: u16,
    opl3: bool,
    unsupported: UnsupportedCounter,
}

impl<P: PortIo> IoPortDevice<P> {
    /// Probe and reset the chip behind already-claimed ports.
    pub fn with_ports(mut ports: P, base: u16) -> Result<Self> {
        let status = ports.inb(base).map_err(Error::Transport)?;
        let opl3 = status & STATUS_OPL2_BITS == 0;
        let mut dev = Self {
            ports,
            base,
            opl3,
            unsupported: UnsupportedCounter::new(),
        };
        dev.silence()?;
        log::debug!(
            "ioport: {} at {:#x} (status {:02X})",
            if opl3 { "OPL3" } else { "OPL2" },
            base,
            status
        );
        Ok(dev)
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    fn write_pair(&mut self, offset: u16, reg: u8, val: u8) -> Result<()> {
        let address = self.base + offset;
        self.ports.outb(address, reg).map_err(Error::Transport)?;
        self.ports.settle(ADDRESS_DELAY);
        self.ports.outb(address + 1, val).map_err(Error::Transport)?;
        self.ports.settle(DATA_DELAY);
        Ok(())
    }

    /// Zero every bank-0 register.
    fn silence(&mut self) -> Result<()> {
        for reg in 0..BANK_SIZE {
            self.write_pair(0, reg as u8, 0)?;
        }
        Ok(())
    }
}

impl<P: PortIo> Device for IoPortDevice<P> {
    fn name(&self) -> &'static str {
        "ioport"
    }

    fn is_opl3(&self) -> bool {
        self.opl3
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        if reg > MAX_REGISTER {
            self.unsupported.record(self.name(), reg, val);
            return Ok(());
        }
        match Bank::of(reg) {
            Bank::Primary => self.write_pair(0, reg as u8, val),
            // an OPL2 aliases base+2/3 onto bank 0
            Bank::Secondary if !self.opl3 => {
                self.unsupported.record(self.name(), reg, val);
                Ok(())
            }
            Bank::Secondary => self.write_pair(2, (reg & 0xFF) as u8, val),
        }
    }

    fn unsupported_writes(&self) -> u64 {
        self.unsupported.count()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        // silence hanging notes before giving the ports back
        let result = self.silence();
        if let Err(e) = &result {
            log::warn!("ioport: failed to silence chip at {:#x}: {}", self.base, e);
        }
        log::debug!("ioport: released {:#x}", self.base);
        result
    }
}
