//! OPL2LPT / OPL3LPT parallel port adapters
//!
//! A register write puts the register number on the data lines and
//! pulses the control lines to latch it as an address, then does the
//! same with the value and a data latch sequence. The adapters cannot be
//! probed, so OPL2/OPL3 is chosen by the caller.

pub mod direct;
pub mod ppdev;

use crate::device::{Device, UnsupportedCounter};
use crate::error::{Error, Result};
use crate::registers::{Bank, MAX_REGISTER};
use std::io;
use std::thread;
use std::time::Duration;

/// Raw control register bits
pub mod control {
    pub const STROBE: u8 = 0x01;
    pub const AUTO_FEED: u8 = 0x02;
    pub const INIT: u8 = 0x04;
    pub const SELECT_IN: u8 = 0x08;
}

use control::{INIT, SELECT_IN, STROBE};

/// Control sequence latching an address for bank 0
pub const ADDRESS_LATCH: [u8; 3] = [SELECT_IN | INIT | STROBE, SELECT_IN | STROBE, SELECT_IN | INIT | STROBE];

/// Control sequence latching an address for bank 1
pub const ADDRESS_LATCH_BANK1: [u8; 3] = [INIT | STROBE, STROBE, INIT | STROBE];

/// Control sequence latching a data byte
pub const DATA_LATCH: [u8; 3] = [SELECT_IN | INIT, SELECT_IN, SELECT_IN | INIT];

pub const ADDRESS_DELAY: Duration = Duration::from_micros(4);
pub const DATA_DELAY: Duration = Duration::from_micros(33);

/// Data and control lines of a claimed parallel port
pub trait ParallelPort {
    fn write_data(&mut self, val: u8) -> io::Result<()>;

    fn write_control(&mut self, val: u8) -> io::Result<()>;

    fn settle(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

impl<P: ParallelPort + ?Sized> ParallelPort for Box<P> {
    fn write_data(&mut self, val: u8) -> io::Result<()> {
        (**self).write_data(val)
    }

    fn write_control(&mut self, val: u8) -> io::Result<()> {
        (**self).write_control(val)
    }

    fn settle(&mut self, delay: Duration) {
        (**self).settle(delay)
    }
}

/// Open the adapter on the port called `name` (empty for the first one).
///
/// Uses the kernel parallel port device when it is available and falls
/// back to claiming the port's I/O range directly.
pub fn open(name: &str, opl3: bool) -> Result<LptDevice<Box<dyn ParallelPort>>> {
    let port: Box<dyn ParallelPort> = match ppdev::PpdevPort::open(name) {
        Ok(port) => Box::new(port),
        Err(ppdev_err) => {
            log::debug!("lpt: ppdev unavailable ({}), trying direct access", ppdev_err);
            match direct::DirectParallelPort::open(name) {
                Ok(port) => Box::new(port),
                Err(direct_err) => {
                    log::debug!("lpt: direct access failed: {}", direct_err);
                    return Err(ppdev_err);
                }
            }
        }
    };
    Ok(LptDevice::new(port, opl3))
}

/// OPL2LPT / OPL3LPT device
pub struct LptDevice<P: ParallelPort> {
    port: P,
    opl3: bool,
    unsupported: UnsupportedCounter,
}

impl<P: ParallelPort> LptDevice<P> {
    pub fn new(port: P, opl3: bool) -> Self {
        Self {
            port,
            opl3,
            unsupported: UnsupportedCounter::new(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn latch(&mut self, byte: u8, sequence: &[u8; 3], delay: Duration) -> io::Result<()> {
        self.port.write_data(byte)?;
        for &ctrl in sequence {
            self.port.write_control(ctrl)?;
        }
        self.port.settle(delay);
        Ok(())
    }
}

impl<P: ParallelPort> Device for LptDevice<P> {
    fn name(&self) -> &'static str {
        if self.opl3 {
            "opl3lpt"
        } else {
            "opl2lpt"
        }
    }

    fn is_opl3(&self) -> bool {
        self.opl3
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        let bank = Bank::of(reg);
        if reg > MAX_REGISTER || (bank == Bank::Secondary && !self.opl3) {
            self.unsupported.record(self.name(), reg, val);
            return Ok(());
        }
        let address_latch = match bank {
            Bank::Primary => &ADDRESS_LATCH,
            Bank::Secondary => &ADDRESS_LATCH_BANK1,
        };
        self.latch((reg & 0xFF) as u8, address_latch, ADDRESS_DELAY)
            .and_then(|_| self.latch(val, &DATA_LATCH, DATA_DELAY))
            .map_err(Error::Transport)
    }

    fn unsupported_writes(&self) -> u64 {
        self.unsupported.count()
    }

    fn close(self: Box<Self>) -> Result<()> {
        log::debug!("{}: released", self.name());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::ParallelPort;
    use std::io;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LineEvent {
        Data(u8),
        Control(u8),
        Settle(Duration),
    }

    #[derive(Default)]
    pub struct MockParallelPort {
        pub events: Vec<LineEvent>,
    }

    impl ParallelPort for MockParallelPort {
        fn write_data(&mut self, val: u8) -> io::Result<()> {
            self.events.push(LineEvent::Data(val));
            Ok(())
        }

        fn write_control(&mut self, val: u8) -> io::Result<()> {
            self.events.push(LineEvent::Control(val));
            Ok(())
        }

        fn settle(&mut self, delay: Duration) {
            self.events.push(LineEvent::Settle(delay));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{LineEvent, MockParallelPort};
    use super::*;
    use LineEvent::{Control, Data, Settle};

    #[test]
    fn test_latch_values() {
        assert_eq!(ADDRESS_LATCH, [0x0D, 0x09, 0x0D]);
        assert_eq!(ADDRESS_LATCH_BANK1, [0x05, 0x01, 0x05]);
        assert_eq!(DATA_LATCH, [0x0C, 0x08, 0x0C]);
    }

    #[test]
    fn test_bank0_write_sequence() {
        let mut dev = LptDevice::new(MockParallelPort::default(), false);
        dev.write(0xB0, 0x31).unwrap();
        assert_eq!(
            dev.port().events,
            vec![
                Data(0xB0),
                Control(0x0D),
                Control(0x09),
                Control(0x0D),
                Settle(ADDRESS_DELAY),
                Data(0x31),
                Control(0x0C),
                Control(0x08),
                Control(0x0C),
                Settle(DATA_DELAY),
            ]
        );
    }

    #[test]
    fn test_bank1_uses_second_address_latch() {
        let mut dev = LptDevice::new(MockParallelPort::default(), true);
        assert_eq!(dev.name(), "opl3lpt");
        dev.write(0x105, 0x01).unwrap();
        assert_eq!(
            &dev.port().events[..5],
            &[
                Data(0x05),
                Control(0x05),
                Control(0x01),
                Control(0x05),
                Settle(ADDRESS_DELAY)
            ]
        );
        assert_eq!(dev.port().events[5], Data(0x01));
    }

    #[test]
    fn test_bank1_dropped_on_opl2() {
        let mut dev = LptDevice::new(MockParallelPort::default(), false);
        assert_eq!(dev.name(), "opl2lpt");
        dev.write(0x1A0, 0x10).unwrap();
        assert!(dev.port().events.is_empty());
        assert_eq!(dev.unsupported_writes(), 1);
    }

    #[test]
    fn test_opl3_flag_is_caller_asserted() {
        assert!(LptDevice::new(MockParallelPort::default(), true).is_opl3());
        assert!(!LptDevice::new(MockParallelPort::default(), false).is_opl3());
    }
}
