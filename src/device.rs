//! The device contract every backend and filter implements

use crate::error::Result;
use crate::registers::BANK_SIZE;

/// An attached (or emulated) OPL2/OPL3 chip
///
/// A device is owned by whoever opened it and is not safe to share
/// between threads without external locking. Writes reach the transport
/// in the order they are issued.
pub trait Device {
    /// Short backend name (e.g., "ioport", "retrowave")
    fn name(&self) -> &'static str;

    /// Whether the hardware supports the OPL3 extension. Fixed at open time.
    fn is_opl3(&self) -> bool;

    /// Write `val` to register `reg` (0x000-0x1FF).
    ///
    /// Registers the backend cannot represent are dropped and counted,
    /// not reported as errors. May sleep for the chip's settle time.
    fn write(&mut self, reg: u16, val: u8) -> Result<()>;

    /// Number of register writes dropped as unsupported so far
    fn unsupported_writes(&self) -> u64 {
        0
    }

    /// Zero every register of bank 0, and of bank 1 on OPL3 hardware.
    ///
    /// This also clears the OPL3 enable bit; callers that want OPL3 mode
    /// afterwards must set it again.
    fn reset(&mut self) -> Result<()> {
        for reg in 0..BANK_SIZE {
            self.write(reg, 0)?;
        }
        if self.is_opl3() {
            for reg in BANK_SIZE..BANK_SIZE * 2 {
                self.write(reg, 0)?;
            }
        }
        Ok(())
    }

    /// Release the device and everything it owns.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Running count of dropped register writes
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCounter {
    count: u64,
}

impl UnsupportedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, backend: &str, reg: u16, val: u8) {
        self.count += 1;
        log::trace!("{}: dropped write {:03X}={:02X}", backend, reg, val);
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingDevice;
    use super::*;

    #[test]
    fn test_reset_opl3_covers_both_banks() {
        let (mut dev, log) = RecordingDevice::new(true);
        dev.reset().unwrap();
        let log = log.borrow();
        assert_eq!(log.writes.len(), 512);
        for (i, (reg, val)) in log.writes.iter().enumerate() {
            assert_eq!(*reg, i as u16);
            assert_eq!(*val, 0);
        }
    }

    #[test]
    fn test_reset_opl2_covers_one_bank() {
        let (mut dev, log) = RecordingDevice::new(false);
        dev.reset().unwrap();
        let log = log.borrow();
        assert_eq!(log.writes.len(), 256);
        assert_eq!(log.writes.last(), Some(&(0xFF, 0)));
        assert!(log.writes.iter().all(|(_, v)| *v == 0));
    }

    #[test]
    fn test_reset_through_trait_object() {
        let (dev, log) = RecordingDevice::new(true);
        let mut dev: Box<dyn Device> = Box::new(dev);
        dev.reset().unwrap();
        dev.close().unwrap();
        assert_eq!(log.borrow().writes.len(), 512);
        assert!(log.borrow().closed);
    }

    #[test]
    fn test_unsupported_counter() {
        let mut counter = UnsupportedCounter::new();
        assert_eq!(counter.count(), 0);
        counter.record("test", 0x1A0, 0x12);
        counter.record("test", 0x0F, 0x00);
        assert_eq!(counter.count(), 2);
    }
}
