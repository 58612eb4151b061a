//! Byte-wide I/O port access
//!
//! Two ways in: direct `in`/`out` instructions after `ioperm` (x86 Linux,
//! needs CAP_SYS_RAWIO), or reads and writes at the port's offset in
//! `/dev/port` when direct access is unavailable.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::thread;
use std::time::Duration;

/// Kernel file exposing the I/O port space
pub const DEV_PORT: &str = "/dev/port";

/// Access to a range of I/O ports
pub trait PortIo {
    fn outb(&mut self, port: u16, val: u8) -> io::Result<()>;

    fn inb(&mut self, port: u16) -> io::Result<u8>;

    /// Wait for the hardware to latch the last write.
    fn settle(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

impl<P: PortIo + ?Sized> PortIo for Box<P> {
    fn outb(&mut self, port: u16, val: u8) -> io::Result<()> {
        (**self).outb(port, val)
    }

    fn inb(&mut self, port: u16) -> io::Result<u8> {
        (**self).inb(port)
    }

    fn settle(&mut self, delay: Duration) {
        (**self).settle(delay)
    }
}

/// Claim `len` ports starting at `base`, preferring direct access.
pub fn acquire(base: u16, len: u16) -> Result<Box<dyn PortIo>> {
    #[cfg(all(
        target_os = "linux",
        target_env = "gnu",
        any(target_arch = "x86", target_arch = "x86_64")
    ))]
    match direct::DirectPorts::claim(base, len) {
        Ok(ports) => return Ok(Box::new(ports)),
        Err(e) => log::debug!("direct port access unavailable ({}), trying {}", e, DEV_PORT),
    }

    let ports = DevPort::open(base, len)?;
    Ok(Box::new(ports))
}

fn range_name(base: u16, len: u16) -> String {
    format!("I/O ports {:#x}-{:#x}", base, base as u32 + len as u32 - 1)
}

fn check_range(base: u16, len: u16, port: u16) -> io::Result<()> {
    let (port, base, len) = (port as u32, base as u32, len as u32);
    if port < base || port >= base + len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("port {:#x} outside claimed {:#x}+{}", port, base, len),
        ));
    }
    Ok(())
}

/// Ports reached through `/dev/port`
pub struct DevPort {
    file: File,
    base: u16,
    len: u16,
}

impl DevPort {
    pub fn open(base: u16, len: u16) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(DEV_PORT)
            .map_err(|e| Error::open(DEV_PORT, e))?;
        log::debug!("using {} for {}", DEV_PORT, range_name(base, len));
        Ok(Self { file, base, len })
    }
}

impl PortIo for DevPort {
    fn outb(&mut self, port: u16, val: u8) -> io::Result<()> {
        check_range(self.base, self.len, port)?;
        self.file.write_all_at(&[val], port as u64)
    }

    fn inb(&mut self, port: u16) -> io::Result<u8> {
        check_range(self.base, self.len, port)?;
        let mut buf = [0u8; 1];
        self.file.read_exact_at(&mut buf, port as u64)?;
        Ok(buf[0])
    }
}

#[cfg(all(
    target_os = "linux",
    target_env = "gnu",
    any(target_arch = "x86", target_arch = "x86_64")
))]
pub mod direct {
    use super::{check_range, range_name, PortIo};
    use crate::error::{Error, Result};
    use nix::libc;
    use std::arch::asm;
    use std::io;

    /// Ports reached with `in`/`out` after `ioperm`
    pub struct DirectPorts {
        base: u16,
        len: u16,
    }

    impl DirectPorts {
        pub fn claim(base: u16, len: u16) -> Result<Self> {
            // SAFETY: ioperm only changes this process's I/O permission bitmap
            let rc = unsafe { libc::ioperm(base as libc::c_ulong, len as libc::c_ulong, 1) };
            if rc < 0 {
                return Err(Error::open(
                    range_name(base, len),
                    io::Error::last_os_error(),
                ));
            }
            log::debug!("claimed {}", range_name(base, len));
            Ok(Self { base, len })
        }
    }

    impl Drop for DirectPorts {
        fn drop(&mut self) {
            // SAFETY: revokes the permission granted in claim
            unsafe {
                libc::ioperm(self.base as libc::c_ulong, self.len as libc::c_ulong, 0);
            }
        }
    }

    impl PortIo for DirectPorts {
        fn outb(&mut self, port: u16, val: u8) -> io::Result<()> {
            check_range(self.base, self.len, port)?;
            // SAFETY: the port lies in the range ioperm granted
            unsafe {
                asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
            }
            Ok(())
        }

        fn inb(&mut self, port: u16) -> io::Result<u8> {
            check_range(self.base, self.len, port)?;
            let val: u8;
            // SAFETY: the port lies in the range ioperm granted
            unsafe {
                asm!("in al, dx", out("al") val, in("dx") port, options(nomem, nostack, preserves_flags));
            }
            Ok(val)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording port I/O for backend tests

    use super::PortIo;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PortEvent {
        Out(u16, u8),
        Settle(Duration),
    }

    #[derive(Default)]
    pub struct MockPorts {
        pub events: Rc<RefCell<Vec<PortEvent>>>,
        pub inputs: HashMap<u16, u8>,
        pub fail_writes: bool,
    }

    impl MockPorts {
        pub fn new() -> (Self, Rc<RefCell<Vec<PortEvent>>>) {
            let ports = Self::default();
            let events = Rc::clone(&ports.events);
            (ports, events)
        }

        pub fn with_input(mut self, port: u16, val: u8) -> Self {
            self.inputs.insert(port, val);
            self
        }
    }

    impl PortIo for MockPorts {
        fn outb(&mut self, port: u16, val: u8) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::Other, "port gone"));
            }
            self.events.borrow_mut().push(PortEvent::Out(port, val));
            Ok(())
        }

        fn inb(&mut self, port: u16) -> io::Result<u8> {
            Ok(self.inputs.get(&port).copied().unwrap_or(0))
        }

        fn settle(&mut self, delay: Duration) {
            self.events.borrow_mut().push(PortEvent::Settle(delay));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(0x388, 4, 0x388).is_ok());
        assert!(check_range(0x388, 4, 0x38B).is_ok());
        assert!(check_range(0x388, 4, 0x38C).is_err());
        assert!(check_range(0x388, 4, 0x387).is_err());
    }

    #[test]
    fn test_range_name() {
        assert_eq!(range_name(0x220, 4), "I/O ports 0x220-0x223");
    }
}
