//! Parallel port through its I/O registers, for systems without ppdev

use super::ParallelPort;
use crate::backends::ioport::port::{self, PortIo};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Where the kernel lists parallel ports and their base addresses
pub const PARPORT_PROC: &str = "/proc/sys/dev/parport";

const DATA_OFFSET: u16 = 0;
const CONTROL_OFFSET: u16 = 2;
const PORT_SPAN: u16 = 3;

/// First number of a `base-addr` file, in decimal
pub fn parse_base_addr(text: &str) -> Option<u16> {
    text.split_whitespace().next()?.parse().ok()
}

/// Parallel ports known to the kernel, with their base addresses
pub fn list_ports() -> Vec<(String, u16)> {
    list_ports_in(Path::new(PARPORT_PROC))
}

fn list_ports_in(dir: &Path) -> Vec<(String, u16)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut ports: Vec<(String, u16)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !name.starts_with("parport") {
                return None;
            }
            let text = fs::read_to_string(entry.path().join("base-addr")).ok()?;
            Some((name, parse_base_addr(&text)?))
        })
        .collect();
    ports.sort();
    ports
}

/// Pick the port called `name`, or the first one when `name` is empty.
fn find(ports: &[(String, u16)], name: &str) -> Result<u16> {
    // accept "/dev/parport0" as well as "parport0"
    let wanted = name.rsplit('/').next().unwrap_or(name);
    ports
        .iter()
        .find(|(port, _)| wanted.is_empty() || port == wanted)
        .map(|(_, base)| *base)
        .ok_or_else(|| {
            if wanted.is_empty() {
                Error::NotFound(format!("no parallel ports under {}", PARPORT_PROC))
            } else {
                Error::NotFound(format!("parallel port {}", wanted))
            }
        })
}

/// Parallel port driven through its data and control registers
pub struct DirectParallelPort<P: PortIo> {
    ports: P,
    base: u16,
}

impl DirectParallelPort<Box<dyn PortIo>> {
    pub fn open(name: &str) -> Result<Self> {
        let base = find(&list_ports(), name)?;
        let ports = port::acquire(base, PORT_SPAN)?;
        log::debug!("lpt: direct access at {:#x}", base);
        Ok(Self::with_ports(ports, base))
    }
}

impl<P: PortIo> DirectParallelPort<P> {
    pub fn with_ports(ports: P, base: u16) -> Self {
        Self { ports, base }
    }

    pub fn base(&self) -> u16 {
        self.base
    }
}

impl<P: PortIo> ParallelPort for DirectParallelPort<P> {
    fn write_data(&mut self, val: u8) -> io::Result<()> {
        self.ports.outb(self.base + DATA_OFFSET, val)
    }

    fn write_control(&mut self, val: u8) -> io::Result<()> {
        self.ports.outb(self.base + CONTROL_OFFSET, val)
    }

    fn settle(&mut self, delay: Duration) {
        self.ports.settle(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ioport::port::testing::{MockPorts, PortEvent};
    use crate::backends::lpt::LptDevice;
    use crate::device::Device;

    #[test]
    fn test_parse_base_addr() {
        assert_eq!(parse_base_addr("888\t1912\n"), Some(0x378));
        assert_eq!(parse_base_addr("632\n"), Some(0x278));
        assert_eq!(parse_base_addr(""), None);
        assert_eq!(parse_base_addr("0x378"), None);
    }

    #[test]
    fn test_list_ports_in() {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in [("parport1", "632\t1656\n"), ("parport0", "888\t1912\n")] {
            fs::create_dir(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("base-addr"), text).unwrap();
        }
        fs::create_dir(dir.path().join("default")).unwrap();

        let ports = list_ports_in(dir.path());
        assert_eq!(
            ports,
            vec![("parport0".to_string(), 0x378), ("parport1".to_string(), 0x278)]
        );
        assert_eq!(find(&ports, "").unwrap(), 0x378);
        assert_eq!(find(&ports, "/dev/parport1").unwrap(), 0x278);
        assert!(find(&ports, "parport7").unwrap_err().is_not_found());
        assert!(find(&[], "").unwrap_err().is_not_found());
    }

    #[test]
    fn test_lines_map_to_registers() {
        let (ports, events) = MockPorts::new();
        let mut dev = LptDevice::new(DirectParallelPort::with_ports(ports, 0x378), false);
        dev.write(0x20, 0x01).unwrap();

        let outs: Vec<(u16, u8)> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                PortEvent::Out(p, v) => Some((*p, *v)),
                _ => None,
            })
            .collect();
        assert_eq!(
            outs,
            vec![
                (0x378, 0x20),
                (0x37A, 0x0D),
                (0x37A, 0x09),
                (0x37A, 0x0D),
                (0x378, 0x01),
                (0x37A, 0x0C),
                (0x37A, 0x08),
                (0x37A, 0x0C),
            ]
        );
    }
}
