//! Parallel port through the kernel's ppdev interface (/dev/parportN)

use super::ParallelPort;
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const PP_IOCTL: u8 = b'p';

nix::ioctl_write_ptr!(ppwcontrol, PP_IOCTL, 0x84, u8);
nix::ioctl_write_ptr!(ppwdata, PP_IOCTL, 0x86, u8);
nix::ioctl_none!(ppclaim, PP_IOCTL, 0x8b);
nix::ioctl_none!(pprelease, PP_IOCTL, 0x8c);

const DEV_DIR: &str = "/dev";

/// ppdev nodes present under /dev, in numeric order
pub fn list_nodes() -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(DEV_DIR) else {
        return Vec::new();
    };
    let mut nodes: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name.to_str()?.strip_prefix("parport")?.parse().ok()?;
            Some((index, entry.path()))
        })
        .collect();
    nodes.sort();
    nodes.into_iter().map(|(_, path)| path).collect()
}

/// Map a port name to its node: a path as given, else a name under /dev.
fn resolve(name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        return list_nodes()
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("no /dev/parport* device".into()));
    }
    let given = PathBuf::from(name);
    if name.contains('/') || given.exists() {
        return Ok(given);
    }
    Ok(Path::new(DEV_DIR).join(name))
}

/// Claimed ppdev port
pub struct PpdevPort {
    file: File,
    path: PathBuf,
}

impl PpdevPort {
    pub fn open(name: &str) -> Result<Self> {
        let path = resolve(name)?;
        let display = path.display().to_string();
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| Error::open(display.clone(), e))?;
        // SAFETY: fd is an open ppdev node; PPCLAIM takes no argument
        unsafe { ppclaim(file.as_raw_fd()) }.map_err(|e| Error::open(display, e.into()))?;
        log::debug!("lpt: claimed {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PpdevPort {
    fn drop(&mut self) {
        // SAFETY: the port was claimed in open
        if let Err(e) = unsafe { pprelease(self.file.as_raw_fd()) } {
            log::warn!("lpt: releasing {} failed: {}", self.path.display(), e);
        }
    }
}

impl ParallelPort for PpdevPort {
    fn write_data(&mut self, val: u8) -> io::Result<()> {
        // SAFETY: PPWDATA reads one byte through the pointer
        unsafe { ppwdata(self.file.as_raw_fd(), &val) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn write_control(&mut self, val: u8) -> io::Result<()> {
        // SAFETY: PPWCONTROL reads one byte through the pointer
        unsafe { ppwcontrol(self.file.as_raw_fd(), &val) }
            .map(drop)
            .map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_names() {
        assert_eq!(resolve("/dev/parport1").unwrap(), PathBuf::from("/dev/parport1"));
        assert_eq!(
            resolve("no-such-parport-name").unwrap(),
            PathBuf::from("/dev/no-such-parport-name")
        );
    }

    #[test]
    fn test_open_missing_node() {
        let err = PpdevPort::open("/nonexistent/parport9").err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
