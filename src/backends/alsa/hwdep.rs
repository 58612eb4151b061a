//! hwdep device nodes: naming, discovery and the FM ioctls

use super::{FmInterface, FmMode, FmNote, FmParams, FmVoice};
use crate::error::{Error, Result};
use nix::libc::{c_int, c_uint};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::mem::{self, MaybeUninit};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

/// Kernel list of hwdep interfaces
pub const PROC_HWDEP: &str = "/proc/asound/hwdep";

/// hwdep interface classes
pub mod iface {
    pub const OPL2: i32 = 0;
    pub const OPL3: i32 = 1;
    pub const OPL4: i32 = 2;
}

/// `struct snd_hwdep_info`
#[repr(C)]
pub struct HwdepInfo {
    pub device: c_uint,
    pub card: c_int,
    pub id: [u8; 64],
    pub name: [u8; 80],
    pub iface: c_int,
    pub reserved: [u8; 64],
}

const HWDEP_IOCTL: u8 = b'H';

nix::ioctl_read!(hwdep_info, HWDEP_IOCTL, 0x01, HwdepInfo);
nix::ioctl_write_ptr!(fm_play_note, HWDEP_IOCTL, 0x22, FmNote);
nix::ioctl_write_ptr!(fm_set_voice, HWDEP_IOCTL, 0x23, FmVoice);
nix::ioctl_write_ptr!(fm_set_params, HWDEP_IOCTL, 0x24, FmParams);
nix::ioctl_write_int!(fm_set_mode, HWDEP_IOCTL, 0x25);
nix::ioctl_write_int_bad!(
    fm_set_connection,
    nix::request_code_readwrite!(HWDEP_IOCTL, 0x26, mem::size_of::<c_int>())
);

/// One line of [`PROC_HWDEP`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HwdepEntry {
    pub card: u32,
    pub device: u32,
    pub description: String,
}

impl HwdepEntry {
    /// `hw:C,D` name of the interface
    pub fn name(&self) -> String {
        format!("hw:{},{}", self.card, self.device)
    }

    pub fn is_fm(&self) -> bool {
        self.description.contains("OPL2") || self.description.contains("OPL3")
    }
}

/// Parse the `CC-DD: description` lines of [`PROC_HWDEP`].
pub fn parse_proc(text: &str) -> Vec<HwdepEntry> {
    text.lines()
        .filter_map(|line| {
            let (address, description) = line.split_once(':')?;
            let (card, device) = address.trim().split_once('-')?;
            Some(HwdepEntry {
                card: card.parse().ok()?,
                device: device.parse().ok()?,
                description: description.trim().to_string(),
            })
        })
        .collect()
}

/// hwdep interfaces the kernel knows about
pub fn list() -> Vec<HwdepEntry> {
    fs::read_to_string(PROC_HWDEP)
        .map(|text| parse_proc(&text))
        .unwrap_or_default()
}

/// Name of the first FM interface in `entries`.
pub fn find_fm(entries: &[HwdepEntry]) -> Result<String> {
    entries
        .iter()
        .find(|entry| entry.is_fm())
        .map(HwdepEntry::name)
        .ok_or(Error::NoHardware)
}

/// Map `hw:C,D`, `hw:C` or a node path to the node path.
pub fn node_path(name: &str) -> Result<PathBuf> {
    if name.starts_with('/') {
        return Ok(PathBuf::from(name));
    }
    let invalid = || Error::InvalidName(format!("{} is not hw:CARD[,DEVICE] or a path", name));
    let address = name.strip_prefix("hw:").ok_or_else(invalid)?;
    let (card, device) = address.split_once(',').unwrap_or((address, "0"));
    let card: u32 = card.trim().parse().map_err(|_| invalid())?;
    let device: u32 = device.trim().parse().map_err(|_| invalid())?;
    Ok(PathBuf::from(format!("/dev/snd/hwC{}D{}", card, device)))
}

/// Whether an interface class can be driven, and as which chip
fn class_is_opl3(class: i32) -> Option<bool> {
    match class {
        iface::OPL2 => Some(false),
        // OPL4 carries a full OPL3 FM part
        iface::OPL3 | iface::OPL4 => Some(true),
        _ => None,
    }
}

fn cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Open hwdep node
pub struct Hwdep {
    file: File,
    path: PathBuf,
}

impl Hwdep {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| Error::open(path.display().to_string(), e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open by name, discovering the first FM interface when `name` is
    /// empty. Returns the node and whether it is an OPL3.
    pub fn open_named(name: &str) -> Result<(Self, bool)> {
        let name = if name.is_empty() {
            let found = find_fm(&list())?;
            log::info!("alsa: discovered {}", found);
            found
        } else {
            name.to_string()
        };
        let hw = Self::open(&node_path(&name)?)?;
        let info = hw.info()?;
        let opl3 = class_is_opl3(info.iface).ok_or_else(|| {
            Error::Unsupported(format!(
                "{} is not an FM interface (class {})",
                hw.path.display(),
                info.iface
            ))
        })?;
        log::debug!(
            "alsa: {} is {} ({})",
            hw.path.display(),
            cstr(&info.name),
            if opl3 { "OPL3" } else { "OPL2" }
        );
        Ok((hw, opl3))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Result<HwdepInfo> {
        let mut info = MaybeUninit::<HwdepInfo>::zeroed();
        // SAFETY: the kernel fills a struct snd_hwdep_info; all-zero is a valid value
        unsafe { hwdep_info(self.file.as_raw_fd(), info.as_mut_ptr()) }
            .map_err(|e| Error::Transport(e.into()))?;
        // SAFETY: zero-initialized above and only written by the kernel
        Ok(unsafe { info.assume_init() })
    }
}

impl FmInterface for Hwdep {
    fn set_voice(&mut self, voice: &FmVoice) -> io::Result<()> {
        // SAFETY: FmVoice matches struct snd_dm_fm_voice
        unsafe { fm_set_voice(self.file.as_raw_fd(), voice) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn play_note(&mut self, note: &FmNote) -> io::Result<()> {
        // SAFETY: FmNote matches struct snd_dm_fm_note
        unsafe { fm_play_note(self.file.as_raw_fd(), note) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn set_params(&mut self, params: &FmParams) -> io::Result<()> {
        // SAFETY: FmParams matches struct snd_dm_fm_params
        unsafe { fm_set_params(self.file.as_raw_fd(), params) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn set_mode(&mut self, mode: FmMode) -> io::Result<()> {
        // SAFETY: SET_MODE takes the mode by value
        unsafe { fm_set_mode(self.file.as_raw_fd(), mode as i32 as nix::sys::ioctl::ioctl_param_type) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn set_connection(&mut self, connection: u8) -> io::Result<()> {
        // SAFETY: SET_CONNECTION takes the connection mask by value
        unsafe { fm_set_connection(self.file.as_raw_fd(), connection as c_int) }
            .map(drop)
            .map_err(io::Error::from)
    }
}
