//! Hardware abstraction for OPL2/OPL3 FM synthesis chips
//!
//! Open a chip by name with [`open_device`], then issue register writes
//! through the [`Device`] trait. The name selects the transport:
//!
//! | name | backend |
//! |------|---------|
//! | `retrowave:/dev/ttyACM0` | RetroWave OPL3 over USB serial |
//! | `ioport:388` | legacy I/O ports (hex base, empty for 0x388) |
//! | `opl2lpt:parport0`, `opl3lpt:` | OPL2LPT / OPL3LPT adapters |
//! | `imfwrite:song.imf` | capture to an IMF file |
//! | `alsa:hw:1,0`, anything else | kernel FM hwdep interface |

pub mod backends;
pub mod config;
pub mod device;
pub mod error;
pub mod factory;
pub mod filter;
pub mod registers;

pub use config::Config;
pub use device::Device;
pub use error::{Error, Result};
pub use factory::{open_device, open_device_with};
pub use filter::{create_volume_filter, VolumeFilter};
