//! Transport backends

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub mod alsa;
#[cfg(feature = "imfwrite")]
pub mod imfwrite;
#[cfg(all(feature = "ioport", target_os = "linux"))]
pub mod ioport;
#[cfg(all(feature = "lpt", target_os = "linux"))]
pub mod lpt;
#[cfg(feature = "retrowave")]
pub mod retrowave;
