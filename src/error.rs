use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device busy: {0}")]
    Busy(String),

    #[error("No OPL2/OPL3 hardware found")]
    NoHardware,

    #[error("Invalid device name: {0}")]
    InvalidName(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Transport failure: {0}")]
    Transport(#[source] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Classify a failure to acquire `what` into an open error the caller can report.
    pub fn open(what: impl Into<String>, err: io::Error) -> Self {
        let what = what.into();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(what),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(what),
            _ if is_busy(&err) => Error::Busy(what),
            _ => Error::Io(io::Error::new(err.kind(), format!("{}: {}", what, err))),
        }
    }

    /// True for the open failures that mean the hardware is absent rather than unusable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NoHardware)
    }
}

#[cfg(unix)]
fn is_busy(err: &io::Error) -> bool {
    // EBUSY is 16 on every unix the crate targets
    err.raw_os_error() == Some(16)
}

#[cfg(not(unix))]
fn is_busy(_err: &io::Error) -> bool {
    false
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_classification() {
        let e = Error::open("/dev/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(e, Error::NotFound(ref p) if p == "/dev/x"));
        assert!(e.is_not_found());

        let e = Error::open("/dev/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(e, Error::PermissionDenied(_)));

        let e = Error::open("/dev/x", io::Error::from_raw_os_error(16));
        assert!(matches!(e, Error::Busy(_)));
        assert!(!e.is_not_found());
    }
}
