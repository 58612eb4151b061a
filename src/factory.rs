//! Device selection by name
//!
//! Names look like `scheme:rest`. A scheme picks the backend and `rest`
//! is handed to its `open`. Names without a known scheme (including
//! schemes of backends that are not compiled in) go to the kernel FM
//! backend whole.

use crate::config::Config;
use crate::device::Device;
use crate::error::Result;

/// Backend chosen by a device name, with the backend-specific remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceName<'a> {
    #[cfg(feature = "retrowave")]
    RetroWave(&'a str),
    #[cfg(all(feature = "ioport", target_os = "linux"))]
    IoPort(&'a str),
    #[cfg(all(feature = "lpt", target_os = "linux"))]
    Lpt { port: &'a str, opl3: bool },
    #[cfg(feature = "imfwrite")]
    ImfWrite(&'a str),
    /// Kernel FM hwdep name; empty asks for discovery
    Alsa(&'a str),
}

impl<'a> DeviceName<'a> {
    pub fn parse(name: &'a str) -> Self {
        if let Some((scheme, rest)) = name.split_once(':') {
            match scheme {
                #[cfg(feature = "retrowave")]
                "retrowave" => return DeviceName::RetroWave(rest),
                #[cfg(all(feature = "ioport", target_os = "linux"))]
                "ioport" => return DeviceName::IoPort(rest),
                #[cfg(all(feature = "lpt", target_os = "linux"))]
                "opl2lpt" => return DeviceName::Lpt { port: rest, opl3: false },
                #[cfg(all(feature = "lpt", target_os = "linux"))]
                "opl3lpt" => return DeviceName::Lpt { port: rest, opl3: true },
                #[cfg(feature = "imfwrite")]
                "imfwrite" => return DeviceName::ImfWrite(rest),
                "alsa" => return DeviceName::Alsa(rest),
                _ => {}
            }
        }
        DeviceName::Alsa(name)
    }

    /// Scheme this name selects
    pub fn scheme(&self) -> &'static str {
        match self {
            #[cfg(feature = "retrowave")]
            DeviceName::RetroWave(_) => "retrowave",
            #[cfg(all(feature = "ioport", target_os = "linux"))]
            DeviceName::IoPort(_) => "ioport",
            #[cfg(all(feature = "lpt", target_os = "linux"))]
            DeviceName::Lpt { opl3: false, .. } => "opl2lpt",
            #[cfg(all(feature = "lpt", target_os = "linux"))]
            DeviceName::Lpt { opl3: true, .. } => "opl3lpt",
            #[cfg(feature = "imfwrite")]
            DeviceName::ImfWrite(_) => "imfwrite",
            DeviceName::Alsa(_) => "alsa",
        }
    }
}

/// Schemes recognized by this build
pub fn list_schemes() -> Vec<&'static str> {
    let mut schemes = Vec::new();
    #[cfg(feature = "retrowave")]
    schemes.push("retrowave");
    #[cfg(all(feature = "ioport", target_os = "linux"))]
    schemes.push("ioport");
    #[cfg(all(feature = "lpt", target_os = "linux"))]
    schemes.extend(["opl2lpt", "opl3lpt"]);
    #[cfg(feature = "imfwrite")]
    schemes.push("imfwrite");
    schemes.push("alsa");
    schemes
}

/// Open a device by name, taking the default from `OPLHW_DEVICE`.
pub fn open_device(name: &str) -> Result<Box<dyn Device>> {
    open_device_with(name, &Config::from_env())
}

/// Open a device by name. An empty name falls back to the configured
/// default, then to the first kernel FM interface found.
pub fn open_device_with(name: &str, config: &Config) -> Result<Box<dyn Device>> {
    let name = config.resolve(name);
    let selected = DeviceName::parse(name);
    log::debug!("opening {:?}", selected);

    let dev: Box<dyn Device> = match selected {
        #[cfg(feature = "retrowave")]
        DeviceName::RetroWave(path) => Box::new(crate::backends::retrowave::RetroWaveDevice::open(path)?),
        #[cfg(all(feature = "ioport", target_os = "linux"))]
        DeviceName::IoPort(base) => Box::new(crate::backends::ioport::open(base)?),
        #[cfg(all(feature = "lpt", target_os = "linux"))]
        DeviceName::Lpt { port, opl3 } => Box::new(crate::backends::lpt::open(port, opl3)?),
        #[cfg(feature = "imfwrite")]
        DeviceName::ImfWrite(path) => Box::new(crate::backends::imfwrite::ImfDevice::create(
            path,
            config.imf_rate,
        )?),
        #[cfg(all(feature = "alsa", target_os = "linux"))]
        DeviceName::Alsa(hw) => Box::new(crate::backends::alsa::open(hw)?),
        #[cfg(not(all(feature = "alsa", target_os = "linux")))]
        DeviceName::Alsa(_) => {
            return Err(crate::error::Error::Unsupported(format!(
                "no backend for {:?} (kernel FM support not built)",
                name
            )))
        }
    };
    log::info!(
        "opened {} ({})",
        dev.name(),
        if dev.is_opl3() { "OPL3" } else { "OPL2" }
    );
    Ok(dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_fallback() {
        assert_eq!(DeviceName::parse(""), DeviceName::Alsa(""));
        assert_eq!(DeviceName::parse("hw:1,0"), DeviceName::Alsa("hw:1,0"));
        assert_eq!(DeviceName::parse("alsa:hw:0"), DeviceName::Alsa("hw:0"));
        assert_eq!(DeviceName::parse("bogus:x"), DeviceName::Alsa("bogus:x"));
        assert_eq!(DeviceName::parse("alsa:hw:0").scheme(), "alsa");
    }

    #[cfg(all(feature = "ioport", target_os = "linux"))]
    #[test]
    fn test_parse_ioport() {
        use crate::backends::ioport::{parse_base, DEFAULT_BASE};

        let DeviceName::IoPort(base) = DeviceName::parse("ioport:220") else {
            panic!("ioport:220 not routed to ioport");
        };
        assert_eq!(parse_base(base).unwrap(), 0x220);

        let DeviceName::IoPort(base) = DeviceName::parse("ioport:") else {
            panic!("ioport: not routed to ioport");
        };
        assert_eq!(parse_base(base).unwrap(), DEFAULT_BASE);
        assert_eq!(DEFAULT_BASE, 0x388);
    }

    #[cfg(all(feature = "lpt", target_os = "linux"))]
    #[test]
    fn test_parse_lpt() {
        assert_eq!(
            DeviceName::parse("opl2lpt:parport0"),
            DeviceName::Lpt {
                port: "parport0",
                opl3: false
            }
        );
        assert_eq!(
            DeviceName::parse("opl3lpt:"),
            DeviceName::Lpt {
                port: "",
                opl3: true
            }
        );
        assert_eq!(DeviceName::parse("opl3lpt:").scheme(), "opl3lpt");
    }

    #[cfg(all(feature = "retrowave", feature = "imfwrite"))]
    #[test]
    fn test_parse_file_backends() {
        assert_eq!(
            DeviceName::parse("retrowave:/dev/ttyACM0"),
            DeviceName::RetroWave("/dev/ttyACM0")
        );
        assert_eq!(
            DeviceName::parse("imfwrite:out.imf"),
            DeviceName::ImfWrite("out.imf")
        );
    }

    #[test]
    fn test_schemes_end_with_fallback() {
        let schemes = list_schemes();
        assert_eq!(schemes.last(), Some(&"alsa"));
        for scheme in &schemes {
            let name = format!("{}:x", scheme);
            assert_eq!(DeviceName::parse(&name).scheme(), *scheme);
        }
    }

    #[cfg(feature = "retrowave")]
    #[test]
    fn test_configured_default_is_used() {
        let config = Config::new().with_default_device("retrowave:/nonexistent/ttyRW");
        let err = open_device_with("", &config).err().unwrap();
        assert!(matches!(err, Error::NotFound(ref p) if p == "/nonexistent/ttyRW"));
    }
}
