use clap::{Parser, Subcommand};
use oplhw::{Config, Device};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oplhw")]
#[command(version = "0.1.0")]
#[command(about = "Drive OPL2/OPL3 FM chips", long_about = None)]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a device and report what it is
    Info {
        /// Device name (defaults to $OPLHW_DEVICE, then discovery)
        #[arg(short, long, default_value = "")]
        device: String,

        #[arg(long)]
        json: bool,
    },
    /// List FM interfaces and parallel ports
    List {
        #[arg(long)]
        json: bool,
    },
    /// Zero every register
    Reset {
        #[arg(short, long, default_value = "")]
        device: String,
    },
    /// Write registers in order
    Write {
        #[arg(short, long, default_value = "")]
        device: String,

        /// Scale operator levels (0-255)
        #[arg(long)]
        volume: Option<u8>,

        /// Hex register=value pairs, e.g. 20=01 0x105=1
        #[arg(required = true, value_parser = parse_write)]
        writes: Vec<(u16, u8)>,
    },
}

fn parse_hex(text: &str) -> Result<u32, String> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|_| format!("{:?} is not hex", text))
}

fn parse_write(text: &str) -> Result<(u16, u8), String> {
    let (reg, val) = text
        .split_once('=')
        .ok_or_else(|| format!("{:?} is not REG=VAL", text))?;
    let reg = parse_hex(reg)?;
    let val = parse_hex(val)?;
    if reg > oplhw::registers::MAX_REGISTER as u32 {
        return Err(format!("register {:#x} out of range", reg));
    }
    let val = u8::try_from(val).map_err(|_| format!("value {:#x} out of range", val))?;
    Ok((reg as u16, val))
}

#[derive(Serialize)]
struct Info {
    backend: &'static str,
    opl3: bool,
}

#[derive(Serialize)]
struct ParallelPort {
    name: String,
    base: Option<u16>,
}

#[derive(Serialize, Default)]
struct Listing {
    schemes: Vec<&'static str>,
    #[cfg(all(feature = "alsa", target_os = "linux"))]
    hwdep: Vec<oplhw::backends::alsa::hwdep::HwdepEntry>,
    parallel_ports: Vec<ParallelPort>,
}

fn listing() -> Listing {
    #[allow(unused_mut)]
    let mut listing = Listing {
        schemes: oplhw::factory::list_schemes(),
        ..Listing::default()
    };
    #[cfg(all(feature = "alsa", target_os = "linux"))]
    {
        listing.hwdep = oplhw::backends::alsa::hwdep::list();
    }
    #[cfg(all(feature = "lpt", target_os = "linux"))]
    {
        use oplhw::backends::lpt::{direct, ppdev};
        for (name, base) in direct::list_ports() {
            listing.parallel_ports.push(ParallelPort {
                name,
                base: Some(base),
            });
        }
        for node in ppdev::list_nodes() {
            let Some(name) = node.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !listing.parallel_ports.iter().any(|p| p.name == name) {
                listing.parallel_ports.push(ParallelPort {
                    name: name.to_string(),
                    base: None,
                });
            }
        }
    }
    listing
}

fn load_config(path: Option<&PathBuf>) -> oplhw::Result<Config> {
    let env = Config::from_env();
    let Some(path) = path else {
        return Ok(env);
    };
    let mut config = Config::from_json(&std::fs::read_to_string(path)?)?;
    // the environment wins over the file
    if env.default_device.is_some() {
        config.default_device = env.default_device;
    }
    Ok(config)
}

fn open(device: &str, config: &Config) -> oplhw::Result<Box<dyn Device>> {
    oplhw::open_device_with(device, config)
}

fn finish(dev: Box<dyn Device>) -> oplhw::Result<()> {
    let dropped = dev.unsupported_writes();
    if dropped > 0 {
        log::warn!("{}: {} register writes not supported", dev.name(), dropped);
    }
    dev.close()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Info { device, json } => {
            let dev = open(&device, &config)?;
            let info = Info {
                backend: dev.name(),
                opl3: dev.is_opl3(),
            };
            dev.close()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!(
                    "{}: {}",
                    info.backend,
                    if info.opl3 { "OPL3" } else { "OPL2" }
                );
            }
        }
        Command::List { json } => {
            let listing = listing();
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("schemes: {}", listing.schemes.join(", "));
                #[cfg(all(feature = "alsa", target_os = "linux"))]
                for entry in &listing.hwdep {
                    let mark = if entry.is_fm() { "*" } else { " " };
                    println!("{} {}  {}", mark, entry.name(), entry.description);
                }
                for port in &listing.parallel_ports {
                    match port.base {
                        Some(base) => println!("  {}  {:#x}", port.name, base),
                        None => println!("  {}", port.name),
                    }
                }
            }
        }
        Command::Reset { device } => {
            let mut dev = open(&device, &config)?;
            dev.reset()?;
            finish(dev)?;
        }
        Command::Write {
            device,
            volume,
            writes,
        } => {
            let mut dev = open(&device, &config)?;
            if let Some(volume) = volume {
                let mut filter = oplhw::create_volume_filter(dev);
                filter.set_volume(volume);
                dev = filter;
            }
            for (reg, val) in writes {
                dev.write(reg, val)?;
            }
            finish(dev)?;
        }
    }

    Ok(())
}
