//! # CiA 402 Synchronized Spin
//!
//! Enables a set of CiA 402 drives over a fieldbus master, spins them at a
//! common velocity magnitude for a fixed time, then stops and disables them.
//!
//! # Usage
//!
//! ```bash
//! # Reference run from the default config
//! cia402_spin
//!
//! # Two devices against the simulation master, verbose
//! cia402_spin --simulate -d 1 -d 2 -v
//!
//! # Write a JSON session report
//! cia402_spin --config spin.toml --report /tmp/spin.json
//! ```

#![deny(warnings)]

use cia402_common::config::{ConfigError, ConfigLoader, DeviceSet, SpinConfig};
use cia402_common::consts::DEFAULT_CONFIG_PATH;
use cia402_spin::core::SpinCore;
use cia402_spin::master_registry::MasterRegistry;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when the configuration cannot be used.
const EXIT_CONFIG: i32 = 2;

/// CiA 402 Synchronized Spin - enable, spin, stop and disable a set of drives
#[derive(Parser, Debug)]
#[command(name = "cia402_spin")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Synchronized velocity run for CiA 402 drives")]
#[command(long_about = None)]
struct Args {
    /// Path to run configuration (spin.toml). Missing file means defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Network interface of the fieldbus master
    #[arg(short, long)]
    interface: Option<String>,

    /// Master backend name
    #[arg(short, long)]
    master: Option<String>,

    /// Force the simulation master
    #[arg(short = 's', long)]
    simulate: bool,

    /// Device id (can be specified multiple times, replaces the configured set)
    #[arg(short, long = "device", action = clap::ArgAction::Append)]
    devices: Vec<u16>,

    /// Velocity magnitude
    #[arg(long)]
    velocity: Option<i32>,

    /// Hold duration in milliseconds
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Write the session report as JSON to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let loaded = load_config(&args);
    setup_tracing(&args, loaded.as_ref().ok().map(|(config, _)| config));

    let config = match loaded {
        Ok((config, true)) => {
            info!("Loaded configuration from {:?}", args.config);
            config
        }
        Ok((config, false)) => {
            warn!("Config file {:?} not found, using defaults", args.config);
            config
        }
        Err(e) => {
            error!("Configuration error in {:?}: {}", args.config, e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    match run(&args, config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Spin failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args, config: SpinConfig) -> Result<i32, Box<dyn std::error::Error>> {
    info!("CiA 402 spin v{} starting...", env!("CARGO_PKG_VERSION"));

    let master_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation".to_string()
    } else {
        config.bus.master.clone()
    };

    let core = match SpinCore::new(config) {
        Ok(core) => core,
        Err(e) => {
            error!("Configuration error: {}", e);
            return Ok(EXIT_CONFIG);
        }
    };

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received interrupt, ending hold");
        running.store(false, Ordering::SeqCst);
    })?;

    let registry = MasterRegistry::with_builtin();
    if !registry.contains(&master_name) {
        error!("Unknown master '{}', available: {:?}", master_name, registry.names());
        return Ok(EXIT_CONFIG);
    }
    let mut master = registry.create_master(&master_name, core.config())?;
    info!("Using master backend '{}'", master.name());

    let report = core.run(&mut *master);

    if let Some(path) = &args.report {
        std::fs::write(path, report.to_json()?)?;
        info!("Session report written to {:?}", path);
    }

    match report.error() {
        None => info!("CiA 402 spin complete"),
        Some(err) => error!("CiA 402 spin failed: {}", err),
    }
    Ok(report.exit_code())
}

/// Load the config file and apply CLI overrides.
///
/// A missing file yields defaults; the flag reports whether the file was read.
fn load_config(args: &Args) -> Result<(SpinConfig, bool), ConfigError> {
    let (mut config, from_file) = match SpinConfig::load(&args.config) {
        Ok(config) => (config, true),
        Err(ConfigError::FileNotFound) => (SpinConfig::default(), false),
        Err(e) => return Err(e),
    };

    if let Some(interface) = &args.interface {
        config.bus.interface = interface.clone();
    }
    if let Some(master) = &args.master {
        config.bus.master = master.clone();
    }
    if !args.devices.is_empty() {
        config.motion.devices = DeviceSet::new(&args.devices)?;
    }
    if let Some(velocity) = args.velocity {
        config.motion.velocity = velocity;
    }
    if let Some(hold_ms) = args.hold_ms {
        config.motion.hold_ms = hold_ms;
    }
    Ok((config, from_file))
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, config: Option<&SpinConfig>) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        let default = config.map_or("info", |c| c.shared.log_level.as_directive());
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cia402_common::consts::{DEFAULT_INTERFACE, DEFAULT_MASTER, DEFAULT_VELOCITY};
    use std::io::Write;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["cia402_spin", "--config", "/nonexistent/spin.toml"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (config, from_file) = load_config(&parse(&[])).unwrap();
        assert!(!from_file);
        assert_eq!(config.bus.interface, DEFAULT_INTERFACE);
        assert_eq!(config.bus.master, DEFAULT_MASTER);
        assert_eq!(config.motion.devices.ids(), &[1, 2, 3, 4]);
        assert_eq!(config.motion.velocity, DEFAULT_VELOCITY);
    }

    #[test]
    fn cli_overrides_replace_configured_values() {
        let args = parse(&[
            "--interface",
            "eth7",
            "--master",
            "bench",
            "-d",
            "3",
            "--device",
            "1",
            "--velocity",
            "1200",
            "--hold-ms",
            "250",
        ]);
        let (config, _) = load_config(&args).unwrap();

        assert_eq!(config.bus.interface, "eth7");
        assert_eq!(config.bus.master, "bench");
        assert_eq!(config.motion.devices.ids(), &[3, 1]);
        assert_eq!(config.motion.velocity, 1200);
        assert_eq!(config.motion.hold_ms, 250);
    }

    #[test]
    fn cli_overrides_apply_on_top_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[motion]\ndevices = [1, 2]\nvelocity = 500\nhold_ms = 10").unwrap();
        let path = file.path().to_str().unwrap();

        let args = Args::try_parse_from(["cia402_spin", "-c", path, "--velocity", "700"]).unwrap();
        let (config, from_file) = load_config(&args).unwrap();

        assert!(from_file);
        assert_eq!(config.motion.devices.ids(), &[1, 2]);
        assert_eq!(config.motion.velocity, 700);
        assert_eq!(config.motion.hold_ms, 10);
    }

    #[test]
    fn duplicate_device_override_is_rejected() {
        let args = parse(&["-d", "1", "-d", "1"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn simulate_flag_parses() {
        let args = parse(&["--simulate", "--json"]);
        assert!(args.simulate);
        assert!(args.json);
        assert!(args.report.is_none());
    }
}
