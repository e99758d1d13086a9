//! Motion Coordinator binary: single-threaded cooperative event loop over
//! the serial command pipeline and I²C side-band (SPEC_FULL.md §5).

mod engine_stub;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use engine_stub::StubEngine;
use mc_coordinator::config::AppConfig;
use mc_coordinator::error::CoordinatorError;
use mc_coordinator::MotionCoordinator;
use mc_firmware::LinuxI2cSideband;

/// Motion Coordinator — composes the state store, firmware link, and
/// planner adapter into the machine control surface.
#[derive(Parser, Debug)]
#[command(name = "mc_coordinator")]
#[command(version)]
#[command(about = "Motion control coordinator event loop")]
struct Args {
    /// Path to the coordinator's TOML configuration file.
    #[arg(short, long, default_value = "/etc/mc/coordinator.toml")]
    config: PathBuf,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,
}

fn setup_tracing(args: &Args, configured: mc_common::config::LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            mc_common::config::LogLevel::Trace => Level::TRACE,
            mc_common::config::LogLevel::Debug => Level::DEBUG,
            mc_common::config::LogLevel::Info => Level::INFO,
            mc_common::config::LogLevel::Warn => Level::WARN,
            mc_common::config::LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match AppConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    setup_tracing(&args, config.shared.log_level);

    if let Err(e) = run(config).await {
        error!("coordinator exited with error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), CoordinatorError> {
    info!("mc_coordinator v{} starting", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.preplanner.upload_dir).ok();
    std::fs::create_dir_all(&config.preplanner.plans_dir).ok();
    std::fs::create_dir_all(&config.preplanner.meta_dir).ok();

    let serial = tokio_serial::new(config.serial.port.as_str(), config.serial.baud)
        .open_native_async()
        .map_err(|e| CoordinatorError::SerialOpen {
            path: config.serial.port.clone(),
            source: std::io::Error::other(e),
        })?;
    let (mut serial_reader, mut serial_writer) = tokio::io::split(serial);

    let i2c_bus = LinuxI2cSideband::open(config.i2c.bus_path.clone(), config.i2c.address)?;
    let engine = StubEngine::new();
    let mut coordinator = MotionCoordinator::new(engine, i2c_bus);

    coordinator.connect().await?;

    let mut debounce = tokio::time::interval(Duration::from_millis(mc_common::consts::DEBOUNCE_MS));
    let mut heartbeat = tokio::time::interval(Duration::from_secs(60 * 60));
    let mut read_buf = [0u8; 1024];

    loop {
        let write_chunk = coordinator.poll_write().map(<[u8]>::to_vec);

        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }

            n = serial_reader.read(&mut read_buf) => {
                match n {
                    Ok(0) => {
                        warn!("serial port closed by peer");
                        break;
                    }
                    Ok(n) => {
                        if let Err(e) = coordinator.feed_read_bytes(&read_buf[..n]).await {
                            warn!("error applying telemetry: {e}");
                        }
                    }
                    Err(e) => {
                        warn!("serial read error: {e}");
                        tokio::time::sleep(Duration::from_millis(mc_common::consts::RECONNECT_MS)).await;
                    }
                }
            }

            result = async { serial_writer.write(write_chunk.as_ref().unwrap()).await }, if write_chunk.is_some() => {
                match result {
                    Ok(n) => coordinator.advance_write(n),
                    Err(e) => warn!("serial write error: {e}"),
                }
            }

            _ = debounce.tick() => {
                if coordinator.debounce_armed() {
                    if let Err(e) = coordinator.notify_and_process().await {
                        warn!("error processing state changes: {e}");
                    }
                }
            }

            _ = heartbeat.tick() => {
                info!("mc_coordinator heartbeat");
            }
        }
    }

    Ok(())
}
