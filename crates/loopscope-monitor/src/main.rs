//! Loopscope Monitor - loop waveform of the default audio input, in a terminal
//!
//! Captures audio with CPAL, feeds it through the analysis bridge on the
//! audio thread and redraws a one-line loop strip at the configured refresh
//! rate on the main thread.
//!
//! ## Command line flags
//!
//! - `--config <path>`: config file (default `~/.config/loopscope/monitor.yaml`)
//! - `--list-devices`: print input device names and exit
//! - `--save-config`: write the effective config to the config path and exit
//! - `--seconds <n>`: stop after `n` seconds

mod audio;
mod config;
mod render;
mod transport;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam::channel::{after, never, tick, Receiver};

use config::{default_monitor_config_path, MonitorConfig};
use loopscope_core::bridge;
use loopscope_core::config::{load_config, read_config, save_config};
use render::StripRenderer;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    config_path: Option<PathBuf>,
    list_devices: bool,
    save_config: bool,
    seconds: Option<f64>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config_path = Some(PathBuf::from(path));
                }
                "--list-devices" => parsed.list_devices = true,
                "--save-config" => parsed.save_config = true,
                "--seconds" => {
                    let value = args.next().context("--seconds needs a number")?;
                    let seconds: f64 = value
                        .parse()
                        .with_context(|| format!("Invalid --seconds value: {}", value))?;
                    if !seconds.is_finite() || seconds <= 0.0 {
                        bail!("--seconds must be positive, got {}", seconds);
                    }
                    parsed.seconds = Some(seconds);
                }
                other => bail!("Unknown argument: {}", other),
            }
        }
        Ok(parsed)
    }
}

/// An explicit `--config` file must parse; the default location falls back to
/// defaults with a warning
fn load_monitor_config(explicit: Option<&Path>) -> Result<(MonitorConfig, PathBuf)> {
    match explicit {
        Some(path) => {
            let config = read_config(path)?.unwrap_or_default();
            Ok((config, path.to_path_buf()))
        }
        None => {
            let path = default_monitor_config_path();
            Ok((load_config(&path), path))
        }
    }
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for per-frame diagnostics
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    if args.list_devices {
        for name in audio::list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let (config, config_path) = load_monitor_config(args.config_path.as_deref())?;

    if args.save_config {
        save_config(&config, &config_path)?;
        println!("Config written to {}", config_path.display());
        return Ok(());
    }

    log::info!("loopscope-monitor starting up");

    let (producer, consumer) = bridge(&config.bridge);
    consumer.set_time_mode(config.display.time_mode);

    let input = audio::start_input(&config.input, producer)?;
    println!(
        "Monitoring '{}' ({} ch, {} Hz). Ctrl+C to quit.",
        input.device_name(),
        input.channels(),
        input.sample_rate()
    );

    let mut renderer = StripRenderer::new(consumer, &config.display);
    let ticker = tick(config.display.refresh_period());
    let deadline: Receiver<Instant> = match args.seconds {
        Some(seconds) => after(Duration::from_secs_f64(seconds)),
        None => never(),
    };

    let mut stdout = std::io::stdout();
    loop {
        crossbeam::select! {
            recv(ticker) -> now => {
                let Ok(now) = now else { break };
                if let Some(line) = renderer.render(now) {
                    write!(stdout, "\r{}", line)?;
                    stdout.flush()?;
                }
            }
            recv(deadline) -> _ => break,
        }
    }

    writeln!(stdout)?;
    log::info!("Stopped after {} loop resets", renderer.resets());
    drop(input);
    Ok(())
}
