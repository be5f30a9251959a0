//! Ansaphone - a two-button GPIO answering machine
//!
//! Run with `ansaphone` or `ansaphone run` to start the controller.
//! Use `ansaphone devices` to list audio devices.
//! Use `ansaphone config --init` to write the default config file.

use ansaphone::{audio, config, device, gpio, machine, store};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ansaphone")]
#[command(author, version, about = "Two-button GPIO answering machine for Raspberry Pi")]
#[command(long_about = "
Ansaphone turns a Raspberry Pi with two buttons and a USB headset into a
landline-style answering machine.

WIRING:
  Both buttons are read active-low against the internal pull-ups.
  Hook switch on BCM pin 21 (default), play button on BCM pin 20.

USAGE:
  Pick up the receiver (hook active) to hear the greeting and leave a
  message; hang up to save it. Hold the play button while picking up to
  hear the last message back, then hang up to reset.
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller (default if no command specified)
    Run,

    /// List audio capture and playback devices
    Devices,

    /// Show the effective configuration
    Config {
        /// Write the default config file if missing
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("ansaphone={},warn", log_level))),
        )
        .with_target(false)
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_machine(config).await?,
        Commands::Devices => device::log_devices(&cpal::default_host()),
        Commands::Config { init } => show_config(&config, init)?,
    }

    Ok(())
}

/// Wire up the hardware and run the controller until interrupted
async fn run_machine(config: config::Config) -> anyhow::Result<()> {
    // Startup device enumeration, matching the console contract.
    device::log_devices(&cpal::default_host());

    let sampler = gpio::GpioSampler::new(&config.gpio)?;
    let adapter = audio::create_adapter(&config.audio);
    let recordings = store::RecordingStore::new(
        config.storage.dir.clone(),
        config.storage.prefix.clone(),
    );

    let mut machine = machine::Machine::new(config, Box::new(sampler), adapter, recordings);
    machine.run().await?;

    tracing::info!("Exiting the program.");
    Ok(())
}

/// Show current configuration, optionally writing the default file first
fn show_config(config: &config::Config, init: bool) -> anyhow::Result<()> {
    if init {
        match config::Config::default_path() {
            Some(path) => {
                if config::init_config_file(&path)? {
                    println!("Created: {:?}", path);
                } else {
                    println!("Config file exists: {:?}", path);
                }
            }
            None => println!("Cannot determine the config directory on this system."),
        }
        println!();
    }

    println!("Current Configuration\n");

    println!("[gpio]");
    println!("  hook_pin = {}", config.gpio.hook_pin);
    println!("  play_pin = {}", config.gpio.play_pin);
    println!("  poll_interval_ms = {}", config.gpio.poll_interval_ms);

    println!("\n[audio]");
    println!("  output_device = {:?}", config.audio.output_device);
    println!("  sample_rate = {}", config.audio.sample_rate);
    println!("  chunk_frames = {}", config.audio.chunk_frames);

    println!("\n[storage]");
    println!("  dir = {:?}", config.storage.dir);
    println!("  prefix = {:?}", config.storage.prefix);
    println!("  greeting = {:?}", config.storage.greeting);

    println!("\n---");
    println!(
        "Config file: {:?}",
        config::Config::default_path().unwrap_or_else(|| PathBuf::from("(not found)"))
    );

    Ok(())
}
