//! CLI application for controlling LIFX lights.
//!
//! This demo drives the public device API from the command line: discover
//! devices, inspect state, and change power or color.
//!
//! Run with: cargo run --example lifx_cli -- --help

use std::net::Ipv4Addr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lifx_lan_rs::{Hsbk, Light, MacAddress, PowerLevel, colors, discover_devices};

#[derive(Parser)]
#[command(name = "lifx-cli")]
#[command(about = "Control LIFX smart lights from the command line", long_about = None)]
struct Cli {
    /// Mac address of the target light (not required for discover)
    #[arg(short, long, global = true)]
    mac: Option<MacAddress>,

    /// IP address of the target light; broadcast is used when omitted
    #[arg(short, long, global = true)]
    ip: Option<Ipv4Addr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover all LIFX devices on the network
    Discover {
        /// Discovery timeout in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Refresh and print the current state of the light
    Status,

    /// Print wifi signal and device uptime
    Info,

    /// Turn the light on
    On,

    /// Turn the light off
    Off,

    /// Toggle the light on/off
    Toggle,

    /// Set a named color (red, blue, warm_white, ...)
    Color {
        /// Preset color name
        name: String,
        /// Fade duration in milliseconds
        #[arg(short, long, default_value = "0")]
        duration: u32,
    },

    /// Set an HSBK color from raw channel values
    Hsbk {
        hue: u16,
        saturation: u16,
        brightness: u16,
        kelvin: u16,
        /// Fade duration in milliseconds
        #[arg(short, long, default_value = "0")]
        duration: u32,
    },

    /// Set the device label
    Label { label: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Discover { timeout } = cli.command {
        let devices = discover_devices(Duration::from_secs(timeout)).await?;
        if devices.is_empty() {
            return Err(lifx_lan_rs::Error::NoDevices.into());
        }
        println!("Found {} device(s)", devices.len());
        for found in devices {
            println!("  {} - {}:{}", found.mac_addr, found.ip_addr, found.port);
        }
        return Ok(());
    }

    let mac = cli.mac.ok_or("a --mac address is required")?;
    let light = Light::new(mac, cli.ip);

    match cli.command {
        Commands::Discover { .. } => unreachable!("handled above"),
        Commands::Status => {
            if !light.refresh().await? {
                eprintln!("warning: some fields did not respond");
            }
            print!("{}", light.describe().await);
            if let Some(color) = light.state().await.color {
                println!("  Color (HSBK): {color:?}");
            }
        }
        Commands::Info => {
            let wifi = light.wifi_info().await?;
            let time = light.time_info().await?;
            println!("Wifi Signal Strength (mW): {}", wifi.signal);
            println!("Wifi TX (bytes): {}", wifi.tx);
            println!("Wifi RX (bytes): {}", wifi.rx);
            println!("Uptime (hours): {:.2}", time.uptime as f64 / 3.6e12);
        }
        Commands::On => light.set_power(PowerLevel::On, 0, false).await?,
        Commands::Off => light.set_power(PowerLevel::Off, 0, false).await?,
        Commands::Toggle => {
            let power = light.get_power().await?;
            let next = match power {
                PowerLevel::On => PowerLevel::Off,
                PowerLevel::Off => PowerLevel::On,
            };
            light.set_power(next, 0, false).await?;
            println!("Power: {next:?}");
        }
        Commands::Color { name, duration } => {
            let color = colors::by_name(&name).ok_or_else(|| format!("unknown color {name}"))?;
            light.set_color(color, duration, false).await?;
        }
        Commands::Hsbk {
            hue,
            saturation,
            brightness,
            kelvin,
            duration,
        } => {
            light
                .set_color(Hsbk::new(hue, saturation, brightness, kelvin), duration, false)
                .await?;
        }
        Commands::Label { label } => light.set_label(&label).await?,
    }

    Ok(())
}
