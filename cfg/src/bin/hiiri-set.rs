use clap::Parser;
use hiiri_cfg::{parse_args, Dongle, Settings};

/// Sends DPI and USB polling interval to the mouse through the dongle.
#[derive(Debug, Parser)]
#[command(name = "hiiri-set")]
struct Cli {
    /// Sensor resolution, 0 keeps the current one.
    #[arg(required_unless_present = "dpi_step")]
    dpi: Option<u16>,

    /// bInterval of the HID endpoint, 0 keeps the current one.
    #[arg(required_unless_present = "poll_mode")]
    interval: Option<u8>,

    /// Polling mode 0..=4, for bInterval 0 (keep), 8, 4, 2 or 1.
    #[arg(long)]
    poll_mode: Option<u8>,

    /// DPI slider step, for 400 * 2^step DPI.
    #[arg(long)]
    dpi_step: Option<u8>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli: Cli = parse_args();
    let settings = Settings::resolve(cli.dpi, cli.interval, cli.dpi_step, cli.poll_mode)?;

    let dongle = Dongle::open()?;
    dongle.set_settings(settings).await?;
    println!("dpi {} interval {}", settings.dpi, settings.interval);
    Ok(())
}
