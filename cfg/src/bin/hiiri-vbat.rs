use std::time::Duration;

use clap::Parser;
use hiiri_cfg::{parse_args, Battery, Dongle};

/// Reads the mouse battery level through the dongle.
#[derive(Debug, Parser)]
#[command(name = "hiiri-vbat")]
struct Cli {
    /// Keep polling every SECS seconds.
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli: Cli = parse_args();
    let dongle = Dongle::open()?;

    let Some(secs) = cli.watch else {
        return report(&dongle).await;
    };
    let mut ticks = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        ticks.tick().await;
        report(&dongle).await?;
    }
}

async fn report(dongle: &Dongle) -> color_eyre::Result<()> {
    let raw = dongle.battery().await?;
    let battery = Battery::from_status(raw);
    println!(
        "raw {raw:#04x} step {} ~{} mV",
        battery.step, battery.millivolts
    );
    Ok(())
}
