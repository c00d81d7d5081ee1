//! Host side of the dongle's vendor requests.

use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use icd::battery;
use icd::vendor::{self, GET_BATTERY, SET_MOUSESETTINGS, USB_PID, USB_VID};
use nusb::transfer::{Control, ControlType, Recipient};

const TIMEOUT: Duration = Duration::from_secs(1);

/// Like [`Parser::parse`], but bad arguments exit with code 1.
pub fn parse_args<P: Parser>() -> P {
    match P::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// 0 keeps the current DPI.
    pub dpi: u16,
    /// bInterval, 0 keeps the current one.
    pub interval: u8,
}

impl Settings {
    /// Explicit values win over the configurator-style step and mode.
    pub fn resolve(
        dpi: Option<u16>,
        interval: Option<u8>,
        dpi_step: Option<u8>,
        poll_mode: Option<u8>,
    ) -> Result<Self> {
        let dpi = match (dpi, dpi_step) {
            (Some(dpi), _) => dpi,
            (None, Some(step)) => vendor::dpi_for_step(step),
            (None, None) => 0,
        };
        let interval = match (interval, poll_mode) {
            (Some(interval), _) => interval,
            (None, Some(mode)) => vendor::poll_mode_interval(mode)
                .ok_or_else(|| eyre!("poll mode {mode} out of range 0..=4"))?,
            (None, None) => 0,
        };
        Ok(Self { dpi, interval })
    }
}

/// Battery reading decoded from the raw GET_BATTERY byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Battery {
    pub step: u8,
    pub millivolts: u16,
}

impl Battery {
    pub fn from_status(raw: u8) -> Self {
        let step = battery::step_from_status(raw);
        Self {
            step,
            millivolts: battery::millivolts(step),
        }
    }
}

pub struct Dongle {
    device: nusb::Device,
}

impl Dongle {
    pub fn open() -> Result<Self> {
        let info = nusb::list_devices()?
            .find(|d| d.vendor_id() == USB_VID && d.product_id() == USB_PID)
            .ok_or_else(|| eyre!("no dongle {USB_VID:04x}:{USB_PID:04x} connected"))?;
        let device = info.open().wrap_err("opening the dongle")?;
        Ok(Self { device })
    }

    fn request(request: u8, value: u16, index: u16) -> Control {
        Control {
            control_type: ControlType::Vendor,
            recipient: Recipient::Device,
            request,
            value,
            index,
        }
    }

    /// SET_MOUSESETTINGS. A non-zero interval makes the dongle re-enumerate.
    pub async fn set_settings(&self, settings: Settings) -> Result<()> {
        let device = self.device.clone();
        let control = Self::request(SET_MOUSESETTINGS, settings.dpi, settings.interval.into());
        tokio::task::spawn_blocking(move || device.control_out_blocking(control, &[], TIMEOUT))
            .await?
            .wrap_err("SET_MOUSESETTINGS")?;
        Ok(())
    }

    /// GET_BATTERY, the raw mouse status byte.
    pub async fn battery(&self) -> Result<u8> {
        let device = self.device.clone();
        let control = Self::request(GET_BATTERY, 0, 0);
        let (len, buf) = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 1];
            device
                .control_in_blocking(control, &mut buf, TIMEOUT)
                .map(|len| (len, buf))
        })
        .await?
        .wrap_err("GET_BATTERY")?;
        if len != buf.len() {
            return Err(eyre!("GET_BATTERY returned {len} bytes"));
        }
        Ok(buf[0])
    }
}
