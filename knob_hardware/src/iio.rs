//! Linux Industrial I/O ADC backend.
//!
//! Reads one channel through sysfs (`/sys/bus/iio/devices/iio:deviceN/in_voltageM_raw`).
//! The kernel performs a single conversion per read, so no data-ready wait is
//! needed; results wider than the ladder's 10-bit range are shifted down.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use knob_traits::SampleSource;

use crate::error::{HwError, Result};

#[derive(Debug)]
pub struct IioAdc {
    raw_path: PathBuf,
    /// Right shift applied to bring the channel's native resolution to 10 bits.
    shift: u32,
}

impl IioAdc {
    /// Open channel `channel` of the IIO device directory `device`.
    pub fn open(device: impl AsRef<Path>, channel: u8, resolution_bits: u32) -> Result<Self> {
        let raw_path = device
            .as_ref()
            .join(format!("in_voltage{channel}_raw"));
        if !raw_path.exists() {
            return Err(HwError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("open iio channel {}", raw_path.display()),
            )));
        }
        let shift = resolution_bits.saturating_sub(10);
        tracing::info!(path = %raw_path.display(), resolution_bits, "iio adc opened");
        Ok(Self { raw_path, shift })
    }

    fn convert(&self) -> Result<u16> {
        let text = std::fs::read_to_string(&self.raw_path)?;
        let value: u32 = text
            .trim()
            .parse()
            .map_err(|e| HwError::Parse(format!("{:?}: {e}", text.trim())))?;
        Ok(u16::try_from((value >> self.shift).min(1023)).unwrap_or(1023))
    }
}

impl SampleSource for IioAdc {
    fn read(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let started = Instant::now();
        let value = self.convert()?;
        if started.elapsed() > timeout {
            tracing::warn!(?timeout, "iio conversion exceeded timeout");
            return Err(Box::new(HwError::Timeout));
        }
        Ok(value)
    }
}
