// SPDX-License-Identifier: GPL-3.0-only

//! Torch LED control via Linux sysfs
//!
//! Discovers LEDs exposed at `/sys/class/leds/*:flash` or `*:torch` and
//! drives them through the `brightness` file (torch mode), which is
//! group-writable on most distributions, unlike the root-only strobe
//! interface.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default sysfs LED class directory
pub const SYSFS_LEDS_DIR: &str = "/sys/class/leds";

/// A torch-capable LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct TorchDevice {
    /// e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    max_brightness: u32,
    name: String,
}

impl TorchDevice {
    /// Probe one LED class entry
    ///
    /// Returns `None` unless the entry is a flash or torch LED with a
    /// positive `max_brightness` and a writable `brightness` file.
    fn probe(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        if !(name.ends_with(":flash") || name.ends_with(":torch")) {
            return None;
        }

        let max_brightness = read_max_brightness(&path)
            .inspect_err(|e| warn!(led = %name, error = %e, "Unusable max_brightness"))
            .ok()?;

        if let Err(e) = std::fs::OpenOptions::new()
            .write(true)
            .open(path.join("brightness"))
        {
            warn!(led = %name, error = %e, "Torch LED found but not writable");
            return None;
        }

        Some(Self {
            path,
            max_brightness,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a raw brightness, capped at `max_brightness`
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let value = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), value.to_string())
    }

    /// Full brightness or off
    pub fn switch(&self, on: bool) -> io::Result<()> {
        self.set_brightness(if on { self.max_brightness } else { 0 })
    }
}

fn read_max_brightness(led: &Path) -> io::Result<u32> {
    let raw = std::fs::read_to_string(led.join("max_brightness"))?;
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("max_brightness {:?}", raw.trim()),
        )),
    }
}

/// The set of controllable torch LEDs on this machine
#[derive(Debug, Clone, Default)]
pub struct TorchLeds {
    devices: Vec<TorchDevice>,
}

impl TorchLeds {
    /// Scan the default sysfs directory
    pub fn discover() -> Self {
        Self::discover_in(Path::new(SYSFS_LEDS_DIR))
    }

    /// Scan `leds_dir` for usable `*:flash`/`*:torch` entries
    pub fn discover_in(leds_dir: &Path) -> Self {
        let entries = match std::fs::read_dir(leds_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %leds_dir.display(), error = %e, "No LED class, torch unavailable");
                return Self::default();
            }
        };

        let mut devices: Vec<TorchDevice> = entries
            .flatten()
            .filter_map(|entry| TorchDevice::probe(entry.path()))
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        for dev in &devices {
            info!(led = %dev.name, max_brightness = dev.max_brightness, "Discovered torch LED");
        }
        Self { devices }
    }

    /// Whether any controllable torch LED was found
    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Discovered devices
    pub fn devices(&self) -> &[TorchDevice] {
        &self.devices
    }

    /// Switch every LED on (full brightness) or off
    ///
    /// Fails only if no LED accepted the change.
    pub fn set(&self, on: bool) -> io::Result<()> {
        let mut last_error = None;
        let mut applied = 0usize;
        for dev in &self.devices {
            match dev.switch(on) {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(device = %dev.name, error = %e, on, "Failed to switch torch LED");
                    last_error = Some(e);
                }
            }
        }
        match (applied, last_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(io::Error::new(io::ErrorKind::NotFound, "no torch LED")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(dir: &Path, name: &str, max: &str) {
        let led = dir.join(name);
        std::fs::create_dir_all(&led).unwrap();
        std::fs::write(led.join("max_brightness"), max).unwrap();
        std::fs::write(led.join("brightness"), "0").unwrap();
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fake_led(dir.path(), "yellow:flash", "100\n");
        fake_led(dir.path(), "white:torch", "255\n");
        fake_led(dir.path(), "input3::capslock", "1\n");
        fake_led(dir.path(), "broken:flash", "0\n");

        let leds = TorchLeds::discover_in(dir.path());
        let names: Vec<&str> = leds.devices().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["white:torch", "yellow:flash"]);
    }

    #[test]
    fn test_set_writes_brightness() {
        let dir = tempfile::tempdir().unwrap();
        fake_led(dir.path(), "white:flash", "200");

        let leds = TorchLeds::discover_in(dir.path());
        leds.set(true).unwrap();
        let value = std::fs::read_to_string(dir.path().join("white:flash/brightness")).unwrap();
        assert_eq!(value, "200");

        leds.set(false).unwrap();
        let value = std::fs::read_to_string(dir.path().join("white:flash/brightness")).unwrap();
        assert_eq!(value, "0");
    }

    #[test]
    fn test_missing_directory_has_no_devices() {
        let leds = TorchLeds::discover_in(Path::new("/nonexistent/leds"));
        assert!(!leds.has_devices());
        assert!(leds.set(true).is_err());
    }
}
