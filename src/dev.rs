//! Input device discovery, exclusive grab, and capture loops.
//!
//! Devices are matched against the `--keyboards` substrings by their
//! advertised name (any match wins, the virtual output excludes itself) and
//! grabbed exclusively so the desktop never sees their raw events. Each
//! grabbed device gets its own OS thread running a blocking read loop; a
//! read error ends only that loop.
//!
//! Required permissions: the process user must be able to read
//! /dev/input/event* and write /dev/uinput, typically via the `input` group:
//!   sudo usermod -aG input $USER   (then log out and back in)

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use evdev::Device;

use crate::engine::ScriptEngine;
use crate::error::Error;
use crate::event::RawEvent;
use crate::output::VirtualOutput;
use crate::pipeline::Pipeline;

// ---------------------------------------------------------------------------
// Discovery and matching
// ---------------------------------------------------------------------------

/// Path and advertised name of every device under /dev/input.
pub fn available_devices() -> Vec<(PathBuf, String)> {
    evdev::enumerate()
        .map(|(path, device)| {
            let name = device.name().unwrap_or("unnamed").to_owned();
            (path, name)
        })
        .collect()
}

/// Selects the devices whose name contains any of the patterns.
///
/// Matches are OR; enumeration order already makes paths unique. The device
/// named `exclude_name` is the virtual output -- grabbing our own sink would
/// feed every synthesized event back into the pipeline.
pub fn match_devices<'a>(
    devices: &'a [(PathBuf, String)],
    patterns: &[String],
    exclude_name: &str,
) -> Vec<&'a (PathBuf, String)> {
    devices
        .iter()
        .filter(|(_, name)| name != exclude_name)
        .filter(|(_, name)| {
            patterns
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .any(|p| name.contains(p))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Grabbed devices
// ---------------------------------------------------------------------------

struct GrabbedDevice {
    name: String,
    path: PathBuf,
    device: Device,
}

impl Drop for GrabbedDevice {
    fn drop(&mut self) {
        let _ = self.device.ungrab();
    }
}

pub struct DeviceManager {
    devices: Vec<GrabbedDevice>,
}

impl DeviceManager {
    /// Opens and exclusively grabs every matching device.
    ///
    /// A device that fails to open or grab is logged and skipped; the whole
    /// startup fails only when nothing remains, in which case the available
    /// device names are listed to help fix the patterns.
    pub fn grab_matching(patterns: &[String], exclude_name: &str) -> Result<Self, Error> {
        let known = available_devices();
        if known.is_empty() {
            log::error!(
                "capture: no devices visible under /dev/input; \
                 is this user in the 'input' group?"
            );
        }

        let mut devices = Vec::new();
        for (path, name) in match_devices(&known, patterns, exclude_name) {
            match open_and_grab(path) {
                Ok(device) => {
                    log::info!("capture: grabbed {:?} ({})", name, path.display());
                    devices.push(GrabbedDevice {
                        name: name.clone(),
                        path: path.clone(),
                        device,
                    });
                }
                Err(e) => {
                    log::warn!("capture: skipping {:?}: {e}", name);
                }
            }
        }

        if devices.is_empty() {
            log::info!("capture: available devices:");
            for (path, name) in &known {
                log::info!("capture:   {:?} ({})", name, path.display());
            }
            return Err(Error::NoKeyboards {
                patterns: patterns.to_vec(),
            });
        }
        Ok(Self { devices })
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Spawns one capture thread per grabbed device. Each thread owns its
    /// device and pipeline; only the engine and output are shared.
    pub fn spawn_loops(
        self,
        engine: Arc<ScriptEngine>,
        output: Arc<VirtualOutput>,
    ) -> Vec<JoinHandle<()>> {
        self.devices
            .into_iter()
            .map(|dev| {
                let pipeline = Pipeline::new(engine.clone(), output.clone());
                thread::Builder::new()
                    .name(format!("capture-{}", dev.name))
                    .spawn(move || run_device_loop(dev, pipeline))
                    .expect("spawn capture thread")
            })
            .collect()
    }
}

fn open_and_grab(path: &std::path::Path) -> Result<Device, Error> {
    let mut device = Device::open(path).map_err(|source| Error::Device {
        path: path.to_path_buf(),
        source,
    })?;
    device.grab().map_err(|source| Error::Device {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(device)
}

// ---------------------------------------------------------------------------
// Capture loop
// ---------------------------------------------------------------------------

/// Blocking read loop for one device. Runs until a read error (device
/// unplugged, or the fd closed on shutdown) ends it.
fn run_device_loop(mut dev: GrabbedDevice, mut pipeline: Pipeline) {
    log::info!("capture: processing events from {:?}", dev.name);
    loop {
        match dev.device.fetch_events() {
            Ok(events) => {
                for ev in events {
                    pipeline.handle(RawEvent::from_input(&ev));
                }
            }
            Err(e) => {
                log::error!(
                    "capture: read error on {:?} ({}): {e}",
                    dev.name,
                    dev.path.display()
                );
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
