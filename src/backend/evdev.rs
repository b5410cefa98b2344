//! # Linux evdev Backend
//!
//! Joystick discovery, event draining and axis sampling through the Linux
//! evdev interface.
//!
//! ## Device Detection
//!
//! A device counts as a joystick when it reports an `ABS_X` axis and at least
//! one button in the joystick/gamepad range (`BTN_JOYSTICK..BTN_DIGI`).
//! Devices are ordered by their `/dev/input/eventX` path.
//!
//! ## Indexing
//!
//! | Input | Index order |
//! |-------|-------------|
//! | Axes | supported absolute axes by code, hats (`ABS_HAT0X..ABS_HAT3Y`) excluded |
//! | Buttons | keys from `BTN_JOYSTICK` upward, then `BTN_MISC..BTN_JOYSTICK` |
//!
//! With a typical Xbox-style pad this puts the left stick on axes (0, 1) and
//! the right stick on (3, 4); some drivers report it on (2, 3).

use async_trait::async_trait;
use evdev::{AbsoluteAxisType, Device, EventStream, InputEvent, InputEventKind, Key};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DeviceHandle, InputBackend, RawEvent};
use crate::error::{PadError, Result};

/// Default directory scanned for event devices
const INPUT_DIR: &str = "/dev/input";

/// First miscellaneous button code
const BTN_MISC: u16 = 0x100;
/// First joystick button code
const BTN_JOYSTICK: u16 = 0x120;
/// First code past the gamepad range
const BTN_DIGI: u16 = 0x140;

/// Hat axis codes (`ABS_HAT0X..=ABS_HAT3Y`)
const ABS_HAT_FIRST: u16 = 0x10;
const ABS_HAT_LAST: u16 = 0x17;

/// Joystick backend over `/dev/input/event*` devices
pub struct EvdevBackend {
    candidates: Vec<(PathBuf, Device)>,
    discovered: usize,
    opened: Option<OpenedDevice>,
}

struct OpenedDevice {
    index: usize,
    path: PathBuf,
    stream: EventStream,
    axes: Vec<AbsoluteAxisType>,
    discrete: DiscreteTranslator,
}

/// Turns key and hat events into discrete events
///
/// Buttons are indexed by their position in `buttons`. The hat position is
/// kept between events so each motion reports the combined (x, y) state.
#[derive(Debug, Clone)]
struct DiscreteTranslator {
    buttons: Vec<Key>,
    hat: (i8, i8),
}

impl std::fmt::Debug for EvdevBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevBackend")
            .field("discovered", &self.discovered)
            .field("opened", &self.opened.as_ref().map(|d| d.path.display().to_string()))
            .finish_non_exhaustive()
    }
}

impl EvdevBackend {
    /// Scan `/dev/input` for joysticks
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the input directory cannot be read.
    pub fn new() -> Result<Self> {
        Self::with_input_dir(INPUT_DIR)
    }

    /// Scan a custom input directory for joysticks
    ///
    /// Devices that cannot be opened (usually permission denied) are skipped.
    pub fn with_input_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| {
                PadError::BackendUnavailable(format!("Failed to read {}: {}", dir.display(), e))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("event"))
                    .unwrap_or(false)
            })
            .collect();

        // Deterministic ordering so index 0 is stable across runs
        entries.sort();

        let mut candidates = Vec::new();
        for path in entries {
            match Device::open(&path) {
                Ok(device) => {
                    if is_joystick(&device) {
                        info!(
                            "Found joystick at {}: {}",
                            path.display(),
                            device.name().unwrap_or("unnamed")
                        );
                        candidates.push((path, device));
                    } else {
                        debug!("Skipping non-joystick device {}", path.display());
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Ok(Self {
            discovered: candidates.len(),
            candidates,
            opened: None,
        })
    }

    fn opened_mut(&mut self, handle: &DeviceHandle) -> Result<&mut OpenedDevice> {
        match self.opened.as_mut() {
            Some(opened) if opened.index == handle.index => Ok(opened),
            _ => Err(PadError::Backend(format!(
                "device {} is not open",
                handle.index
            ))),
        }
    }
}

impl DiscreteTranslator {
    fn new(buttons: Vec<Key>) -> Self {
        Self {
            buttons,
            hat: (0, 0),
        }
    }

    fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// Convert a raw evdev event into a discrete event, tracking hat state
    fn translate(&mut self, event: &InputEvent) -> Option<RawEvent> {
        match event.kind() {
            InputEventKind::Key(key) => {
                let button = self.buttons.iter().position(|k| *k == key)? as u32;
                match event.value() {
                    1 => Some(RawEvent::ButtonPressed { button }),
                    0 => Some(RawEvent::ButtonReleased { button }),
                    // Autorepeat
                    _ => None,
                }
            }
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_HAT0X) => {
                self.hat.0 = event.value().signum() as i8;
                Some(RawEvent::HatMotion { x: self.hat.0, y: self.hat.1 })
            }
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_HAT0Y) => {
                // evdev reports up as -1
                self.hat.1 = -(event.value().signum() as i8);
                Some(RawEvent::HatMotion { x: self.hat.0, y: self.hat.1 })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl InputBackend for EvdevBackend {
    fn device_count(&mut self) -> Result<usize> {
        Ok(self.discovered)
    }

    fn open_device(&mut self, index: usize) -> Result<DeviceHandle> {
        if index >= self.candidates.len() {
            return Err(PadError::InvalidDevice {
                index,
                count: self.candidates.len(),
            });
        }

        // Release every device we are not going to use
        let (path, device) = std::mem::take(&mut self.candidates).swap_remove(index);

        let name = device.name().unwrap_or("Unknown joystick").to_string();
        let axes = axis_order(
            device
                .supported_absolute_axes()
                .map(|set| set.iter().collect::<Vec<_>>())
                .unwrap_or_default(),
        );
        let buttons = button_order(
            device
                .supported_keys()
                .map(|set| set.iter().collect::<Vec<_>>())
                .unwrap_or_default(),
        );

        let stream = device.into_event_stream().map_err(|e| {
            warn!("Failed to open event stream for {}: {}", path.display(), e);
            PadError::Device(e)
        })?;

        info!(
            "Opened {} at {} ({} axes, {} buttons)",
            name,
            path.display(),
            axes.len(),
            buttons.len()
        );

        self.opened = Some(OpenedDevice {
            index,
            path,
            stream,
            axes,
            discrete: DiscreteTranslator::new(buttons),
        });

        Ok(DeviceHandle { index, name })
    }

    async fn poll_discrete(&mut self) -> Result<Vec<RawEvent>> {
        let opened = self
            .opened
            .as_mut()
            .ok_or_else(|| PadError::Backend("no device open".to_string()))?;

        let mut events = Vec::new();
        loop {
            // Zero timeout: take only events that are ready now
            let next = tokio::time::timeout(Duration::ZERO, opened.stream.next_event()).await;
            match next {
                Ok(Ok(event)) => {
                    if let Some(raw) = opened.discrete.translate(&event) {
                        events.push(raw);
                    }
                }
                Ok(Err(e)) => {
                    warn!("Failed to fetch events from {}: {}", opened.path.display(), e);
                    return Err(PadError::Device(e));
                }
                Err(_) => break,
            }
        }

        Ok(events)
    }

    fn axis_count(&self, handle: &DeviceHandle) -> usize {
        match self.opened.as_ref() {
            Some(opened) if opened.index == handle.index => opened.axes.len(),
            _ => 0,
        }
    }

    fn read_axis(&mut self, handle: &DeviceHandle, index: usize) -> Result<f32> {
        let opened = self.opened_mut(handle)?;
        let count = opened.axes.len();
        let axis = *opened
            .axes
            .get(index)
            .ok_or(PadError::AxisOutOfRange { index, count })?;

        let state = opened.stream.device().get_abs_state().map_err(|e| {
            warn!("Failed to read axes from {}: {}", opened.path.display(), e);
            PadError::Device(e)
        })?;
        let info = state[axis.0 as usize];

        Ok(normalize_axis(info.value, info.minimum, info.maximum))
    }

    fn close(&mut self) {
        if let Some(opened) = self.opened.take() {
            info!(
                "Released joystick at {} ({} buttons)",
                opened.path.display(),
                opened.discrete.button_count()
            );
        }
        self.candidates.clear();
    }
}

/// Joystick-like: has `ABS_X` and at least one joystick or gamepad button
fn is_joystick(device: &Device) -> bool {
    let has_x = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X))
        .unwrap_or(false);
    let has_buttons = device
        .supported_keys()
        .map(|keys| {
            keys.iter()
                .any(|key| (BTN_JOYSTICK..BTN_DIGI).contains(&key.code()))
        })
        .unwrap_or(false);

    has_x && has_buttons
}

/// Analog axes in code order with hats removed
fn axis_order(mut axes: Vec<AbsoluteAxisType>) -> Vec<AbsoluteAxisType> {
    axes.retain(|axis| !(ABS_HAT_FIRST..=ABS_HAT_LAST).contains(&axis.0));
    axes.sort_by_key(|axis| axis.0);
    axes
}

/// Joystick buttons first, then the miscellaneous block below them
fn button_order(keys: Vec<Key>) -> Vec<Key> {
    let mut high: Vec<Key> = keys.iter().copied().filter(|k| k.code() >= BTN_JOYSTICK).collect();
    let mut misc: Vec<Key> = keys
        .iter()
        .copied()
        .filter(|k| (BTN_MISC..BTN_JOYSTICK).contains(&k.code()))
        .collect();
    high.sort_by_key(|k| k.code());
    misc.sort_by_key(|k| k.code());
    high.extend(misc);
    high
}

/// Map a raw reading in `[minimum, maximum]` onto `[-1.0, 1.0]`
fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (maximum as f64) - (minimum as f64);
    let scaled = ((value as f64) - (minimum as f64)) / span * 2.0 - 1.0;
    (scaled as f32).clamp(-1.0, 1.0)
}
