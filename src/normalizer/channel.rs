//! # Channel Policy
//!
//! Decides when an analog stick sample becomes an event.
//!
//! A sample is emitted when it is the first one seen by the channel, or when
//! it both moved more than `epsilon` on either axis **and** at least
//! `min_interval` has passed since the previous emission. Neither condition
//! alone is enough: fast jitter stays below epsilon, and a large move right
//! after an emission waits out the interval.

use std::time::Duration;
use tokio::time::Instant;

use super::event::Event;

/// Default per-axis change threshold
pub const DEFAULT_EPSILON: f32 = 0.02;

/// Default spacing between emissions
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(20);

/// Analog stick a channel reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Build this stick's event for a sample.
    pub fn event(self, x: f32, y: f32) -> Event {
        match self {
            Stick::Left => Event::LeftStick { x, y },
            Stick::Right => Event::RightStick { x, y },
        }
    }

    /// Conventional axis pair: left (0, 1), right (2, 3).
    pub fn default_axes(self) -> (usize, usize) {
        match self {
            Stick::Left => (0, 1),
            Stick::Right => (2, 3),
        }
    }
}

impl std::fmt::Display for Stick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stick::Left => write!(f, "left"),
            Stick::Right => write!(f, "right"),
        }
    }
}

/// Per-channel emission settings, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// (x, y) axis indices on the device.
    pub axes: (usize, usize),
    /// Minimum per-axis delta that counts as a change.
    pub epsilon: f32,
    /// Minimum time between two emissions.
    pub min_interval: Duration,
}

impl ChannelConfig {
    /// Defaults for `stick` with its conventional axis pair.
    pub fn for_stick(stick: Stick) -> Self {
        Self {
            axes: stick.default_axes(),
            epsilon: DEFAULT_EPSILON,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

/// Mutable emission state of one stick.
///
/// `last_value` and `last_emit` only ever change together, on emission.
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    stick: Stick,
    config: ChannelConfig,
    last_value: Option<(f32, f32)>,
    last_emit: Instant,
}

impl ChannelPolicy {
    /// New channel with no prior sample; `started` stands in for the last emission.
    pub fn new(stick: Stick, config: ChannelConfig, started: Instant) -> Self {
        Self {
            stick,
            config,
            last_value: None,
            last_emit: started,
        }
    }

    pub fn stick(&self) -> Stick {
        self.stick
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn last_value(&self) -> Option<(f32, f32)> {
        self.last_value
    }

    pub fn last_emit(&self) -> Instant {
        self.last_emit
    }

    /// Whether a device with `axis_count` axes can serve both of this channel's axes.
    pub fn is_available(&self, axis_count: usize) -> bool {
        let (xi, yi) = self.config.axes;
        axis_count > xi.max(yi)
    }

    /// Apply the emission policy to a fresh sample taken at `now`.
    pub fn evaluate(&mut self, sample: (f32, f32), now: Instant) -> Option<Event> {
        let (x, y) = sample;
        let epsilon = self.config.epsilon;

        let first = self.last_value.is_none();
        let changed = match self.last_value {
            Some((last_x, last_y)) => (x - last_x).abs() > epsilon || (y - last_y).abs() > epsilon,
            None => false,
        };
        let spaced = now.saturating_duration_since(self.last_emit) >= self.config.min_interval;

        if first || (changed && spaced) {
            self.last_value = Some(sample);
            self.last_emit = now;
            Some(self.stick.event(x, y))
        } else {
            None
        }
    }
}
