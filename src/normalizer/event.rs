//! # Event Vocabulary
//!
//! The small set of events delivered to the application loop.

use serde::Serialize;
use std::fmt;

use crate::backend::RawEvent;

/// Normalized joystick event.
///
/// Events are plain values; two events with equal content are interchangeable.
///
/// # Examples
///
/// ```
/// use padstream::normalizer::Event;
///
/// let event = Event::ButtonDown { button: 3 };
/// assert_eq!(event.to_string(), "Button 3 pressed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Button transitioned to pressed.
    ButtonDown { button: u32 },
    /// Button transitioned to released.
    ButtonUp { button: u32 },
    /// D-pad state snapshot, each component in {-1, 0, 1}.
    #[serde(rename = "dpad")]
    DPad { x: i8, y: i8 },
    /// Left stick position, each component in [-1.0, 1.0].
    LeftStick { x: f32, y: f32 },
    /// Right stick position, each component in [-1.0, 1.0].
    RightStick { x: f32, y: f32 },
}

impl Event {
    /// True for button and D-pad events.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Event::ButtonDown { .. } | Event::ButtonUp { .. } | Event::DPad { .. }
        )
    }
}

impl From<RawEvent> for Event {
    /// One raw event maps to exactly one event; hats pass through unfiltered.
    fn from(raw: RawEvent) -> Self {
        match raw {
            RawEvent::ButtonPressed { button } => Event::ButtonDown { button },
            RawEvent::ButtonReleased { button } => Event::ButtonUp { button },
            RawEvent::HatMotion { x, y } => Event::DPad { x, y },
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::ButtonDown { button } => write!(f, "Button {} pressed", button),
            Event::ButtonUp { button } => write!(f, "Button {} released", button),
            Event::DPad { x, y } => write!(f, "D-Pad: ({}, {})", x, y),
            Event::LeftStick { x, y } => write!(f, "Left stick:  x={:+.3} y={:+.3}", x, y),
            Event::RightStick { x, y } => write!(f, "Right stick: x={:+.3} y={:+.3}", x, y),
        }
    }
}
