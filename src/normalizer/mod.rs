//! # Normalizer Module
//!
//! Turns raw joystick input into an ordered stream of [`Event`]s.
//!
//! This module handles:
//! - Translating button and hat events one-to-one, in arrival order
//! - Sampling enabled sticks and filtering them through a [`ChannelPolicy`]
//! - Driving the pull loop through a [`Session`]

pub mod channel;
pub mod event;
pub mod session;

pub use channel::{ChannelConfig, ChannelPolicy, Stick};
pub use event::Event;
pub use session::{has_device, start_session, Session, SessionConfig};
