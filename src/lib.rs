//! # Padstream Library
//!
//! Normalize joystick input into a small, ordered stream of events.
//!
//! Button presses, button releases and D-pad motion are forwarded one-to-one.
//! Analog sticks are sampled every iteration and only emitted when the
//! position changed enough and enough time has passed since the last emission.

pub mod backend;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod output;
