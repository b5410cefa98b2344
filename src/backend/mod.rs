//! # Backend Module
//!
//! Thin adapter over the platform input subsystem.
//!
//! This module handles:
//! - Device discovery and opening a single joystick
//! - Draining pending discrete events (buttons, hats) without blocking
//! - Sampling normalized analog axes on demand
//! - Releasing the device when the session ends
//!
//! The normalizer only talks to the [`InputBackend`] trait, so tests can swap
//! in a scripted backend.

pub mod evdev;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Discrete hardware event as reported by the backend, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    /// Button with the given index went down.
    ButtonPressed { button: u32 },
    /// Button with the given index went up.
    ButtonReleased { button: u32 },
    /// Hat (D-pad) moved; each component is -1, 0 or 1, up is +1.
    HatMotion { x: i8, y: i8 },
}

/// Identifies the device opened by [`InputBackend::open_device`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Index the device was opened with.
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
}

/// Contract the normalizer requires from the platform input subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputBackend: Send {
    /// Number of connected joysticks.
    fn device_count(&mut self) -> Result<usize>;

    /// Open the joystick at `index`.
    ///
    /// Fails with `InvalidDevice` if the index does not exist.
    fn open_device(&mut self, index: usize) -> Result<DeviceHandle>;

    /// Drain every discrete event received since the previous call.
    ///
    /// Must not wait for new events; returns an empty vector when nothing is pending.
    async fn poll_discrete(&mut self) -> Result<Vec<RawEvent>>;

    /// Number of analog axes the opened device reports.
    fn axis_count(&self, handle: &DeviceHandle) -> usize;

    /// Instantaneous axis sample normalized to `[-1.0, 1.0]`.
    ///
    /// Fails with `AxisOutOfRange` if `index >= axis_count`.
    fn read_axis(&mut self, handle: &DeviceHandle, index: usize) -> Result<f32>;

    /// Rest between poll iterations.
    async fn rest(&mut self, period: Duration) {
        tokio::time::sleep(period).await;
    }

    /// Release the device and backend resources. Safe to call more than once.
    fn close(&mut self);
}
