//! # Streaming Session
//!
//! Pull-based event loop over one opened joystick.
//!
//! Each call to [`Session::next_batch`] performs exactly one iteration:
//!
//! 1. Drain discrete events from the backend and translate them in order
//! 2. Evaluate the left stick channel, then the right one, if enabled
//! 3. Rest for the configured period
//!
//! The session never ends on its own. The caller stops pulling and closes (or
//! drops) it, which releases the device.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::channel::{ChannelConfig, ChannelPolicy, Stick};
use super::event::Event;
use crate::backend::{DeviceHandle, InputBackend};
use crate::error::{PadError, Result};

/// Default rest between iterations
pub const DEFAULT_REST_PERIOD: Duration = Duration::from_millis(1);

/// Device index a session opens
const DEVICE_INDEX: usize = 0;

/// Settings supplied when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Left stick channel, `None` when disabled.
    pub left: Option<ChannelConfig>,
    /// Right stick channel, `None` when disabled.
    pub right: Option<ChannelConfig>,
    /// Rest at the end of every iteration.
    pub rest_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            left: None,
            right: None,
            rest_period: DEFAULT_REST_PERIOD,
        }
    }
}

/// Report whether at least one joystick is connected.
pub fn has_device<B: InputBackend + ?Sized>(backend: &mut B) -> Result<bool> {
    Ok(backend.device_count()? > 0)
}

/// Start a session on the first joystick. See [`Session::start`].
pub fn start_session<B: InputBackend>(backend: B, config: SessionConfig) -> Result<Session<B>> {
    Session::start(backend, config)
}

/// One run of the normalizer from device acquisition to release.
///
/// # Examples
///
/// ```no_run
/// use padstream::backend::evdev::EvdevBackend;
/// use padstream::normalizer::{Session, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let backend = EvdevBackend::new()?;
///     let mut session = Session::start(backend, SessionConfig::default())?;
///     loop {
///         for event in session.next_batch().await? {
///             println!("{}", event);
///         }
///     }
/// }
/// ```
pub struct Session<B: InputBackend> {
    backend: B,
    device: DeviceHandle,
    channels: Vec<ChannelPolicy>,
    rest_period: Duration,
    closed: bool,
}

impl<B: InputBackend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("channels", &self.channels)
            .field("rest_period", &self.rest_period)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<B: InputBackend> Session<B> {
    /// Open the first joystick and set up one policy per enabled channel
    ///
    /// # Errors
    ///
    /// - `NoDevice`: no joystick is connected
    /// - any error from the backend while opening the device
    ///
    /// The backend is closed before an error is returned.
    pub fn start(mut backend: B, config: SessionConfig) -> Result<Self> {
        let device = match open_first(&mut backend) {
            Ok(device) => device,
            Err(e) => {
                backend.close();
                return Err(e);
            }
        };

        let started = Instant::now();
        let axis_count = backend.axis_count(&device);
        let channels: Vec<ChannelPolicy> = [(Stick::Left, config.left), (Stick::Right, config.right)]
            .into_iter()
            .filter_map(|(stick, cfg)| cfg.map(|cfg| ChannelPolicy::new(stick, cfg, started)))
            .collect();

        for channel in &channels {
            if !channel.is_available(axis_count) {
                let (xi, yi) = channel.config().axes;
                warn!(
                    "{} stick axes ({}, {}) exceed the {} axes of {}; channel will be skipped",
                    channel.stick(),
                    xi,
                    yi,
                    axis_count,
                    device.name
                );
            }
        }

        info!(
            "Session started on {} ({} axes, sticks: [{}])",
            device.name,
            axis_count,
            channels
                .iter()
                .map(|c| c.stick().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            backend,
            device,
            channels,
            rest_period: config.rest_period,
            closed: false,
        })
    }

    /// Device this session reads from.
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Policy state of an enabled channel.
    pub fn channel(&self, stick: Stick) -> Option<&ChannelPolicy> {
        self.channels.iter().find(|c| c.stick() == stick)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one poll iteration and return every event it produced
    ///
    /// Discrete events come first in backend order, followed by the left and
    /// then the right stick event when their policy allows an emission.
    ///
    /// # Errors
    ///
    /// Backend failures propagate unchanged, except an out-of-range axis read,
    /// which skips that channel for this iteration.
    pub async fn next_batch(&mut self) -> Result<Vec<Event>> {
        if self.closed {
            return Err(PadError::Backend("session is closed".to_string()));
        }

        let mut batch: Vec<Event> = self
            .backend
            .poll_discrete()
            .await?
            .into_iter()
            .map(Event::from)
            .collect();
        debug_assert!(batch.iter().all(Event::is_discrete));

        let axis_count = self.backend.axis_count(&self.device);
        for channel in self.channels.iter_mut() {
            if !channel.is_available(axis_count) {
                continue;
            }

            let (xi, yi) = channel.config().axes;
            let sample = match read_pair(&mut self.backend, &self.device, xi, yi) {
                Ok(sample) => sample,
                Err(PadError::AxisOutOfRange { index, count }) => {
                    trace!(
                        "{} stick skipped: axis {} out of range ({} axes)",
                        channel.stick(),
                        index,
                        count
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(event) = channel.evaluate(sample, Instant::now()) {
                trace!("{} stick emitted ({:.3}, {:.3})", channel.stick(), sample.0, sample.1);
                batch.push(event);
            }
        }

        self.backend.rest(self.rest_period).await;
        Ok(batch)
    }

    /// Release the device. Calling this more than once has no further effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.backend.close();
        debug!("Session on {} closed", self.device.name);
    }
}

impl<B: InputBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_first<B: InputBackend>(backend: &mut B) -> Result<DeviceHandle> {
    if !has_device(backend)? {
        return Err(PadError::NoDevice);
    }
    backend.open_device(DEVICE_INDEX)
}

fn read_pair<B: InputBackend>(
    backend: &mut B,
    device: &DeviceHandle,
    xi: usize,
    yi: usize,
) -> Result<(f32, f32)> {
    let x = backend.read_axis(device, xi)?;
    let y = backend.read_axis(device, yi)?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mocks::ScriptedBackend;
    use crate::backend::{MockInputBackend, RawEvent};

    fn left_only() -> SessionConfig {
        SessionConfig {
            left: Some(ChannelConfig::for_stick(Stick::Left)),
            ..SessionConfig::default()
        }
    }

    fn both_sticks() -> SessionConfig {
        SessionConfig {
            left: Some(ChannelConfig::for_stick(Stick::Left)),
            right: Some(ChannelConfig::for_stick(Stick::Right)),
            ..SessionConfig::default()
        }
    }

    // ==================== Startup ====================

    #[tokio::test(start_paused = true)]
    async fn test_start_without_device_fails() {
        let backend = ScriptedBackend::new(0, &[]);
        let result = Session::start(backend.clone(), SessionConfig::default());

        match result {
            Err(PadError::NoDevice) => {}
            other => panic!("Expected NoDevice, got: {:?}", other),
        }
        assert_eq!(backend.close_calls(), 1, "backend should be torn down");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_closes_backend_when_open_fails() {
        let mut mock = MockInputBackend::new();
        mock.expect_device_count().returning(|| Ok(1));
        mock.expect_open_device()
            .returning(|_| Err(PadError::BackendUnavailable("init failed".to_string())));
        mock.expect_close().times(1).return_const(());

        match Session::start(mock, SessionConfig::default()) {
            Err(PadError::BackendUnavailable(msg)) => assert_eq!(msg, "init failed"),
            other => panic!("Expected BackendUnavailable, got: {:?}", other),
        }
    }

    #[test]
    fn test_has_device() {
        let mut empty = ScriptedBackend::new(0, &[]);
        let mut one = ScriptedBackend::new(1, &[0.0, 0.0]);
        assert!(!has_device(&mut empty).unwrap());
        assert!(has_device(&mut one).unwrap());
    }

    // ==================== Discrete events ====================

    #[tokio::test(start_paused = true)]
    async fn test_single_button_press() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        backend.push_events(vec![RawEvent::ButtonPressed { button: 3 }]);
        let mut session = Session::start(backend, SessionConfig::default()).unwrap();

        let batch = session.next_batch().await.unwrap();
        assert_eq!(batch, vec![Event::ButtonDown { button: 3 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discrete_events_keep_order_and_count() {
        let backend = ScriptedBackend::new(1, &[]);
        backend.push_events(vec![
            RawEvent::HatMotion { x: 1, y: 0 },
            RawEvent::ButtonPressed { button: 0 },
            RawEvent::HatMotion { x: 1, y: 0 },
            RawEvent::ButtonReleased { button: 0 },
            RawEvent::HatMotion { x: 0, y: 0 },
        ]);
        let mut session = Session::start(backend, SessionConfig::default()).unwrap();

        let batch = session.next_batch().await.unwrap();
        assert_eq!(
            batch,
            vec![
                Event::DPad { x: 1, y: 0 },
                Event::ButtonDown { button: 0 },
                Event::DPad { x: 1, y: 0 },
                Event::ButtonUp { button: 0 },
                Event::DPad { x: 0, y: 0 },
            ]
        );
        assert!(session.next_batch().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_channels_never_read_axes() {
        let backend = ScriptedBackend::new(1, &[0.4, 0.4, 0.4, 0.4]);
        let mut session = Session::start(backend.clone(), SessionConfig::default()).unwrap();

        for _ in 0..5 {
            assert!(session.next_batch().await.unwrap().is_empty());
        }
        assert_eq!(backend.axis_reads(), 0);
    }

    // ==================== Stick policy ====================

    #[tokio::test(start_paused = true)]
    async fn test_left_stick_debounce_sequence() {
        let backend = ScriptedBackend::new(1, &[0.50, -0.10]);
        let mut session = Session::start(backend.clone(), left_only()).unwrap();

        // Baseline
        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![Event::LeftStick { x: 0.50, y: -0.10 }]
        );

        // Below epsilon
        backend.set_axes(&[0.505, -0.095]);
        assert!(session.next_batch().await.unwrap().is_empty());

        // Above epsilon but inside the interval
        backend.set_axes(&[0.60, -0.10]);
        assert!(session.next_batch().await.unwrap().is_empty());

        // Same sample once the interval has passed
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![Event::LeftStick { x: 0.60, y: -0.10 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_input_emits_only_baseline() {
        let backend = ScriptedBackend::new(1, &[0.2, 0.7, -0.3, 0.1]);
        let mut session = Session::start(backend, both_sticks()).unwrap();

        let mut emitted = Vec::new();
        for _ in 0..100 {
            emitted.extend(session.next_batch().await.unwrap());
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(
            emitted,
            vec![
                Event::LeftStick { x: 0.2, y: 0.7 },
                Event::RightStick { x: -0.3, y: 0.1 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_ignores_epsilon_and_interval() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        let config = SessionConfig {
            left: Some(ChannelConfig {
                axes: (0, 1),
                epsilon: 1.0,
                min_interval: Duration::from_secs(60),
            }),
            ..SessionConfig::default()
        };
        let mut session = Session::start(backend, config).unwrap();

        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![Event::LeftStick { x: 0.0, y: 0.0 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_right_stick_skipped_on_two_axis_device() {
        let backend = ScriptedBackend::new(1, &[0.1, 0.2]);
        let mut session = Session::start(backend.clone(), both_sticks()).unwrap();

        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![Event::LeftStick { x: 0.1, y: 0.2 }]
        );

        backend.set_axes(&[0.9, 0.9]);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![Event::LeftStick { x: 0.9, y: 0.9 }]
        );

        let right = session.channel(Stick::Right).unwrap();
        assert_eq!(right.last_value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_leaves_channel_state_untouched() {
        let backend = ScriptedBackend::new(1, &[0.1, 0.2, 0.3, 0.4]);
        let mut session = Session::start(backend.clone(), both_sticks()).unwrap();
        session.next_batch().await.unwrap();

        let before = session.channel(Stick::Right).unwrap().clone();

        // Device suddenly reports fewer axes
        backend.set_axes(&[0.1, 0.2]);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(session.next_batch().await.unwrap().is_empty());

        let after = session.channel(Stick::Right).unwrap();
        assert_eq!(after.last_value(), before.last_value());
        assert_eq!(after.last_emit(), before.last_emit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discrete_before_left_before_right() {
        let backend = ScriptedBackend::new(1, &[0.5, 0.5, -0.5, -0.5]);
        backend.push_events(vec![RawEvent::ButtonPressed { button: 2 }]);
        let mut session = Session::start(backend, both_sticks()).unwrap();

        assert_eq!(
            session.next_batch().await.unwrap(),
            vec![
                Event::ButtonDown { button: 2 },
                Event::LeftStick { x: 0.5, y: 0.5 },
                Event::RightStick { x: -0.5, y: -0.5 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_discrete_events_form_batch_prefix() {
        let backend = ScriptedBackend::new(1, &[0.1, 0.2, 0.3, 0.4]);
        backend.push_events(vec![
            RawEvent::HatMotion { x: 1, y: 0 },
            RawEvent::ButtonPressed { button: 0 },
            RawEvent::ButtonReleased { button: 0 },
        ]);
        let mut session = Session::start(backend, both_sticks()).unwrap();

        let batch = session.next_batch().await.unwrap();
        assert_eq!(batch.len(), 5);
        let discrete = batch.iter().take_while(|e| e.is_discrete()).count();
        assert_eq!(discrete, 3);
        assert!(batch[discrete..].iter().all(|e| !e.is_discrete()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_read_is_absorbed() {
        let mut mock = MockInputBackend::new();
        mock.expect_device_count().returning(|| Ok(1));
        mock.expect_open_device().returning(|index| {
            Ok(DeviceHandle {
                index,
                name: "Mock".to_string(),
            })
        });
        mock.expect_axis_count().returning(|_| 4);
        mock.expect_poll_discrete().returning(|| Ok(vec![]));
        mock.expect_read_axis()
            .returning(|_, index| Err(PadError::AxisOutOfRange { index, count: 4 }));
        mock.expect_rest().returning(|_| ());
        mock.expect_close().times(1).return_const(());

        let mut session = Session::start(mock, left_only()).unwrap();
        assert!(session.next_batch().await.unwrap().is_empty());
        assert_eq!(session.channel(Stick::Left).unwrap().last_value(), None);
    }

    // ==================== Failures and teardown ====================

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_propagates_unchanged() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        let mut session = Session::start(backend.clone(), left_only()).unwrap();
        backend.set_poll_error("No such device (os error 19)");

        match session.next_batch().await {
            Err(PadError::Backend(msg)) => assert_eq!(msg, "No such device (os error 19)"),
            other => panic!("Expected Backend error, got: {:?}", other),
        }

        drop(session);
        assert_eq!(backend.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_error_reaches_caller_unwrapped() {
        let mut mock = MockInputBackend::new();
        mock.expect_device_count().returning(|| Ok(1));
        mock.expect_open_device().returning(|index| {
            Ok(DeviceHandle {
                index,
                name: "Mock".to_string(),
            })
        });
        mock.expect_axis_count().return_const(2usize);
        mock.expect_poll_discrete()
            .returning(|| Err(PadError::Device(std::io::Error::from_raw_os_error(19))));
        mock.expect_close().times(1).return_const(());

        let mut session = Session::start(mock, left_only()).unwrap();
        let err = session.next_batch().await.unwrap_err();

        let expected = std::io::Error::from_raw_os_error(19).to_string();
        assert_eq!(err.to_string(), expected);
        assert_eq!(anyhow::Error::from(err).to_string(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_axis_read_error_propagates() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        let mut session = Session::start(backend.clone(), left_only()).unwrap();
        backend.set_read_error("ioctl failed");

        assert!(matches!(
            session.next_batch().await,
            Err(PadError::Backend(ref msg)) if msg == "ioctl failed"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        let mut session = Session::start(backend.clone(), SessionConfig::default()).unwrap();

        session.close();
        session.close();
        assert!(session.is_closed());
        drop(session);

        assert_eq!(backend.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_after_close_fails() {
        let backend = ScriptedBackend::new(1, &[0.0, 0.0]);
        let mut session = Session::start(backend, SessionConfig::default()).unwrap();
        session.close();
        assert!(session.next_batch().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_period_paces_iterations() {
        let backend = ScriptedBackend::new(1, &[]);
        let config = SessionConfig {
            rest_period: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let mut session = Session::start(backend, config).unwrap();

        let begin = Instant::now();
        for _ in 0..4 {
            session.next_batch().await.unwrap();
        }
        assert!(Instant::now() - begin >= Duration::from_millis(20));
    }

    #[test]
    fn test_start_session_outside_async_context() {
        let backend = ScriptedBackend::new(1, &[0.25, 0.75]);
        let mut session = start_session(backend, left_only()).unwrap();
        let batch = tokio_test::block_on(session.next_batch()).unwrap();
        assert_eq!(batch, vec![Event::LeftStick { x: 0.25, y: 0.75 }]);
    }
}
