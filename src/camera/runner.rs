//! Timer-driven async driver for [`SmartCamera`].
//!
//! One task owns the controller and multiplexes the fixed-cadence tick
//! driver, the consensus deadline timer, commands from [`CameraHandle`]s and
//! cancellation. Captures run inside the tick that triggered them, so at
//! most one is ever in flight and a stop always wins over pending work.

use super::controller::{CameraEvent, CameraState, SmartCamera};
use crate::capture::LiveSource;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// The runner has shut down and no longer accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("camera runner has shut down")]
pub struct RunnerClosed;

/// Requests sent to a running camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraCommand {
    StartConsensus { target: usize, timeout: Duration },
    ManualCapture,
    ToggleTorch,
}

/// Cloneable control handle for a [`CameraRunner`].
#[derive(Debug, Clone)]
pub struct CameraHandle {
    commands: mpsc::UnboundedSender<CameraCommand>,
    cancel: CancellationToken,
}

impl CameraHandle {
    /// Starts an auto-consensus session of `target` frames within `timeout`.
    pub fn start_auto_consensus(&self, target: usize, timeout: Duration) -> Result<(), RunnerClosed> {
        self.send(CameraCommand::StartConsensus { target, timeout })
    }

    pub fn manual_capture(&self) -> Result<(), RunnerClosed> {
        self.send(CameraCommand::ManualCapture)
    }

    pub fn toggle_torch(&self) -> Result<(), RunnerClosed> {
        self.send(CameraCommand::ToggleTorch)
    }

    /// Stops the camera. Takes effect before any further tick, deadline or
    /// command is processed.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn send(&self, command: CameraCommand) -> Result<(), RunnerClosed> {
        if self.cancel.is_cancelled() {
            return Err(RunnerClosed);
        }
        self.commands.send(command).map_err(|_| RunnerClosed)
    }
}

/// Owns a [`SmartCamera`] and drives it from timers.
pub struct CameraRunner<S: LiveSource> {
    camera: SmartCamera<S>,
    commands: mpsc::UnboundedReceiver<CameraCommand>,
    events: mpsc::UnboundedSender<CameraEvent>,
    cancel: CancellationToken,
}

impl<S: LiveSource> CameraRunner<S> {
    /// Wraps `camera`, returning the runner, a control handle and the event
    /// stream carrying captures and finished batches.
    pub fn new(
        camera: SmartCamera<S>,
    ) -> (Self, CameraHandle, mpsc::UnboundedReceiver<CameraEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let runner = Self {
            camera,
            commands: command_rx,
            events: event_tx,
            cancel: cancel.clone(),
        };
        let handle = CameraHandle {
            commands: command_tx,
            cancel,
        };
        (runner, handle, event_rx)
    }

    /// Starts the camera if needed and runs until stopped or until every
    /// handle is dropped. Returns the stopped controller.
    ///
    /// If the source cannot be opened the controller is returned idle.
    pub async fn run(mut self) -> SmartCamera<S> {
        if self.camera.state() == CameraState::Idle {
            if let Err(e) = self.camera.start() {
                tracing::warn!(error = %e, "Camera runner could not start");
                return self.camera;
            }
        }

        let period = self.camera.monitor_config().tick_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tick_interval_ms = period.as_millis() as u64,
            "Camera runner started"
        );

        loop {
            let deadline = self.camera.consensus_deadline();

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!("Camera runner cancelled");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::info!("All camera handles dropped");
                        break;
                    }
                },
                _ = sleep_until(deadline) => {
                    if let Some(event) = self.camera.poll_deadline(now()) {
                        self.emit(event);
                    }
                }
                _ = ticker.tick() => {
                    match self.camera.tick(now()) {
                        Ok(Some(event)) => self.emit(event),
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "Tick failed"),
                    }
                }
            }
        }

        self.camera.stop();
        self.camera
    }

    fn handle_command(&mut self, command: CameraCommand) {
        tracing::debug!(?command, "Camera command");
        match command {
            CameraCommand::StartConsensus { target, timeout } => {
                if let Err(e) = self.camera.start_auto_consensus(target, timeout, now()) {
                    tracing::warn!(error = %e, target, "Could not start consensus");
                }
            }
            CameraCommand::ManualCapture => match self.camera.manual_capture() {
                Ok(Some(event)) => self.emit(event),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Manual capture failed"),
            },
            CameraCommand::ToggleTorch => {
                self.camera.toggle_torch();
            }
        }
    }

    fn emit(&self, event: CameraEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Current time on the runtime clock, which tests may pause and advance.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::StatusLog;
    use crate::capture::StillSource;
    use crate::consensus::Completion;
    use crate::processing::NormalizeConfig;
    use image::{Rgba, RgbaImage};

    fn falling() -> RgbaImage {
        RgbaImage::from_fn(320, 240, |x, _| {
            let v = (255 - x * 255 / 319) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn camera() -> (SmartCamera<StillSource>, StatusLog) {
        let log = StatusLog::new();
        let camera = SmartCamera::new(StillSource::with_frame(falling()))
            .with_normalize_config(NormalizeConfig {
                output_width: 320,
                output_height: 180,
            })
            .with_sink(log.clone());
        (camera, log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_after_three_ticks() {
        let (camera, _log) = camera();
        let (runner, handle, mut events) = CameraRunner::new(camera);
        let started = Instant::now();
        let task = tokio::spawn(runner.run());

        let event = events.recv().await.unwrap();
        assert!(matches!(event, CameraEvent::Captured(_)));
        // Ticks at 0, 300 and 600 ms.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(600) && elapsed < Duration::from_millis(900));

        handle.stop();
        let camera = task.await.unwrap();
        assert_eq!(camera.state(), CameraState::Stopped);
        assert_eq!(camera.stats().captures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consensus_times_out_with_partial_batch() {
        let (camera, log) = camera();
        let (runner, handle, mut events) = CameraRunner::new(camera);
        handle
            .start_auto_consensus(3, Duration::from_millis(2_000))
            .unwrap();
        let started = Instant::now();
        let task = tokio::spawn(runner.run());

        match events.recv().await.unwrap() {
            CameraEvent::BatchReady(batch) => {
                assert_eq!(batch.completion, Completion::TimedOut);
                assert_eq!(batch.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_000) && elapsed < Duration::from_millis(2_300));
        assert!(log.contains(crate::camera::messages::DISCARDED));

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_session() {
        let (camera, _log) = camera();
        let (runner, handle, mut events) = CameraRunner::new(camera);
        handle
            .start_auto_consensus(5, Duration::from_secs(10))
            .unwrap();
        let task = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(700)).await;
        handle.stop();
        let camera = task.await.unwrap();

        // The runner is gone and never delivered a batch.
        assert!(events.recv().await.is_none());
        let stats = camera.stats();
        assert_eq!(stats.candidates_accepted, 1);
        assert_eq!(stats.sessions_aborted, 1);
        assert_eq!(stats.sessions_timed_out, 0);
        assert!(matches!(handle.manual_capture(), Err(RunnerClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_capture_command() {
        let (camera, _log) = camera();
        let camera = camera.with_monitor_config(crate::camera::MonitorConfig {
            single_stability: 100,
            ..Default::default()
        });
        let (runner, handle, mut events) = CameraRunner::new(camera);
        handle.manual_capture().unwrap();
        let task = tokio::spawn(runner.run());

        assert!(matches!(
            events.recv().await.unwrap(),
            CameraEvent::Captured(_)
        ));
        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_ends_runner() {
        let (camera, _log) = camera();
        let (runner, handle, _events) = CameraRunner::new(camera);
        let task = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(handle);
        let camera = task.await.unwrap();
        assert_eq!(camera.state(), CameraState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_interval_still_runs() {
        let (camera, _log) = camera();
        let camera = camera.with_monitor_config(crate::camera::MonitorConfig {
            tick_interval_ms: 0,
            single_stability: 1,
            batch_stability: 1,
        });
        let (runner, handle, mut events) = CameraRunner::new(camera);
        let task = tokio::spawn(runner.run());

        assert!(matches!(events.recv().await, Some(CameraEvent::Captured(_))));
        handle.stop();
        let camera = task.await.unwrap();
        assert_eq!(camera.state(), CameraState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_source_returns_idle() {
        let camera = SmartCamera::new(StillSource::unavailable());
        let (runner, _handle, _events) = CameraRunner::new(camera);
        let camera = runner.run().await;
        assert_eq!(camera.state(), CameraState::Idle);
    }
}
