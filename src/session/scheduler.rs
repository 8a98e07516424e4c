use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{TickOutcome, TryOnSession};
use crate::camera::CameraSource;
use crate::config::SchedulerConfig;
use crate::error::TryOnResult;
use crate::pose::KeypointExtractor;

/// Drives a session at a fixed cadence until cancelled.
///
/// Ticks run one after another on the calling task, so at most one
/// extraction is in flight; ticks that fall behind are skipped, not queued.
pub struct FrameScheduler {
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_token(config, CancellationToken::new())
    }

    pub fn with_token(config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the loop; the pending tick is dropped.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.target_fps.max(1) as f64)
    }

    /// Starts the session if needed, then ticks until cancelled. Hard start
    /// errors are returned; tick errors pause the loop and it carries on.
    /// The session is always stopped on return.
    pub async fn run<C, E>(&self, session: &mut TryOnSession<C, E>) -> TryOnResult<()>
    where
        C: CameraSource,
        E: KeypointExtractor,
    {
        self.run_with(session, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_redraw` after every tick that
    /// changed the canvas or the status (e.g. to present the canvas).
    pub async fn run_with<C, E, F>(&self, session: &mut TryOnSession<C, E>, mut on_redraw: F) -> TryOnResult<()>
    where
        C: CameraSource,
        E: KeypointExtractor,
        F: FnMut(&TryOnSession<C, E>),
    {
        if !session.is_running() {
            let started = tokio::select! {
                _ = self.cancel.cancelled() => None,
                r = session.start() => Some(r),
            };
            match started {
                None => {
                    session.stop();
                    return Ok(());
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(())) => {}
            }
        }

        let period = self.tick_period();
        let pause = Duration::from_millis(self.config.tick_error_pause_ms);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "scheduler running");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                r = session.tick() => r,
            };

            match result {
                Ok(TickOutcome::Rendered { .. }) => on_redraw(session),
                Ok(_) => {}
                Err(e) => {
                    warn!(pause_ms = pause.as_millis() as u64, "{e}");
                    session.report_tick_failure(&e);
                    on_redraw(session);
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = time::sleep(pause) => {}
                    }
                    interval.reset();
                }
            }
        }

        session.stop();
        Ok(())
    }
}
