//! Display-score smoothing
//!
//! The risk meter eases toward each new nearest-zone score instead of
//! jumping. A new target cancels the running animation and starts again
//! from whatever value is currently displayed.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Roughly one display frame
pub const FRAME: Duration = Duration::from_millis(16);

/// Ease-out cubic over [0, 1]
pub fn ease_out_cubic(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

/// One interpolation from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAnimation {
    pub from: u8,
    pub to: u8,
    pub duration: Duration,
}

impl ScoreAnimation {
    /// Displayed value `elapsed` into the animation
    pub fn value_at(&self, elapsed: Duration) -> u8 {
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let from = f64::from(self.from);
        let to = f64::from(self.to);
        (from + (to - from) * ease_out_cubic(progress))
            .round()
            .clamp(0.0, 100.0) as u8
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}

/// Drives [`ScoreAnimation`]s on the runtime and publishes each frame
pub struct ScoreAnimator {
    display: watch::Sender<u8>,
    running: Mutex<Option<CancellationToken>>,
    parent: CancellationToken,
    duration: Duration,
}

impl ScoreAnimator {
    pub fn new(parent: CancellationToken, duration: Duration) -> Self {
        let (display, _) = watch::channel(0);
        Self {
            display,
            running: Mutex::new(None),
            parent,
            duration,
        }
    }

    pub fn current(&self) -> u8 {
        *self.display.borrow()
    }

    /// Start easing toward `target`, replacing any running animation
    pub fn animate_to(&self, target: u8) {
        let token = self.parent.child_token();
        if let Ok(mut running) = self.running.lock() {
            if let Some(previous) = running.replace(token.clone()) {
                previous.cancel();
            }
        }

        let animation = ScoreAnimation {
            from: self.current(),
            to: target,
            duration: self.duration,
        };
        debug!("Animating display score {} -> {}", animation.from, animation.to);

        let display = self.display.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut frames = tokio::time::interval(FRAME);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = frames.tick() => {
                        let elapsed = started.elapsed();
                        display.send_replace(animation.value_at(elapsed));
                        if animation.is_finished(elapsed) {
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Drop for ScoreAnimator {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(token) = running.take() {
                token.cancel();
            }
        }
    }
}
