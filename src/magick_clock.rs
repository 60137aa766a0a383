//! Hold-to-confirm countdown for the ImageMagick gestures.
//!
//! A gesture has to stay up for the whole hold budget before it counts. Short dropouts of
//! the pose detector are absorbed by a grace budget; once the gesture has been gone longer
//! than that the clock starts over.

use std::time::{Duration, Instant};

use crate::{config::ClockConfig, keypoints::any_menu_gesture, types::Pose};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockPhase {
    /// Not counting; the countdown shows its sentinel.
    Idle,
    /// Gesture present and the hold budget is draining.
    Holding,
    /// Gesture absent but still inside the grace window; the countdown is frozen.
    Grace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    /// The gesture was held for the full budget. The clock has already reset itself.
    Triggered,
    /// The gesture was absent longer than the grace window.
    Reset,
}

#[derive(Clone, Debug)]
pub struct GestureClock {
    config: ClockConfig,
    hold_budget: Duration,
    reset_budget: Duration,
    last_sample: Option<Instant>,
    countdown: Option<Duration>,
    gesture_present: bool,
}

impl GestureClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            hold_budget: config.hold,
            reset_budget: config.grace,
            last_sample: None,
            countdown: None,
            gesture_present: false,
        }
    }

    /// Restores both budgets and forgets the last sample time, so a stale timestamp from a
    /// previous activation never turns into one huge step.
    pub fn reset(&mut self) {
        self.hold_budget = self.config.hold;
        self.reset_budget = self.config.grace;
        self.last_sample = None;
        self.countdown = None;
        self.gesture_present = false;
    }

    /// Feeds one frame's poses observed at `now`.
    pub fn observe(&mut self, poses: &[Pose], now: Instant) -> Option<ClockEvent> {
        let present = any_menu_gesture(poses);
        let dt = self
            .last_sample
            .map(|last| now.saturating_duration_since(last).min(self.config.max_step));
        self.last_sample = Some(now);
        self.step(present, dt)
    }

    /// `dt` is `None` for the first sample after a reset: it only starts the clock.
    pub fn step(&mut self, present: bool, dt: Option<Duration>) -> Option<ClockEvent> {
        self.gesture_present = present;
        let Some(dt) = dt else {
            return None;
        };

        if present {
            self.reset_budget = self.config.grace;
            self.hold_budget = self.hold_budget.saturating_sub(dt);
            if self.hold_budget < self.config.visible_below {
                self.countdown = Some(self.hold_budget);
            }
            if self.hold_budget.is_zero() {
                log::debug!("gesture held for {:?}, triggering", self.config.hold);
                self.restart_budgets();
                return Some(ClockEvent::Triggered);
            }
        } else if self.is_engaged() {
            match self.reset_budget.checked_sub(dt) {
                Some(remaining) => self.reset_budget = remaining,
                None => {
                    log::warn!("resetting magick clock timers");
                    self.restart_budgets();
                    return Some(ClockEvent::Reset);
                }
            }
        }

        None
    }

    fn restart_budgets(&mut self) {
        self.hold_budget = self.config.hold;
        self.reset_budget = self.config.grace;
        self.countdown = None;
    }

    /// True once some hold time has been spent.
    pub fn is_engaged(&self) -> bool {
        self.hold_budget < self.config.hold
    }

    pub fn phase(&self) -> ClockPhase {
        if !self.is_engaged() {
            ClockPhase::Idle
        } else if self.gesture_present {
            ClockPhase::Holding
        } else {
            ClockPhase::Grace
        }
    }

    /// The visible countdown; `None` is the "not counting" sentinel.
    pub fn countdown(&self) -> Option<Duration> {
        self.countdown
    }

    pub fn hold_budget(&self) -> Duration {
        self.hold_budget
    }

    pub fn reset_budget(&self) -> Duration {
        self.reset_budget
    }

    /// Whole seconds left on the visible countdown, rounded up.
    pub fn seconds_left(&self) -> Option<u64> {
        self.countdown.map(whole_seconds_ceil)
    }

    pub fn format_countdown(&self) -> Option<String> {
        self.seconds_left()
            .map(|seconds| format!("ImageMagick in {seconds}"))
    }
}

pub fn whole_seconds_ceil(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
