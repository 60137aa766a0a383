use std::time::{Duration, Instant};

use crate::{
    config::{MODE_SWITCH_DELAY, RESULT_DISPLAY, SNAPSHOT_COUNTDOWN},
    magick_clock::whole_seconds_ceil,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotStage {
    /// Counting down before the frame is captured.
    Countdown { until: Instant },
    /// Frame captured, waiting for the effect service.
    Awaiting,
    /// Showing the converted image before returning to the overlays.
    Showing { until: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Costume,
    Wireframe,
    Menu,
    Snapshot(SnapshotStage),
}

impl DisplayMode {
    pub fn is_overlay(&self) -> bool {
        matches!(self, DisplayMode::Costume | DisplayMode::Wireframe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Costume => "Costume",
            DisplayMode::Wireframe => "Wireframe",
            DisplayMode::Menu => "ImageMagick menu",
            DisplayMode::Snapshot(_) => "Snapshot",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: DisplayMode,
    pub to: DisplayMode,
}

/// Owns the active display mode. Every method that changes it returns the [`Transition`] so
/// the caller can cancel work owned by the outgoing mode and set up the incoming one.
#[derive(Debug)]
pub struct ModeController {
    mode: DisplayMode,
    menu_enabled: bool,
    switch_delay: Duration,
    overlay_deadline: Instant,
}

impl ModeController {
    pub fn new(menu_enabled: bool, now: Instant) -> Self {
        Self::with_switch_delay(menu_enabled, MODE_SWITCH_DELAY, now)
    }

    pub fn with_switch_delay(menu_enabled: bool, switch_delay: Duration, now: Instant) -> Self {
        Self {
            mode: DisplayMode::Costume,
            menu_enabled,
            switch_delay,
            overlay_deadline: now + switch_delay,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Whether the gesture clock should be fed in the current mode.
    pub fn watches_gesture(&self) -> bool {
        match self.mode {
            DisplayMode::Costume | DisplayMode::Wireframe | DisplayMode::Menu => self.menu_enabled,
            DisplayMode::Snapshot(_) => false,
        }
    }

    /// Applies the time-driven transitions: overlay alternation and the snapshot stages.
    pub fn poll_timer(&mut self, now: Instant) -> Option<Transition> {
        let next = match self.mode {
            DisplayMode::Costume if now >= self.overlay_deadline => DisplayMode::Wireframe,
            DisplayMode::Wireframe if now >= self.overlay_deadline => DisplayMode::Costume,
            DisplayMode::Snapshot(SnapshotStage::Countdown { until }) if now >= until => {
                DisplayMode::Snapshot(SnapshotStage::Awaiting)
            }
            DisplayMode::Snapshot(SnapshotStage::Showing { until }) if now >= until => {
                DisplayMode::Costume
            }
            _ => return None,
        };
        Some(self.enter(next, now))
    }

    /// The gesture clock fired.
    pub fn gesture_triggered(&mut self, now: Instant) -> Option<Transition> {
        let next = match self.mode {
            DisplayMode::Costume | DisplayMode::Wireframe if self.menu_enabled => DisplayMode::Menu,
            DisplayMode::Menu => DisplayMode::Snapshot(SnapshotStage::Countdown {
                until: now + SNAPSHOT_COUNTDOWN,
            }),
            _ => return None,
        };
        Some(self.enter(next, now))
    }

    pub fn cancel_menu(&mut self, now: Instant) -> Option<Transition> {
        match self.mode {
            DisplayMode::Menu => Some(self.enter(DisplayMode::Costume, now)),
            _ => None,
        }
    }

    pub fn effect_ready(&mut self, now: Instant) -> Option<Transition> {
        match self.mode {
            DisplayMode::Snapshot(SnapshotStage::Awaiting) => Some(self.enter(
                DisplayMode::Snapshot(SnapshotStage::Showing {
                    until: now + RESULT_DISPLAY,
                }),
                now,
            )),
            _ => None,
        }
    }

    pub fn effect_failed(&mut self, now: Instant) -> Option<Transition> {
        match self.mode {
            DisplayMode::Snapshot(SnapshotStage::Awaiting) => {
                Some(self.enter(DisplayMode::Costume, now))
            }
            _ => None,
        }
    }

    /// Banner for the timed snapshot stages.
    pub fn stage_banner(&self, now: Instant) -> Option<String> {
        match self.mode {
            DisplayMode::Snapshot(SnapshotStage::Countdown { until }) => Some(format!(
                "Taking snapshot in {}",
                whole_seconds_ceil(until.saturating_duration_since(now))
            )),
            DisplayMode::Snapshot(SnapshotStage::Showing { until }) => Some(format!(
                "Returning to main menu in {}",
                whole_seconds_ceil(until.saturating_duration_since(now))
            )),
            _ => None,
        }
    }

    fn enter(&mut self, next: DisplayMode, now: Instant) -> Transition {
        let from = self.mode;
        self.mode = next;
        if next.is_overlay() {
            self.overlay_deadline = now + self.switch_delay;
        }
        log::info!("mode {} -> {}", from.label(), next.label());
        Transition { from, to: next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlays_alternate_on_the_timer_indefinitely() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(false, t0);
        let mut expected = DisplayMode::Wireframe;
        for i in 1..=50u32 {
            let now = t0 + MODE_SWITCH_DELAY * i;
            assert_eq!(modes.poll_timer(now - Duration::from_millis(1)), None);
            let transition = modes.poll_timer(now).expect("switch");
            assert_eq!(transition.to, expected);
            expected = if expected == DisplayMode::Costume {
                DisplayMode::Wireframe
            } else {
                DisplayMode::Costume
            };
        }
    }

    #[test]
    fn gesture_ignored_when_menu_disabled() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(false, t0);
        assert!(!modes.watches_gesture());
        assert_eq!(modes.gesture_triggered(t0), None);
        assert_eq!(modes.mode(), DisplayMode::Costume);
    }

    #[test]
    fn menu_stops_the_overlay_timer() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(true, t0);
        modes.gesture_triggered(t0).expect("menu");
        assert_eq!(modes.mode(), DisplayMode::Menu);
        assert_eq!(modes.poll_timer(t0 + MODE_SWITCH_DELAY * 3), None);

        let back = modes.cancel_menu(t0 + Duration::from_secs(31)).expect("cancel");
        assert_eq!(back.to, DisplayMode::Costume);
        // The overlay timer restarts on re-entry.
        assert_eq!(modes.poll_timer(t0 + Duration::from_secs(35)), None);
        assert!(modes.poll_timer(t0 + Duration::from_secs(41)).is_some());
    }

    #[test]
    fn full_snapshot_flow_returns_to_costume() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(true, t0);
        modes.gesture_triggered(t0).expect("menu");
        let snap = modes.gesture_triggered(t0).expect("snapshot");
        assert_eq!(
            snap.to,
            DisplayMode::Snapshot(SnapshotStage::Countdown {
                until: t0 + SNAPSHOT_COUNTDOWN
            })
        );
        assert!(!modes.watches_gesture());
        assert_eq!(
            modes.stage_banner(t0 + Duration::from_millis(1500)).as_deref(),
            Some("Taking snapshot in 4")
        );

        assert_eq!(modes.poll_timer(t0 + Duration::from_secs(4)), None);
        let capture = modes.poll_timer(t0 + SNAPSHOT_COUNTDOWN).expect("capture");
        assert_eq!(capture.to, DisplayMode::Snapshot(SnapshotStage::Awaiting));
        assert_eq!(modes.stage_banner(t0 + SNAPSHOT_COUNTDOWN), None);

        let t1 = t0 + Duration::from_secs(8);
        modes.effect_ready(t1).expect("showing");
        assert_eq!(
            modes.stage_banner(t1).as_deref(),
            Some("Returning to main menu in 5")
        );
        let done = modes.poll_timer(t1 + RESULT_DISPLAY).expect("done");
        assert_eq!(done.to, DisplayMode::Costume);
    }

    #[test]
    fn failed_effect_falls_back_to_costume() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(true, t0);
        modes.gesture_triggered(t0);
        modes.gesture_triggered(t0);
        modes.poll_timer(t0 + SNAPSHOT_COUNTDOWN);
        assert_eq!(modes.effect_failed(t0).map(|t| t.to), Some(DisplayMode::Costume));
        // A late result for the abandoned snapshot is ignored.
        assert_eq!(modes.effect_ready(t0), None);
    }

    #[test]
    fn cancel_outside_menu_is_a_no_op() {
        let t0 = Instant::now();
        let mut modes = ModeController::new(true, t0);
        assert_eq!(modes.cancel_menu(t0), None);
        assert_eq!(modes.effect_ready(t0), None);
    }
}
