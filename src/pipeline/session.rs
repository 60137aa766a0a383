//! The session thread: one tick per camera frame.
//!
//! A tick takes the newest frame, runs pose inference, then updates the gesture clock and
//! the mode controller and composes the output. Work that outlives a tick (inference, the
//! effect request) is tied to the [`CancelToken`] of the mode that started it, and its
//! result is dropped when that mode is gone by the time it arrives.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, unbounded};
use image::RgbaImage;
use rand::{SeedableRng, rngs::StdRng};

use super::{
    compositor::{Compositor, scale_poses},
    pose::{EstimationConfig, PoseEstimator},
};
use crate::{
    config::{
        AppConfig, MENU_OPTION_COUNT, MIN_PART_CONFIDENCE, MIN_POSE_CONFIDENCE, SNAPSHOT_HEIGHT,
        SNAPSHOT_WIDTH,
    },
    effects::{self, EffectError, EffectOption, MagickClient, OptionBands},
    fps::{FpsAnalyzer, FpsError},
    keypoints::filter_poses,
    magick_clock::{ClockEvent, GestureClock},
    modes::{DisplayMode, ModeController, SnapshotStage, Transition},
    overlay,
    types::{Frame, Pose},
};

const FRAME_WAIT: Duration = Duration::from_millis(100);

/// Shared flag checked after every suspension point.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    CancelMenu,
}

/// Everything the UI needs to draw one tick.
#[derive(Clone, Debug)]
pub struct SessionView {
    pub frame: RgbaImage,
    pub mode: DisplayMode,
    pub banner: Option<String>,
    pub options: Vec<&'static str>,
    pub selected: usize,
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    Frame(SessionView),
    /// The session ended on an error; no more frames follow.
    Failed(String),
}

struct EffectOutcome {
    token: CancelToken,
    result: Result<RgbaImage, EffectError>,
}

pub struct SessionHandle {
    stop: CancelToken,
    commands: Sender<SessionCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub fn cancel_menu(&self) {
        let _ = self.commands.send(SessionCommand::CancelMenu);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_session(
    config: AppConfig,
    estimator: Box<dyn PoseEstimator>,
    sprite: Option<RgbaImage>,
    display: (u32, u32),
    frame_rx: Receiver<Frame>,
    event_tx: Sender<SessionEvent>,
) -> Result<SessionHandle> {
    let stop = CancelToken::new();
    let (command_tx, command_rx) = unbounded();
    let client = if config.magick_enabled {
        Some(MagickClient::new(config.magick_url.clone()).context("failed to build effect client")?)
    } else {
        None
    };

    let mut session = Session::new(
        &config,
        estimator,
        client,
        Compositor::new(display.0, display.1, sprite),
        StdRng::from_entropy(),
        command_rx,
        stop.clone(),
        Instant::now(),
    );

    let handle = thread::Builder::new()
        .name("session".into())
        .spawn(move || {
            if let Err(err) = session.run(&frame_rx, &event_tx) {
                log::error!("session ended: {err:?}");
                let _ = event_tx.send(SessionEvent::Failed(format!("{err:#}")));
            }
        })
        .context("failed to spawn session thread")?;

    Ok(SessionHandle {
        stop,
        commands: command_tx,
        handle: Some(handle),
    })
}

struct Session {
    estimator: Box<dyn PoseEstimator>,
    estimation: EstimationConfig,
    client: Option<MagickClient>,
    compositor: Compositor,
    modes: ModeController,
    clock: GestureClock,
    fps: FpsAnalyzer,
    rng: StdRng,
    catalog: Vec<EffectOption>,
    options: Vec<EffectOption>,
    bands: OptionBands,
    selected: usize,
    result: Option<RgbaImage>,
    mode_token: CancelToken,
    stop: CancelToken,
    commands: Receiver<SessionCommand>,
    effect_tx: Sender<EffectOutcome>,
    effect_rx: Receiver<EffectOutcome>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: &AppConfig,
        estimator: Box<dyn PoseEstimator>,
        client: Option<MagickClient>,
        compositor: Compositor,
        rng: StdRng,
        commands: Receiver<SessionCommand>,
        stop: CancelToken,
        now: Instant,
    ) -> Self {
        let (effect_tx, effect_rx) = bounded(1);
        let (_, height) = compositor.size();
        let mut fps = FpsAnalyzer::new();
        fps.start(now);
        Self {
            estimator,
            estimation: EstimationConfig::default(),
            client,
            compositor,
            modes: ModeController::new(config.magick_enabled, now),
            clock: GestureClock::new(config.clock),
            fps,
            rng,
            catalog: effects::catalog(),
            options: Vec::new(),
            bands: OptionBands::new(MENU_OPTION_COUNT, height as f32),
            selected: 0,
            result: None,
            mode_token: CancelToken::new(),
            stop,
            commands,
            effect_tx,
            effect_rx,
        }
    }

    fn run(&mut self, frame_rx: &Receiver<Frame>, event_tx: &Sender<SessionEvent>) -> Result<()> {
        while !self.stop.is_cancelled() {
            let frame = match recv_latest_frame(frame_rx) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => bail!("camera stream closed"),
            };
            if let Some(view) = self.tick(frame)? {
                // The UI only needs the newest view.
                let _ = event_tx.try_send(SessionEvent::Frame(view));
            }
        }
        Ok(())
    }

    /// Processes one frame. Returns `None` when the frame was discarded because its mode
    /// was cancelled while inference ran.
    fn tick(&mut self, frame: Frame) -> Result<Option<SessionView>> {
        let now = frame.timestamp;
        let token = self.mode_token.clone();

        let poses = if self.needs_poses() {
            self.estimator
                .estimate(&frame, &self.estimation)
                .context("pose estimation failed")?
        } else {
            Vec::new()
        };

        self.drain_commands(now)?;
        if token.is_cancelled() || self.stop.is_cancelled() {
            log::debug!("discarding poses from a cancelled mode");
            return Ok(None);
        }
        self.drain_effects(now)?;

        let live = self.compositor.to_display(&frame)?;
        self.compositor.capture_background(&live);
        let poses = scale_poses(
            filter_poses(poses, MIN_POSE_CONFIDENCE),
            (frame.width, frame.height),
            self.compositor.size(),
        );

        if let Some(transition) = self.modes.poll_timer(now) {
            self.on_transition(transition, now)?;
            if transition.to == DisplayMode::Snapshot(SnapshotStage::Awaiting) {
                self.request_effect(&live)?;
            }
        }

        if self.modes.watches_gesture() {
            let before = self.clock.phase();
            let event = self.clock.observe(&poses, now);
            let after = self.clock.phase();
            if before != after {
                log::debug!(
                    "magick clock {before:?} -> {after:?} (hold {:?}, grace {:?})",
                    self.clock.hold_budget(),
                    self.clock.reset_budget()
                );
            }
            if event == Some(ClockEvent::Triggered) {
                if let Some(transition) = self.modes.gesture_triggered(now) {
                    self.on_transition(transition, now)?;
                }
            }
        }

        if self.modes.mode() == DisplayMode::Menu {
            self.selected = self.bands.select(&poses, self.selected);
        }

        let frame = self.render(live, &poses);
        if self.modes.mode().is_overlay() {
            match self.fps.update(now) {
                Ok(()) | Err(FpsError::NotStarted) => {}
            }
        }

        Ok(Some(SessionView {
            frame,
            mode: self.modes.mode(),
            banner: self.banner(now),
            options: self.options.iter().map(|o| o.display_name).collect(),
            selected: self.selected,
        }))
    }

    fn needs_poses(&self) -> bool {
        !matches!(self.modes.mode(), DisplayMode::Snapshot(_))
    }

    fn drain_commands(&mut self, now: Instant) -> Result<()> {
        loop {
            match self.commands.try_recv() {
                Ok(SessionCommand::CancelMenu) => {
                    if let Some(transition) = self.modes.cancel_menu(now) {
                        self.on_transition(transition, now)?;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    fn drain_effects(&mut self, now: Instant) -> Result<()> {
        while let Ok(outcome) = self.effect_rx.try_recv() {
            if outcome.token.is_cancelled() {
                log::debug!("discarding effect result for a cancelled snapshot");
                continue;
            }
            let transition = match outcome.result {
                Ok(image) => {
                    self.result = Some(image);
                    self.modes.effect_ready(now)
                }
                Err(err) => {
                    log::error!("effect request failed: {err}");
                    self.modes.effect_failed(now)
                }
            };
            if let Some(transition) = transition {
                self.on_transition(transition, now)?;
            }
        }
        Ok(())
    }

    fn on_transition(&mut self, transition: Transition, now: Instant) -> Result<()> {
        self.mode_token.cancel();
        self.mode_token = CancelToken::new();
        self.clock.reset();

        if transition.from.is_overlay() {
            match self.fps.stop() {
                Ok(info) => log::debug!(
                    "{} ran {:.1}s at {:.1} fps ({} frames)",
                    transition.from.label(),
                    info.elapsed_secs,
                    info.fps,
                    info.frames_read
                ),
                Err(FpsError::NotStarted) => {}
            }
        }
        if transition.to.is_overlay() {
            self.fps.start(now);
        }

        match transition.to {
            DisplayMode::Menu => {
                self.options = effects::random_options(&self.catalog, MENU_OPTION_COUNT, &mut self.rng)?;
                self.selected = 0;
            }
            DisplayMode::Costume | DisplayMode::Wireframe => {
                self.options.clear();
                self.result = None;
            }
            DisplayMode::Snapshot(_) => {}
        }
        Ok(())
    }

    fn request_effect(&mut self, live: &RgbaImage) -> Result<()> {
        let client = self
            .client
            .clone()
            .context("snapshot requested without an effect service")?;
        let option = self
            .options
            .get(self.selected)
            .cloned()
            .context("no effect option selected")?;
        let snapshot = self
            .compositor
            .snapshot(live, SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT)?;
        let token = self.mode_token.clone();
        let effect_tx = self.effect_tx.clone();

        log::info!("applying {} to snapshot", option.display_name);
        thread::Builder::new()
            .name("effect-request".into())
            .spawn(move || {
                let result = client.convert(&snapshot, &option);
                if token.is_cancelled() {
                    log::debug!("effect {} finished after cancel", option.display_name);
                    return;
                }
                let _ = effect_tx.send(EffectOutcome { token, result });
            })
            .context("failed to spawn effect request")?;
        Ok(())
    }

    fn render(&mut self, live: RgbaImage, poses: &[Pose]) -> RgbaImage {
        match self.modes.mode() {
            DisplayMode::Costume => {
                let commands =
                    overlay::costume(poses, MIN_PART_CONFIDENCE, self.compositor.has_sprite());
                self.compositor.compose(live, &commands)
            }
            DisplayMode::Wireframe => {
                let commands = overlay::wireframe(poses, MIN_PART_CONFIDENCE, &mut self.rng);
                let base = self.compositor.background().cloned().unwrap_or(live);
                self.compositor.compose(base, &commands)
            }
            DisplayMode::Menu => self.compositor.compose(live, &overlay::menu(poses)),
            DisplayMode::Snapshot(SnapshotStage::Showing { .. }) => match &self.result {
                Some(result) => result.clone(),
                None => self.compositor.compose(live, &[]),
            },
            DisplayMode::Snapshot(_) => self.compositor.compose(live, &[]),
        }
    }

    fn banner(&self, now: Instant) -> Option<String> {
        match self.modes.mode() {
            DisplayMode::Snapshot(SnapshotStage::Awaiting) => self
                .options
                .get(self.selected)
                .map(|option| format!("Applying {}...", option.display_name)),
            DisplayMode::Snapshot(_) => self.modes.stage_banner(now),
            DisplayMode::Menu => self
                .clock
                .seconds_left()
                .map(|seconds| format!("Selecting effect in {seconds}")),
            _ if self.modes.watches_gesture() => self.clock.format_countdown(),
            _ => None,
        }
    }
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Result<Frame, RecvTimeoutError> {
    let mut frame = frame_rx.recv_timeout(FRAME_WAIT)?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MODE_SWITCH_DELAY, SNAPSHOT_COUNTDOWN},
        keypoints::tests::{menu_gesture_pose, standing_pose},
    };

    const WIDTH: u32 = 192;
    const HEIGHT: u32 = 108;
    const STEP: Duration = Duration::from_millis(100);

    /// Returns whatever poses the test put in the shared slot. Optionally fires a command
    /// while "inference" runs.
    struct ScriptedEstimator {
        poses: Arc<std::sync::Mutex<Vec<Pose>>>,
        during_inference: Option<Sender<SessionCommand>>,
    }

    impl PoseEstimator for ScriptedEstimator {
        fn estimate(&mut self, _frame: &Frame, _config: &EstimationConfig) -> Result<Vec<Pose>> {
            if let Some(tx) = self.during_inference.take() {
                tx.send(SessionCommand::CancelMenu).unwrap();
            }
            Ok(self.poses.lock().unwrap().clone())
        }
    }

    struct Harness {
        session: Session,
        poses: Arc<std::sync::Mutex<Vec<Pose>>>,
        commands: Sender<SessionCommand>,
        t0: Instant,
    }

    fn harness(magick_enabled: bool) -> Harness {
        let poses = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (commands, command_rx) = unbounded();
        let config = AppConfig {
            magick_enabled,
            ..AppConfig::from_lookup(|_| None)
        };
        let client = magick_enabled.then(|| MagickClient::new("http://127.0.0.1:9").unwrap());
        let t0 = Instant::now();
        let session = Session::new(
            &config,
            Box::new(ScriptedEstimator {
                poses: poses.clone(),
                during_inference: None,
            }),
            client,
            Compositor::new(WIDTH, HEIGHT, None),
            StdRng::seed_from_u64(3),
            command_rx,
            CancelToken::new(),
            t0,
        );
        Harness {
            session,
            poses,
            commands,
            t0,
        }
    }

    fn frame_at(timestamp: Instant) -> Frame {
        Frame {
            rgba: [40, 80, 120, 255].repeat((WIDTH * HEIGHT) as usize),
            width: WIDTH,
            height: HEIGHT,
            timestamp,
        }
    }

    impl Harness {
        fn set_poses(&self, poses: Vec<Pose>) {
            *self.poses.lock().unwrap() = poses;
        }

        /// Ticks every `STEP` from `from` up to and including `until`.
        fn run(&mut self, from: Duration, until: Duration) -> Option<SessionView> {
            let mut last = None;
            let mut at = from;
            while at <= until {
                last = self.session.tick(frame_at(self.t0 + at)).unwrap().or(last);
                at += STEP;
            }
            last
        }
    }

    #[test]
    fn overlays_alternate_without_the_menu() {
        let mut h = harness(false);
        h.set_poses(vec![menu_gesture_pose()]);
        let view = h.run(Duration::ZERO, Duration::from_secs(9)).unwrap();
        assert_eq!(view.mode, DisplayMode::Costume);
        assert_eq!(view.banner, None);
        assert_eq!(view.frame.dimensions(), (WIDTH, HEIGHT));

        let view = h.run(MODE_SWITCH_DELAY, MODE_SWITCH_DELAY).unwrap();
        assert_eq!(view.mode, DisplayMode::Wireframe);
    }

    #[test]
    fn held_gesture_opens_the_menu_with_fresh_options() {
        let mut h = harness(true);
        h.set_poses(vec![menu_gesture_pose()]);

        let view = h.run(Duration::ZERO, Duration::from_millis(1500)).unwrap();
        assert_eq!(view.mode, DisplayMode::Costume);
        assert_eq!(view.banner.as_deref(), Some("ImageMagick in 3"));

        let view = h.run(Duration::from_millis(1600), Duration::from_millis(4000)).unwrap();
        assert_eq!(view.mode, DisplayMode::Menu);
        assert_eq!(view.options.len(), MENU_OPTION_COUNT);
        assert_eq!(view.banner, None);

        // Holding on inside the menu counts down to the effect choice, not to the menu.
        let view = h.run(Duration::from_millis(4100), Duration::from_millis(5600)).unwrap();
        assert_eq!(view.mode, DisplayMode::Menu);
        assert_eq!(view.banner.as_deref(), Some("Selecting effect in 3"));
    }

    #[test]
    fn menu_cancel_returns_to_costume() {
        let mut h = harness(true);
        h.set_poses(vec![menu_gesture_pose()]);
        h.run(Duration::ZERO, Duration::from_millis(4000));
        assert_eq!(h.session.modes.mode(), DisplayMode::Menu);

        h.set_poses(vec![standing_pose(0.9)]);
        h.commands.send(SessionCommand::CancelMenu).unwrap();
        // The tick that sees the cancel belongs to the menu and is dropped.
        let view = h.run(Duration::from_millis(4100), Duration::from_millis(4200)).unwrap();
        assert_eq!(view.mode, DisplayMode::Costume);
        assert!(view.options.is_empty());
    }

    #[test]
    fn poses_from_a_cancelled_mode_are_discarded() {
        let mut h = harness(true);
        h.set_poses(vec![menu_gesture_pose()]);
        h.run(Duration::ZERO, Duration::from_millis(4000));
        assert_eq!(h.session.modes.mode(), DisplayMode::Menu);

        let (tx, rx) = unbounded();
        h.session.commands = rx;
        h.session.estimator = Box::new(ScriptedEstimator {
            poses: h.poses.clone(),
            during_inference: Some(tx),
        });
        let hold_before = h.session.clock.hold_budget();
        assert!(h.session.tick(frame_at(h.t0 + Duration::from_millis(4100))).unwrap().is_none());
        assert_eq!(h.session.modes.mode(), DisplayMode::Costume);
        assert!(h.session.clock.hold_budget() >= hold_before);
    }

    #[test]
    fn stale_effect_results_are_ignored() {
        let mut h = harness(true);
        h.set_poses(vec![menu_gesture_pose()]);
        h.run(Duration::ZERO, Duration::from_millis(4000));
        // Second hold picks the effect and starts the snapshot countdown.
        h.run(Duration::from_millis(4100), Duration::from_millis(8200));
        assert!(matches!(
            h.session.modes.mode(),
            DisplayMode::Snapshot(SnapshotStage::Countdown { .. })
        ));

        let stale = CancelToken::new();
        stale.cancel();
        h.session
            .effect_tx
            .send(EffectOutcome {
                token: stale,
                result: Ok(RgbaImage::new(4, 4)),
            })
            .unwrap();
        h.session.drain_effects(h.t0 + Duration::from_millis(8300)).unwrap();
        assert!(h.session.result.is_none());
        assert!(matches!(
            h.session.modes.mode(),
            DisplayMode::Snapshot(SnapshotStage::Countdown { .. })
        ));
    }

    #[test]
    fn effect_result_is_shown_then_costume_resumes() {
        let mut h = harness(true);
        h.set_poses(vec![menu_gesture_pose()]);
        h.run(Duration::ZERO, Duration::from_millis(4000));
        h.run(Duration::from_millis(4100), Duration::from_millis(8200));
        let snapshot_at = h.t0 + Duration::from_millis(8200);

        // Pretend the capture already happened so no request goes out.
        h.session.modes.poll_timer(snapshot_at + SNAPSHOT_COUNTDOWN);
        h.session
            .effect_tx
            .send(EffectOutcome {
                token: h.session.mode_token.clone(),
                result: Ok(RgbaImage::from_pixel(8, 4, image::Rgba([9, 9, 9, 255]))),
            })
            .unwrap();

        let shown_at = Duration::from_millis(8200) + SNAPSHOT_COUNTDOWN;
        let view = h.run(shown_at, shown_at).unwrap();
        assert!(matches!(
            view.mode,
            DisplayMode::Snapshot(SnapshotStage::Showing { .. })
        ));
        assert_eq!(view.frame.dimensions(), (8, 4));
        assert_eq!(view.banner.as_deref(), Some("Returning to main menu in 5"));

        let view = h
            .run(shown_at + Duration::from_secs(5), shown_at + Duration::from_secs(5))
            .unwrap();
        assert_eq!(view.mode, DisplayMode::Costume);
    }
}
