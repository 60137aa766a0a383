use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, bounded, unbounded};
use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};

use crate::{
    config::{AppConfig, DISPLAY_HEIGHT, DISPLAY_WIDTH},
    model_download::{ModelDownloadEvent, ensure_pose_model_ready},
    modes::DisplayMode,
    pipeline::{
        self, CameraStream, PoseEstimator, SessionEvent, SessionHandle, load_estimator,
        start_camera_stream, start_session,
    },
};

mod download;
mod main_view;
mod render_util;

pub fn launch_ui(app: &mut App, config: AppConfig) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Toby Magick".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    config: AppConfig,
    screen: Screen,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
    // Dropped before the camera so the session thread stops first.
    session: Option<SessionHandle>,
    camera_stream: Option<CameraStream>,
    event_rx: Option<Receiver<SessionEvent>>,
    latest_image: Option<Arc<RenderImage>>,
    status: SessionStatus,
}

enum Screen {
    Download(DownloadState),
    Main,
}

struct DownloadState {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    estimator: Option<Box<dyn PoseEstimator>>,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "Preparing pose model...".to_string(),
            error: None,
            estimator: None,
        }
    }
}

enum DownloadMessage {
    Event(ModelDownloadEvent),
    Ready(Box<dyn PoseEstimator>),
    Error(String),
}

/// What the side panel shows about the running session.
struct SessionStatus {
    mode: DisplayMode,
    banner: Option<String>,
    options: Vec<&'static str>,
    selected: usize,
    error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Costume,
            banner: None,
            options: Vec::new(),
            selected: 0,
            error: None,
        }
    }
}

impl AppView {
    fn new(config: AppConfig) -> Self {
        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(config.clone(), download_tx);

        Self {
            config,
            screen: Screen::Download(DownloadState::new()),
            download_rx,
            _download_handle: download_handle,
            session: None,
            camera_stream: None,
            event_rx: None,
            latest_image: None,
            status: SessionStatus::default(),
        }
    }

    fn start_pipeline(&mut self, estimator: Box<dyn PoseEstimator>) {
        let (frame_tx, frame_rx) = bounded(1);
        let (event_tx, event_rx) = bounded(1);

        let camera = match start_camera_stream(self.config.camera_index, frame_tx) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("failed to start camera: {err:?}");
                self.status.error = Some(format!("Camera unavailable: {err:#}"));
                return;
            }
        };

        let sprite = self.config.head_image.as_deref().and_then(|path| {
            pipeline::load_sprite(path)
                .map_err(|err| log::warn!("{err:#}; drawing the procedural head"))
                .ok()
        });

        match start_session(
            self.config.clone(),
            estimator,
            sprite,
            (DISPLAY_WIDTH, DISPLAY_HEIGHT),
            frame_rx,
            event_tx,
        ) {
            Ok(session) => {
                self.session = Some(session);
                self.camera_stream = Some(camera);
                self.event_rx = Some(event_rx);
            }
            Err(err) => {
                log::error!("failed to start session: {err:?}");
                self.status.error = Some(format!("{err:#}"));
            }
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let screen = mem::replace(&mut self.screen, Screen::Main);
        let (view, screen) = match screen {
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let view = self.render_download_view(&state, cx);
                match state.estimator.take() {
                    Some(estimator) => {
                        self.start_pipeline(estimator);
                        (view, Screen::Main)
                    }
                    None => (view, Screen::Download(state)),
                }
            }
            Screen::Main => (self.render_main(window, cx), Screen::Main),
        };
        self.screen = screen;
        view
    }
}
