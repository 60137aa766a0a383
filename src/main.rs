#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod effects;
mod fps;
mod keypoints;
mod magick_clock;
mod model_download;
mod modes;
mod overlay;
mod pipeline;
mod types;
mod ui;

use std::thread;

use anyhow::Result;
use gpui::Application;

use config::AppConfig;
use effects::MagickClient;

fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::from_env();
    log::info!(
        "pose model {} at {}, ImageMagick menu {}",
        config.pose_model.label(),
        config.pose_model_path.display(),
        if config.magick_enabled { "enabled" } else { "disabled" }
    );
    if config.magick_enabled {
        probe_effect_service(config.magick_url.clone());
    }

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

fn probe_effect_service(url: String) {
    thread::spawn(move || {
        match MagickClient::new(url.clone()).and_then(|client| client.health()) {
            Ok(()) => log::info!("effect service reachable at {url}"),
            Err(err) => log::warn!("effect service at {url} is not healthy: {err}"),
        }
    });
}
