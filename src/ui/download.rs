use super::{
    ActiveTheme, AnyElement, AppView, Context, DownloadMessage, DownloadState, IntoElement,
    ModelDownloadEvent, ParentElement, Styled, StyledExt, Tag, div, ensure_pose_model_ready,
    h_flex, load_estimator, thread, v_flex,
};
use crate::config::AppConfig;
use crossbeam_channel::Sender;

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent) => {
                    state.message = "Pose model found, loading...".to_string();
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { total }) => {
                    state.total = total;
                    state.message = "Downloading pose model...".to_string();
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress { downloaded, total }) => {
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished) => {
                    state.message = "Loading pose model...".to_string();
                }
                DownloadMessage::Ready(estimator) => {
                    state.message = "Starting camera...".to_string();
                    state.estimator = Some(estimator);
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.message = "Pose model unavailable".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let detail = match state.total {
            Some(total) if total > 0 => {
                let percent = (state.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("Downloaded {} KB", state.downloaded / 1024),
        };

        let (status_text, status_color) = if state.error.is_some() {
            ("✗ Model unavailable", theme.accent)
        } else if state.estimator.is_some() {
            ("✓ Model ready", theme.success)
        } else {
            ("⟳ Preparing model", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(status_color)
                            .font_semibold()
                            .child(status_text),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(self.config.pose_model.label()),
                    ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(progress_bar_string(state.downloaded, state.total)),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(detail),
            )
            .child(div().text_color(theme.foreground).child(state.message.clone()));

        if let Some(err) = &state.error {
            container = container.child(Tag::danger().rounded_full().child(format!("Error: {err}")));
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

/// Provisions and loads the pose model off the UI thread.
pub(super) fn spawn_model_download(
    config: AppConfig,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let result = ensure_pose_model_ready(
            config.pose_model,
            &config.pose_model_path,
            config.pose_model_url.as_deref(),
            |event| {
                let _ = tx.send(DownloadMessage::Event(event));
            },
        )
        .and_then(|()| load_estimator(config.pose_model, &config.pose_model_path));

        match result {
            Ok(estimator) => {
                let _ = tx.send(DownloadMessage::Ready(estimator));
            }
            Err(err) => {
                log::error!("failed to prepare pose model: {err:?}");
                let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
            }
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => {
            let spinner_width = ((downloaded / 64) as usize % BAR_LEN) + 1;
            format!("[{:-<spinner_width$}] unknown size", ">")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::progress_bar_string;

    #[test]
    fn bar_fills_with_progress() {
        assert_eq!(
            progress_bar_string(50, Some(100)),
            format!("[{}{}]  50.0%", "=".repeat(15), " ".repeat(15))
        );
        assert!(progress_bar_string(200, Some(100)).ends_with("100.0%"));
    }

    #[test]
    fn unknown_size_spins() {
        assert!(progress_bar_string(0, None).starts_with("[>]"));
        assert!(progress_bar_string(0, Some(0)).ends_with("unknown size"));
    }
}
