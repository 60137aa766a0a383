use super::render_util::to_render_image;
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, Context, DisplayMode,
    FluentBuilder, IntoElement, ObjectFit, ParentElement, RenderImage, SessionEvent,
    SharedString, Styled, StyledImage, Tag, Window, div, h_flex, img, px, v_flex,
};

const SIDE_PANEL_WIDTH: f32 = 320.0;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.poll_session_events(window, cx);

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for camera...")
                .into_any_element()
        };

        let banner = self.status.banner.clone().map(|text| {
            div()
                .absolute()
                .top(px(24.0))
                .left(px(24.0))
                .px_4()
                .py_2()
                .rounded_lg()
                .bg(gpui::rgba(0x000000aa))
                .text_xl()
                .text_color(gpui::rgb(0xffffff))
                .child(text)
        });

        let stage = div()
            .relative()
            .flex_1()
            .h_full()
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view)
            .when_some(banner, |this, banner| this.child(banner));

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(
                h_flex()
                    .flex_1()
                    .gap_3()
                    .p_4()
                    .items_start()
                    .child(stage)
                    .child(self.render_side_panel(cx)),
            )
            .into_any_element()
    }

    fn render_side_panel(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let (accent, success, border, foreground, muted_foreground) = {
            let theme = cx.theme();
            (
                theme.accent,
                theme.success,
                theme.border,
                theme.foreground,
                theme.muted_foreground,
            )
        };
        let status = &self.status;

        let mode_color = match status.mode {
            DisplayMode::Menu | DisplayMode::Snapshot(_) => accent,
            _ => success,
        };
        let mode_row = h_flex()
            .gap_2()
            .items_center()
            .child(
                div()
                    .px_2()
                    .py_0p5()
                    .rounded_md()
                    .bg(gpui::rgba(0x00000033))
                    .text_xs()
                    .text_color(mode_color)
                    .child(format!("● {}", status.mode.label())),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(muted_foreground)
                    .child(if self.config.magick_enabled {
                        "ImageMagick on"
                    } else {
                        "ImageMagick off"
                    }),
            );

        let mut panel = v_flex()
            .w(px(SIDE_PANEL_WIDTH))
            .gap_3()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(mode_row);

        if matches!(status.mode, DisplayMode::Menu) {
            let mut list = v_flex().gap_1();
            for (idx, name) in status.options.iter().enumerate() {
                let selected = idx == status.selected;
                list = list.child(
                    div()
                        .px_3()
                        .py_2()
                        .rounded_md()
                        .border_1()
                        .border_color(if selected { accent } else { border })
                        .bg(if selected {
                            gpui::rgba(0x60a5fa33)
                        } else {
                            gpui::rgba(0x00000000)
                        })
                        .text_sm()
                        .text_color(foreground)
                        .child(format!("{}. {name}", idx + 1)),
                );
            }

            panel = panel
                .child(
                    div()
                        .text_xs()
                        .text_color(muted_foreground)
                        .child("Move your right hand to pick, raise your left hand to confirm"),
                )
                .child(list)
                .child(
                    Button::new(SharedString::from("cancel-menu"))
                        .outline()
                        .label("Back to costume")
                        .on_click(cx.listener(|this, _, _, cx| {
                            if let Some(session) = &this.session {
                                session.cancel_menu();
                            }
                            cx.notify();
                        })),
                );
        }

        if let Some(err) = &status.error {
            panel = panel.child(Tag::danger().rounded_full().child(err.clone()));
        }

        panel.into_any_element()
    }

    fn poll_session_events(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(rx) = self.event_rx.take() else {
            return;
        };
        let mut keep = true;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::Frame(view) => {
                    if let Some(image) = to_render_image(&view.frame) {
                        self.replace_latest_image(image, window, cx);
                    }
                    self.status.mode = view.mode;
                    self.status.banner = view.banner;
                    self.status.options = view.options;
                    self.status.selected = view.selected;
                }
                SessionEvent::Failed(message) => {
                    self.status.error = Some(message);
                    self.status.banner = None;
                    keep = false;
                }
            }
        }
        if keep {
            self.event_rx = Some(rx);
        } else {
            self.session = None;
            self.camera_stream = None;
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every frame unless it is released explicitly.
            cx.drop_image(old_image, Some(window));
        }
    }
}
