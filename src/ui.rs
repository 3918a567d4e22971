//! Immediate-mode UI overlay.
//!
//! [`UiOverlay`] adapts egui to the rendering context: it converts the explicit
//! [`InputState`] into egui input once per frame and, at the end of the frame,
//! records the tessellated output into the shared command buffer as one
//! [`Command::PaintUi`](crate::render::Command::PaintUi). The context paints it
//! with its UI renderer and applies egui's texture changes.
//!
//! ```text
//! begin_frame(input) -> widgets via context() -> end_frame(cmd)
//! ```
//!
//! `end_frame` must be called inside the render pass the overlay draws into.

use anyhow::Result;

use crate::{
    context::RenderContext,
    data_structures::handle::TextureHandle,
    input::{InputState, MouseButton},
    render::{CommandBuffer, UiPaint, UiScreen},
};

const CUSTOM_FONT: &str = "custom";

pub struct UiOverlay<'c> {
    /// Registered program textures, unregistered in reverse on drop.
    user_textures: Vec<egui::TextureId>,
    egui: egui::Context,
    ctx: &'c dyn RenderContext,
    last_buttons: [bool; 3],
    last_cursor: Option<(f32, f32)>,
}

impl<'c> UiOverlay<'c> {
    /// `font` replaces egui's first choice for every font family.
    pub fn new(ctx: &'c dyn RenderContext, font: Option<Vec<u8>>) -> Result<Self> {
        let egui = egui::Context::default();
        if let Some(font) = font {
            install_font(&egui, font)?;
        }
        Ok(Self {
            user_textures: Vec::new(),
            egui,
            ctx,
            last_buttons: [false; 3],
            last_cursor: None,
        })
    }

    /// Makes a context texture usable in egui image widgets. The texture must
    /// outlive the overlay.
    pub fn register_texture(&mut self, texture: TextureHandle) -> Result<egui::TextureId> {
        let id = self.ctx.register_ui_texture(texture)?;
        self.user_textures.push(id);
        Ok(id)
    }

    pub fn context(&self) -> &egui::Context {
        &self.egui
    }

    pub fn begin_frame(
        &mut self,
        input: &InputState,
        framebuffer: (u32, u32),
        pixels_per_point: f32,
        time: f64,
    ) {
        let raw = raw_input(
            input,
            self.last_cursor,
            self.last_buttons,
            framebuffer,
            pixels_per_point,
            time,
        );
        self.last_cursor = input.cursor();
        self.last_buttons = input.buttons();
        self.egui.begin_pass(raw);
    }

    /// Ends the egui pass and records the overlay into `cmd`.
    pub fn end_frame(&mut self, cmd: &mut CommandBuffer, framebuffer: (u32, u32)) {
        let output = self.egui.end_pass();
        let pixels_per_point = output.pixels_per_point;
        let primitives = self.egui.tessellate(output.shapes, pixels_per_point);
        log::trace!(
            "ui: {} primitives, {} texture sets, {} frees",
            primitives.len(),
            output.textures_delta.set.len(),
            output.textures_delta.free.len()
        );

        cmd.push_debug_group("UI");
        cmd.paint_ui(UiPaint::new(
            primitives,
            output.textures_delta,
            UiScreen {
                size_in_pixels: [framebuffer.0, framebuffer.1],
                pixels_per_point,
            },
        ));
        cmd.pop_debug_group();
    }
}

impl Drop for UiOverlay<'_> {
    fn drop(&mut self) {
        for id in self.user_textures.drain(..).rev() {
            self.ctx.unregister_ui_texture(id);
        }
    }
}

fn install_font(egui: &egui::Context, font: Vec<u8>) -> Result<()> {
    anyhow::ensure!(
        is_font_file(&font),
        "font data is neither TrueType nor OpenType"
    );
    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        CUSTOM_FONT.to_owned(),
        egui::FontData::from_owned(font).into(),
    );
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .insert(0, CUSTOM_FONT.to_owned());
    }
    egui.set_fonts(fonts);
    log::info!("custom ui font installed");
    Ok(())
}

fn is_font_file(data: &[u8]) -> bool {
    matches!(
        data.get(..4),
        Some([0x00, 0x01, 0x00, 0x00]) | Some(b"OTTO") | Some(b"true") | Some(b"ttcf")
    )
}

fn egui_button(button: MouseButton) -> egui::PointerButton {
    match button {
        MouseButton::Left => egui::PointerButton::Primary,
        MouseButton::Right => egui::PointerButton::Secondary,
        MouseButton::Middle => egui::PointerButton::Middle,
    }
}

/// Builds egui input from the pointer state of this frame and the previous one.
///
/// Cursor positions are physical pixels; egui works in points, so everything
/// is divided by `pixels_per_point`. Buttons produce an event only when their
/// state changed since `last_buttons`.
pub fn raw_input(
    input: &InputState,
    last_cursor: Option<(f32, f32)>,
    last_buttons: [bool; 3],
    framebuffer: (u32, u32),
    pixels_per_point: f32,
    time: f64,
) -> egui::RawInput {
    let ppp = if pixels_per_point > 0.0 {
        pixels_per_point
    } else {
        1.0
    };
    let to_points = |(x, y): (f32, f32)| egui::pos2(x / ppp, y / ppp);

    let mut events = Vec::new();
    match (input.cursor(), last_cursor) {
        (Some(cursor), last) if last != Some(cursor) => {
            events.push(egui::Event::PointerMoved(to_points(cursor)));
        }
        (None, Some(_)) => events.push(egui::Event::PointerGone),
        _ => {}
    }

    let pos = input
        .cursor()
        .or(last_cursor)
        .map(to_points)
        .unwrap_or(egui::Pos2::ZERO);
    for ((button, down), was_down) in MouseButton::ALL
        .into_iter()
        .zip(input.buttons())
        .zip(last_buttons)
    {
        if down != was_down {
            events.push(egui::Event::PointerButton {
                pos,
                button: egui_button(button),
                pressed: down,
                modifiers: egui::Modifiers::NONE,
            });
        }
    }

    let mut raw = egui::RawInput {
        screen_rect: Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(framebuffer.0 as f32 / ppp, framebuffer.1 as f32 / ppp),
        )),
        time: Some(time),
        events,
        ..Default::default()
    };
    raw.viewports
        .entry(egui::ViewportId::ROOT)
        .or_default()
        .native_pixels_per_point = Some(ppp);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::desc::{TextureDesc, TextureSize},
        headless::HeadlessContext,
        render::Command,
    };

    #[test]
    fn cursor_and_press_become_events() {
        let mut input = InputState::new();
        input.set_cursor(200.0, 100.0);
        input.set_button(MouseButton::Left, true);

        let raw = raw_input(&input, None, [false; 3], (960, 540), 2.0, 1.5);
        assert_eq!(
            raw.screen_rect,
            Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(480.0, 270.0)))
        );
        assert_eq!(raw.time, Some(1.5));
        assert_eq!(raw.events.len(), 2);
        assert_eq!(raw.events[0], egui::Event::PointerMoved(egui::pos2(100.0, 50.0)));
        assert!(matches!(
            raw.events[1],
            egui::Event::PointerButton {
                button: egui::PointerButton::Primary,
                pressed: true,
                ..
            }
        ));
    }

    #[test]
    fn unchanged_state_produces_no_events() {
        let mut input = InputState::new();
        input.set_cursor(10.0, 10.0);
        input.set_button(MouseButton::Right, true);
        let raw = raw_input(&input, Some((10.0, 10.0)), [false, true, false], (100, 100), 1.0, 0.0);
        assert!(raw.events.is_empty());
    }

    #[test]
    fn release_and_leave() {
        let input = InputState::new();
        let raw = raw_input(&input, Some((5.0, 5.0)), [false, false, true], (100, 100), 1.0, 0.0);
        assert_eq!(raw.events[0], egui::Event::PointerGone);
        assert!(matches!(
            raw.events[1],
            egui::Event::PointerButton {
                button: egui::PointerButton::Middle,
                pressed: false,
                ..
            }
        ));
    }

    #[test]
    fn first_frame_paints_once_with_the_font_atlas() {
        let ctx = HeadlessContext::default();
        let mut overlay = UiOverlay::new(&ctx, None).unwrap();
        overlay.begin_frame(&InputState::new(), (320, 200), 1.0, 0.0);
        egui::Window::new("hello").show(overlay.context(), |ui| ui.label("world"));
        let mut cmd = CommandBuffer::new();
        overlay.end_frame(&mut cmd, (320, 200));

        let commands = cmd.commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], Command::PushDebugGroup("UI".to_string()));
        let Command::PaintUi(paint) = &commands[1] else {
            panic!("expected a UI paint, got {:?}", commands[1]);
        };
        assert_eq!(paint.screen.size_in_pixels, [320, 200]);
        assert!(paint
            .textures_delta
            .set
            .iter()
            .any(|(id, delta)| *id == egui::TextureId::default() && delta.pos.is_none()));
        assert!(paint.mesh_textures().count() > 0);
    }

    #[test]
    fn registered_textures_are_released_with_the_overlay() {
        let ctx = HeadlessContext::default();
        let image = ctx
            .create_texture(TextureDesc {
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                size: TextureSize::Fixed { width: 2, height: 2 },
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                data: None,
                debug_name: "image",
            })
            .unwrap();
        let id = {
            let mut overlay = UiOverlay::new(&ctx, None).unwrap();
            let id = overlay.register_texture(image.handle()).unwrap();
            assert_eq!(ctx.ui_user_texture(id), Some(image.handle()));
            assert!(overlay.register_texture(ctx.current_swapchain_texture()).is_err());
            id
        };
        assert_eq!(ctx.ui_user_texture(id), None);
    }

    #[test]
    fn font_magic() {
        assert!(is_font_file(&[0, 1, 0, 0, 0]));
        assert!(is_font_file(b"OTTO...."));
        assert!(!is_font_file(b"PNG."));
    }
}
