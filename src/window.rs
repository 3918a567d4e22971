//! Window creation and platform event wiring.
//!
//! [`WindowShim`] is the winit [`ApplicationHandler`]: it creates the window
//! when the event loop resumes and folds window events into the close flag and
//! the [`InputState`]. [`WinitPlatform`] pairs it with the event loop and pumps
//! events without blocking, once per frame.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow, bail};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

use crate::{flow::FramePlatform, input::InputState};

/// How many times [`WindowShim::open`] pumps the event loop waiting for the
/// window before giving up.
const OPEN_ATTEMPTS: usize = 100;

/// Requested title and size. Non-positive dimensions select the fallback
/// placement, see [`resolve_window_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: i32,
    pub height: i32,
}

impl WindowConfig {
    pub fn new(title: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
        }
    }
}

/// Outcome of the window size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlacement {
    Sized { width: u32, height: u32 },
    Maximized,
}

/// Positive requests are taken as-is. A non-positive dimension means "monitor
/// size minus its absolute value"; without a known monitor the window opens
/// maximized instead.
pub fn resolve_window_size(requested: (i32, i32), monitor: Option<(u32, u32)>) -> WindowPlacement {
    let (width, height) = requested;
    if width > 0 && height > 0 {
        return WindowPlacement::Sized {
            width: width as u32,
            height: height as u32,
        };
    }
    let Some((monitor_w, monitor_h)) = monitor else {
        return WindowPlacement::Maximized;
    };
    let fit = |requested: i32, available: u32| -> u32 {
        if requested > 0 {
            requested as u32
        } else {
            available.saturating_sub(requested.unsigned_abs()).max(1)
        }
    };
    WindowPlacement::Sized {
        width: fit(width, monitor_w),
        height: fit(height, monitor_h),
    }
}

pub struct WindowShim {
    config: WindowConfig,
    window: Option<Arc<Window>>,
    error: Option<anyhow::Error>,
    should_close: bool,
    input: InputState,
}

impl WindowShim {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window: None,
            error: None,
            should_close: false,
            input: InputState::new(),
        }
    }

    /// Pumps `event_loop` until the window exists.
    ///
    /// Window creation failures are fatal and returned as errors.
    pub fn open(&mut self, event_loop: &mut EventLoop<()>) -> Result<Arc<Window>> {
        for _ in 0..OPEN_ATTEMPTS {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), self);
            if let Some(err) = self.error.take() {
                return Err(err);
            }
            if let Some(window) = &self.window {
                log::info!(
                    "opened window '{}' ({}x{})",
                    self.config.title,
                    window.inner_size().width,
                    window.inner_size().height
                );
                return Ok(window.clone());
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with code {code} before the window opened");
            }
        }
        bail!("window '{}' did not open", self.config.title)
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    pub fn request_close(&mut self) {
        self.should_close = true;
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Window> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .map(|m| (m.size().width, m.size().height));
        let mut attrs = Window::default_attributes().with_title(self.config.title.clone());
        attrs = match resolve_window_size((self.config.width, self.config.height), monitor) {
            WindowPlacement::Sized { width, height } => {
                attrs.with_inner_size(PhysicalSize::new(width, height))
            }
            WindowPlacement::Maximized => attrs.with_maximized(true),
        };
        event_loop
            .create_window(attrs)
            .map_err(|e| anyhow!("failed to create window '{}': {e}", self.config.title))
    }
}

impl ApplicationHandler for WindowShim {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.create_window(event_loop) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                log::error!("{e:#}");
                self.error = Some(e);
                self.should_close = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                log::info!("close requested");
                self.should_close = true;
                event_loop.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.set_cursor(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.input.clear_cursor(),
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.apply_mouse_input(button, state);
            }
            _ => {}
        }
    }
}

/// The real [`FramePlatform`]: a winit event loop pumped with a zero timeout.
pub struct WinitPlatform {
    shim: WindowShim,
    event_loop: EventLoop<()>,
}

impl WinitPlatform {
    pub fn new(event_loop: EventLoop<()>, shim: WindowShim) -> Self {
        Self { shim, event_loop }
    }
}

impl FramePlatform for WinitPlatform {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.shim);
        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            self.shim.request_close();
        }
    }

    fn should_close(&self) -> bool {
        self.shim.should_close()
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.shim
            .window()
            .map(|w| (w.inner_size().width, w.inner_size().height))
            .unwrap_or((0, 0))
    }

    fn pixels_per_point(&self) -> f32 {
        self.shim
            .window()
            .map(|w| w.scale_factor() as f32)
            .unwrap_or(1.0)
    }

    fn input(&self) -> &InputState {
        self.shim.input()
    }
}
