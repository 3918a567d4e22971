//! Explicit pointer state.
//!
//! There is no event queue: the window shim overwrites this state as platform
//! events arrive, and consumers (the UI overlay) read the latest values once
//! per frame.

use winit::event::{ElementState, MouseButton as WinitMouseButton};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub const ALL: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

    fn slot(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }

    /// `None` for buttons the programs do not track (back, forward, ...).
    pub fn from_winit(button: WinitMouseButton) -> Option<Self> {
        match button {
            WinitMouseButton::Left => Some(MouseButton::Left),
            WinitMouseButton::Right => Some(MouseButton::Right),
            WinitMouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Latest cursor position in physical pixels and button down-state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    cursor: Option<(f32, f32)>,
    buttons: [bool; 3],
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<(f32, f32)> {
        self.cursor
    }

    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor = Some((x, y));
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons[button.slot()]
    }

    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        self.buttons[button.slot()] = down;
    }

    /// Applies a winit button event; untracked buttons are ignored.
    pub fn apply_mouse_input(&mut self, button: WinitMouseButton, state: ElementState) {
        if let Some(button) = MouseButton::from_winit(button) {
            self.set_button(button, state == ElementState::Pressed);
        }
    }

    pub fn buttons(&self) -> [bool; 3] {
        self.buttons
    }
}
