//! Window input for the flow viewer.
//!
//! [`Input`] turns raw winit events into three things:
//!
//! - pointer moves and pointer-downs, forwarded to the interaction queue
//!   through an [`InteractionSender`] (never applied directly),
//! - left-drag deltas for orbiting the camera,
//! - [`KeyAction`]s for the keyboard shortcuts.
//!
//! | Key          | Action                      |
//! |--------------|-----------------------------|
//! | Up / Down    | particle count +/- 1000     |
//! | Right / Left | speed +/- 0.1               |
//! | F / V        | flow intensity +/- 0.25     |
//! | S / X        | particle size +/- 0.01      |
//! | R            | reseed the pool             |
//! | Space        | explicit pulse              |
//! | P            | pause                       |
//! | Escape       | quit                        |

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};

use crate::config::Knob;
use crate::interaction::{InteractionEvent, InteractionSender, PulseKind};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<WinitMouseButton> for MouseButton {
    fn from(btn: WinitMouseButton) -> Self {
        match btn {
            WinitMouseButton::Left => MouseButton::Left,
            WinitMouseButton::Right => MouseButton::Right,
            WinitMouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    F,
    V,
    S,
    X,
    R,
    P,
    Space,
    Escape,
    Other(u32),
}

impl From<WinitKeyCode> for KeyCode {
    fn from(key: WinitKeyCode) -> Self {
        match key {
            WinitKeyCode::ArrowUp => KeyCode::Up,
            WinitKeyCode::ArrowDown => KeyCode::Down,
            WinitKeyCode::ArrowLeft => KeyCode::Left,
            WinitKeyCode::ArrowRight => KeyCode::Right,
            WinitKeyCode::KeyF => KeyCode::F,
            WinitKeyCode::KeyV => KeyCode::V,
            WinitKeyCode::KeyS => KeyCode::S,
            WinitKeyCode::KeyX => KeyCode::X,
            WinitKeyCode::KeyR => KeyCode::R,
            WinitKeyCode::KeyP => KeyCode::P,
            WinitKeyCode::Space => KeyCode::Space,
            WinitKeyCode::Escape => KeyCode::Escape,
            _ => KeyCode::Other(key as u32),
        }
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Step a knob up (`+1`) or down (`-1`).
    Nudge(Knob, i32),
    /// Rebuild the pool with the same count and fresh seeds.
    Reseed,
    /// Explicit click-strength pulse.
    Pulse,
    TogglePause,
    Quit,
}

impl KeyAction {
    /// Binding for `key`, if any.
    pub fn from_key(key: KeyCode) -> Option<Self> {
        let action = match key {
            KeyCode::Up => KeyAction::Nudge(Knob::Count, 1),
            KeyCode::Down => KeyAction::Nudge(Knob::Count, -1),
            KeyCode::Right => KeyAction::Nudge(Knob::Speed, 1),
            KeyCode::Left => KeyAction::Nudge(Knob::Speed, -1),
            KeyCode::F => KeyAction::Nudge(Knob::FlowIntensity, 1),
            KeyCode::V => KeyAction::Nudge(Knob::FlowIntensity, -1),
            KeyCode::S => KeyAction::Nudge(Knob::ParticleSize, 1),
            KeyCode::X => KeyAction::Nudge(Knob::ParticleSize, -1),
            KeyCode::R => KeyAction::Reseed,
            KeyCode::Space => KeyAction::Pulse,
            KeyCode::P => KeyAction::TogglePause,
            KeyCode::Escape => KeyAction::Quit,
            KeyCode::Other(_) => return None,
        };
        Some(action)
    }
}

/// Keyboard and mouse state for the viewer window.
#[derive(Debug)]
pub struct Input {
    sender: InteractionSender,
    keys_held: HashSet<KeyCode>,
    mouse_held: HashSet<MouseButton>,
    /// Cursor position in physical pixels.
    mouse_position: Vec2,
    mouse_ndc: Vec2,
    /// Left-drag motion not yet consumed by the camera.
    drag_delta: Vec2,
    window_size: (u32, u32),
}

impl Input {
    /// Create an input tracker that forwards pointer events to `sender`.
    pub fn new(sender: InteractionSender) -> Self {
        Self {
            sender,
            keys_held: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_position: Vec2::ZERO,
            mouse_ndc: Vec2::ZERO,
            drag_delta: Vec2::ZERO,
            window_size: (800, 600),
        }
    }

    /// Get the mouse position in normalized device coordinates (-1 to 1).
    ///
    /// Origin is at center of window. X increases to the right, Y increases upward.
    pub fn mouse_ndc(&self) -> Vec2 {
        self.mouse_ndc
    }

    pub fn mouse_held(&self, button: MouseButton) -> bool {
        self.mouse_held.contains(&button)
    }

    /// Update window size for NDC calculations.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    /// Take the accumulated left-drag motion in pixels, resetting it.
    pub fn take_drag(&mut self) -> Vec2 {
        std::mem::take(&mut self.drag_delta)
    }

    /// Process a winit window event. Returns the bound action for a fresh key press.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<KeyAction> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(keycode) = event.physical_key {
                    return self.on_key(KeyCode::from(keycode), event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.on_mouse_button(MouseButton::from(*button), *state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            _ => {}
        }
        None
    }

    fn on_key(&mut self, key: KeyCode, pressed: bool) -> Option<KeyAction> {
        if !pressed {
            self.keys_held.remove(&key);
            return None;
        }
        // Auto-repeat is not a fresh press
        if !self.keys_held.insert(key) {
            return None;
        }
        // Pulse goes out through `FrameDriver::apply_key`, like every other key
        KeyAction::from_key(key)
    }

    fn on_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if !pressed {
            self.mouse_held.remove(&button);
            return;
        }
        self.mouse_held.insert(button);
        self.sender.send(InteractionEvent::Pulse(PulseKind::Ambient));
        if button == MouseButton::Left {
            self.sender.send(InteractionEvent::Pulse(PulseKind::Click));
        }
    }

    fn on_cursor_moved(&mut self, position: Vec2) {
        let delta = position - self.mouse_position;
        self.mouse_position = position;
        if self.mouse_held(MouseButton::Left) {
            self.drag_delta += delta;
        }

        let (w, h) = self.window_size;
        if w > 0 && h > 0 {
            self.mouse_ndc = Vec2::new(
                (position.x / w as f32) * 2.0 - 1.0,
                1.0 - (position.y / h as f32) * 2.0, // Y flipped
            );
            self.sender.send(InteractionEvent::PointerMoved(self.mouse_ndc));
        }
    }
}
