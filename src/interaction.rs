//! Pointer position and pulse state, plus the queue that feeds them.
//!
//! Event callbacks never touch [`InteractionState`] directly. They hold an
//! [`InteractionSender`] and enqueue [`InteractionEvent`]s; the frame driver
//! drains the queue once at the start of each update phase, so a render pass
//! can never observe a half-applied event.
//!
//! ```
//! use neural_flow::interaction::{interaction_queue, InteractionEvent, InteractionState, PulseKind};
//!
//! let (sender, queue) = interaction_queue();
//! sender.send(InteractionEvent::Pulse(PulseKind::Click));
//!
//! let mut state = InteractionState::new();
//! assert_eq!(state.pulse(), 0.0);
//!
//! for event in queue.drain() {
//!     state.apply(event);
//! }
//! assert_eq!(state.pulse(), 2.0);
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use glam::{Vec2, Vec3};

/// Exponential decay rate of the pulse, per second.
pub const PULSE_DECAY_RATE: f32 = 4.0;

/// Pulses below this are snapped to zero.
const PULSE_FLOOR: f32 = 1e-5;

/// The two classes of interaction event that raise the pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    /// Any pointer-down anywhere in the viewport.
    Ambient,
    /// An explicit click.
    Click,
}

impl PulseKind {
    /// Pulse magnitude this event requests.
    pub fn magnitude(self) -> f32 {
        match self {
            PulseKind::Ambient => 1.0,
            PulseKind::Click => 2.0,
        }
    }
}

/// A pending change to the interaction state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    /// Pointer moved; position in normalized device coordinates (-1 to 1, Y up).
    PointerMoved(Vec2),
    /// Pointer-down of the given class.
    Pulse(PulseKind),
    /// Raw pulse request with an explicit magnitude.
    Impulse(f32),
}

/// Write end of the interaction queue. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct InteractionSender {
    tx: Sender<InteractionEvent>,
}

impl InteractionSender {
    /// Enqueue an event for the next update phase.
    ///
    /// Events sent after the queue is gone are dropped.
    pub fn send(&self, event: InteractionEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Interaction queue closed, dropping {:?}", event);
        }
    }
}

/// Read end of the interaction queue, owned by the frame driver.
#[derive(Debug)]
pub struct InteractionQueue {
    rx: Receiver<InteractionEvent>,
}

impl InteractionQueue {
    /// Take every event queued so far, in arrival order.
    pub fn drain(&self) -> impl Iterator<Item = InteractionEvent> + '_ {
        self.rx.try_iter()
    }
}

/// Create a connected sender/queue pair.
pub fn interaction_queue() -> (InteractionSender, InteractionQueue) {
    let (tx, rx) = mpsc::channel();
    (InteractionSender { tx }, InteractionQueue { rx })
}

/// Pointer and pulse state read by the flow step.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    /// Latest pointer position in NDC, waiting for the next `update_pointer`.
    pointer_ndc: Vec2,
    /// Pointer projected onto the z = 0 plane.
    pointer_world: Vec3,
    pulse: f32,
}

impl InteractionState {
    /// Pointer at the origin, no pulse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pulse magnitude (always `>= 0`).
    #[inline]
    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    /// Pointer position in world space as of the last `update_pointer`.
    #[inline]
    pub fn pointer_world(&self) -> Vec3 {
        self.pointer_world
    }

    /// Latest pointer position in NDC.
    #[inline]
    pub fn pointer_ndc(&self) -> Vec2 {
        self.pointer_ndc
    }

    /// Apply one drained event.
    pub fn apply(&mut self, event: InteractionEvent) {
        match event {
            InteractionEvent::PointerMoved(ndc) => self.pointer_ndc = ndc,
            InteractionEvent::Pulse(kind) => self.on_interaction_event(kind.magnitude()),
            InteractionEvent::Impulse(magnitude) => self.on_interaction_event(magnitude),
        }
    }

    /// Raise the pulse to `magnitude`. A smaller event never cuts a larger pulse short.
    pub fn on_interaction_event(&mut self, magnitude: f32) {
        if magnitude.is_finite() {
            self.pulse = self.pulse.max(magnitude);
        }
    }

    /// Decay the pulse toward zero over `delta_time` seconds.
    ///
    /// Uses `pulse *= exp(-rate * dt)`, so any split of the same total time
    /// gives the same result. Zero or negative deltas leave the pulse alone.
    pub fn tick(&mut self, delta_time: f32) {
        if delta_time.is_nan() || delta_time <= 0.0 {
            return;
        }
        self.pulse *= (-PULSE_DECAY_RATE * delta_time).exp();
        if self.pulse < PULSE_FLOOR {
            self.pulse = 0.0;
        }
    }

    /// Project the pending NDC pointer onto the z = 0 plane.
    ///
    /// `world_extent` is the visible width and height of that plane.
    pub fn update_pointer(&mut self, world_extent: Vec2) -> Vec3 {
        self.pointer_world = ndc_to_world(self.pointer_ndc, world_extent);
        self.pointer_world
    }
}

/// Map NDC (-1 to 1) onto a plane of the given extent centered at the origin.
pub fn ndc_to_world(ndc: Vec2, world_extent: Vec2) -> Vec3 {
    let half = world_extent * 0.5;
    Vec3::new(ndc.x * half.x, ndc.y * half.y, 0.0)
}
