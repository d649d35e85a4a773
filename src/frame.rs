//! Two-phase frame driver.
//!
//! Each frame has an update phase and a read phase. [`FrameDriver::update`] is
//! the update phase and is the only place simulation state is written:
//!
//! 1. apply a pending configuration, rebuilding the pool if the count changed
//!    or a reseed was requested,
//! 2. drain the interaction queue,
//! 3. decay the pulse by the frame delta,
//! 4. project the pointer into world space,
//! 5. recompute the [`SimulationUniforms`].
//!
//! It returns a [`Frame`] that borrows the driver immutably. Everything the
//! read phase needs (uniforms, the pool, the CPU flow step) hangs off that
//! borrow, so the borrow checker rules out a write landing mid-read.
//!
//! ```
//! use neural_flow::{FlowConfig, FrameDriver};
//! use neural_flow::interaction::{InteractionEvent, PulseKind};
//!
//! let mut config = FlowConfig::default();
//! config.count = 1000;
//! config.seed = Some(1);
//! let mut driver = FrameDriver::new(config).unwrap();
//!
//! driver.sender().send(InteractionEvent::Pulse(PulseKind::Click));
//! let frame = driver.update(0.0).unwrap();
//! assert_eq!(frame.uniforms().pulse, 2.0);
//! assert_eq!(frame.evaluate().len(), 1000);
//! ```

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::FlowConfig;
use crate::error::{ConfigError, PoolError, SimulationError};
use crate::flow::{evaluate_into, evaluate_pool, RenderAttributes};
use crate::gpu::OrbitCamera;
use crate::input::KeyAction;
use crate::interaction::{
    interaction_queue, InteractionEvent, InteractionQueue, InteractionSender, InteractionState, PulseKind,
};
use crate::pool::{Particle, ParticlePool, DEFAULT_CAPACITY};
use crate::uniforms::SimulationUniforms;

/// Owns all mutable simulation state and sequences the update phase.
#[derive(Debug)]
pub struct FrameDriver {
    config: FlowConfig,
    pending_config: Option<FlowConfig>,
    reseed_requested: bool,
    pool: ParticlePool,
    pool_capacity: u32,
    rng: SmallRng,
    interaction: InteractionState,
    queue: InteractionQueue,
    sender: InteractionSender,
    camera: OrbitCamera,
    viewport: Vec2,
    pixel_ratio: f32,
    elapsed: f32,
    delta: f32,
    uniforms: SimulationUniforms,
}

impl FrameDriver {
    /// Check `config` and build the initial pool.
    pub fn new(config: FlowConfig) -> Result<Self, SimulationError> {
        let config = config.checked()?;
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let pool = ParticlePool::generate(config.count, DEFAULT_CAPACITY, &mut rng)?;
        log::info!("Generated particle pool with {} particles", pool.size());

        let (sender, queue) = interaction_queue();
        let camera = OrbitCamera::new(&config.camera);
        let viewport = Vec2::new(1280.0, 720.0);
        let uniforms = SimulationUniforms::from_config(&config, &camera, viewport, 1.0);

        Ok(Self {
            config,
            pending_config: None,
            reseed_requested: false,
            pool,
            pool_capacity: DEFAULT_CAPACITY,
            rng,
            interaction: InteractionState::new(),
            queue,
            sender,
            camera,
            viewport,
            pixel_ratio: 1.0,
            elapsed: 0.0,
            delta: 0.0,
            uniforms,
        })
    }

    /// A handle for event callbacks to enqueue interaction events.
    pub fn sender(&self) -> InteractionSender {
        self.sender.clone()
    }

    /// The configuration in effect for the current frame.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// The configuration the next frame will use.
    pub fn target_config(&self) -> &FlowConfig {
        self.pending_config.as_ref().unwrap_or(&self.config)
    }

    /// Queue a configuration change for the next update phase.
    ///
    /// The config is validated and clamped here; a rejected config leaves any
    /// earlier request in place.
    pub fn request_config(&mut self, config: FlowConfig) -> Result<(), ConfigError> {
        let config = config.checked()?;
        if &config != self.target_config() {
            log::debug!("Queued config change: {:?}", config);
            self.pending_config = Some(config);
        }
        Ok(())
    }

    /// Queue a pool rebuild with the current count and fresh seeds.
    pub fn request_reseed(&mut self) {
        self.reseed_requested = true;
    }

    /// Apply a keyboard action. Pause and quit belong to the caller and return `false`.
    pub fn apply_key(&mut self, action: KeyAction) -> bool {
        match action {
            KeyAction::Nudge(knob, steps) => {
                let nudged = self.target_config().nudged(knob, steps);
                // Clamped output of a checked config is always valid
                if let Err(e) = self.request_config(nudged) {
                    log::warn!("Ignoring key change: {}", e);
                }
                true
            }
            KeyAction::Reseed => {
                self.request_reseed();
                true
            }
            KeyAction::Pulse => {
                self.sender.send(InteractionEvent::Pulse(PulseKind::Click));
                true
            }
            KeyAction::TogglePause | KeyAction::Quit => false,
        }
    }

    /// Viewport size in physical pixels and the display's pixel ratio.
    ///
    /// Keeps the pool and elapsed time.
    pub fn set_viewport(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        self.viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            self.pixel_ratio = pixel_ratio;
        }
    }

    /// Lower (or raise) the largest pool the device accepts.
    pub fn set_pool_capacity(&mut self, capacity: u32) {
        if self.pool.size() > capacity {
            log::warn!(
                "Current pool of {} particles exceeds the device capacity of {}",
                self.pool.size(),
                capacity
            );
        }
        self.pool_capacity = capacity;
    }

    pub fn pool_capacity(&self) -> u32 {
        self.pool_capacity
    }

    /// Rotate the camera by a drag of `(dx, dy)` physical pixels.
    pub fn orbit(&mut self, drag: Vec2) {
        if drag != Vec2::ZERO {
            self.camera.orbit(drag.x, drag.y, self.viewport.y);
        }
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// Run the update phase for a frame `delta` seconds after the previous one.
    ///
    /// If a requested rebuild fails, the old pool stays, the rest of the
    /// request still applies, and the error is returned so the caller can skip
    /// this frame.
    pub fn update(&mut self, delta: f32) -> Result<Frame<'_>, PoolError> {
        let rebuild_result = self.apply_pending();

        for event in self.queue.drain() {
            self.interaction.apply(event);
        }

        self.delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.interaction.tick(self.delta);
        self.elapsed += self.delta;

        let aspect = self.viewport.x / self.viewport.y;
        let pointer_world = self.interaction.update_pointer(self.camera.world_extent(aspect));

        let mut uniforms = SimulationUniforms::from_config(&self.config, &self.camera, self.viewport, self.pixel_ratio);
        uniforms.elapsed_time = self.elapsed;
        uniforms.pointer_world = pointer_world;
        uniforms.pulse = self.interaction.pulse();
        self.uniforms = uniforms;

        rebuild_result?;
        Ok(Frame { driver: self })
    }

    fn apply_pending(&mut self) -> Result<(), PoolError> {
        let mut result = Ok(());

        if let Some(mut next) = self.pending_config.take() {
            if next.count != self.config.count || self.reseed_requested {
                match self.pool.rebuild(next.count, self.pool_capacity, &mut self.rng) {
                    Ok(()) => self.reseed_requested = false,
                    Err(e) => {
                        log::error!("Pool rebuild failed, keeping {} particles: {}", self.pool.size(), e);
                        next.count = self.config.count;
                        self.reseed_requested = false;
                        result = Err(e);
                    }
                }
            }
            self.camera.apply_config(&next.camera);
            self.config = next;
        }

        if self.reseed_requested {
            self.reseed_requested = false;
            if let Err(e) = self.pool.rebuild(self.config.count, self.pool_capacity, &mut self.rng) {
                log::error!("Reseed failed: {}", e);
                result = Err(e);
            }
        }

        result
    }
}

/// Read-only view of one frame's state.
///
/// Holding a `Frame` keeps the driver borrowed, so nothing can be updated
/// until the read phase is over.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    driver: &'a FrameDriver,
}

impl<'a> Frame<'a> {
    pub fn uniforms(&self) -> &'a SimulationUniforms {
        &self.driver.uniforms
    }

    pub fn config(&self) -> &'a FlowConfig {
        &self.driver.config
    }

    pub fn pool(&self) -> &'a ParticlePool {
        &self.driver.pool
    }

    pub fn particles(&self) -> &'a [Particle] {
        self.driver.pool.particles()
    }

    /// This frame's delta in seconds.
    pub fn delta(&self) -> f32 {
        self.driver.delta
    }

    /// Seconds since start, summed over frame deltas.
    pub fn elapsed(&self) -> f32 {
        self.driver.elapsed
    }

    /// Run the CPU flow step over the whole pool.
    pub fn evaluate(&self) -> Vec<RenderAttributes> {
        evaluate_pool(self.particles(), self.uniforms())
    }

    /// Like [`evaluate`](Self::evaluate), reusing `out`.
    pub fn evaluate_into(&self, out: &mut Vec<RenderAttributes>) {
        evaluate_into(self.particles(), self.uniforms(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Knob;
    use glam::Vec3;

    fn driver(count: u32) -> FrameDriver {
        let mut config = FlowConfig::default();
        config.count = count;
        config.seed = Some(11);
        FrameDriver::new(config).unwrap()
    }

    #[test]
    fn test_new_rejects_zero_count() {
        let mut config = FlowConfig::default();
        config.count = 0;
        assert!(matches!(
            FrameDriver::new(config),
            Err(SimulationError::Config(ConfigError::EmptyPool))
        ));
    }

    #[test]
    fn test_zero_delta_keeps_pulse() {
        let mut driver = driver(1000);
        driver.sender().send(InteractionEvent::Impulse(2.0));
        let frame = driver.update(0.0).unwrap();
        assert_eq!(frame.uniforms().pulse, 2.0);
    }

    #[test]
    fn test_events_apply_at_next_update() {
        let mut driver = driver(1000);
        assert_eq!(driver.update(0.016).unwrap().uniforms().pulse, 0.0);

        driver.sender().send(InteractionEvent::Pulse(PulseKind::Ambient));
        driver.sender().send(InteractionEvent::PointerMoved(Vec2::new(1.0, 0.0)));

        let frame = driver.update(0.0).unwrap();
        assert_eq!(frame.uniforms().pulse, 1.0);
        let extent = driver.camera().world_extent(1280.0 / 720.0);
        assert!((driver.uniforms.pointer_world - Vec3::new(extent.x / 2.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_pulse_decays_across_frames() {
        let mut driver = driver(1000);
        driver.sender().send(InteractionEvent::Pulse(PulseKind::Click));
        let first = driver.update(0.1).unwrap().uniforms().pulse;
        let second = driver.update(0.1).unwrap().uniforms().pulse;
        assert!(first < 2.0);
        assert!(second < first);
        assert!(second >= 0.0);
    }

    #[test]
    fn test_count_change_rebuilds_on_next_update() {
        let mut driver = driver(1000);
        let mut config = driver.config().clone();
        config.count = 3000;
        driver.request_config(config).unwrap();

        // Not applied until the update phase
        assert_eq!(driver.pool.size(), 1000);

        let frame = driver.update(0.016).unwrap();
        assert_eq!(frame.pool().size(), 3000);
        assert_eq!(frame.pool().generation(), 1);
        assert_eq!(frame.evaluate().len(), 3000);
    }

    #[test]
    fn test_non_count_change_keeps_pool() {
        let mut driver = driver(1000);
        let before = driver.pool.particles().to_vec();

        driver.apply_key(KeyAction::Nudge(Knob::Speed, 1));
        let frame = driver.update(0.016).unwrap();
        assert!((frame.uniforms().speed - 0.3).abs() < 1e-6);
        assert_eq!(frame.particles(), &before[..]);
        assert_eq!(frame.pool().generation(), 0);
    }

    #[test]
    fn test_nudges_compose_within_a_frame() {
        let mut driver = driver(5000);
        driver.apply_key(KeyAction::Nudge(Knob::Count, 1));
        driver.apply_key(KeyAction::Nudge(Knob::Count, 1));
        assert_eq!(driver.update(0.0).unwrap().pool().size(), 7000);
    }

    #[test]
    fn test_reseed_keeps_count() {
        let mut driver = driver(1000);
        let before = driver.pool.particles().to_vec();
        driver.apply_key(KeyAction::Reseed);

        let frame = driver.update(0.016).unwrap();
        assert_eq!(frame.pool().size(), 1000);
        assert_ne!(frame.particles(), &before[..]);
    }

    #[test]
    fn test_failed_rebuild_keeps_old_pool() {
        let mut driver = driver(1000);
        driver.set_pool_capacity(2000);

        let mut config = driver.config().clone();
        config.count = 5000;
        config.speed = 1.0;
        driver.request_config(config).unwrap();

        let err = driver.update(0.016).unwrap_err();
        assert_eq!(
            err,
            PoolError::CapacityExceeded {
                requested: 5000,
                capacity: 2000
            }
        );
        assert_eq!(driver.pool.size(), 1000);
        assert_eq!(driver.config().count, 1000);
        assert_eq!(driver.config().speed, 1.0);

        // Next frame renders normally
        assert!(driver.update(0.016).is_ok());
    }

    #[test]
    fn test_resize_keeps_pool_and_time() {
        let mut driver = driver(1000);
        driver.update(0.5).unwrap();
        let generation = driver.pool.generation();

        driver.set_viewport(1920, 1080, 2.0);
        let frame = driver.update(0.25).unwrap();
        assert!((frame.elapsed() - 0.75).abs() < 1e-6);
        assert_eq!(frame.pool().generation(), generation);
        assert_eq!(frame.uniforms().pixel_ratio, 2.0);
        assert_eq!(frame.uniforms().viewport, Vec2::new(1920.0, 1080.0));
    }

    #[test]
    fn test_pause_and_quit_are_left_to_caller() {
        let mut driver = driver(1000);
        assert!(!driver.apply_key(KeyAction::TogglePause));
        assert!(!driver.apply_key(KeyAction::Quit));
        assert!(driver.apply_key(KeyAction::Pulse));
        assert_eq!(driver.update(0.0).unwrap().uniforms().pulse, 2.0);
    }

    #[test]
    fn test_pulse_key_queues_exactly_one_click() {
        let mut driver = driver(1000);
        assert!(driver.apply_key(KeyAction::Pulse));
        let events: Vec<_> = driver.queue.drain().collect();
        assert_eq!(events, vec![InteractionEvent::Pulse(PulseKind::Click)]);
    }
}
