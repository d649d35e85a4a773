//! Simulation builder and runner

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::FlowConfig;
use crate::error::{ConfigError, SimulationError};
use crate::frame::FrameDriver;
use crate::gpu::GpuState;
use crate::input::{Input, KeyAction};
use crate::time::FrameClock;

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// A neural flow viewer builder.
///
/// Use method chaining to configure, then call `.run()` to open the window.
///
/// ```no_run
/// use neural_flow::Simulation;
///
/// Simulation::new()
///     .with_count(8000)
///     .with_seed(7)
///     .run()
///     .unwrap();
/// ```
pub struct Simulation {
    config: FlowConfig,
    title: String,
}

impl Simulation {
    /// Create a viewer with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FlowConfig::default(),
            title: "Neural Flow".to_string(),
        }
    }

    /// Load the configuration from a TOML preset.
    pub fn from_preset(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = FlowConfig::load(path.as_ref())?;
        Ok(Self::new().with_config(config))
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the particle count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.config.count = count;
        self
    }

    /// Seed the pool generator for a reproducible layout.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run the viewer. This blocks until the window is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        let driver = FrameDriver::new(self.config)?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.title, driver);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    title: String,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    driver: FrameDriver,
    clock: FrameClock,
    input: Input,
    last_title_update: Instant,
    error: Option<SimulationError>,
}

impl App {
    fn new(title: String, driver: FrameDriver) -> Self {
        let input = Input::new(driver.sender());
        Self {
            title,
            window: None,
            gpu_state: None,
            driver,
            clock: FrameClock::new(),
            input,
            last_title_update: Instant::now(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn sync_viewport(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        let size = window.inner_size();
        self.driver
            .set_viewport(size.width, size.height, window.scale_factor() as f32);
        self.input.set_window_size(size.width, size.height);
    }

    fn on_key_action(&mut self, event_loop: &ActiveEventLoop, action: KeyAction) {
        match action {
            KeyAction::TogglePause => {
                self.clock.toggle_pause();
                log::info!("{}", if self.clock.is_paused() { "Paused" } else { "Resumed" });
            }
            KeyAction::Quit => event_loop.exit(),
            other => {
                self.driver.apply_key(other);
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.driver.orbit(self.input.take_drag());
        let delta = self.clock.tick();

        let Some(gpu_state) = self.gpu_state.as_mut() else {
            return;
        };

        let frame = match self.driver.update(delta) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return;
            }
        };

        if let Err(e) = gpu_state.sync_pool(frame.pool()) {
            log::error!("{}", e);
            self.error = Some(e.into());
            event_loop.exit();
            return;
        }

        match gpu_state.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => gpu_state.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                event_loop.exit();
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        if self.last_title_update.elapsed() < TITLE_REFRESH {
            return;
        }
        self.last_title_update = Instant::now();

        if let Some(window) = &self.window {
            let paused = if self.clock.is_paused() { " | paused" } else { "" };
            window.set_title(&format!(
                "{} | {} particles | {:.0} fps{}",
                self.title,
                self.driver.config().count,
                self.clock.fps(),
                paused
            ));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.title.as_str())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(window)) {
            Ok(gpu_state) => {
                self.driver.set_pool_capacity(gpu_state.max_particles());
                self.gpu_state = Some(gpu_state);
            }
            Err(e) => return self.fail(event_loop, e.into()),
        }

        self.sync_viewport();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
                self.sync_viewport();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.sync_viewport();
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            other => {
                if let Some(action) = self.input.handle_event(&other) {
                    self.on_key_action(event_loop, action);
                }
            }
        }
    }
}
