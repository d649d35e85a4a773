//! Error types for neural-flow.
//!
//! Configuration, pool generation, GPU initialization and the window loop
//! each get their own error type; [`SimulationError`] wraps all of them for
//! [`Simulation::run`](crate::Simulation::run).

use std::fmt;

/// Errors produced while loading or checking a [`FlowConfig`](crate::FlowConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read or write a preset file.
    Io(std::io::Error),
    /// Preset file is not valid TOML for a flow config.
    Parse(toml::de::Error),
    /// Config could not be serialized.
    Serialize(toml::ser::Error),
    /// A color string is not `#rrggbb`.
    InvalidColor(String),
    /// A knob holds NaN or infinity.
    NonFinite(&'static str),
    /// Particle count of zero.
    EmptyPool,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to access preset file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse preset: {}", e),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize preset: {}", e),
            ConfigError::InvalidColor(s) => {
                write!(f, "Invalid color '{}': expected a hex color like #4a00e0", s)
            }
            ConfigError::NonFinite(name) => write!(f, "Config value '{}' is not a finite number", name),
            ConfigError::EmptyPool => write!(f, "Particle count must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

/// Errors reported when (re)building the particle pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// A pool of zero particles was requested.
    Empty,
    /// More particles were requested than the device can hold.
    CapacityExceeded {
        /// Requested particle count.
        requested: u32,
        /// Largest pool the current device accepts.
        capacity: u32,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Empty => write!(f, "Cannot build an empty particle pool"),
            PoolError::CapacityExceeded { requested, capacity } => write!(
                f,
                "Requested {} particles but the device holds at most {}",
                requested, capacity
            ),
        }
    }
}

impl std::error::Error for PoolError {}

/// Errors that can occur during GPU initialization and buffer allocation.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// The surface offers no texture format to render into.
    NoSurfaceFormat,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Particle buffers would exceed the device's storage binding limit.
    CapacityExceeded {
        /// Requested particle count.
        requested: u32,
        /// Largest particle count the device can bind.
        capacity: u32,
    },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::NoSurfaceFormat => write!(f, "The window surface reports no supported texture formats"),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::CapacityExceeded { requested, capacity } => write!(
                f,
                "Cannot allocate {} particles on this device (limit {})",
                requested, capacity
            ),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Configuration was rejected.
    Config(ConfigError),
    /// The initial particle pool could not be built.
    Pool(PoolError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Config(e) => write!(f, "Config error: {}", e),
            SimulationError::Pool(e) => write!(f, "Particle pool error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Config(e) => Some(e),
            SimulationError::Pool(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

impl From<PoolError> for SimulationError {
    fn from(e: PoolError) -> Self {
        SimulationError::Pool(e)
    }
}
