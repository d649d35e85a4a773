//! # Neural Flow
//!
//! A GPU particle field that drifts through a 3D noise flow and reacts to the
//! pointer.
//!
//! Every particle is stateless: its position each frame is a pure function of
//! its seed (a base position and a random phase) and the frame's uniforms
//! (time, pointer, pulse, knobs). There is no integration and no velocity, so
//! the whole field can be evaluated from scratch on the GPU or the CPU.
//!
//! ## Quick Start
//!
//! ```no_run
//! use neural_flow::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let mut config = FlowConfig::default();
//!     config.count = 12_000;
//!     config.flow_intensity = 1.5;
//!
//!     Simulation::new().with_config(config).run()
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### The flow step
//!
//! [`flow::flow_step`] maps one seed to its render attributes. In order it
//! samples a brightness from noise at the base position, pushes the particle
//! away from the pointer by the current pulse, displaces it through the noise
//! flow one axis at a time, then applies a soft repulsion around the pointer.
//! The compute kernel in [`flow::compute_shader_wgsl`] runs the same steps.
//!
//! ### Frames
//!
//! [`FrameDriver`] owns all mutable state. [`FrameDriver::update`] is the only
//! writer; the [`Frame`] it returns is a read-only borrow that the renderer
//! (or a test) consumes.
//!
//! ### Interaction
//!
//! Input never writes the pulse or pointer directly. Events go through an
//! [`interaction::InteractionSender`] and are drained at the start of the next
//! update, so every frame sees one consistent interaction state.
//!
//! ## Feature Overview
//!
//! | Area | Items |
//! |------|-------|
//! | Configuration | [`FlowConfig`], [`config::PostConfig`], [`config::CameraConfig`] |
//! | Pool | [`pool::ParticlePool`], [`pool::Particle`] |
//! | Flow | [`flow::flow_step`], [`flow::evaluate_pool`], [`noise::noise3`] |
//! | Interaction | [`interaction::InteractionState`], [`interaction::InteractionEvent`] |
//! | Rendering | [`renderer::sprite_shader_wgsl`], [`bright_pass_wgsl`], [`composite_wgsl`] |

pub mod config;
pub mod error;
pub mod flow;
pub mod frame;
mod gpu;
pub mod input;
pub mod interaction;
pub mod noise;
pub mod pool;
pub mod renderer;
pub mod shader_utils;
mod simulation;
pub mod time;
pub mod uniforms;

pub use config::FlowConfig;
pub use error::{ConfigError, GpuError, PoolError, SimulationError};
pub use frame::{Frame, FrameDriver};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{bright_pass_wgsl, composite_wgsl, view_depth, OrbitCamera, PostUniforms};
pub use simulation::Simulation;

/// Common imports for running and scripting the viewer.
pub mod prelude {
    pub use crate::config::{CameraConfig, FlowConfig, Knob, PostConfig, Rgb};
    pub use crate::error::SimulationError;
    pub use crate::flow::{flow_step, RenderAttributes};
    pub use crate::frame::{Frame, FrameDriver};
    pub use crate::interaction::{InteractionEvent, PulseKind};
    pub use crate::pool::{Particle, ParticlePool};
    pub use crate::simulation::Simulation;
    pub use crate::uniforms::SimulationUniforms;
    pub use crate::{Vec2, Vec3, Vec4};
}
