//! Runtime knobs and TOML presets.
//!
//! A [`FlowConfig`] is the single external parameter source. Every struct uses
//! `#[serde(default)]`, so a preset only needs the keys it overrides:
//!
//! ```toml
//! count = 12000
//! color_b = "#ff3cac"
//!
//! [post]
//! bloom_intensity = 2.5
//! ```
//!
//! Values are checked at this boundary. [`FlowConfig::validate`] rejects what
//! cannot be repaired (NaN, a zero count) and [`FlowConfig::clamped`] pulls every
//! knob into its documented range. The frame driver only accepts configs that
//! went through both.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Documented particle count range.
pub const COUNT_RANGE: (u32, u32) = (1000, 20_000);
/// Change in particle count per count key press.
pub const COUNT_STEP: u32 = 1000;

/// An sRGB color authored as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear-light RGB in `[0, 1]`, as the shaders expect.
    pub fn to_linear(self) -> Vec3 {
        Vec3::new(
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        )
    }
}

fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ConfigError::InvalidColor(s.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Post-processing chain knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    /// Bloom strength, `[0, 5]`.
    pub bloom_intensity: f32,
    /// Luminance where bloom starts, `[0, 1]`.
    pub bloom_luminance: f32,
    /// Width of the luminance ramp above the threshold, `[0, 1]`.
    pub bloom_smoothing: f32,
    /// Film grain opacity, `[0, 0.5]`.
    pub noise_opacity: f32,
    /// Vignette offset, `[0, 1]`.
    pub vignette_offset: f32,
    /// Vignette darkness, `[0, 5]`.
    pub vignette_darkness: f32,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            bloom_intensity: 1.5,
            bloom_luminance: 0.1,
            bloom_smoothing: 0.025,
            noise_opacity: 0.05,
            vignette_offset: 0.1,
            vignette_darkness: 1.1,
        }
    }
}

/// Camera rig knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Orbit distance from the origin, `[1, 200]`.
    pub distance: f32,
    /// Vertical field of view in degrees, `[10, 120]`.
    pub fov_degrees: f32,
    /// Drag rotation speed, `[0, 5]`.
    pub rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 20.0,
            fov_degrees: 50.0,
            rotate_speed: 0.5,
        }
    }
}

/// Every knob of the flow simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Particle count, `[1000, 20000]`. Changing it rebuilds the pool.
    pub count: u32,
    /// Time scale of the flow field, `[0, 2]`.
    pub speed: f32,
    /// Flow displacement per axis, `[0.1, 5]`.
    pub flow_intensity: f32,
    /// Sprite size before perspective, `[0.01, 0.5]`.
    pub particle_size: f32,
    /// Color of dim particles.
    pub color_a: Rgb,
    /// Color of bright particles.
    pub color_b: Rgb,
    /// Clear color behind the particles.
    pub background: Rgb,
    /// Reach of the continuous pointer repulsion, `[0, 20]`.
    pub interaction_radius: f32,
    /// Strength of the continuous pointer repulsion, `[0, 10]`.
    pub interaction_force: f32,
    /// Cap on the pulse blast displacement, `[0.5, 40]`.
    pub max_impulse: f32,
    /// How far each particle's random phase offsets its brightness in time, `[0, 10]`.
    pub phase_jitter: f32,
    /// Pool seed; `None` seeds from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub post: PostConfig,
    pub camera: CameraConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            count: 5000,
            speed: 0.2,
            flow_intensity: 1.0,
            particle_size: 0.15,
            color_a: Rgb::new(0x4a, 0x00, 0xe0),
            color_b: Rgb::new(0x8e, 0x2d, 0xe2),
            background: Rgb::new(0x05, 0x05, 0x05),
            interaction_radius: 5.0,
            interaction_force: 1.0,
            max_impulse: 10.0,
            phase_jitter: 0.0,
            seed: None,
            post: PostConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

/// The knobs bound to keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    Count,
    Speed,
    FlowIntensity,
    ParticleSize,
}

impl FlowConfig {
    /// Load a preset from a TOML file. Missing keys use defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the config as a pretty-printed TOML preset, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no clamp can repair.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::EmptyPool);
        }
        let fields = [
            ("speed", self.speed),
            ("flow_intensity", self.flow_intensity),
            ("particle_size", self.particle_size),
            ("interaction_radius", self.interaction_radius),
            ("interaction_force", self.interaction_force),
            ("max_impulse", self.max_impulse),
            ("phase_jitter", self.phase_jitter),
            ("post.bloom_intensity", self.post.bloom_intensity),
            ("post.bloom_luminance", self.post.bloom_luminance),
            ("post.bloom_smoothing", self.post.bloom_smoothing),
            ("post.noise_opacity", self.post.noise_opacity),
            ("post.vignette_offset", self.post.vignette_offset),
            ("post.vignette_darkness", self.post.vignette_darkness),
            ("camera.distance", self.camera.distance),
            ("camera.fov_degrees", self.camera.fov_degrees),
            ("camera.rotate_speed", self.camera.rotate_speed),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, _)) => Err(ConfigError::NonFinite(*name)),
            None => Ok(()),
        }
    }

    /// Copy with every knob pulled into its documented range.
    ///
    /// Logs a warning for each field that had to move.
    pub fn clamped(&self) -> Self {
        let mut c = self.clone();
        c.count = clamp_count(c.count);
        c.speed = clamp_field("speed", c.speed, 0.0, 2.0);
        c.flow_intensity = clamp_field("flow_intensity", c.flow_intensity, 0.1, 5.0);
        c.particle_size = clamp_field("particle_size", c.particle_size, 0.01, 0.5);
        c.interaction_radius = clamp_field("interaction_radius", c.interaction_radius, 0.0, 20.0);
        c.interaction_force = clamp_field("interaction_force", c.interaction_force, 0.0, 10.0);
        c.max_impulse = clamp_field("max_impulse", c.max_impulse, 0.5, 40.0);
        c.phase_jitter = clamp_field("phase_jitter", c.phase_jitter, 0.0, 10.0);

        let p = &mut c.post;
        p.bloom_intensity = clamp_field("post.bloom_intensity", p.bloom_intensity, 0.0, 5.0);
        p.bloom_luminance = clamp_field("post.bloom_luminance", p.bloom_luminance, 0.0, 1.0);
        p.bloom_smoothing = clamp_field("post.bloom_smoothing", p.bloom_smoothing, 0.0, 1.0);
        p.noise_opacity = clamp_field("post.noise_opacity", p.noise_opacity, 0.0, 0.5);
        p.vignette_offset = clamp_field("post.vignette_offset", p.vignette_offset, 0.0, 1.0);
        p.vignette_darkness = clamp_field("post.vignette_darkness", p.vignette_darkness, 0.0, 5.0);

        let cam = &mut c.camera;
        cam.distance = clamp_field("camera.distance", cam.distance, 1.0, 200.0);
        cam.fov_degrees = clamp_field("camera.fov_degrees", cam.fov_degrees, 10.0, 120.0);
        cam.rotate_speed = clamp_field("camera.rotate_speed", cam.rotate_speed, 0.0, 5.0);
        c
    }

    /// [`validate`](Self::validate) then [`clamped`](Self::clamped).
    pub fn checked(&self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self.clamped())
    }

    /// Copy with one knob stepped up (`steps > 0`) or down, then clamped.
    pub fn nudged(&self, knob: Knob, steps: i32) -> Self {
        let mut c = self.clone();
        let s = steps as f32;
        match knob {
            Knob::Count => {
                let delta = steps.unsigned_abs().saturating_mul(COUNT_STEP);
                c.count = if steps >= 0 {
                    c.count.saturating_add(delta)
                } else {
                    c.count.saturating_sub(delta)
                };
            }
            Knob::Speed => c.speed = round_to(c.speed + 0.1 * s, 100.0),
            Knob::FlowIntensity => c.flow_intensity = round_to(c.flow_intensity + 0.25 * s, 100.0),
            Knob::ParticleSize => c.particle_size = round_to(c.particle_size + 0.01 * s, 1000.0),
        }
        c.clamped()
    }
}

/// Round away float drift from repeated increments.
fn round_to(value: f32, scale: f32) -> f32 {
    (value * scale).round() / scale
}

fn clamp_field(name: &str, value: f32, min: f32, max: f32) -> f32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("{} = {} is outside [{}, {}], using {}", name, value, min, max, clamped);
    }
    clamped
}

fn clamp_count(count: u32) -> u32 {
    let (min, max) = COUNT_RANGE;
    let clamped = count.clamp(min, max);
    if clamped != count {
        log::warn!("count = {} is outside [{}, {}], using {}", count, min, max, clamped);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.count, 5000);
        assert_eq!(config.color_a.to_string(), "#4a00e0");
        assert_eq!(config.color_b.to_string(), "#8e2de2");
        assert_eq!(config.camera.distance, 20.0);
        assert_eq!(config.clamped(), config);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = FlowConfig::default();
        config.count = 12_000;
        config.color_b = Rgb::new(0xff, 0x3c, 0xac);
        config.seed = Some(99);
        config.post.bloom_intensity = 2.5;

        let text = config.to_toml_string().unwrap();
        let parsed = FlowConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = FlowConfig::from_toml_str(
            r##"
            speed = 0.7
            color_a = "#00FF00"

            [post]
            noise_opacity = 0.2
            "##,
        )
        .unwrap();

        assert_eq!(parsed.speed, 0.7);
        assert_eq!(parsed.color_a, Rgb::new(0, 255, 0));
        assert_eq!(parsed.post.noise_opacity, 0.2);
        assert_eq!(parsed.post.bloom_intensity, 1.5);
        assert_eq!(parsed.count, 5000);
        assert_eq!(parsed.seed, None);
    }

    #[test]
    fn test_bad_color_is_rejected() {
        let err = FlowConfig::from_toml_str(r#"color_a = "purple""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert_eq!("8e2de2".parse::<Rgb>().unwrap(), Rgb::new(0x8e, 0x2d, 0xe2));
    }

    #[test]
    fn test_srgb_to_linear() {
        assert_eq!(Rgb::new(0, 0, 0).to_linear(), Vec3::ZERO);
        assert!((Rgb::new(255, 255, 255).to_linear() - Vec3::ONE).length() < 1e-6);
        // sRGB 0.5 is about 0.214 linear
        let mid = Rgb::new(128, 128, 128).to_linear();
        assert!((mid.x - 0.2158).abs() < 1e-3);
    }

    #[test]
    fn test_clamped_pulls_into_range() {
        let mut config = FlowConfig::default();
        config.count = 50_000;
        config.speed = -1.0;
        config.particle_size = 3.0;
        config.post.noise_opacity = 0.9;

        let clamped = config.clamped();
        assert_eq!(clamped.count, 20_000);
        assert_eq!(clamped.speed, 0.0);
        assert_eq!(clamped.particle_size, 0.5);
        assert_eq!(clamped.post.noise_opacity, 0.5);
        assert_eq!(clamped.flow_intensity, config.flow_intensity);
    }

    #[test]
    fn test_validate_rejects_nan_and_zero_count() {
        let mut config = FlowConfig::default();
        config.flow_intensity = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::NonFinite("flow_intensity"))));

        let mut config = FlowConfig::default();
        config.count = 0;
        assert!(matches!(config.checked(), Err(ConfigError::EmptyPool)));
    }

    #[test]
    fn test_nudged_steps_and_clamps() {
        let config = FlowConfig::default();
        assert_eq!(config.nudged(Knob::Count, 1).count, 6000);
        assert_eq!(config.nudged(Knob::Count, -10).count, 1000);
        assert_eq!(config.nudged(Knob::Speed, 1).speed, 0.3);
        assert_eq!(config.nudged(Knob::Speed, -5).speed, 0.0);
        assert_eq!(config.nudged(Knob::FlowIntensity, 2).flow_intensity, 1.5);
        assert_eq!(config.nudged(Knob::ParticleSize, -1).particle_size, 0.14);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("neural-flow-config-{}", std::process::id()));
        let path = dir.join("preset.toml");

        let mut config = FlowConfig::default();
        config.phase_jitter = 2.0;
        config.save(&path).unwrap();
        let loaded = FlowConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
