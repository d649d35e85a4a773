//! Orbit camera and the pointer plane it looks at.

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;
const PITCH_LIMIT: f32 = 1.5;

/// Orbit camera looking at the origin.
///
/// Zoom and pan are fixed; only yaw and pitch change, by dragging.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the origin.
    pub distance: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Radians of rotation per viewport height of drag, divided by 2π.
    pub rotate_speed: f32,
}

impl OrbitCamera {
    /// Camera on +Z at `config.distance`, looking at the origin.
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: config.distance,
            fov_y: config.fov_degrees.to_radians(),
            rotate_speed: config.rotate_speed,
        }
    }

    /// Pick up distance/FOV/speed changes without resetting the orbit angles.
    pub fn apply_config(&mut self, config: &CameraConfig) {
        self.distance = config.distance;
        self.fov_y = config.fov_degrees.to_radians();
        self.rotate_speed = config.rotate_speed;
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), NEAR_PLANE, FAR_PLANE)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Visible width and height of the z = 0 plane at the camera distance.
    pub fn world_extent(&self, aspect: f32) -> Vec2 {
        let height = 2.0 * self.distance * (self.fov_y * 0.5).tan();
        Vec2::new(height * aspect, height)
    }

    /// Rotate by a drag of `(dx, dy)` physical pixels in a viewport `height` pixels tall.
    pub fn orbit(&mut self, dx: f32, dy: f32, height: f32) {
        if height <= 0.0 {
            return;
        }
        let per_pixel = std::f32::consts::TAU * self.rotate_speed / height;
        self.yaw -= dx * per_pixel;
        self.pitch = (self.pitch + dy * per_pixel).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

/// Positive distance from the camera along its view direction.
pub fn view_depth(view: &Mat4, position: Vec3) -> f32 {
    -view.transform_point3(position).z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_on_positive_z() {
        let camera = OrbitCamera::default();
        let pos = camera.position();
        assert!((pos - Vec3::new(0.0, 0.0, 20.0)).length() < 1e-5);
    }

    #[test]
    fn test_view_depth_of_origin_is_distance() {
        let camera = OrbitCamera::default();
        let view = camera.view_matrix();
        assert!((view_depth(&view, Vec3::ZERO) - 20.0).abs() < 1e-4);
        assert!((view_depth(&view, Vec3::new(0.0, 0.0, 5.0)) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_world_extent_matches_fov() {
        let camera = OrbitCamera::default();
        let extent = camera.world_extent(2.0);
        let expected_h = 40.0 * 25.0f32.to_radians().tan();
        assert!((extent.y - expected_h).abs() < 1e-4);
        assert!((extent.x - expected_h * 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_extent_corner_projects_to_ndc_corner() {
        let camera = OrbitCamera::default();
        let aspect = 16.0 / 9.0;
        let half = camera.world_extent(aspect) * 0.5;
        let clip = camera.view_proj(aspect) * Vec3::new(half.x, half.y, 0.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!((ndc.x - 1.0).abs() < 1e-4);
        assert!((ndc.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_full_height_drag_is_half_turn() {
        let mut camera = OrbitCamera::default();
        camera.orbit(600.0, 0.0, 600.0);
        assert!((camera.yaw + std::f32::consts::PI).abs() < 1e-5);

        camera.orbit(0.0, 10_000.0, 600.0);
        assert_eq!(camera.pitch, PITCH_LIMIT);
    }
}
