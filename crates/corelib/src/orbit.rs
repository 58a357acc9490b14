//! Orbit controls around a target point with +Z as the vertical axis.
//!
//! Input handlers only accumulate deltas; `update` applies them to the
//! camera once per frame.

use std::f32::consts::{PI, TAU};

use crate::{Vec2, Vec3, camera::Camera};

const MIN_POLAR: f32 = 1e-4;
const ZOOM_STEP: f32 = 0.95;

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    // Pending input since the last update.
    rotate_delta: Vec2,
    pan_delta: Vec3,
    zoom_scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_delta: Vec2::ZERO,
            pan_delta: Vec3::ZERO,
            zoom_scale: 1.0,
        }
    }
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Mouse drag in pixels. A drag across the full viewport height turns
    /// the camera by one full revolution.
    pub fn rotate(&mut self, pixels: Vec2, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        self.rotate_delta += pixels * (TAU * self.rotate_speed / h);
    }

    /// Wheel steps; positive moves towards the target.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_scale *= ZOOM_STEP.powf(steps * self.zoom_speed);
    }

    /// Drag in pixels, translated so the point under the cursor follows it
    /// at the target's depth.
    pub fn pan(&mut self, pixels: Vec2, camera: &Camera, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        let distance = (camera.eye - self.target).length();
        let world_per_pixel = 2.0 * distance * (camera.fov_y_rad * 0.5).tan() / h;
        let right = camera.right();
        let up = right.cross(camera.forward());
        self.pan_delta +=
            (-right * pixels.x + up * pixels.y) * world_per_pixel * self.pan_speed;
    }

    /// Apply accumulated input to the camera. Returns `true` if the camera
    /// moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.eye - self.target;
        let radius = offset.length();
        let mut theta = offset.y.atan2(offset.x);
        let mut phi = if radius > 0.0 {
            (offset.z / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI * 0.5
        };

        theta -= self.rotate_delta.x;
        phi = (phi - self.rotate_delta.y).clamp(MIN_POLAR, PI - MIN_POLAR);
        let radius = (radius * self.zoom_scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_delta;
        let new_eye = self.target
            + radius * Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());

        let moved = new_eye != camera.eye || self.target != camera.target;
        camera.eye = new_eye;
        camera.target = self.target;

        self.rotate_delta = Vec2::ZERO;
        self.pan_delta = Vec3::ZERO;
        self.zoom_scale = 1.0;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;
    use approx::assert_relative_eq;

    fn framed_camera() -> Camera {
        let mut cam = Camera::z_up(75f32.to_radians(), 1.0);
        cam.eye = vec3(-2.0, -2.0, 2.0);
        cam.target = vec3(0.0, 0.0, 1.0);
        cam
    }

    #[test]
    fn idle_update_keeps_camera_in_place() {
        let mut cam = framed_camera();
        let mut controls = OrbitControls::new(cam.target);
        controls.update(&mut cam);
        assert!(cam.eye.abs_diff_eq(vec3(-2.0, -2.0, 2.0), 1e-5));
        assert_eq!(cam.target, vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn zoom_in_shrinks_distance() {
        let mut cam = framed_camera();
        let before = (cam.eye - cam.target).length();
        let mut controls = OrbitControls::new(cam.target);
        controls.zoom(1.0);
        assert!(controls.update(&mut cam));
        let after = (cam.eye - cam.target).length();
        assert_relative_eq!(after, before * 0.95, epsilon = 1e-5);
    }

    #[test]
    fn rotation_preserves_distance_and_stays_off_pole() {
        let mut cam = framed_camera();
        let before = (cam.eye - cam.target).length();
        let mut controls = OrbitControls::new(cam.target);
        controls.rotate(Vec2::new(120.0, 5000.0), 720.0);
        controls.update(&mut cam);
        let offset = cam.eye - cam.target;
        assert_relative_eq!(offset.length(), before, epsilon = 1e-4);
        // Clamped just short of straight up.
        assert!(offset.z > 0.0);
        assert!(offset.truncate().length() > 0.0);
    }

    #[test]
    fn pan_moves_target_and_eye_together() {
        let mut cam = framed_camera();
        let offset_before = cam.eye - cam.target;
        let mut controls = OrbitControls::new(cam.target);
        controls.pan(Vec2::new(40.0, 0.0), &cam, 720.0);
        controls.update(&mut cam);
        assert_ne!(cam.target, vec3(0.0, 0.0, 1.0));
        assert!((cam.eye - cam.target).abs_diff_eq(offset_before, 1e-4));
    }
}
