use crate::{Framing, Mat4, Vec3};

/// Default vertical field of view, degrees.
pub const DEFAULT_FOV_DEG: f32 = 75.0;
pub const DEFAULT_Z_NEAR: f32 = 0.1;
pub const DEFAULT_Z_FAR: f32 = 1000.0;

/// Simple perspective camera (right-handed).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    /// Camera with +Z as the vertical axis, the usual convention for
    /// printer and CAD coordinates. Starts at the origin looking along +Y
    /// until a model is framed.
    pub fn z_up(fov_y_rad: f32, aspect: f32) -> Self {
        Self::new_perspective(
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Z,
            fov_y_rad,
            DEFAULT_Z_NEAR,
            DEFAULT_Z_FAR,
            aspect,
        )
    }

    /// Move the eye and look at the framed center. `up` is left untouched.
    pub fn apply_framing(&mut self, framing: &Framing) {
        self.eye = framing.eye;
        self.target = framing.target;
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection with depth in `[0, 1]`.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Unit vector pointing from the eye towards the target.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or(Vec3::Y)
    }

    /// Screen-right direction in world space.
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Aabb, vec3};

    #[test]
    fn z_up_defaults() {
        let cam = Camera::z_up(DEFAULT_FOV_DEG.to_radians(), 2.0);
        assert_eq!(cam.up, Vec3::Z);
        assert_eq!(cam.z_near, 0.1);
        assert_eq!(cam.z_far, 1000.0);
    }

    #[test]
    fn framing_keeps_z_up_and_looks_at_center() {
        let b = Aabb::new(vec3(-30.0, -15.0, 0.0), vec3(30.0, 15.0, 48.0));
        let mut cam = Camera::z_up(1.0, 1.0);
        cam.apply_framing(&Framing::from_bounds(&b));
        assert_eq!(cam.eye, vec3(-60.0, -60.0, 60.0));
        assert_eq!(cam.target, vec3(0.0, 0.0, 24.0));
        assert_eq!(cam.up, Vec3::Z);

        // The target projects to the middle of the screen.
        let clip = cam.proj_view() * cam.target.extend(1.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
    }

    #[test]
    fn right_is_orthogonal_to_forward_and_up() {
        let mut cam = Camera::z_up(1.0, 1.0);
        cam.eye = vec3(-2.0, -2.0, 2.0);
        cam.target = vec3(0.0, 0.0, 1.0);
        let r = cam.right();
        assert!(r.dot(cam.forward()).abs() < 1e-5);
        assert!(r.dot(Vec3::Z).abs() < 1e-5);
    }
}
