//! Core types: math re-exports, bounds, camera framing, orbit controls,
//! and the append-only scene graph.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, vec3};

pub mod bounds;
pub mod camera;
pub mod error;
pub mod orbit;
pub mod scene;
pub mod transform;

pub use bounds::{Aabb, Framing};
pub use error::{CoreError, CoreResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn grid_rotation_lays_xz_plane_onto_xy() {
        let t = transform::Transform::identity()
            .with_rotation_euler(vec3(std::f32::consts::FRAC_PI_2, 0.0, 0.0));
        let p = t.matrix().transform_point3(vec3(3.0, 0.0, 5.0));
        assert!((p.x - 3.0).abs() < 1e-5);
        assert!((p.y + 5.0).abs() < 1e-5);
        assert!(p.z.abs() < 1e-5);
    }

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::z_up(75f32.to_radians(), 16.0 / 9.0);
        let a = cam.proj_view().to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn end_to_end_framing_numbers() {
        let bounds = Aabb::new(vec3(-1.0, -1.0, 0.0), vec3(1.0, 1.0, 2.0));
        assert_eq!(bounds.center(), vec3(0.0, 0.0, 1.0));
        assert_eq!(bounds.size(), vec3(2.0, 2.0, 2.0));
        assert_eq!(bounds.max_extent(), 2.0);

        let framing = Framing::from_bounds(&bounds);
        assert_eq!(framing.eye, vec3(-2.0, -2.0, 2.0));
        assert_eq!(framing.target, vec3(0.0, 0.0, 1.0));
        assert!(framing.axes_position.abs_diff_eq(vec3(-1.4, -1.4, 0.0), 1e-6));

        let mut cam = camera::Camera::z_up(75f32.to_radians(), 1.0);
        cam.apply_framing(&framing);
        assert_eq!(cam.eye, vec3(-2.0, -2.0, 2.0));
        assert_eq!(cam.target, vec3(0.0, 0.0, 1.0));
        assert_eq!(cam.up, Vec3::Z);
    }
}
