//! Math utilities and types
//!
//! `nalgebra` aliases plus the few camera helpers the viewer needs. Projection
//! helpers produce Vulkan clip space: +Y points down and depth runs from 0 at the
//! near plane to 1 at the far plane.

pub use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Converts OpenGL-style clip coordinates (Y up, depth -1..1) into Vulkan's
pub fn vulkan_clip_correction() -> Mat4 {
    #[rustfmt::skip]
    let correction = Mat4::new(
        1.0,  0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0,  0.0, 0.5, 0.5,
        0.0,  0.0, 0.0, 1.0,
    );
    correction
}

/// Right-handed perspective projection targeting Vulkan clip space
pub fn perspective(fov_y_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    vulkan_clip_correction() * Mat4::new_perspective(aspect, fov_y_radians, z_near, z_far)
}

/// Right-handed view matrix looking from `eye` towards `target`
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
}

/// Rotation of `angle_radians` about `axis`
pub fn rotation(axis: Vec3, angle_radians: f32) -> Mat4 {
    Mat4::new_rotation(axis.normalize() * angle_radians)
}

/// Column-major array layout expected by GLSL `mat4`
pub fn to_column_arrays(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(proj: &Mat4, point: Vec3) -> Vec3 {
        let clip = proj * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_depth_maps_to_zero_one() {
        let proj = perspective(45f32.to_radians(), 4.0 / 3.0, 0.1, 10.0);
        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -0.1)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -10.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_y_axis_points_down() {
        let proj = perspective(45f32.to_radians(), 1.0, 0.1, 10.0);
        let ndc = project(&proj, Vec3::new(0.0, 1.0, -5.0));
        assert!(ndc.y < 0.0);
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let view = look_at(Vec3::new(2.0, 2.0, 2.0), Vec3::zeros(), Vec3::z());
        let target = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.z, -(12.0f32).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_column_arrays_are_column_major() {
        let translation = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let columns = to_column_arrays(&translation);
        assert_eq!(columns[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
