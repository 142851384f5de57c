//! Per-frame shader constants

use crate::foundation::math::{self, Vec3};

/// Degrees the model turns about +Z per second
pub const ROTATION_DEGREES_PER_SECOND: f32 = 90.0;

/// Vertical field of view in degrees
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;

/// Near clip plane distance
pub const NEAR_PLANE: f32 = 0.1;

/// Far clip plane distance
pub const FAR_PLANE: f32 = 10.0;

/// Model, view and projection matrices bound at descriptor binding 0
///
/// Matrices are stored column-major to match GLSL `mat4` in a std140 block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBufferObject {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to camera
    pub view: [[f32; 4]; 4],
    /// Camera to Vulkan clip space
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Transform for `elapsed_seconds` since the first frame at the given aspect ratio
    pub fn at_time(elapsed_seconds: f32, aspect: f32) -> Self {
        let model = math::rotation(
            Vec3::z(),
            elapsed_seconds * ROTATION_DEGREES_PER_SECOND.to_radians(),
        );
        let view = math::look_at(Vec3::new(2.0, 2.0, 2.0), Vec3::zeros(), Vec3::z());
        let proj = math::perspective(FIELD_OF_VIEW_DEGREES.to_radians(), aspect, NEAR_PLANE, FAR_PLANE);

        Self {
            model: math::to_column_arrays(&model),
            view: math::to_column_arrays(&view),
            proj: math::to_column_arrays(&proj),
        }
    }

    /// Width over height, guarded against a collapsed window
    pub fn aspect_ratio(width: u32, height: u32) -> f32 {
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec4};
    use approx::assert_relative_eq;

    fn matrix(columns: [[f32; 4]; 4]) -> Mat4 {
        Mat4::from(columns)
    }

    #[test]
    fn test_model_is_identity_at_start() {
        let ubo = UniformBufferObject::at_time(0.0, 1.0);
        assert_relative_eq!(matrix(ubo.model), Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_model_turns_ninety_degrees_per_second() {
        let ubo = UniformBufferObject::at_time(1.0, 1.0);
        let rotated = matrix(ubo.model) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(rotated, Vec4::new(0.0, 1.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_origin_lands_inside_depth_range() {
        let ubo = UniformBufferObject::at_time(0.5, 800.0 / 600.0);
        let clip = matrix(ubo.proj) * matrix(ubo.view) * matrix(ubo.model) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0, "depth {depth} outside 0..1");
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_layout_is_three_packed_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 64);
        let ubo = UniformBufferObject::at_time(0.0, 1.0);
        assert_eq!(bytemuck::bytes_of(&ubo).len(), 192);
    }

    #[test]
    fn test_aspect_ratio_guards_zero_height() {
        assert_relative_eq!(UniformBufferObject::aspect_ratio(800, 600), 4.0 / 3.0);
        assert_relative_eq!(UniformBufferObject::aspect_ratio(800, 0), 1.0);
    }
}
