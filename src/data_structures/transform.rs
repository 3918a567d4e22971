//! Per-frame transforms and the push constant block shared by the mesh and
//! quad shaders.

use cgmath::{Deg, Matrix4, Point3, Rad, Vector3};

/// Converts cgmath's OpenGL clip space (z in -1..1) to wgpu's (z in 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const FOV_Y: Deg<f32> = Deg(45.0);
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 1000.0;

/// Matches `struct PushConstants` in the WGSL shaders, including the trailing
/// padding WGSL adds to round the struct up to 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PushConstants {
    pub mvp: [[f32; 4]; 4],
    pub texture_id: u32,
    pub _padding: [u32; 3],
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(mvp: Matrix4<f32>, texture_id: u32) -> Self {
        Self {
            mvp: mvp.into(),
            texture_id,
            _padding: [0; 3],
        }
    }
}

/// Width over height, `1.0` for degenerate sizes.
pub fn aspect_ratio(framebuffer: (u32, u32)) -> f32 {
    if framebuffer.0 == 0 || framebuffer.1 == 0 {
        return 1.0;
    }
    framebuffer.0 as f32 / framebuffer.1 as f32
}

/// Perspective view of a model spinning around the origin.
pub fn spinning_mvp(aspect: f32, time: f64) -> Matrix4<f32> {
    let proj = OPENGL_TO_WGPU_MATRIX * cgmath::perspective(FOV_Y, aspect, Z_NEAR, Z_FAR);
    let view = Matrix4::look_at_rh(
        Point3::new(0.0, 0.0, 5.0),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    let t = time as f32;
    let model = Matrix4::from_axis_angle(Vector3::unit_y(), Rad(t))
        * Matrix4::from_axis_angle(Vector3::unit_x(), Rad(t * 0.5));
    proj * view * model
}

/// Orthographic transform fitting a unit quad (-1..1) with `image_aspect` into
/// a viewport of `viewport_aspect` without distortion.
pub fn ortho_mvp(viewport_aspect: f32, image_aspect: f32) -> Matrix4<f32> {
    let (sx, sy) = if image_aspect > viewport_aspect {
        (1.0, viewport_aspect / image_aspect)
    } else {
        (image_aspect / viewport_aspect, 1.0)
    };
    let proj = OPENGL_TO_WGPU_MATRIX * cgmath::ortho(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
    if !(sx.is_finite() && sy.is_finite()) {
        return proj;
    }
    proj * Matrix4::from_nonuniform_scale(sx, sy, 1.0)
}

#[cfg(test)]
mod tests {
    use cgmath::Vector4;

    use super::*;

    #[test]
    fn push_constants_match_wgsl_layout() {
        assert_eq!(PushConstants::SIZE, 80);
    }

    #[test]
    fn origin_projects_to_screen_centre_inside_depth_range() {
        let clip = spinning_mvp(16.0 / 9.0, 1.25) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn ortho_letterboxes_wide_images() {
        let mvp = ortho_mvp(1.0, 2.0);
        let corner = mvp * Vector4::new(1.0, 1.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 0.5).abs() < 1e-6);

        let matched = ortho_mvp(2.0, 2.0) * Vector4::new(-1.0, 1.0, 0.0, 1.0);
        assert!((matched.x + 1.0).abs() < 1e-6);
        assert!((matched.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_sized_framebuffer_has_unit_aspect() {
        assert_eq!(aspect_ratio((0, 540)), 1.0);
        assert_eq!(aspect_ratio((960, 540)), 960.0 / 540.0);
    }
}
