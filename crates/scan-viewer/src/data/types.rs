//! GPU-facing data layouts.

use glam::{Mat4, Vec3};

/// One point of the cloud, uploaded as a per-instance vertex.
/// Must match `VsIn` instance inputs in `POINTS_WGSL`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct PointVertex {
    pub position: [f32; 3],
    /// sRGB colour in [0,1].
    pub color: [f32; 3],
    /// Unit normal, or zero when the cloud carries no shading information.
    pub normal: [f32; 3],
}

/// Vertex of the shared marker sphere mesh.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Per-marker model matrix (uniform scale + translation).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct MarkerInstance {
    pub model: [[f32; 4]; 4],
}

impl MarkerInstance {
    pub fn new(position: Vec3, radius: f32) -> Self {
        let m = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius));
        Self {
            model: m.to_cols_array_2d(),
        }
    }

    #[inline]
    pub fn translation(&self) -> Vec3 {
        let c = self.model[3];
        Vec3::new(c[0], c[1], c[2])
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.model[0][0]
    }

    /// Rewrites the scale in place, leaving the translation untouched.
    #[inline]
    pub fn set_radius(&mut self, radius: f32) {
        self.model[0][0] = radius;
        self.model[1][1] = radius;
        self.model[2][2] = radius;
    }
}

/// Anchor of one screen-space glow sprite.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct GlowInstance {
    pub position: [f32; 3],
}

/// Per-frame uniform shared by every scene pipeline.
/// Must match `Scene` in the WGSL sources (std140-compatible).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniformStd140 {
    pub view_proj: [[f32; 4]; 4],
    /// Scan-group transform applied to cloud, markers and glows.
    pub world: [[f32; 4]; 4],
    /// Viewport in physical pixels.
    pub viewport_size: [f32; 2],
    /// World-space point size before perspective attenuation.
    pub point_size: f32,
    /// Glow sprite edge length in pixels.
    pub glow_size_px: f32,
    /// Unit vector towards the directional light.
    pub light_dir: [f32; 3],
    /// Linear ambient intensity.
    pub ambient: f32,
    pub camera_pos: [f32; 3],
    pub _pad0: f32,
}

const _: [(); 176] = [(); core::mem::size_of::<SceneUniformStd140>()];
