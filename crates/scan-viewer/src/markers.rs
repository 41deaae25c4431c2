//! Location markers: one lit sphere plus one screen-space glow per point.
//!
//! This is the CPU half. It owns the instance arrays and decides whether the
//! GPU side must rebuild, rewrite or drop its buffers.

use crate::bounds::Aabb;
use crate::data::types::{GlowInstance, MarkerInstance};
use glam::Vec3;

pub const DEFAULT_MARKER_SCALE: f32 = 0.5;
/// Floor for the unscaled sphere radius.
pub const MIN_BASE_RADIUS: f32 = 0.02;
pub const GLOW_SIZE_PX: f32 = 24.0;
pub const GLOW_TEXTURE_SIZE: u32 = 128;

pub const MARKER_COLOR: u32 = 0xff2a2a;
pub const MARKER_EMISSIVE: u32 = 0x550000;
pub const MARKER_ROUGHNESS: f32 = 0.35;
pub const SPHERE_DETAIL: u32 = 1;

/// Sphere radius for a marker set.
///
/// With a positive reference diagonal (the point cloud's) the base is
/// `reference / 120`; otherwise the markers' own diagonal `/ 40`. The base is
/// floored at [`MIN_BASE_RADIUS`] before `scale` is applied.
pub fn marker_radius(markers: &[Vec3], reference_diagonal: Option<f32>, scale: f32) -> f32 {
    let base = match reference_diagonal {
        Some(d) if d > 1e-6 => d / 120.0,
        _ => Aabb::from_points(markers).diagonal() / 40.0,
    };
    base.max(MIN_BASE_RADIUS) * scale
}

/// What the GPU side has to do after a [`MarkerLayer`] change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerUpdate {
    /// New set: release old buffers, upload instances and glows.
    Rebuilt,
    /// Same set, new radius: rewrite instance transforms in place.
    Rescaled,
    /// Empty set: release everything.
    Cleared,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct MarkerLayer {
    points: Vec<Vec3>,
    instances: Vec<MarkerInstance>,
    glows: Vec<GlowInstance>,
    radius: f32,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the marker set.
    pub fn rebuild(&mut self, points: Vec<Vec3>, reference_diagonal: Option<f32>, scale: f32) -> MarkerUpdate {
        if points.is_empty() {
            return self.clear();
        }

        self.radius = marker_radius(&points, reference_diagonal, scale);
        let r = self.radius;
        self.instances = points.iter().map(|p| MarkerInstance::new(*p, r)).collect();
        self.glows = points
            .iter()
            .map(|p| GlowInstance {
                position: p.to_array(),
            })
            .collect();
        self.points = points;

        log::info!("Markers: {} placed, radius {:.4}", self.points.len(), r);
        MarkerUpdate::Rebuilt
    }

    /// Recomputes the radius and rewrites the existing instances in place.
    pub fn rescale(&mut self, reference_diagonal: Option<f32>, scale: f32) -> MarkerUpdate {
        if self.points.is_empty() {
            return MarkerUpdate::Unchanged;
        }

        self.radius = marker_radius(&self.points, reference_diagonal, scale);
        for inst in &mut self.instances {
            inst.set_radius(self.radius);
        }

        log::debug!("Markers rescaled: radius {:.4}", self.radius);
        MarkerUpdate::Rescaled
    }

    pub fn clear(&mut self) -> MarkerUpdate {
        let had_any = !self.points.is_empty();
        self.points.clear();
        self.instances.clear();
        self.glows.clear();
        self.radius = 0.0;
        if had_any {
            MarkerUpdate::Cleared
        } else {
            MarkerUpdate::Unchanged
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn instances(&self) -> &[MarkerInstance] {
        &self.instances
    }

    pub fn glows(&self) -> &[GlowInstance] {
        &self.glows
    }
}

/// Radial gradient used by the glow sprites, RGBA8 sRGB, `size`×`size`.
///
/// Colour is (255, 40, 40); alpha falls from 1.0 at the centre to 0.55 at 35%
/// of the radius and to 0 at the edge.
pub fn glow_texture(size: u32) -> Vec<u8> {
    const STOPS: [(f32, f32); 3] = [(0.0, 1.0), (0.35, 0.55), (1.0, 0.0)];

    let half = size as f32 * 0.5;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 + 0.5 - half;
            let dy = y as f32 + 0.5 - half;
            let t = ((dx * dx + dy * dy).sqrt() / half).min(1.0);

            let alpha = STOPS
                .windows(2)
                .find(|w| t <= w[1].0)
                .map(|w| {
                    let (t0, a0) = w[0];
                    let (t1, a1) = w[1];
                    a0 + (a1 - a0) * ((t - t0) / (t1 - t0))
                })
                .unwrap_or(0.0);

            rgba.extend_from_slice(&[255, 40, 40, (alpha * 255.0).round() as u8]);
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn radius_from_reference_diagonal() {
        let pts = [Vec3::ZERO];
        assert!(approx(marker_radius(&pts, Some(120.0), 0.5), 0.5));
        assert!(approx(marker_radius(&pts, Some(120.0), 2.0), 2.0));
    }

    #[test]
    fn radius_from_own_diagonal_without_cloud() {
        let pts = [Vec3::ZERO, Vec3::new(40.0, 0.0, 0.0)];
        assert!(approx(marker_radius(&pts, None, 1.0), 1.0));
        assert!(approx(marker_radius(&pts, Some(0.0), 1.0), 1.0));
    }

    #[test]
    fn single_marker_gets_floor_radius() {
        let pts = [Vec3::new(3.0, 4.0, 5.0)];
        assert!(approx(marker_radius(&pts, None, 0.5), 0.01));
    }

    #[test]
    fn small_reference_is_floored_before_scaling() {
        let pts = [Vec3::ZERO];
        assert!(approx(marker_radius(&pts, Some(1.2), 3.0), 0.06));
    }

    #[test]
    fn rescale_keeps_positions_and_count() {
        let mut layer = MarkerLayer::new();
        let pts = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 0.0, 8.0)];
        assert_eq!(layer.rebuild(pts.clone(), Some(120.0), 0.5), MarkerUpdate::Rebuilt);
        assert!(approx(layer.instances()[0].radius(), 0.5));

        assert_eq!(layer.rescale(Some(120.0), 2.0), MarkerUpdate::Rescaled);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.glows().len(), 2);
        for (inst, p) in layer.instances().iter().zip(&pts) {
            assert_eq!(inst.translation(), *p);
            assert!(approx(inst.radius(), 2.0));
        }
    }

    #[test]
    fn empty_set_clears_previous_markers() {
        let mut layer = MarkerLayer::new();
        layer.rebuild(vec![Vec3::ZERO], None, 1.0);
        assert_eq!(layer.rebuild(Vec::new(), None, 1.0), MarkerUpdate::Cleared);
        assert!(layer.is_empty() && layer.instances().is_empty() && layer.glows().is_empty());
        assert_eq!(layer.rescale(None, 1.0), MarkerUpdate::Unchanged);
        assert_eq!(layer.clear(), MarkerUpdate::Unchanged);
    }

    #[test]
    fn glow_gradient_stops() {
        let size = GLOW_TEXTURE_SIZE;
        let tex = glow_texture(size);
        assert_eq!(tex.len(), (size * size * 4) as usize);

        let px = |x: u32, y: u32| &tex[((y * size + x) * 4) as usize..][..4];
        let center = px(size / 2, size / 2);
        assert_eq!(&center[..3], &[255, 40, 40]);
        assert!(center[3] >= 250);
        assert_eq!(px(0, 0)[3], 0);
        assert!(px(size / 2, 0)[3] <= 2);

        // Roughly 35% of the radius out from the centre.
        let a = px(size / 2 + 22, size / 2)[3] as f32 / 255.0;
        assert!((a - 0.55).abs() < 0.03, "{a}");
    }
}
