use crate::bounds::{Aabb, BoundingMetrics};
use glam::{Mat4, Vec3};
use std::f32::consts::{PI, TAU};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

pub const DEFAULT_NEAR: f32 = 0.01;
pub const DEFAULT_FAR: f32 = 10_000.0;

/// Perspective camera looking at `target`, y-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(fov_y_deg: f32, aspect: f32) -> Self {
        Self {
            position: Vec3::splat(5.0),
            target: Vec3::ZERO,
            fov_y_deg,
            aspect,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// wgpu clip space: right-handed, depth in [0,1].
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect.max(1e-6),
            self.near,
            self.far,
        )
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Frames `bounds` (already in scene space) from the (1, 0.8, 1) diagonal and
/// adapts the clip planes to the fitted distance. Returns `None`, leaving the
/// camera untouched, when the box is empty.
pub fn fit_camera(camera: &mut Camera, bounds: &Aabb) -> Option<BoundingMetrics> {
    if bounds.is_empty() {
        return None;
    }

    let center = bounds.center();
    let mut max_extent = bounds.size().max_element();
    if max_extent < 1e-6 {
        max_extent = 1.0;
    }

    let half_fov = (camera.fov_y_deg.to_radians() * 0.5).max(1e-3);
    let distance = max_extent * 0.8 / half_fov.tan();

    camera.position = center + Vec3::new(1.0, 0.8, 1.0).normalize() * distance;
    camera.near = (distance / 1000.0).max(DEFAULT_NEAR);
    camera.far = distance * 1000.0;
    camera.target = center;

    log::debug!(
        "Camera fitted: center=({:.2},{:.2},{:.2}) distance={:.3} near={:.4} far={:.1}",
        center.x,
        center.y,
        center.z,
        distance,
        camera.near,
        camera.far
    );

    Some(BoundingMetrics::from(*bounds))
}

/// Orbit/pan/zoom around the camera target with inertial damping.
///
/// Input accumulates deltas; `update` applies a `damping_factor` share of
/// them each frame and decays the remainder.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    rotating: bool,
    panning: bool,
    last_cursor: Option<(f64, f64)>,
    viewport_height: f32,

    theta_delta: f32,
    phi_delta: f32,
    zoom_scale: f32,
    pan_offset: Vec3,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitController {
    pub fn new() -> Self {
        Self {
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotating: false,
            panning: false,
            last_cursor: None,
            viewport_height: 720.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            zoom_scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Drops any pending motion, e.g. after the camera was re-fitted.
    pub fn reset(&mut self) {
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.zoom_scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    pub fn handle_event(&mut self, event: &WindowEvent, camera: &Camera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.rotating = pressed,
                    MouseButton::Right | MouseButton::Middle => self.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let xy = (position.x, position.y);
                if let Some(last) = self.last_cursor {
                    let dx = (xy.0 - last.0) as f32;
                    let dy = (xy.1 - last.1) as f32;
                    if self.rotating {
                        self.rotate(dx, dy);
                    } else if self.panning {
                        self.pan(dx, dy, camera);
                    }
                }
                self.last_cursor = Some(xy);
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.zoom(scroll);
            }
            _ => {}
        }
    }

    /// Drag by `dx`,`dy` pixels; a full viewport height turns one revolution.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.theta_delta -= TAU * dx / self.viewport_height * self.rotate_speed;
        self.phi_delta -= TAU * dy / self.viewport_height * self.rotate_speed;
    }

    /// Positive `scroll` zooms in.
    pub fn zoom(&mut self, scroll: f32) {
        if scroll != 0.0 {
            self.zoom_scale *= 0.95f32.powf(self.zoom_speed * scroll);
        }
    }

    /// Screen-space pan: the point under the cursor follows the cursor.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &Camera) {
        let forward = (camera.target - camera.position).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        let world_per_px = 2.0 * camera.distance() * (camera.fov_y_deg.to_radians() * 0.5).tan()
            / self.viewport_height;
        self.pan_offset += (-right * dx + up * dy) * world_per_px;
    }

    /// Applies one frame of damped motion. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - camera.target;
        let mut radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let df = self.damping_factor;
        theta += self.theta_delta * df;
        phi = (phi + self.phi_delta * df).clamp(1e-6, PI - 1e-6);
        radius = (radius * self.zoom_scale).clamp(self.min_distance.max(1e-6), self.max_distance);

        let before = camera.position;
        camera.target += self.pan_offset * df;
        let sin_phi = phi.sin();
        camera.position = camera.target
            + Vec3::new(sin_phi * theta.sin(), phi.cos(), sin_phi * theta.cos()) * radius;

        let keep = 1.0 - df;
        self.theta_delta *= keep;
        self.phi_delta *= keep;
        self.pan_offset *= keep;
        self.zoom_scale = 1.0;

        before.distance_squared(camera.position) > 1e-10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(min: f32, max: f32) -> Aabb {
        Aabb {
            min: Vec3::splat(min),
            max: Vec3::splat(max),
        }
    }

    #[test]
    fn fit_frames_unit_cube() {
        let mut cam = Camera::new(75.0, 1.0);
        let metrics = fit_camera(&mut cam, &cube(0.0, 1.0)).unwrap();

        let d = 0.8 / (37.5f32.to_radians()).tan();
        assert!((cam.distance() - d).abs() < 1e-4);
        assert_eq!(cam.target, Vec3::splat(0.5));
        let dir = (cam.position - cam.target).normalize();
        assert!((dir - Vec3::new(1.0, 0.8, 1.0).normalize()).length() < 1e-5);
        assert!((cam.near - 0.01).abs() < 1e-6);
        assert!((cam.far - d * 1000.0).abs() < 1e-2);
        assert!((metrics.diagonal - 3f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn fit_on_degenerate_box_uses_unit_extent() {
        let mut cam = Camera::new(75.0, 1.0);
        let b = Aabb {
            min: Vec3::new(2.0, 3.0, 4.0),
            max: Vec3::new(2.0, 3.0, 4.0),
        };
        fit_camera(&mut cam, &b).unwrap();
        let d = 0.8 / (37.5f32.to_radians()).tan();
        assert!((cam.distance() - d).abs() < 1e-4);
        assert_eq!(cam.target, Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn fit_scales_near_plane_with_distance() {
        let mut cam = Camera::new(75.0, 1.0);
        fit_camera(&mut cam, &cube(-500.0, 500.0)).unwrap();
        assert!((cam.near - cam.distance() / 1000.0).abs() < 1e-3);
        assert!(cam.near > DEFAULT_NEAR);
    }

    #[test]
    fn fit_ignores_empty_box() {
        let mut cam = Camera::new(75.0, 1.0);
        let before = cam.clone();
        assert!(fit_camera(&mut cam, &Aabb::EMPTY).is_none());
        assert_eq!(cam, before);
    }

    #[test]
    fn idle_controller_leaves_camera_still() {
        let mut cam = Camera::new(75.0, 1.0);
        let before = cam.position;
        let mut ctl = OrbitController::new();
        assert!(!ctl.update(&mut cam));
        assert!((cam.position - before).length() < 1e-5);
    }

    #[test]
    fn rotation_preserves_distance_and_decays() {
        let mut cam = Camera::new(75.0, 1.0);
        let r = cam.distance();
        let mut ctl = OrbitController::new();
        ctl.rotate(100.0, 0.0);

        assert!(ctl.update(&mut cam));
        assert!((cam.distance() - r).abs() < 1e-4);

        let first = ctl.theta_delta;
        for _ in 0..400 {
            ctl.update(&mut cam);
        }
        assert!(ctl.theta_delta.abs() < first.abs() * 1e-6);
        assert!((cam.distance() - r).abs() < 1e-3);
    }

    #[test]
    fn zoom_in_shrinks_distance() {
        let mut cam = Camera::new(75.0, 1.0);
        let r = cam.distance();
        let mut ctl = OrbitController::new();
        ctl.zoom(1.0);
        ctl.update(&mut cam);
        assert!((cam.distance() - r * 0.95).abs() < 1e-4);
    }

    #[test]
    fn pan_moves_target_and_position_together() {
        let mut cam = Camera::new(75.0, 1.0);
        let offset = cam.position - cam.target;
        let mut ctl = OrbitController::new();
        ctl.pan(50.0, 0.0, &cam);
        ctl.update(&mut cam);
        assert!(cam.target.length() > 0.0);
        assert!(((cam.position - cam.target) - offset).length() < 1e-4);
    }

    #[test]
    fn view_proj_maps_target_to_screen_center() {
        let mut cam = Camera::new(75.0, 16.0 / 9.0);
        cam.position = Vec3::new(3.0, 2.0, 1.0);
        cam.target = Vec3::new(-1.0, 0.5, 0.0);
        let clip = cam.view_proj() * cam.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
