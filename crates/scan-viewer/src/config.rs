use crate::markers::DEFAULT_MARKER_SCALE;
use crate::scene::SceneSettings;
use crate::ui::SCALE_RANGE;
use clap::Parser;
use glam::Mat4;
use std::time::Duration;

/// `scan_viewer` - interactive viewer for a scanned point cloud with glowing
/// location markers.
///
/// Assets are given by URL (`http(s)://`, `file://` or a plain path) and are
/// fetched without caching each time the viewer starts.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Point-cloud asset (PLY, ASCII or binary).
    #[arg(long, env = "SCAN_PLY_URL")]
    pub ply_url: Option<String>,

    /// Marker coordinates: JSON, CSV or whitespace-separated text.
    #[arg(long, env = "SCAN_POINTS_URL")]
    pub points_url: Option<String>,

    /// Marker size multiplier. Adjustable at runtime from the HUD.
    #[arg(long, env = "SCAN_MARKER_SCALE", default_value_t = DEFAULT_MARKER_SCALE)]
    pub scale: f32,

    /// Window height in logical pixels.
    #[arg(long, env = "SCAN_VIEW_HEIGHT", default_value_t = 720)]
    pub height: u32,

    /// Window width in logical pixels.
    #[arg(long, env = "SCAN_VIEW_WIDTH", default_value_t = 1280)]
    pub width: u32,

    /// Vertical field of view, degrees.
    #[arg(long, env = "SCAN_FOV_DEG", default_value_t = 75.0)]
    pub fov: f32,

    /// Rotation of the scan group about X, degrees.
    ///
    /// Scans are typically captured Z-up; the default tilts them into the
    /// viewer's Y-up frame.
    #[arg(long, env = "SCAN_WORLD_PITCH_DEG", default_value_t = 130.0, allow_negative_numbers = true)]
    pub world_pitch_deg: f32,

    /// Rotation of the scan group about Y, degrees.
    #[arg(long, env = "SCAN_WORLD_YAW_DEG", default_value_t = 5.0, allow_negative_numbers = true)]
    pub world_yaw_deg: f32,

    /// Per-request fetch timeout, seconds.
    #[arg(long, env = "SCAN_FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,
}

impl Config {
    /// Scan-group transform: X rotation, then Y (XYZ Euler order).
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_rotation_x(self.world_pitch_deg.to_radians())
            * Mat4::from_rotation_y(self.world_yaw_deg.to_radians())
    }

    pub fn scene_settings(&self, viewport: (u32, u32)) -> SceneSettings {
        let scale = if self.scale.is_finite() && self.scale > 0.0 {
            let clamped = self.scale.clamp(*SCALE_RANGE.start(), *SCALE_RANGE.end());
            if clamped != self.scale {
                log::warn!("Marker scale {} outside {:?}; using {}", self.scale, SCALE_RANGE, clamped);
            }
            clamped
        } else {
            log::warn!("Invalid marker scale {}; using {}", self.scale, DEFAULT_MARKER_SCALE);
            DEFAULT_MARKER_SCALE
        };

        SceneSettings {
            fov_y_deg: self.fov.clamp(1.0, 179.0),
            viewport,
            world: self.world_transform(),
            marker_scale: scale,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
        }
    }
}
