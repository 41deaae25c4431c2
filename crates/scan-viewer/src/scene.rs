//! Scene ownership and asset lifecycle.
//!
//! `SceneManager` is the only place that mutates the camera, the marker layer
//! and the GPU objects behind a [`RenderBackend`]. Loads are tagged with a
//! per-slot sequence number; only the latest request of a slot is installed.

use crate::{
    bounds::BoundingMetrics,
    camera::{fit_camera, Camera, OrbitController},
    coords::parse_coords_counted,
    data::{build_point_cloud, GlowInstance, MarkerInstance, PointCloud},
    error::LoadError,
    markers::{MarkerLayer, MarkerUpdate, DEFAULT_MARKER_SCALE},
    net::{AssetLoader, AssetSlot, Completion, Payload},
    render_loop::StopFlag,
};
use glam::Mat4;
use std::time::Duration;
use winit::event::WindowEvent;

/// GPU side of the scene. Every `install`/`rebuild` owns what it allocates
/// until the matching `release` call.
pub trait RenderBackend {
    fn install_point_cloud(&mut self, cloud: &PointCloud);
    fn release_point_cloud(&mut self);
    /// Allocates exactly `instances.len()` spheres and glows.
    fn rebuild_markers(&mut self, instances: &[MarkerInstance], glows: &[GlowInstance]);
    /// Overwrites existing sphere transforms; never reallocates.
    fn rescale_markers(&mut self, instances: &[MarkerInstance]);
    fn release_markers(&mut self);
    fn resize(&mut self, width: u32, height: u32);
    /// Releases every GPU resource still held.
    fn release_all(&mut self);
}

#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub fov_y_deg: f32,
    pub viewport: (u32, u32),
    /// Transform of the group holding cloud and markers.
    pub world: Mat4,
    pub marker_scale: f32,
    pub fetch_timeout: Duration,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            fov_y_deg: 75.0,
            viewport: (1280, 720),
            world: Mat4::IDENTITY,
            marker_scale: DEFAULT_MARKER_SCALE,
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePhase {
    Idle,
    LoadingCloud,
    CloudReady,
    LoadingMarkers,
    Ready,
    Error,
    Disposed,
}

#[derive(Debug)]
struct LoadSlot {
    latest: Option<u64>,
    state: SlotState,
}

impl LoadSlot {
    fn new() -> Self {
        Self {
            latest: None,
            state: SlotState::Idle,
        }
    }
}

/// The installed cloud, measured in scene space.
#[derive(Debug, Clone, Copy)]
struct ActiveCloud {
    points: usize,
    metrics: BoundingMetrics,
}

pub struct SceneManager<B: RenderBackend> {
    backend: B,
    loader: AssetLoader,
    camera: Camera,
    controls: OrbitController,
    world: Mat4,

    cloud: Option<ActiveCloud>,
    markers: MarkerLayer,
    marker_scale: f32,

    next_seq: u64,
    cloud_slot: LoadSlot,
    marker_slot: LoadSlot,
    /// Marker URL to request once the pending cloud load settles.
    deferred_markers: Option<String>,

    stop: StopFlag,
    disposed: bool,
}

impl<B: RenderBackend> SceneManager<B> {
    pub fn new(mut backend: B, settings: SceneSettings) -> Self {
        let (w, h) = settings.viewport;
        let mut camera = Camera::new(settings.fov_y_deg, 1.0);
        camera.set_viewport(w, h);
        let mut controls = OrbitController::new();
        controls.set_viewport_height(h);
        backend.resize(w, h);

        Self {
            backend,
            loader: AssetLoader::new(settings.fetch_timeout),
            camera,
            controls,
            world: settings.world,
            cloud: None,
            markers: MarkerLayer::new(),
            marker_scale: settings.marker_scale,
            next_seq: 0,
            cloud_slot: LoadSlot::new(),
            marker_slot: LoadSlot::new(),
            deferred_markers: None,
            stop: StopFlag::new(),
            disposed: false,
        }
    }

    /// Loads the cloud first and the markers after it, so markers are sized
    /// against the cloud they annotate.
    pub fn load_scene(&mut self, cloud_url: Option<&str>, markers_url: Option<&str>) {
        match (cloud_url, markers_url) {
            (Some(cloud), markers) => {
                self.deferred_markers = markers.map(str::to_string);
                self.load_point_cloud(cloud);
            }
            (None, Some(markers)) => {
                self.load_markers(markers);
            }
            (None, None) => log::warn!("No point cloud or marker URL given; showing an empty scene"),
        }
    }

    /// Starts a point-cloud load. Returns its sequence number.
    pub fn load_point_cloud(&mut self, url: &str) -> Option<u64> {
        self.request(AssetSlot::PointCloud, url)
    }

    /// Starts a marker load. Returns its sequence number.
    pub fn load_markers(&mut self, url: &str) -> Option<u64> {
        self.request(AssetSlot::Markers, url)
    }

    fn request(&mut self, slot: AssetSlot, url: &str) -> Option<u64> {
        if self.disposed {
            log::warn!("Ignoring {} load of {}: scene disposed", slot, url);
            return None;
        }

        // An explicit marker load supersedes one parked by `load_scene`.
        if slot == AssetSlot::Markers {
            self.deferred_markers = None;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let state = self.slot_mut(slot);
        state.latest = Some(seq);
        state.state = SlotState::Loading;

        self.loader.fetch(slot, seq, url);
        Some(seq)
    }

    /// Rescales the markers in place. Non-finite and non-positive values are
    /// ignored.
    pub fn set_scale(&mut self, value: f32) {
        if self.disposed || !value.is_finite() || value <= 0.0 {
            log::debug!("Ignoring marker scale {}", value);
            return;
        }
        self.marker_scale = value;
        let update = self.markers.rescale(self.reference_diagonal(), value);
        self.apply_marker_update(update);
    }

    /// Installs every completion that has arrived since the last call.
    pub fn pump(&mut self) -> usize {
        let mut n = 0;
        while let Some(done) = self.loader.try_recv() {
            self.complete(done);
            n += 1;
        }
        n
    }

    /// Handles one finished load.
    pub fn complete(&mut self, done: Completion) {
        let Completion {
            slot,
            seq,
            url,
            result,
        } = done;

        if self.disposed {
            log::debug!("Dropping {} #{} from {}: scene disposed", slot, seq, url);
            return;
        }
        if self.slot(slot).latest != Some(seq) {
            log::debug!(
                "Dropping stale {} #{} from {} (latest is #{:?})",
                slot,
                seq,
                url,
                self.slot(slot).latest
            );
            return;
        }

        let outcome = result.and_then(|payload| match (slot, payload) {
            (AssetSlot::PointCloud, Payload::Bytes(bytes)) => self.install_point_cloud(&url, &bytes),
            (AssetSlot::Markers, Payload::Text(text)) => {
                self.install_markers(&text);
                Ok(())
            }
            (slot, _) => Err(LoadError::fetch(&url, format!("unexpected payload kind for {slot}"))),
        });

        self.slot_mut(slot).state = match outcome {
            Ok(()) => SlotState::Ready,
            Err(e) => {
                log::error!("{}", e);
                SlotState::Error(e.to_string())
            }
        };

        if slot == AssetSlot::PointCloud {
            if let Some(markers) = self.deferred_markers.take() {
                self.load_markers(&markers);
            }
        }
    }

    fn install_point_cloud(&mut self, url: &str, bytes: &[u8]) -> Result<(), LoadError> {
        let cloud = build_point_cloud(bytes).map_err(|source| LoadError::Format {
            url: url.to_string(),
            source,
        })?;

        self.backend.release_point_cloud();
        self.backend.install_point_cloud(&cloud);

        let scene_bounds = cloud.bounds.transformed(&self.world);
        let metrics = BoundingMetrics::from(scene_bounds);
        if fit_camera(&mut self.camera, &scene_bounds).is_some() {
            self.controls.reset();
        }
        self.cloud = Some(ActiveCloud {
            points: cloud.len(),
            metrics,
        });

        log::info!(
            "Point cloud installed from {}: {} points ({:.1} MiB), diagonal {:.3}",
            url,
            cloud.len(),
            cloud.size_bytes() as f64 / (1024.0 * 1024.0),
            metrics.diagonal
        );

        let update = self.markers.rescale(self.reference_diagonal(), self.marker_scale);
        self.apply_marker_update(update);
        Ok(())
    }

    fn install_markers(&mut self, text: &str) {
        let parsed = parse_coords_counted(text);
        if parsed.skipped > 0 {
            log::debug!("Skipped {} malformed marker rows", parsed.skipped);
        }
        let update = self
            .markers
            .rebuild(parsed.points, self.reference_diagonal(), self.marker_scale);
        self.apply_marker_update(update);
    }

    fn apply_marker_update(&mut self, update: MarkerUpdate) {
        match update {
            MarkerUpdate::Rebuilt => {
                self.backend.release_markers();
                self.backend
                    .rebuild_markers(self.markers.instances(), self.markers.glows());
            }
            MarkerUpdate::Rescaled => self.backend.rescale_markers(self.markers.instances()),
            MarkerUpdate::Cleared => self.backend.release_markers(),
            MarkerUpdate::Unchanged => {}
        }
    }

    /// Stops the render loop, releases every GPU resource and ignores all
    /// later completions. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop.stop();
        self.markers.clear();
        self.cloud = None;
        self.deferred_markers = None;
        self.backend.release_all();
        self.disposed = true;
        log::info!("Scene disposed");
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if !self.disposed {
            self.controls.handle_event(event, &self.camera);
        }
    }

    /// Damping integration for the orbit controls.
    pub fn update_controls(&mut self) -> bool {
        self.controls.update(&mut self.camera)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.disposed || width == 0 || height == 0 {
            return;
        }
        self.camera.set_viewport(width, height);
        self.controls.set_viewport_height(height);
        self.backend.resize(width, height);
    }

    fn reference_diagonal(&self) -> Option<f32> {
        self.cloud.map(|c| c.metrics.diagonal)
    }

    fn slot(&self, slot: AssetSlot) -> &LoadSlot {
        match slot {
            AssetSlot::PointCloud => &self.cloud_slot,
            AssetSlot::Markers => &self.marker_slot,
        }
    }

    fn slot_mut(&mut self, slot: AssetSlot) -> &mut LoadSlot {
        match slot {
            AssetSlot::PointCloud => &mut self.cloud_slot,
            AssetSlot::Markers => &mut self.marker_slot,
        }
    }

    pub fn phase(&self) -> ScenePhase {
        use SlotState::*;

        if self.disposed {
            return ScenePhase::Disposed;
        }
        match (&self.cloud_slot.state, &self.marker_slot.state) {
            (Loading, _) => ScenePhase::LoadingCloud,
            (_, Loading) => ScenePhase::LoadingMarkers,
            (Error(_), _) | (_, Error(_)) => ScenePhase::Error,
            (Ready, Idle) => ScenePhase::CloudReady,
            (Idle, Idle) => ScenePhase::Idle,
            _ => ScenePhase::Ready,
        }
    }

    pub fn cloud_state(&self) -> &SlotState {
        &self.cloud_slot.state
    }

    pub fn marker_state(&self) -> &SlotState {
        &self.marker_slot.state
    }

    pub fn is_loading(&self) -> bool {
        self.cloud_slot.state == SlotState::Loading
            || self.marker_slot.state == SlotState::Loading
            || self.deferred_markers.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn marker_scale(&self) -> f32 {
        self.marker_scale
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn point_count(&self) -> usize {
        self.cloud.map_or(0, |c| c.points)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ply_bytes, BackendEvent, RecordingBackend};
    use glam::Vec3;

    fn scene() -> SceneManager<RecordingBackend> {
        SceneManager::new(RecordingBackend::default(), SceneSettings::default())
    }

    // Fetches go to paths that do not exist; the tests never pump, so those
    // worker results are never consumed.
    const NOWHERE: &str = "/nonexistent/scan-viewer-test-asset";

    fn cloud_done(seq: u64, points: &[[f32; 3]]) -> Completion {
        Completion {
            slot: AssetSlot::PointCloud,
            seq,
            url: "cloud.ply".into(),
            result: Ok(Payload::Bytes(ply_bytes(points))),
        }
    }

    fn markers_done(seq: u64, text: &str) -> Completion {
        Completion {
            slot: AssetSlot::Markers,
            seq,
            url: "markers.csv".into(),
            result: Ok(Payload::Text(text.into())),
        }
    }

    #[test]
    fn cloud_install_fits_camera_and_releases_old_first() {
        let mut s = scene();
        let first = s.load_point_cloud(NOWHERE).unwrap();
        assert_eq!(s.phase(), ScenePhase::LoadingCloud);
        s.complete(cloud_done(first, &[[0.0; 3], [1.0, 1.0, 1.0]]));
        assert_eq!(s.phase(), ScenePhase::CloudReady);
        assert_eq!(s.point_count(), 2);
        assert_eq!(s.camera().target, Vec3::splat(0.5));

        let second = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(cloud_done(second, &[[0.0; 3], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]]));
        assert_eq!(s.point_count(), 3);

        let ev = &s.backend().events;
        let last_release = ev.iter().rposition(|e| *e == BackendEvent::ReleaseCloud).unwrap();
        let last_install = ev.iter().rposition(|e| *e == BackendEvent::InstallCloud(3)).unwrap();
        assert!(last_release < last_install);
        assert_eq!(s.backend().live_clouds, 1);
    }

    #[test]
    fn stale_completion_is_not_installed() {
        let mut s = scene();
        let old = s.load_point_cloud(NOWHERE).unwrap();
        let new = s.load_point_cloud(NOWHERE).unwrap();
        assert!(new > old);

        s.complete(cloud_done(new, &[[0.0; 3], [2.0, 2.0, 2.0]]));
        s.complete(cloud_done(old, &[[0.0; 3]]));

        assert_eq!(s.point_count(), 2);
        assert_eq!(s.cloud_state(), &SlotState::Ready);
        let installs = s
            .backend()
            .events
            .iter()
            .filter(|e| matches!(e, BackendEvent::InstallCloud(_)))
            .count();
        assert_eq!(installs, 1);
    }

    #[test]
    fn format_error_keeps_previous_cloud() {
        let mut s = scene();
        let seq = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(cloud_done(seq, &[[0.0; 3], [1.0, 0.0, 0.0]]));
        let camera = s.camera().clone();

        let seq = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(Completion {
            slot: AssetSlot::PointCloud,
            seq,
            url: "broken.ply".into(),
            result: Ok(Payload::Bytes(b"garbage".to_vec())),
        });

        assert!(matches!(s.cloud_state(), SlotState::Error(_)));
        assert_eq!(s.phase(), ScenePhase::Error);
        assert_eq!(s.point_count(), 2);
        assert_eq!(s.camera(), &camera);
        assert_eq!(s.backend().live_clouds, 1);
    }

    #[test]
    fn fetch_failure_is_isolated_to_its_slot() {
        let mut s = scene();
        let m = s.load_markers(NOWHERE).unwrap();
        s.complete(markers_done(m, "1,2,3\n4,5,6"));

        let c = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(Completion {
            slot: AssetSlot::PointCloud,
            seq: c,
            url: "http://example.invalid/scan.ply".into(),
            result: Err(LoadError::fetch("http://example.invalid/scan.ply", "HTTP 404")),
        });

        assert!(matches!(s.cloud_state(), SlotState::Error(r) if r.contains("404")));
        assert_eq!(s.marker_state(), &SlotState::Ready);
        assert_eq!(s.markers().len(), 2);
    }

    #[test]
    fn markers_rebuild_then_rescale_in_place() {
        let mut s = scene();
        let m = s.load_markers(NOWHERE).unwrap();
        s.complete(markers_done(m, "x,y,z\n0,0,0\n40,0,0\n0,40,0"));

        assert_eq!(s.backend().marker_instances, 3);
        assert_eq!(s.backend().glow_instances, 3);
        // No cloud: own diagonal 40√2 / 40 = √2, times the default 0.5.
        let r = s.markers().radius();
        assert!((r - 2f32.sqrt() * 0.5).abs() < 1e-5);

        s.set_scale(2.0);
        assert!((s.markers().radius() - 2f32.sqrt() * 2.0).abs() < 1e-5);
        assert_eq!(s.backend().events.last(), Some(&BackendEvent::RescaleMarkers(3)));
        assert_eq!(s.backend().marker_allocations, 1);
    }

    #[test]
    fn invalid_scale_is_ignored() {
        let mut s = scene();
        for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            s.set_scale(bad);
        }
        assert_eq!(s.marker_scale(), DEFAULT_MARKER_SCALE);
    }

    #[test]
    fn new_cloud_rescales_existing_markers() {
        let mut s = scene();
        let m = s.load_markers(NOWHERE).unwrap();
        s.complete(markers_done(m, "[[1,1,1],[2,2,2]]"));
        let before: Vec<Vec3> = s.markers().instances().iter().map(|i| i.translation()).collect();

        let c = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(cloud_done(c, &[[0.0; 3], [120.0, 0.0, 0.0]]));

        // Identity world transform: reference diagonal is 120.
        assert!((s.markers().radius() - 1.0 * DEFAULT_MARKER_SCALE).abs() < 1e-4);
        let after: Vec<Vec3> = s.markers().instances().iter().map(|i| i.translation()).collect();
        assert_eq!(before, after);
        assert_eq!(s.backend().marker_allocations, 1);
    }

    #[test]
    fn empty_marker_asset_releases_prior_markers() {
        let mut s = scene();
        let m = s.load_markers(NOWHERE).unwrap();
        s.complete(markers_done(m, "1 2 3"));
        assert_eq!(s.backend().marker_instances, 1);

        let m = s.load_markers(NOWHERE).unwrap();
        s.complete(markers_done(m, ""));
        assert_eq!(s.backend().marker_instances, 0);
        assert_eq!(s.backend().glow_instances, 0);
        assert!(s.markers().is_empty());
        assert_eq!(s.marker_state(), &SlotState::Ready);
    }

    #[test]
    fn world_transform_drives_fitting_bounds() {
        let settings = SceneSettings {
            world: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            ..SceneSettings::default()
        };
        let mut s = SceneManager::new(RecordingBackend::default(), settings);
        let c = s.load_point_cloud(NOWHERE).unwrap();
        s.complete(cloud_done(c, &[[0.0; 3], [2.0, 2.0, 2.0]]));
        assert_eq!(s.camera().target, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn disposed_scene_ignores_late_completions() {
        let mut s = scene();
        let c = s.load_point_cloud(NOWHERE).unwrap();
        s.dispose();
        s.complete(cloud_done(c, &[[0.0; 3]]));

        assert_eq!(s.phase(), ScenePhase::Disposed);
        assert_eq!(s.point_count(), 0);
        assert!(s.stop_flag().is_stopped());
        assert!(s.backend().released_all);
        assert!(!s
            .backend()
            .events
            .iter()
            .any(|e| matches!(e, BackendEvent::InstallCloud(_))));
        assert!(s.load_markers(NOWHERE).is_none());
    }

    #[test]
    fn disposed_scene_no_longer_touches_the_surface() {
        let mut s = scene();
        s.dispose();
        s.dispose();
        s.resize(800, 600);

        let ev = &s.backend().events;
        assert_eq!(ev.iter().filter(|e| **e == BackendEvent::ReleaseAll).count(), 1);
        assert_eq!(ev.last(), Some(&BackendEvent::ReleaseAll));
    }

    #[test]
    fn scene_load_defers_markers_until_cloud_settles() {
        let mut s = scene();
        s.load_scene(Some(NOWHERE), Some(NOWHERE));
        assert_eq!(s.phase(), ScenePhase::LoadingCloud);
        assert_eq!(s.marker_state(), &SlotState::Idle);
        assert!(s.is_loading());

        let cloud_seq = s.cloud_slot.latest.unwrap();
        s.complete(Completion {
            slot: AssetSlot::PointCloud,
            seq: cloud_seq,
            url: NOWHERE.into(),
            result: Err(LoadError::fetch(NOWHERE, "missing")),
        });
        assert_eq!(s.marker_state(), &SlotState::Loading);
        assert_eq!(s.phase(), ScenePhase::LoadingMarkers);

        let m = s.marker_slot.latest.unwrap();
        s.complete(markers_done(m, "1,2,3"));
        assert_eq!(s.phase(), ScenePhase::Error);
        assert_eq!(s.markers().len(), 1);
        assert!(!s.is_loading());
    }

    #[test]
    fn explicit_marker_load_replaces_deferred_one() {
        let mut s = scene();
        s.load_scene(Some(NOWHERE), Some(NOWHERE));
        let cloud_seq = s.cloud_slot.latest.unwrap();

        let explicit = s.load_markers(NOWHERE).unwrap();
        assert!(s.deferred_markers.is_none());

        s.complete(cloud_done(cloud_seq, &[[0.0; 3], [1.0, 1.0, 1.0]]));
        assert_eq!(s.marker_slot.latest, Some(explicit));

        s.complete(markers_done(explicit, "1,2,3\n4,5,6"));
        assert_eq!(s.markers().len(), 2);
        assert_eq!(s.phase(), ScenePhase::Ready);
    }

    #[test]
    fn pump_installs_local_assets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins.json");
        std::fs::write(&path, r#"{"points": [[0,0,0],[1,1,1]]}"#).unwrap();

        let mut s = scene();
        s.load_markers(path.to_str().unwrap());
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while s.marker_state() == &SlotState::Loading && std::time::Instant::now() < deadline {
            s.pump();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(s.marker_state(), &SlotState::Ready);
        assert_eq!(s.backend().marker_instances, 2);
    }
}
