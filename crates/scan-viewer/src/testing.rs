//! Test doubles shared by the scene and render-loop tests.

use crate::data::{GlowInstance, MarkerInstance, PointCloud};
use crate::scene::RenderBackend;
use plyfmt::{write_binary, PlyCloud};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    InstallCloud(usize),
    ReleaseCloud,
    RebuildMarkers(usize),
    RescaleMarkers(usize),
    ReleaseMarkers,
    Resize(u32, u32),
    ReleaseAll,
}

/// Backend that records calls and tracks what would be alive on the GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<BackendEvent>,
    pub live_clouds: usize,
    pub marker_instances: usize,
    pub glow_instances: usize,
    pub marker_allocations: usize,
    pub size: (u32, u32),
    pub released_all: bool,
}

impl RenderBackend for RecordingBackend {
    fn install_point_cloud(&mut self, cloud: &PointCloud) {
        assert_eq!(self.live_clouds, 0, "previous cloud still alive");
        self.live_clouds = 1;
        self.events.push(BackendEvent::InstallCloud(cloud.len()));
    }

    fn release_point_cloud(&mut self) {
        self.live_clouds = 0;
        self.events.push(BackendEvent::ReleaseCloud);
    }

    fn rebuild_markers(&mut self, instances: &[MarkerInstance], glows: &[GlowInstance]) {
        assert_eq!(self.marker_instances, 0, "previous markers still alive");
        self.marker_instances = instances.len();
        self.glow_instances = glows.len();
        self.marker_allocations += 1;
        self.events.push(BackendEvent::RebuildMarkers(instances.len()));
    }

    fn rescale_markers(&mut self, instances: &[MarkerInstance]) {
        assert_eq!(self.marker_instances, instances.len());
        self.events.push(BackendEvent::RescaleMarkers(instances.len()));
    }

    fn release_markers(&mut self) {
        self.marker_instances = 0;
        self.glow_instances = 0;
        self.events.push(BackendEvent::ReleaseMarkers);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.events.push(BackendEvent::Resize(width, height));
    }

    fn release_all(&mut self) {
        self.release_point_cloud();
        self.release_markers();
        self.released_all = true;
        self.events.push(BackendEvent::ReleaseAll);
    }
}

/// Binary PLY holding `points` and nothing else.
pub fn ply_bytes(points: &[[f32; 3]]) -> Vec<u8> {
    let cloud = PlyCloud {
        positions: points.to_vec(),
        ..PlyCloud::default()
    };
    let mut out = Vec::new();
    write_binary(&mut out, &cloud).expect("in-memory PLY write");
    out
}
