//! Per-frame driver with explicit cancellation.

use crate::scene::{RenderBackend, SceneManager};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Shared cancellation flag, checked once per frame.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct RenderLoop {
    stop: StopFlag,
    last_frame: Option<Instant>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(stop: StopFlag) -> Self {
        Self {
            stop,
            last_frame: None,
            frames: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_stopped()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One iteration: install finished loads, integrate camera damping, then
    /// hand the scene to `draw` together with the time since the last frame.
    /// Returns `None` without touching the scene once the loop is stopped.
    pub fn frame<B, R>(
        &mut self,
        scene: &mut SceneManager<B>,
        draw: impl FnOnce(&mut SceneManager<B>, Duration) -> R,
    ) -> Option<R>
    where
        B: RenderBackend,
    {
        if self.stop.is_stopped() {
            return None;
        }

        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(Duration::ZERO, |t| now.duration_since(t));
        self.last_frame = Some(now);

        scene.pump();
        scene.update_controls();

        self.frames += 1;
        Some(draw(scene, dt))
    }

    /// Matches camera aspect and render targets to the new surface size.
    pub fn resize<B: RenderBackend>(&self, scene: &mut SceneManager<B>, width: u32, height: u32) {
        if self.stop.is_stopped() || width == 0 || height == 0 {
            return;
        }
        scene.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneSettings;
    use crate::testing::RecordingBackend;

    #[test]
    fn frames_run_until_scene_is_disposed() {
        let mut scene = SceneManager::new(RecordingBackend::default(), SceneSettings::default());
        let mut rl = RenderLoop::new(scene.stop_flag());

        assert_eq!(rl.frame(&mut scene, |_, dt| dt), Some(Duration::ZERO));
        assert!(rl.frame(&mut scene, |_, _| ()).is_some());
        assert_eq!(rl.frames(), 2);

        scene.dispose();
        assert!(!rl.is_running());

        let mut drawn = false;
        assert!(rl.frame(&mut scene, |_, _| drawn = true).is_none());
        assert!(!drawn);
        assert_eq!(rl.frames(), 2);
    }

    #[test]
    fn resize_updates_aspect_and_targets() {
        let mut scene = SceneManager::new(RecordingBackend::default(), SceneSettings::default());
        let rl = RenderLoop::new(scene.stop_flag());

        rl.resize(&mut scene, 800, 400);
        assert!((scene.camera().aspect - 2.0).abs() < 1e-6);
        assert_eq!(scene.backend().size, (800, 400));

        rl.resize(&mut scene, 0, 400);
        assert_eq!(scene.backend().size, (800, 400));
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let rl = RenderLoop::new(flag.clone());
        assert!(rl.is_running());
        flag.stop();
        assert!(!rl.is_running());
    }
}
