//! egui overlay: marker scale slider, loading indicator, load errors and counts.

use crate::scene::SlotState;

pub const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.05..=3.0;

/// Snapshot of scene state the HUD displays.
pub struct HudState<'a> {
    pub cloud: &'a SlotState,
    pub markers: &'a SlotState,
    pub loading: bool,
    pub points: usize,
    pub marker_count: usize,
}

/// Draws the overlay. Returns the new scale if the slider moved.
pub fn draw_hud(ctx: &egui::Context, hud: &HudState<'_>, scale: f32) -> Option<f32> {
    let mut value = scale;
    let mut changed = false;

    egui::Window::new("Scan")
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            ui.label(format!("Points: {}", hud.points));
            ui.label(format!("Markers: {}", hud.marker_count));

            ui.separator();
            changed = ui
                .add(
                    egui::Slider::new(&mut value, SCALE_RANGE)
                        .text("Marker scale")
                        .clamp_to_range(true),
                )
                .changed();

            for (name, state) in [("Point cloud", hud.cloud), ("Markers", hud.markers)] {
                if let SlotState::Error(reason) = state {
                    ui.colored_label(egui::Color32::from_rgb(255, 90, 90), format!("{name}: {reason}"));
                }
            }
        });

    if hud.loading {
        egui::Area::new(egui::Id::new("loading"))
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .interactable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(egui::RichText::new("Loading…").size(18.0));
                });
            });
    }

    changed.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hud_runs_headless_without_changing_scale() {
        let ctx = egui::Context::default();
        let err = SlotState::Error("fetch of x failed: HTTP 500".into());
        let hud = HudState {
            cloud: &err,
            markers: &SlotState::Loading,
            loading: true,
            points: 12,
            marker_count: 0,
        };

        let mut result = Some(0.0);
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            result = draw_hud(ctx, &hud, 0.5);
        });
        assert_eq!(result, None);
    }
}
