use crate::describe::{self, Description};

const PANEL_WIDTH: f32 = 320.0;
const PANEL_MARGIN: f32 = 16.0;

/// Overlay state: the loading indicator and the description panel.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    loading: bool,
    progress: f32,
    description: Description,
    description_visible: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            loading: true,
            progress: 0.0,
            description: describe::DEFAULT,
            description_visible: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn set_progress(&mut self, fraction: f32) {
        self.progress = fraction.clamp(0.0, 1.0);
    }

    /// Hides the loading indicator for good.
    pub fn finish_loading(&mut self) {
        self.loading = false;
        self.progress = 1.0;
    }

    pub fn description(&self) -> Description {
        self.description
    }

    pub fn is_description_visible(&self) -> bool {
        self.description_visible
    }

    /// Shows the entry for `name`; `None` shows the default entry.
    pub fn show_description(&mut self, name: Option<&str>) {
        self.description = describe::lookup(name);
        self.description_visible = true;
    }

    pub fn draw(&self, ctx: &egui::Context) {
        if self.loading {
            egui::Area::new(egui::Id::new("loading_overlay"))
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_width(240.0);
                        ui.label("Loading model...");
                        ui.add(
                            egui::ProgressBar::new(self.progress)
                                .show_percentage()
                                .animate(self.progress < 1.0),
                        );
                    });
                });
            ctx.request_repaint();
        }

        if self.description_visible {
            egui::Area::new(egui::Id::new("description_panel"))
                .anchor(
                    egui::Align2::RIGHT_TOP,
                    egui::vec2(-PANEL_MARGIN, PANEL_MARGIN),
                )
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style())
                        .fill(egui::Color32::from_rgba_unmultiplied(20, 20, 20, 220))
                        .show(ui, |ui| {
                            ui.set_max_width(PANEL_WIDTH);
                            ui.heading(self.description.title);
                            ui.add_space(6.0);
                            ui.label(self.description.body);
                        });
                });
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
