use imgui::{Condition, SliderFlags};

use crate::viewer::{LoadStatus, ViewerState};

pub struct DebugGui {
    pub visible: bool,
}

impl DebugGui {
    pub fn new(visible: bool) -> Self {
        Self { visible }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn draw(&mut self, ui: &imgui::Ui, state: &mut ViewerState, uploaded_models: usize) {
        if !self.visible {
            return;
        }

        ui.window("Viewer")
            .position([10.0, 10.0], Condition::FirstUseEver)
            .size([320.0, 300.0], Condition::FirstUseEver)
            .build(|| {
                let framerate = ui.io().framerate;
                ui.text(format!("{:.1} fps ({:.2} ms)", framerate, 1000.0 / framerate.max(1.0)));

                ui.separator();
                match &state.load_status {
                    LoadStatus::Loading => ui.text(format!(
                        "Loading {}...",
                        state.config.model_path.display()
                    )),
                    LoadStatus::Loaded { meshes } => {
                        let vertices: usize = state
                            .scene
                            .models
                            .iter()
                            .map(|(_, scene_model)| scene_model.model.vertex_count())
                            .sum();
                        ui.text(format!(
                            "{} meshes, {} models on GPU",
                            meshes, uploaded_models
                        ));
                        ui.text(format!("{} vertices", vertices));
                    }
                    LoadStatus::Failed(error) => ui.text_wrapped(format!("Load failed: {}", error)),
                }

                let mut scale = state.config.model_scale;
                if ui
                    .slider_config("Model scale", 0.1, 50.0)
                    .flags(SliderFlags::ALWAYS_CLAMP)
                    .build(&mut scale)
                {
                    state.set_model_scale(scale);
                }

                ui.separator();
                let eye = state.camera.eye;
                ui.text(format!("Camera {:.2} {:.2} {:.2}", eye.x, eye.y, eye.z));
                ui.text(format!(
                    "Distance {:.2} (aspect {:.3})",
                    state.camera.distance_to_target(),
                    state.camera.aspect
                ));
                ui.checkbox("Damping", &mut state.controls.enable_damping);
                if ui.button("Reset camera") {
                    state.reset_camera();
                }

                ui.separator();
                ui.slider_config("Ambient", 0.0, 4.0)
                    .flags(SliderFlags::ALWAYS_CLAMP)
                    .build(&mut state.lights.ambient.intensity);
                ui.slider_config("Point light", 0.0, 4.0)
                    .flags(SliderFlags::ALWAYS_CLAMP)
                    .build(&mut state.lights.point.intensity);
            });
    }
}
