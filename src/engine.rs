use crate::{scene_graph::scene::Scene, viewer::ViewerState};

/// The GPU side of a frame, implemented by the renderer.
pub trait FrameTarget {
    /// Uploads every scene model that has no GPU buffers yet.
    fn upload_models(&mut self, scene: &mut Scene) -> anyhow::Result<()>;

    fn render(
        &mut self,
        state: &ViewerState,
        overlay: Option<&imgui::DrawData>,
    ) -> Result<(), wgpu::SurfaceError>;
}

/// Advances the viewer by one frame and renders it once.
pub fn tick<T: FrameTarget>(
    state: &mut ViewerState,
    target: &mut T,
    overlay: Option<&imgui::DrawData>,
) -> Result<(), wgpu::SurfaceError> {
    if state.poll_asset() {
        if let Err(error) = target.upload_models(&mut state.scene) {
            log::error!("Failed to upload model: {:#}", error);
        }
    }

    state.controls.update(&mut state.camera);
    state.scene.update();

    target.render(state, overlay)
}
