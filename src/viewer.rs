use std::time::Instant;

use anyhow::Context;
use glam::Vec3;
use id_arena::Arena;

use crate::{
    asset_loader::{AssetPoll, GltfAsset, PendingAsset},
    camera::Camera,
    config::ViewerConfig,
    controls::OrbitControls,
    lights::Lights,
    material::{MaterialId, ShaderMaterial},
    scene_graph::{object3d::ObjectId, scene::Scene},
    viewport::Viewport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Loaded { meshes: usize },
    Failed(String),
}

pub struct ViewerState {
    pub config: ViewerConfig,
    pub scene: Scene,
    pub materials: Arena<ShaderMaterial>,
    pub shader_material: MaterialId,
    pub lights: Lights,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub start_time: Instant,
    pub model_root: Option<ObjectId>,
    pub load_status: LoadStatus,
    pending_asset: Option<PendingAsset>,
}

impl ViewerState {
    pub fn new(config: ViewerConfig) -> anyhow::Result<Self> {
        let pending_asset = PendingAsset::spawn(&config.model_path)
            .context("Failed to start loading the model")?;

        Ok(Self::with_pending_asset(config, Some(pending_asset)))
    }

    fn with_pending_asset(config: ViewerConfig, pending_asset: Option<PendingAsset>) -> Self {
        let scene = Scene::new();

        let mut materials = Arena::new();
        let shader_material = materials.alloc(ShaderMaterial::default_shader());

        let lights = config.lights.clone();

        // The real aspect ratio arrives with the first resize.
        let mut camera = Camera::from_config(&config.camera, 1.0);
        let mut controls = OrbitControls::new(&config.controls);
        controls.update(&mut camera);

        let load_status = match pending_asset {
            Some(_) => LoadStatus::Loading,
            None => LoadStatus::Failed("No model requested".to_string()),
        };

        Self {
            config,
            scene,
            materials,
            shader_material,
            lights,
            camera,
            controls,
            start_time: Instant::now(),
            model_root: None,
            load_status,
            pending_asset,
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    /// Checks the background load. Returns true when a model was added to the scene this call.
    pub fn poll_asset(&mut self) -> bool {
        let Some(pending) = &self.pending_asset else {
            return false;
        };

        let result = match pending.poll() {
            AssetPoll::Pending => return false,
            AssetPoll::Ready(asset) => self.on_asset_loaded(asset),
            AssetPoll::Failed(error) => Err(error),
        };
        self.pending_asset = None;

        match result {
            Ok(meshes) => {
                self.load_status = LoadStatus::Loaded { meshes };
                true
            }
            Err(error) => {
                log::error!("Failed to load model: {:#}", error);
                self.load_status = LoadStatus::Failed(format!("{:#}", error));
                false
            }
        }
    }

    /// Scales the asset, inserts it into the scene and switches every mesh to the shader
    /// material. Returns the number of meshes.
    pub fn on_asset_loaded(&mut self, asset: GltfAsset) -> anyhow::Result<usize> {
        let gltf_scene = asset.scene()?;
        let root = self
            .scene
            .spawn_gltf_scene(&asset.buffers, &gltf_scene)
            .with_context(|| format!("Failed to build scene from {}", asset.path.display()))?;

        self.scene
            .set_object_scale(root, Vec3::splat(self.config.model_scale));
        let meshes = self.scene.set_mesh_material(root, self.shader_material);
        self.model_root = Some(root);

        log::info!(
            "Loaded {} with {} meshes ({} unique models)",
            asset.path.display(),
            meshes,
            self.scene.models.len()
        );

        for (_, scene_model) in self.scene.models.iter() {
            if let Some(bounds) = scene_model.model.bounds() {
                log::debug!("{}: size {}", scene_model.name(), bounds.size());
            }
        }

        Ok(meshes)
    }

    /// Non-positive or non-finite scales are ignored.
    pub fn set_model_scale(&mut self, scale: f32) {
        if !scale.is_finite() || scale <= 0.0 {
            log::warn!("Ignoring invalid model scale {}", scale);
            return;
        }

        self.config.model_scale = scale;
        if let Some(root) = self.model_root {
            self.scene.set_object_scale(root, Vec3::splat(scale));
        }
    }

    pub fn resize(&mut self, viewport: &Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.camera.set_aspect(viewport.aspect());
    }

    pub fn reset_camera(&mut self) {
        let aspect = self.camera.aspect;
        self.camera = Camera::from_config(&self.config.camera, aspect);
        self.controls = OrbitControls::new(&self.config.controls);
        self.controls.update(&mut self.camera);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use winit::dpi::PhysicalSize;

    use super::*;
    use crate::model::tests::{gltf_fixture, test_asset_path, POINTS_MESH, TRIANGLE_MESH};

    pub(crate) fn loaded_state() -> ViewerState {
        let mut state = ViewerState::with_pending_asset(ViewerConfig::default(), None);
        let asset = GltfAsset::import(&test_asset_path()).unwrap();
        state.on_asset_loaded(asset).unwrap();
        state
    }

    pub(crate) fn loading_state() -> ViewerState {
        let config = ViewerConfig {
            model_path: test_asset_path(),
            ..Default::default()
        };
        ViewerState::new(config).unwrap()
    }

    #[test]
    fn loaded_model_is_scaled_and_uses_shader_material() {
        let state = loaded_state();
        let root = state.model_root.unwrap();

        let scale = state.scene.get_object(root).unwrap().transform.scale();
        assert_eq!(scale, Vec3::splat(10.0));

        let mut meshes = 0;
        state.scene.traverse(root, |_, object| {
            if object.model_id.is_some() {
                meshes += 1;
                assert_eq!(object.material_id, Some(state.shader_material));
            }
        });
        assert_eq!(meshes, 3);
    }

    #[test]
    fn background_load_completes_through_poll() {
        let mut state = loading_state();
        assert_eq!(state.load_status, LoadStatus::Loading);

        let deadline = Instant::now() + std::time::Duration::from_secs(10);
        while !state.poll_asset() {
            assert_eq!(state.load_status, LoadStatus::Loading);
            assert!(Instant::now() < deadline, "model did not load in time");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert_eq!(state.load_status, LoadStatus::Loaded { meshes: 3 });
        assert!(state.model_root.is_some());
        assert!(!state.poll_asset());
    }

    #[test]
    fn failed_load_keeps_the_scene_empty() {
        let config = ViewerConfig {
            model_path: "missing/scene.gltf".into(),
            ..Default::default()
        };
        let mut state = ViewerState::new(config).unwrap();

        let deadline = Instant::now() + std::time::Duration::from_secs(10);
        while state.load_status == LoadStatus::Loading {
            assert!(!state.poll_asset());
            assert!(Instant::now() < deadline);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert!(matches!(state.load_status, LoadStatus::Failed(_)));
        assert!(state.model_root.is_none());
        assert_eq!(state.scene.objects.len(), 0);
    }

    #[test]
    fn unsupported_mesh_fails_the_load_without_partial_scene() {
        let mut state = ViewerState::with_pending_asset(ViewerConfig::default(), None);
        let (document, buffers) = gltf_fixture(&[TRIANGLE_MESH, POINTS_MESH]);
        let asset = GltfAsset {
            path: "fixture.gltf".into(),
            document,
            buffers,
        };

        assert!(state.on_asset_loaded(asset).is_err());
        assert!(state.model_root.is_none());
        assert_eq!(state.scene.objects.len(), 0);
        assert_eq!(state.scene.models.len(), 0);
    }

    #[test]
    fn resize_updates_camera_aspect() {
        let mut state = ViewerState::with_pending_asset(ViewerConfig::default(), None);

        let viewport = Viewport::from_window(PhysicalSize::new(1600, 900), 1.0, 2.0);
        state.resize(&viewport);
        assert!((state.camera.aspect - 16.0 / 9.0).abs() < 1e-6);

        state.resize(&Viewport::from_window(PhysicalSize::new(0, 0), 1.0, 2.0));
        assert!((state.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn camera_starts_at_configured_position_facing_target() {
        let state = ViewerState::with_pending_asset(ViewerConfig::default(), None);

        assert!(state.camera.eye.abs_diff_eq(Vec3::new(2.5, 1.5, 3.0), 1e-5));
        assert_eq!(state.camera.target, Vec3::new(0.0, 0.5, -0.2));
    }

    #[test]
    fn scale_can_be_changed_after_load() {
        let mut state = loaded_state();
        state.set_model_scale(2.0);

        let root = state.model_root.unwrap();
        let scale = state.scene.get_object(root).unwrap().transform.scale();
        assert_eq!(scale, Vec3::splat(2.0));
    }

    #[test]
    fn invalid_scale_is_ignored() {
        let mut state = loaded_state();
        let root = state.model_root.unwrap();

        for scale in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            state.set_model_scale(scale);
        }

        assert_eq!(state.config.model_scale, 10.0);
        let scale = state.scene.get_object(root).unwrap().transform.scale();
        assert_eq!(scale, Vec3::splat(10.0));
    }
}
