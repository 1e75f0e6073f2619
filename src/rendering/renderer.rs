use std::sync::{Arc, RwLock};

use anyhow::Context;
use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    engine::FrameTarget,
    lights::LightsUniform,
    rendering::{
        global_uniform::{GlobalUniform, GlobalUniformState},
        imgui_renderer::ImguiRendererState,
        instance::gather_instances,
        passes::{
            mesh_pass::{MeshPass, MeshPassTextureViews},
            pass::{Pass, PassCreationContext},
        },
        render_camera::RenderCamera,
        render_common::RenderCommon,
        render_model::RenderModel,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
    scene_graph::scene::Scene,
    viewer::ViewerState,
    viewport::Viewport,
};

pub struct Renderer {
    pub window: Arc<Window>,
    pub viewport: Viewport,
    /// Drawing buffer size in physical pixels.
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: Arc<RenderCommon>,
    depth_texture: DepthTexture,
    render_models: Arena<RenderModel>,

    camera: RenderCamera,

    shader_loader: ShaderLoader,

    mesh_pass: MeshPass,
    imgui_renderer: ImguiRendererState,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        state: &ViewerState,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let viewport = Viewport::from_window(
            window.inner_size(),
            window.scale_factor(),
            state.config.max_pixel_ratio,
        );
        let size = viewport.drawing_buffer_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using adapter {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let output_surface_config = RenderCommon::surface_config(&adapter, &surface, size)?;
        surface.configure(&device, &output_surface_config);

        let camera = RenderCamera::new(&device, &state.camera);

        let global_uniform = GlobalUniform::new(
            &device,
            GlobalUniformState::new(size, 0.0, viewport.pixel_ratio as f32),
            LightsUniform::new(&state.lights),
        );

        let imgui_renderer =
            ImguiRendererState::new(&device, &queue, output_surface_config.format, imgui_context);

        let common = Arc::new(RenderCommon {
            output_surface_config: RwLock::new(output_surface_config),
            camera_uniform_buffer: camera.uniform_buffer.clone(),
            global_uniform,
        });

        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");

        let mut cache_builder = PipelineCacheBuilder::new();

        let mesh_pass = MeshPass::create(
            &PassCreationContext {
                device: &device,
                common: common.clone(),
                materials: &state.materials,
            },
            &mut cache_builder,
        )?;

        let shader_loader =
            ShaderLoader::new(device.clone(), cache_builder, state.config.watch_shaders)?;

        Ok(Self {
            window,
            viewport,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            render_models: Arena::new(),
            camera,
            shader_loader,
            mesh_pass,
            imgui_renderer,
        })
    }

    /// Resizes the drawing buffer. Empty viewports (minimised window) are ignored.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }

        self.viewport = viewport;
        self.size = viewport.drawing_buffer_size();
        self.configure_surface();
        self.depth_texture.resize(&self.device, self.size);

        log::debug!(
            "Resized to {}x{} (pixel ratio {})",
            self.size.width,
            self.size.height,
            viewport.pixel_ratio
        );
    }

    /// Reconfigures the surface at the current size, e.g. after it was lost.
    pub fn configure_surface(&mut self) {
        let mut config = match self.common.output_surface_config.write() {
            Ok(config) => config,
            Err(poisoned) => poisoned.into_inner(),
        };

        config.width = self.size.width;
        config.height = self.size.height;
        self.surface.configure(&self.device, &config);
    }

    pub fn model_count(&self) -> usize {
        self.render_models.len()
    }
}

impl FrameTarget for Renderer {
    fn upload_models(&mut self, scene: &mut Scene) -> anyhow::Result<()> {
        for (_id, scene_model) in scene.models.iter_mut() {
            if scene_model.render_model.is_some() {
                continue;
            }

            let render_model = RenderModel::from_model(&self.device, &scene_model.model);
            scene_model.render_model = Some(self.render_models.alloc(render_model));

            log::info!(
                "Uploaded model {} with {} primitives",
                scene_model.name(),
                scene_model.model.primitives.len()
            );
        }

        Ok(())
    }

    fn render(
        &mut self,
        state: &ViewerState,
        overlay: Option<&imgui::DrawData>,
    ) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        self.camera.update(&self.queue, &state.camera);
        self.common.global_uniform.update(
            &self.queue,
            GlobalUniformState::new(
                self.size,
                state.elapsed_seconds(),
                self.viewport.pixel_ratio as f32,
            ),
            LightsUniform::new(&state.lights),
        );

        gather_instances(&self.device, &self.queue, &state.scene, &mut self.render_models);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let render_models = &self.render_models;
        self.mesh_pass.render(
            &MeshPassTextureViews {
                color: view.clone(),
                depth: self.depth_texture.view().clone(),
            },
            &mut encoder,
            &self.shader_loader.cache,
            |render_pass, material| {
                for (_id, render_model) in render_models.iter() {
                    if render_model.uses_material(material) {
                        render_model.draw(render_pass, material);
                    }
                }
            },
        );

        if let Some(draw_data) = overlay {
            if let Err(error) = self.imgui_renderer.render(
                &view,
                draw_data,
                &self.device,
                &self.queue,
                &mut encoder,
            ) {
                log::error!("{:#}", error);
            }
        }

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();

        Ok(())
    }
}
