use std::sync::RwLock;

use anyhow::Context;
use wgpu::SurfaceConfiguration;
use winit::dpi::PhysicalSize;

use crate::rendering::global_uniform::GlobalUniform;

/// State shared between the renderer and the pipeline factories.
pub struct RenderCommon {
    pub output_surface_config: RwLock<SurfaceConfiguration>,
    pub camera_uniform_buffer: wgpu::Buffer,
    pub global_uniform: GlobalUniform,
}

impl RenderCommon {
    pub fn surface_config(
        adapter: &wgpu::Adapter,
        surface: &wgpu::Surface,
        size: PhysicalSize<u32>,
    ) -> anyhow::Result<SurfaceConfiguration> {
        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;

        Ok(wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        })
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        match self.output_surface_config.read() {
            Ok(config) => config.format,
            Err(poisoned) => poisoned.into_inner().format,
        }
    }
}
