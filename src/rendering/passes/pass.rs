use std::sync::Arc;

use id_arena::Arena;
use wgpu::RenderPass;

use crate::{
    material::{MaterialId, ShaderMaterial},
    rendering::{
        render_common::RenderCommon,
        shader_loader::{PipelineCache, PipelineCacheBuilder},
    },
};

pub struct PassCreationContext<'a> {
    pub device: &'a wgpu::Device,
    pub common: Arc<RenderCommon>,
    pub materials: &'a Arena<ShaderMaterial>,
}

pub trait Pass {
    type TextureViews;

    fn create(
        context: &PassCreationContext,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Calls `draw` once per material after binding that material's pipeline.
    fn render<F>(
        &self,
        texture_views: &Self::TextureViews,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        draw: F,
    ) where
        F: FnMut(&mut RenderPass<'_>, MaterialId);
}
