use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPass,
    RenderPassDescriptor, ShaderSource, StencilState,
};

use crate::{
    material::{MaterialId, ShaderMaterial},
    model::MODEL_VERTEX_LAYOUT,
    rendering::{
        instance::Instance,
        passes::pass::{Pass, PassCreationContext},
        shader_loader::{PipelineCache, PipelineCacheBuilder, PipelineId, ShaderDefinition},
        texture::DepthTexture,
    },
};

/// Clears the frame and draws every mesh with its shader material.
pub struct MeshPass {
    pipelines: Vec<(MaterialId, PipelineId)>,
    camera_bind_group: wgpu::BindGroup,
    global_bind_group: wgpu::BindGroup,
}

pub struct MeshPassTextureViews {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

impl Pass for MeshPass {
    type TextureViews = MeshPassTextureViews;

    fn create(
        context: &PassCreationContext,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let device = context.device;
        let global_uniform = &context.common.global_uniform;

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: context.common.camera_uniform_buffer.as_entire_binding(),
            }],
        });

        let pipelines = context
            .materials
            .iter()
            .map(|(material_id, material)| {
                let render_pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(&format!("{} pipeline layout", material.name)),
                        bind_group_layouts: &[
                            &camera_bind_group_layout,
                            &global_uniform.bind_group_layout,
                        ],
                        push_constant_ranges: &[],
                    });

                let common = context.common.clone();
                let material = material.clone();
                let shader_def = material.shader;

                let pipeline_id = cache_builder.add_shader(
                    shader_def,
                    Box::new(
                        move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                            Ok(create_material_pipeline(
                                device,
                                &render_pipeline_layout,
                                common.output_format(),
                                &material,
                                shader_def,
                                source,
                            ))
                        },
                    ),
                );

                (material_id, pipeline_id)
            })
            .collect();

        Ok(MeshPass {
            pipelines,
            camera_bind_group,
            global_bind_group: global_uniform.bind_group.clone(),
        })
    }

    fn render<F>(
        &self,
        texture_views: &Self::TextureViews,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        mut draw: F,
    ) where
        F: FnMut(&mut RenderPass<'_>, MaterialId),
    {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture_views.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &texture_views.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.global_bind_group, &[]);

        for &(material_id, pipeline_id) in &self.pipelines {
            let Some(pipeline) = pipeline_cache.get(pipeline_id) else {
                continue;
            };

            render_pass.set_pipeline(pipeline);
            draw(&mut render_pass, material_id);
        }
    }
}

fn create_material_pipeline(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    material: &ShaderMaterial,
    shader_def: &ShaderDefinition,
    source: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(shader_def.name),
        source: ShaderSource::Wgsl(source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} render pipeline", material.name)),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[MODEL_VERTEX_LAYOUT, Instance::descriptor()],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: material.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthTexture::DEPTH_FORMAT,
            depth_write_enabled: material.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
