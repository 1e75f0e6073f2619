use std::{collections::HashMap, ops::Range};

use glam::Mat4;
use id_arena::Arena;
use itertools::Itertools;
use wgpu::BufferUsages;

use crate::{
    material::MaterialId,
    rendering::render_model::{RenderModel, RenderModelId},
    scene_graph::scene::Scene,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Instance {
    pub model: Mat4,
}

impl Instance {
    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![5 => Float32x4, 6 => Float32x4, 7 => Float32x4, 8 => Float32x4];

        wgpu::VertexBufferLayout {
            array_stride: size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Instances of one model drawn with one material.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceBatch {
    pub material: MaterialId,
    pub range: Range<u32>,
}

/// Orders instances by material so each material's instances are contiguous.
pub fn batch_instances(
    mut instances: Vec<(MaterialId, Instance)>,
) -> (Vec<Instance>, Vec<InstanceBatch>) {
    instances.sort_by_key(|(material, _)| *material);

    let mut batches = Vec::new();
    let mut start = 0u32;
    for (material, group) in &instances.iter().chunk_by(|(material, _)| *material) {
        let end = start + group.count() as u32;
        batches.push(InstanceBatch {
            material,
            range: start..end,
        });
        start = end;
    }

    let instances = instances.into_iter().map(|(_, instance)| instance).collect();
    (instances, batches)
}

/// Collects world matrices of every renderable object into its model's instance buffer.
pub fn gather_instances(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    scene: &Scene,
    render_models: &mut Arena<RenderModel>,
) {
    let mut per_model: HashMap<RenderModelId, Vec<(MaterialId, Instance)>> = HashMap::new();

    for (object, model_id, material) in scene.renderable_objects() {
        let Some(render_model) = scene.get_model(model_id).and_then(|m| m.render_model) else {
            continue;
        };

        per_model.entry(render_model).or_default().push((
            material,
            Instance {
                model: *object.transform.get_world_matrix(),
            },
        ));
    }

    for (id, render_model) in render_models.iter_mut() {
        let instances = per_model.remove(&id).unwrap_or_default();
        render_model.set_instances(device, queue, instances);
    }
}

pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: String,
}

impl InstanceBuffer {
    const INITIAL_CAPACITY: u64 = 16;

    pub fn new(device: &wgpu::Device, name: &str) -> Self {
        let label = format!("Instance buffer ({})", name);
        let buffer = Self::create_buffer(device, &label, Self::INITIAL_CAPACITY);

        Self {
            buffer,
            capacity: Self::INITIAL_CAPACITY,
            label,
        }
    }

    fn create_buffer(device: &wgpu::Device, label: &str, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size_of::<Instance>() as u64 * capacity,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Grows the buffer as needed, the contents are not preserved.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[Instance]) {
        let needed = instances.len() as u64;
        if needed > self.capacity {
            let capacity = needed.next_power_of_two();
            log::debug!("Growing {} to {} instances", self.label, capacity);
            self.buffer = Self::create_buffer(device, &self.label, capacity);
            self.capacity = capacity;
        }

        if !instances.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(instances));
        }
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::material::ShaderMaterial;

    fn at(x: f32) -> Instance {
        Instance {
            model: Mat4::from_translation(Vec3::X * x),
        }
    }

    #[test]
    fn instances_are_grouped_by_material() {
        let mut materials: Arena<ShaderMaterial> = Arena::new();
        let a = materials.alloc(ShaderMaterial::default_shader());
        let b = materials.alloc(ShaderMaterial::default_shader());

        let (instances, batches) =
            batch_instances(vec![(b, at(1.0)), (a, at(2.0)), (b, at(3.0)), (a, at(4.0))]);

        assert_eq!(instances.len(), 4);
        assert_eq!(
            batches,
            vec![
                InstanceBatch { material: a, range: 0..2 },
                InstanceBatch { material: b, range: 2..4 },
            ]
        );
        assert_eq!(instances[0], at(2.0));
        assert_eq!(instances[3], at(3.0));
    }

    #[test]
    fn no_instances_no_batches() {
        let (instances, batches) = batch_instances(Vec::new());
        assert!(instances.is_empty());
        assert!(batches.is_empty());
    }
}
