use std::mem::offset_of;

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use gltf::buffer;
use itertools::izip;

use crate::math::bounds::Aabb;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ModelPrimitive {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|vertex| vertex.position))
    }

    /// Moves the vertices so that the bounding box is centered on the origin.
    /// Returns the applied offset.
    pub fn center(&mut self) -> Vec3 {
        let Some(bounds) = self.bounds() else {
            return Vec3::ZERO;
        };

        let offset = -bounds.center();
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }

        offset
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> anyhow::Result<Model> {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of {}: unsupported mode {:?}",
                    primitive.index(),
                    model.name,
                    primitive.mode()
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions = reader
                .read_positions()
                .with_context(|| {
                    format!(
                        "Primitive {} of {} has no positions",
                        primitive.index(),
                        model.name
                    )
                })?
                .map(Vec3::from)
                .collect::<Vec<_>>();
            let vertex_count = positions.len();

            let normals = match reader.read_normals() {
                Some(normals) => normals.map(Vec3::from).collect(),
                None => {
                    log::debug!("{} primitive {} has no normals", model.name, primitive.index());
                    vec![Vec3::ZERO; vertex_count]
                }
            };

            let tex_coords = match reader.read_tex_coords(0) {
                Some(tex_coords) => tex_coords.into_f32().map(Vec2::from).collect(),
                None => vec![Vec2::ZERO; vertex_count],
            };

            let vertices = izip!(positions, normals, tex_coords)
                .map(|(position, normal, tex_coords)| Vertex {
                    position,
                    normal,
                    tex_coords,
                })
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..vertex_count as u32).collect(),
            };

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            return Err(anyhow::anyhow!("Mesh without primitives: {}", model.name));
        }

        Ok(model)
    }

    /// Centers the geometry of every primitive on the origin.
    pub fn center(&mut self) {
        for primitive in &mut self.primitives {
            primitive.center();
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.primitives
            .iter()
            .filter_map(ModelPrimitive::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.len()).sum()
    }
}

pub const MODEL_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_asset_path() -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/model/scene.gltf")
    }

    pub(crate) const TRIANGLE_MESH: &str =
        r#"{"name": "Triangle", "primitives": [{"attributes": {"POSITION": 0}}]}"#;
    pub(crate) const POINTS_MESH: &str =
        r#"{"name": "Dots", "primitives": [{"attributes": {"POSITION": 0}, "mode": 0}]}"#;

    /// Builds a document with one node per mesh. Accessor 0 holds three zeroed positions.
    pub(crate) fn gltf_fixture(meshes: &[&str]) -> (gltf::Document, Vec<buffer::Data>) {
        let nodes = (0..meshes.len())
            .map(|i| format!(r#"{{"name": "Node {i}", "mesh": {i}}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let scene_nodes = (0..meshes.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let json = format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "buffers": [{{"byteLength": 36, "uri": "data:application/octet-stream;base64,{data}"}}],
                "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [0.0, 0.0, 0.0]
                }}],
                "meshes": [{meshes}],
                "nodes": [{nodes}],
                "scenes": [{{"name": "Fixture", "nodes": [{scene_nodes}]}}],
                "scene": 0
            }}"#,
            data = "A".repeat(48),
            meshes = meshes.join(","),
        );

        let (document, buffers, _images) = gltf::import_slice(json.as_bytes()).unwrap();
        (document, buffers)
    }

    fn first_mesh_model(mesh: &str) -> anyhow::Result<Model> {
        let (document, buffers) = gltf_fixture(&[mesh]);
        let mesh = document.meshes().next().unwrap();
        Model::from_gltf("Fixture", mesh, &buffers)
    }

    fn vertex(x: f32, y: f32, z: f32) -> Vertex {
        Vertex {
            position: Vec3::new(x, y, z),
            normal: Vec3::Y,
            tex_coords: Vec2::ZERO,
        }
    }

    #[test]
    fn center_moves_bounds_to_origin() {
        let mut primitive = ModelPrimitive {
            index: 0,
            vertices: vec![vertex(1.0, 0.0, 2.0), vertex(3.0, 4.0, 2.0), vertex(2.0, 1.0, 6.0)],
            indices: vec![0, 1, 2],
        };

        let offset = primitive.center();

        assert_eq!(offset, Vec3::new(-2.0, -2.0, -4.0));
        assert_eq!(primitive.bounds().unwrap().center(), Vec3::ZERO);
    }

    #[test]
    fn centering_twice_is_a_no_op() {
        let mut primitive = ModelPrimitive {
            index: 0,
            vertices: vec![vertex(0.0, 0.0, 0.0), vertex(2.0, 2.0, 2.0)],
            indices: vec![0, 1, 0],
        };

        primitive.center();
        assert_eq!(primitive.center(), Vec3::ZERO);
    }

    #[test]
    fn empty_primitive_is_left_alone() {
        let mut primitive = ModelPrimitive {
            index: 0,
            vertices: Vec::new(),
            indices: Vec::new(),
        };
        assert_eq!(primitive.center(), Vec3::ZERO);
    }

    #[test]
    fn reads_meshes_from_gltf() {
        let (document, buffers, _images) = gltf::import(test_asset_path()).unwrap();

        let models = document
            .meshes()
            .map(|mesh| {
                let name = mesh.name().unwrap_or("Unnamed").to_string();
                Model::from_gltf(name, mesh, &buffers).unwrap()
            })
            .collect::<Vec<_>>();

        let pedestal = models.iter().find(|m| m.name == "Pedestal").unwrap();
        assert_eq!(pedestal.primitives.len(), 1);
        assert_eq!(pedestal.vertex_count(), 24);
        assert_eq!(pedestal.primitives[0].indices.len(), 36);

        // The crystal has no index accessor, so indices are generated.
        let crystal = models.iter().find(|m| m.name == "Crystal").unwrap();
        let primitive = &crystal.primitives[0];
        assert_eq!(primitive.indices, (0..primitive.vertices.len() as u32).collect::<Vec<_>>());
        assert!(primitive.vertices.iter().all(|v| v.tex_coords == Vec2::ZERO));
    }

    #[test]
    fn non_triangle_primitives_are_skipped() {
        let model = first_mesh_model(
            r#"{"name": "Mixed", "primitives": [
                {"attributes": {"POSITION": 0}, "mode": 0},
                {"attributes": {"POSITION": 0}},
                {"attributes": {"POSITION": 0}, "mode": 1}
            ]}"#,
        )
        .unwrap();

        assert_eq!(model.primitives.len(), 1);
        assert_eq!(model.primitives[0].index, 1);
        assert_eq!(model.primitives[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn mesh_without_triangles_is_an_error() {
        let error = first_mesh_model(POINTS_MESH).err().unwrap();
        assert!(format!("{:#}", error).contains("Mesh without primitives"));
    }

    #[test]
    fn primitive_without_positions_is_an_error() {
        let error = first_mesh_model(
            r#"{"name": "Normals", "primitives": [{"attributes": {"NORMAL": 0}}]}"#,
        )
        .err()
        .unwrap();
        assert!(format!("{:#}", error).contains("has no positions"));
    }

    #[test]
    fn triangle_fixture_reads() {
        let model = first_mesh_model(TRIANGLE_MESH).unwrap();
        assert_eq!(model.vertex_count(), 3);
        assert!(model.primitives[0].vertices.iter().all(|v| v.normal == Vec3::ZERO));
    }

    #[test]
    fn model_bounds_cover_all_primitives() {
        let model = Model {
            name: "two".to_string(),
            primitives: vec![
                ModelPrimitive {
                    index: 0,
                    vertices: vec![vertex(0.0, 0.0, 0.0), vertex(1.0, 1.0, 1.0)],
                    indices: vec![0, 1, 1],
                },
                ModelPrimitive {
                    index: 1,
                    vertices: vec![vertex(-3.0, 0.5, 0.0)],
                    indices: vec![0, 0, 0],
                },
            ],
        };

        let bounds = model.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(-3.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::ONE);
    }
}
