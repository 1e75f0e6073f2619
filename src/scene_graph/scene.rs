use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;
use std::collections::{HashMap, HashSet};

use crate::material::MaterialId;
use crate::model::{Buffers, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    gltf_mesh_to_model: HashMap<usize, SceneModelId>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            gltf_mesh_to_model: HashMap::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    #[allow(dead_code)]
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    pub fn get_model(&self, id: SceneModelId) -> Option<&SceneModel> {
        self.models.get(id)
    }

    /// Spawns a glTF scene under a new root object named after it and returns the root.
    /// glTF meshes referenced by several nodes share one model.
    ///
    /// Every mesh is converted before anything is added, so on error the scene is unchanged.
    pub fn spawn_gltf_scene(
        &mut self,
        buffers: Buffers,
        scene: &gltf::Scene,
    ) -> anyhow::Result<ObjectId> {
        let mut models = Vec::new();
        for node in scene.nodes() {
            collect_gltf_models(buffers, &node, &mut models)?;
        }

        // Mesh indices are only meaningful within one document.
        self.gltf_mesh_to_model.clear();
        for (mesh_index, model) in models {
            let model_id = self.add_model(SceneModel::new(model));
            self.gltf_mesh_to_model.insert(mesh_index, model_id);
        }

        let root_name = scene
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("Scene {}", scene.index()));
        let root_id = self.add_object(Object3D::named(root_name));

        for node in scene.nodes() {
            self.spawn_gltf_node(&node, root_id);
        }

        Ok(root_id)
    }

    fn spawn_gltf_node(&mut self, node: &gltf::Node, parent: ObjectId) {
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        let mut object = Object3D::named(node_name);
        let (translation, rotation, scale) = node.transform().decomposed();

        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            scale.into(),
        );

        object.model_id = node
            .mesh()
            .and_then(|mesh| self.gltf_mesh_to_model.get(&mesh.index()).copied());

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent));

        for child in node.children() {
            self.spawn_gltf_node(&child, object_id);
        }
    }

    /// Visits `root` and all of its descendants depth-first, parents before children.
    pub fn traverse<F>(&self, root: ObjectId, mut visit: F)
    where
        F: FnMut(ObjectId, &Object3D),
    {
        let mut stack = vec![root];

        while let Some(object_id) = stack.pop() {
            let Some(object) = self.objects.get(object_id) else {
                continue;
            };

            visit(object_id, object);
            stack.extend(object.child_ids.iter().rev().copied());
        }
    }

    /// Replaces the material of every mesh below `root` and centers its geometry.
    /// Returns the number of mesh objects updated.
    pub fn set_mesh_material(&mut self, root: ObjectId, material: MaterialId) -> usize {
        let mut meshes = Vec::new();
        self.traverse(root, |object_id, object| {
            if let Some(model_id) = object.model_id {
                meshes.push((object_id, model_id));
            }
        });

        let mut centered = HashSet::new();
        for &(object_id, model_id) in &meshes {
            if centered.insert(model_id) {
                if let Some(scene_model) = self.models.get_mut(model_id) {
                    scene_model.model.center();
                }
            }

            if let Some(object) = self.objects.get_mut(object_id) {
                object.material_id = Some(material);
            }
        }

        meshes.len()
    }

    /// Mesh objects that have a material assigned.
    pub fn renderable_objects(
        &self,
    ) -> impl Iterator<Item = (&Object3D, SceneModelId, MaterialId)> + '_ {
        self.objects.iter().filter_map(|(_, object)| {
            Some((object, object.model_id?, object.material_id?))
        })
    }

    /// Updates all object transforms in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.is_none())
            .map(|(id, _)| id);

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY);
        }
    }

    fn update_object_transform_recursive(&self, object_id: ObjectId, parent_world_matrix: Mat4) {
        if let Some(object) = self.objects.get(object_id) {
            if object.transform.is_world_dirty() {
                let local_matrix = *object.transform.get_local_matrix();
                let world_matrix = parent_world_matrix * local_matrix;
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = *object.transform.get_world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix);
            }
        }
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|c| c.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;

            if let Some(new_parent_id) = new_parent_id {
                if let Some(new_parent) = self.objects.get_mut(new_parent_id) {
                    new_parent.child_ids.push(child_id);
                }
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    /// Recomputes the world matrices invalidated since the last call.
    pub fn update(&mut self) {
        self.update_transforms();
    }
}

/// Converts each glTF mesh reachable from `node` once, in discovery order.
fn collect_gltf_models(
    buffers: Buffers,
    node: &gltf::Node,
    models: &mut Vec<(usize, Model)>,
) -> anyhow::Result<()> {
    if let Some(mesh) = node.mesh() {
        if !models.iter().any(|(index, _)| *index == mesh.index()) {
            let mesh_index = mesh.index();
            let mesh_name = mesh.name().map(String::from).unwrap_or_else(|| {
                format!("{} (Mesh)", node.name().unwrap_or("Unnamed"))
            });

            let model = Model::from_gltf(mesh_name, mesh, buffers)?;
            models.push((mesh_index, model));
        }
    }

    for child in node.children() {
        collect_gltf_models(buffers, &child, models)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use id_arena::Arena;

    use super::*;
    use crate::material::ShaderMaterial;
    use crate::model::{
        tests::{gltf_fixture, test_asset_path, POINTS_MESH, TRIANGLE_MESH},
        ModelPrimitive, Vertex,
    };

    fn load_sample(scene: &mut Scene) -> ObjectId {
        let (document, buffers, _images) = gltf::import(test_asset_path()).unwrap();
        let gltf_scene = document.default_scene().unwrap();
        scene.spawn_gltf_scene(&buffers, &gltf_scene).unwrap()
    }

    fn material() -> MaterialId {
        let mut materials: Arena<ShaderMaterial> = Arena::new();
        materials.alloc(ShaderMaterial::default_shader())
    }

    fn world_matrix(scene: &Scene, id: ObjectId) -> Mat4 {
        *scene.get_object(id).unwrap().transform.get_world_matrix()
    }

    fn names_in_order(scene: &Scene, root: ObjectId) -> Vec<String> {
        let mut names = Vec::new();
        scene.traverse(root, |_, object| names.push(object.name.clone()));
        names
    }

    #[test]
    fn gltf_scene_is_spawned_under_a_root() {
        let mut scene = Scene::new();
        let root = load_sample(&mut scene);

        assert_eq!(
            names_in_order(&scene, root),
            ["Scene", "Base", "Gem", "Plinth", "Anchor"]
        );
        assert!(scene.get_object(root).unwrap().parent_id.is_none());

        // Base and Plinth share the pedestal mesh.
        assert_eq!(scene.models.len(), 2);
        let base = scene.get_object_by_name("Base").unwrap();
        let plinth = scene.get_object_by_name("Plinth").unwrap();
        assert_eq!(
            scene.get_object(base).unwrap().model_id,
            scene.get_object(plinth).unwrap().model_id
        );
    }

    #[test]
    fn failed_spawn_leaves_the_scene_untouched() {
        let (document, buffers) = gltf_fixture(&[TRIANGLE_MESH, POINTS_MESH]);
        let gltf_scene = document.default_scene().unwrap();
        let mut scene = Scene::new();

        assert!(scene.spawn_gltf_scene(&buffers, &gltf_scene).is_err());
        assert_eq!(scene.objects.len(), 0);
        assert_eq!(scene.models.len(), 0);

        scene.update();
    }

    #[test]
    fn fixture_scene_spawns_one_node_per_mesh() {
        let (document, buffers) = gltf_fixture(&[TRIANGLE_MESH, TRIANGLE_MESH]);
        let gltf_scene = document.default_scene().unwrap();
        let mut scene = Scene::new();

        let root = scene.spawn_gltf_scene(&buffers, &gltf_scene).unwrap();

        assert_eq!(names_in_order(&scene, root), ["Fixture", "Node 0", "Node 1"]);
        assert_eq!(scene.models.len(), 2);
    }

    #[test]
    fn every_mesh_gets_the_material_and_centered_geometry() {
        let mut scene = Scene::new();
        let root = load_sample(&mut scene);
        let material = material();

        let updated = scene.set_mesh_material(root, material);

        assert_eq!(updated, 3);
        scene.traverse(root, |_, object| match object.model_id {
            Some(model_id) => {
                assert_eq!(object.material_id, Some(material));
                let model = &scene.get_model(model_id).unwrap().model;
                for primitive in &model.primitives {
                    let center = primitive.bounds().unwrap().center();
                    assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6), "{}", object.name);
                }
            }
            None => assert!(object.material_id.is_none()),
        });
        assert_eq!(scene.renderable_objects().count(), 3);
    }

    #[test]
    fn material_is_only_applied_below_root() {
        let mut scene = Scene::new();
        let mut outside = Object3D::named("Outside");
        outside.model_id = Some(scene.add_model(SceneModel::new(Model {
            name: "Outside".to_string(),
            primitives: vec![ModelPrimitive {
                index: 0,
                vertices: vec![Vertex {
                    position: Vec3::ONE,
                    normal: Vec3::Y,
                    tex_coords: Vec2::ZERO,
                }],
                indices: vec![0, 0, 0],
            }],
        })));
        let outside = scene.add_object(outside);
        let root = load_sample(&mut scene);

        scene.set_mesh_material(root, material());

        assert!(scene.get_object(outside).unwrap().material_id.is_none());
    }

    #[test]
    fn root_scale_propagates_to_world_matrices() {
        let mut scene = Scene::new();
        let root = load_sample(&mut scene);
        scene.set_object_scale(root, Vec3::splat(10.0));

        scene.update();

        let gem = scene.get_object_by_name("Gem").unwrap();
        let world = world_matrix(&scene, gem);
        let (scale, _, translation) = world.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::splat(10.0), 1e-4));
        assert!(translation.abs_diff_eq(Vec3::new(0.0, 0.2, 0.0), 1e-5));

        let plinth = scene.get_object_by_name("Plinth").unwrap();
        let (scale, _, _) = world_matrix(&scene, plinth).to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::splat(5.0), 1e-4));
    }

    #[test]
    fn reparenting_updates_child_lists() {
        let mut scene = Scene::new();
        let a = scene.add_object(Object3D::named("a"));
        let b = scene.add_object(Object3D::named("b"));
        let c = scene.add_object(Object3D::named("c"));

        scene.set_object_parent(c, Some(a));
        scene.set_object_parent(c, Some(b));

        assert!(scene.get_object(a).unwrap().child_ids.is_empty());
        assert_eq!(scene.get_object(b).unwrap().child_ids, vec![c]);
        assert_eq!(scene.get_object(c).unwrap().parent(&scene).unwrap().name, "b");
    }
}
