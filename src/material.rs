use id_arena::Id;

use crate::rendering::shader_loader::ShaderDefinition;

pub type MaterialId = Id<ShaderMaterial>;

/// Renders meshes with a user-supplied WGSL program instead of their glTF materials.
///
/// The shader must provide `vs_main` and `fs_main` and may bind the camera (group 0)
/// and the globals/lights (group 1).
#[derive(Debug, Clone)]
pub struct ShaderMaterial {
    pub name: String,
    pub shader: ShaderDefinition,
    pub cull_mode: Option<wgpu::Face>,
    pub depth_write: bool,
}

pub const DEFAULT_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Default Shader",
    path: "shader.wgsl",
};

impl ShaderMaterial {
    pub fn new(name: impl Into<String>, shader: ShaderDefinition) -> Self {
        Self {
            name: name.into(),
            shader,
            cull_mode: Some(wgpu::Face::Back),
            depth_write: true,
        }
    }

    pub fn default_shader() -> Self {
        Self::new("Shader material", DEFAULT_SHADER)
    }
}
