pub mod mesh_pass;
pub mod pass;
