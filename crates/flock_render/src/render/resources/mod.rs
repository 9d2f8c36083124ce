//! GPU resources and the registry that owns them
//!
//! Shaders, textures, meshes and models each live in their own
//! [`SlotPool`](crate::foundation::collections::SlotPool) inside the
//! [`ResourceRegistry`] and are referred to by typed handles.

mod mesh;
mod model;
mod registry;
mod shader;
mod texture;

pub use mesh::{
    cube, Mesh, MeshData, Winding, COLOR_COMPONENTS, COLOR_LOCATION, POSITION_COMPONENTS,
    POSITION_LOCATION, TEXCOORD_COMPONENTS, TEXCOORD_LOCATION,
};
pub use model::Model;
pub use registry::{DefaultResources, PoolStats, Resource, ResourceRegistry};
pub use shader::{
    sources, Shader, ShaderStage, VertexAttributes, MODEL_UNIFORM, PROJECTION_UNIFORM,
    SAMPLER_UNIFORM, VIEW_UNIFORM,
};
pub use texture::{
    error_texture, MagFilter, MinFilter, SamplingPolicy, Texture, TextureData, WrapMode,
    BYTES_PER_PIXEL,
};

use std::fmt;

/// The four kinds of registry resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Shader program
    Shader,
    /// Texture
    Texture,
    /// Mesh
    Mesh,
    /// Model
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shader => "shader",
            Self::Texture => "texture",
            Self::Mesh => "mesh",
            Self::Model => "model",
        };
        f.write_str(name)
    }
}
