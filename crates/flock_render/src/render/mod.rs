//! Rendering system
//!
//! The pieces, leaf first:
//!
//! - [`device`]: the [`GraphicsDevice`](device::GraphicsDevice) seam to the
//!   host's graphics context
//! - [`resources`]: the handle-based registry of shaders, textures, meshes
//!   and models
//! - [`batching`]: per-frame selection and state-sorted emission of models
//! - [`camera`]: view and projection derivation
//! - [`renderer`]: the context object that owns all of the above
//!
//! # Frame Flow
//!
//! ```text
//! Renderer::draw
//!   ├─ clear, depth on, culling off
//!   ├─ Batcher::prepare_draw_list   (filter visible non-UI, sort)
//!   ├─ Batcher::emit_draw_sequence  (bind on change, draw)
//!   ├─ Batcher::emit_ui_pass        (orthographic, depth off)
//!   └─ GraphicsDevice::present
//! ```

pub mod batching;
pub mod camera;
pub mod device;
pub mod renderer;
pub mod resources;

pub use batching::{BatchStats, Batcher, DrawItem};
pub use camera::{Camera, CameraData};
pub use device::{DeviceCommand, GraphicsDevice, HeadlessDevice};
#[cfg(feature = "gl")]
pub use device::GlDevice;
pub use renderer::{FrameStats, Renderer};
pub use resources::{
    DefaultResources, Mesh, MeshData, Model, PoolStats, ResourceKind, ResourceRegistry,
    SamplingPolicy, Shader, ShaderStage, Texture, TextureData, VertexAttributes, Winding,
};

use thiserror::Error;

use crate::config::ConfigError;
use crate::foundation::collections::{Handle, PoolError};

/// Rendering error types
///
/// Every fallible registry operation rolls back completely before returning
/// one of these, so an error never leaves a half-created resource behind.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A resource pool could not grow to hold a new entry
    ///
    /// Any GPU objects created for the rejected resource have already been
    /// destroyed.
    #[error("Out of slots for {kind} resources: {source}")]
    AllocationFailure {
        /// Pool that failed to grow
        kind: ResourceKind,
        /// Underlying pool failure
        source: PoolError,
    },

    /// A shader stage failed to compile
    #[error("Failed to compile {stage} shader: {log}")]
    CompileFailure {
        /// Stage that failed
        stage: ShaderStage,
        /// Compiler diagnostic
        log: String,
    },

    /// Vertex and fragment stages failed to link
    #[error("Failed to link shader program: {log}")]
    LinkFailure {
        /// Linker diagnostic
        log: String,
    },

    /// A handle did not refer to a live resource of its kind
    ///
    /// Covers out-of-range indices, released slots and stale generations.
    #[error("Invalid {kind} handle {index}v{generation}")]
    InvalidHandle {
        /// Kind of resource the handle was meant for
        kind: ResourceKind,
        /// Slot index carried by the handle
        index: u32,
        /// Generation carried by the handle
        generation: u32,
    },

    /// A shader needs vertex attributes the mesh does not provide
    #[error("Mesh {mesh} lacks {missing:?} required by shader {shader}")]
    IncompatibleResources {
        /// Mesh that was paired with the shader
        mesh: Handle<Mesh>,
        /// Shader whose requirements were not met
        shader: Handle<Shader>,
        /// Attributes the shader needs and the mesh lacks
        missing: VertexAttributes,
    },

    /// No default shader can draw a mesh without colors or texture coordinates
    #[error("No default shader fits mesh {mesh}: it has neither colors nor texture coordinates")]
    NoSuitableShader {
        /// Mesh that was offered
        mesh: Handle<Mesh>,
    },

    /// Texture or mesh data is internally inconsistent
    #[error("Invalid {kind} data: {reason}")]
    InvalidResourceData {
        /// Kind of resource being created
        kind: ResourceKind,
        /// What is wrong with the data
        reason: String,
    },

    /// Renderer configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The graphics device refused an operation
    #[error("Device error: {0}")]
    Device(String),
}

impl RenderError {
    /// Build an [`RenderError::InvalidHandle`] from any typed handle
    pub(crate) fn invalid_handle<T>(kind: ResourceKind, handle: Handle<T>) -> Self {
        Self::InvalidHandle {
            kind,
            index: handle.index(),
            generation: handle.generation(),
        }
    }

    pub(crate) const fn allocation(kind: ResourceKind, source: PoolError) -> Self {
        Self::AllocationFailure { kind, source }
    }
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
