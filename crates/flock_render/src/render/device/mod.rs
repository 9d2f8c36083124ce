//! Graphics device abstraction
//!
//! [`GraphicsDevice`] is the seam between the renderer and the graphics
//! context owned by the host application. The renderer never creates a
//! context itself; it receives a device that already talks to a current one
//! and issues immediate-mode state and draw calls through it.
//!
//! Two implementations ship with the crate:
//! - [`GlDevice`] (feature `gl`): OpenGL 3.3 core through `glow`
//! - [`HeadlessDevice`]: records every call, for tests and GPU-less runs
//!
//! GPU objects are referred to by small opaque ids that wrap the non-zero
//! names the driver hands out.

mod headless;
#[cfg(feature = "gl")]
mod gl;

pub use headless::{DeviceCommand, HeadlessDevice};
#[cfg(feature = "gl")]
pub use gl::GlDevice;

use std::num::NonZeroU32;

use crate::foundation::math::Mat4;
use crate::render::resources::{MeshData, SamplingPolicy, ShaderStage, TextureData, Winding};

/// Result type for device operations; errors carry the driver's diagnostic text
pub type DeviceResult<T> = Result<T, String>;

macro_rules! gpu_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Raw driver name
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }
    };
}

gpu_id!(
    /// A compiled shader stage
    StageId
);
gpu_id!(
    /// A linked shader program
    ProgramId
);
gpu_id!(
    /// A 2D texture object
    TextureId
);
gpu_id!(
    /// A vertex array object
    VertexArrayId
);
gpu_id!(
    /// A buffer object
    BufferId
);

/// GPU objects backing one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    /// Vertex array capturing the attribute layout
    pub vertex_array: VertexArrayId,
    /// Positions, attribute location 0
    pub positions: BufferId,
    /// Per-vertex colors, attribute location 1
    pub colors: Option<BufferId>,
    /// Per-vertex texture coordinates, attribute location 2
    pub uvs: Option<BufferId>,
    /// Element buffer
    pub indices: BufferId,
}

/// Immediate-mode graphics device driven by the renderer
///
/// Implemented for `&mut D` as well, so a renderer can borrow a device the
/// caller keeps ownership of.
///
/// All methods assume the device's context is current on the calling thread.
/// Creation methods return the driver's diagnostic text on failure and must
/// not leak partially created objects.
pub trait GraphicsDevice {
    /// Compile a single shader stage
    ///
    /// # Errors
    /// Returns the compile log when compilation fails.
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> DeviceResult<StageId>;

    /// Link two compiled stages into a program
    ///
    /// # Errors
    /// Returns the link log when linking fails. The program object is deleted
    /// by the device; the stages are left to the caller.
    fn link_program(&mut self, vertex: StageId, fragment: StageId) -> DeviceResult<ProgramId>;

    /// Delete a compiled stage
    fn delete_stage(&mut self, stage: StageId);

    /// Delete a linked program
    fn delete_program(&mut self, program: ProgramId);

    /// Point a sampler uniform of `program` at a texture unit
    fn bind_sampler_unit(&mut self, program: ProgramId, name: &str, unit: u32);

    /// Upload RGBA8 pixels into a new mipmapped texture
    ///
    /// # Errors
    /// Returns a diagnostic if the texture object cannot be created.
    fn upload_texture(&mut self, data: &TextureData<'_>, sampling: SamplingPolicy) -> DeviceResult<TextureId>;

    /// Delete a texture
    fn delete_texture(&mut self, texture: TextureId);

    /// Upload vertex and index data and record the attribute layout
    ///
    /// # Errors
    /// Returns a diagnostic if any buffer cannot be created. Buffers created
    /// before the failure are deleted.
    fn upload_mesh(&mut self, data: &MeshData<'_>) -> DeviceResult<MeshBuffers>;

    /// Delete every object behind a mesh
    fn delete_mesh(&mut self, buffers: &MeshBuffers);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear color and depth
    fn clear(&mut self, color: [f32; 4]);

    /// Toggle depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Toggle back-face culling
    fn set_face_culling(&mut self, enabled: bool);

    /// Make `program` current
    fn use_program(&mut self, program: ProgramId);

    /// Upload a 4x4 matrix uniform to `program`; absent uniforms are ignored
    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4);

    /// Bind `texture` to texture `unit`
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Bind a mesh's vertex array (which carries its element buffer)
    fn bind_mesh(&mut self, vertex_array: VertexArrayId);

    /// Select which winding faces the viewer
    fn set_front_face(&mut self, winding: Winding);

    /// Draw `count` indexed triangle-list elements from the bound mesh
    fn draw_elements(&mut self, count: u32);

    /// Finish the frame's command stream
    ///
    /// Swapping buffers belongs to whoever owns the window; the device only
    /// guarantees that everything issued so far has been submitted.
    fn present(&mut self);
}

impl<D: GraphicsDevice + ?Sized> GraphicsDevice for &mut D {
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> DeviceResult<StageId> {
        (**self).compile_stage(stage, source)
    }

    fn link_program(&mut self, vertex: StageId, fragment: StageId) -> DeviceResult<ProgramId> {
        (**self).link_program(vertex, fragment)
    }

    fn delete_stage(&mut self, stage: StageId) {
        (**self).delete_stage(stage);
    }

    fn delete_program(&mut self, program: ProgramId) {
        (**self).delete_program(program);
    }

    fn bind_sampler_unit(&mut self, program: ProgramId, name: &str, unit: u32) {
        (**self).bind_sampler_unit(program, name, unit);
    }

    fn upload_texture(&mut self, data: &TextureData<'_>, sampling: SamplingPolicy) -> DeviceResult<TextureId> {
        (**self).upload_texture(data, sampling)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        (**self).delete_texture(texture);
    }

    fn upload_mesh(&mut self, data: &MeshData<'_>) -> DeviceResult<MeshBuffers> {
        (**self).upload_mesh(data)
    }

    fn delete_mesh(&mut self, buffers: &MeshBuffers) {
        (**self).delete_mesh(buffers);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        (**self).set_viewport(width, height);
    }

    fn clear(&mut self, color: [f32; 4]) {
        (**self).clear(color);
    }

    fn set_depth_test(&mut self, enabled: bool) {
        (**self).set_depth_test(enabled);
    }

    fn set_face_culling(&mut self, enabled: bool) {
        (**self).set_face_culling(enabled);
    }

    fn use_program(&mut self, program: ProgramId) {
        (**self).use_program(program);
    }

    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        (**self).set_uniform_mat4(program, name, value);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        (**self).bind_texture(unit, texture);
    }

    fn bind_mesh(&mut self, vertex_array: VertexArrayId) {
        (**self).bind_mesh(vertex_array);
    }

    fn set_front_face(&mut self, winding: Winding) {
        (**self).set_front_face(winding);
    }

    fn draw_elements(&mut self, count: u32) {
        (**self).draw_elements(count);
    }

    fn present(&mut self) {
        (**self).present();
    }
}
