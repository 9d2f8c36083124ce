//! Recording device for tests and GPU-less runs

use std::collections::HashSet;
use std::num::NonZeroU32;

use crate::foundation::math::Mat4;
use crate::render::resources::{MeshData, SamplingPolicy, ShaderStage, TextureData, Winding};

use super::{
    BufferId, DeviceResult, GraphicsDevice, MeshBuffers, ProgramId, StageId, TextureId, VertexArrayId,
};

/// One call made against a [`HeadlessDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// A stage compiled successfully
    CompileStage {
        /// Stage kind
        stage: ShaderStage,
        /// Id handed out
        id: StageId,
    },
    /// A program linked successfully
    LinkProgram {
        /// Id handed out
        id: ProgramId,
    },
    /// A stage was deleted
    DeleteStage(StageId),
    /// A program was deleted
    DeleteProgram(ProgramId),
    /// A sampler uniform was pointed at a texture unit
    BindSamplerUnit {
        /// Program owning the uniform
        program: ProgramId,
        /// Uniform name
        name: String,
        /// Texture unit
        unit: u32,
    },
    /// A texture was uploaded
    UploadTexture {
        /// Id handed out
        id: TextureId,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Sampling policy applied
        sampling: SamplingPolicy,
    },
    /// A texture was deleted
    DeleteTexture(TextureId),
    /// A mesh was uploaded
    UploadMesh {
        /// Objects handed out
        buffers: MeshBuffers,
        /// Vertex count
        vertices: usize,
        /// Index count
        indices: usize,
    },
    /// A mesh was deleted
    DeleteMesh(VertexArrayId),
    /// Viewport set
    SetViewport(u32, u32),
    /// Color and depth cleared
    Clear([f32; 4]),
    /// Depth test toggled
    SetDepthTest(bool),
    /// Face culling toggled
    SetFaceCulling(bool),
    /// Program made current
    UseProgram(ProgramId),
    /// Matrix uniform uploaded
    SetUniformMat4 {
        /// Target program
        program: ProgramId,
        /// Uniform name
        name: String,
        /// Uploaded value
        value: Mat4,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Texture unit
        unit: u32,
        /// Bound texture
        texture: TextureId,
    },
    /// Vertex array bound
    BindMesh(VertexArrayId),
    /// Front face selected
    SetFrontFace(Winding),
    /// Indexed draw issued
    DrawElements(u32),
    /// Frame finished
    Present,
}

/// A [`GraphicsDevice`] that records calls instead of rendering
///
/// Ids are handed out from a single counter. Live objects are tracked so
/// tests can assert that nothing leaks, and the next compile, link or upload
/// can be made to fail.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<DeviceCommand>,
    next_id: u32,
    live: HashSet<u32>,
    fail_compile: Option<(ShaderStage, String)>,
    fail_link: Option<String>,
    fail_upload: Option<String>,
}

impl HeadlessDevice {
    /// Create an empty device
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order
    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget the recorded calls, keeping live objects
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of created objects not yet deleted
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Make the next compile of `stage` fail with `log`
    pub fn fail_next_compile(&mut self, stage: ShaderStage, log: impl Into<String>) {
        self.fail_compile = Some((stage, log.into()));
    }

    /// Make the next link fail with `log`
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.fail_link = Some(log.into());
    }

    /// Make the next texture or mesh upload fail with `message`
    pub fn fail_next_upload(&mut self, message: impl Into<String>) {
        self.fail_upload = Some(message.into());
    }

    fn allocate(&mut self) -> NonZeroU32 {
        self.next_id = self.next_id.wrapping_add(1);
        let id = NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN);
        self.live.insert(id.get());
        id
    }

    fn free(&mut self, id: u32) {
        if !self.live.remove(&id) {
            log::warn!("headless device: deleting unknown object {id}");
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn compile_stage(&mut self, stage: ShaderStage, _source: &str) -> DeviceResult<StageId> {
        if self.fail_compile.as_ref().is_some_and(|(s, _)| *s == stage) {
            if let Some((_, log)) = self.fail_compile.take() {
                return Err(log);
            }
        }
        let id = StageId(self.allocate());
        self.commands.push(DeviceCommand::CompileStage { stage, id });
        Ok(id)
    }

    fn link_program(&mut self, _vertex: StageId, _fragment: StageId) -> DeviceResult<ProgramId> {
        if let Some(log) = self.fail_link.take() {
            return Err(log);
        }
        let id = ProgramId(self.allocate());
        self.commands.push(DeviceCommand::LinkProgram { id });
        Ok(id)
    }

    fn delete_stage(&mut self, stage: StageId) {
        self.free(stage.get());
        self.commands.push(DeviceCommand::DeleteStage(stage));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.free(program.get());
        self.commands.push(DeviceCommand::DeleteProgram(program));
    }

    fn bind_sampler_unit(&mut self, program: ProgramId, name: &str, unit: u32) {
        self.commands.push(DeviceCommand::BindSamplerUnit {
            program,
            name: name.to_string(),
            unit,
        });
    }

    fn upload_texture(&mut self, data: &TextureData<'_>, sampling: SamplingPolicy) -> DeviceResult<TextureId> {
        if let Some(message) = self.fail_upload.take() {
            return Err(message);
        }
        let id = TextureId(self.allocate());
        self.commands.push(DeviceCommand::UploadTexture {
            id,
            width: data.width,
            height: data.height,
            sampling,
        });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.free(texture.get());
        self.commands.push(DeviceCommand::DeleteTexture(texture));
    }

    fn upload_mesh(&mut self, data: &MeshData<'_>) -> DeviceResult<MeshBuffers> {
        if let Some(message) = self.fail_upload.take() {
            return Err(message);
        }
        let buffers = MeshBuffers {
            vertex_array: VertexArrayId(self.allocate()),
            positions: BufferId(self.allocate()),
            colors: data.colors.map(|_| BufferId(self.allocate())),
            uvs: data.uvs.map(|_| BufferId(self.allocate())),
            indices: BufferId(self.allocate()),
        };
        self.commands.push(DeviceCommand::UploadMesh {
            buffers,
            vertices: data.vertex_count(),
            indices: data.indices.len(),
        });
        Ok(buffers)
    }

    fn delete_mesh(&mut self, buffers: &MeshBuffers) {
        self.free(buffers.vertex_array.get());
        self.free(buffers.positions.get());
        for buffer in [buffers.colors, buffers.uvs].into_iter().flatten() {
            self.free(buffer.get());
        }
        self.free(buffers.indices.get());
        self.commands.push(DeviceCommand::DeleteMesh(buffers.vertex_array));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(DeviceCommand::SetViewport(width, height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(DeviceCommand::Clear(color));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetDepthTest(enabled));
    }

    fn set_face_culling(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetFaceCulling(enabled));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        self.commands.push(DeviceCommand::SetUniformMat4 {
            program,
            name: name.to_string(),
            value: *value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(DeviceCommand::BindTexture { unit, texture });
    }

    fn bind_mesh(&mut self, vertex_array: VertexArrayId) {
        self.commands.push(DeviceCommand::BindMesh(vertex_array));
    }

    fn set_front_face(&mut self, winding: Winding) {
        self.commands.push(DeviceCommand::SetFrontFace(winding));
    }

    fn draw_elements(&mut self, count: u32) {
        self.commands.push(DeviceCommand::DrawElements(count));
    }

    fn present(&mut self) {
        self.commands.push(DeviceCommand::Present);
    }
}
