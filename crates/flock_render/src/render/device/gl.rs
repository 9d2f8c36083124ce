//! OpenGL 3.3 core device
//!
//! Every `glow` call is unsafe because it talks to a raw driver context. The
//! invariant upheld throughout is the one [`GlDevice::from_loader`] asks the
//! caller for: the context is current on this thread and outlives the device.

#![allow(unsafe_code)]

use std::ffi::c_void;

use glow::HasContext;

use crate::foundation::math::Mat4;
use crate::render::resources::{
    MagFilter, MeshData, MinFilter, SamplingPolicy, ShaderStage, TextureData, Winding, WrapMode,
    COLOR_COMPONENTS, COLOR_LOCATION, POSITION_COMPONENTS, POSITION_LOCATION, TEXCOORD_COMPONENTS,
    TEXCOORD_LOCATION,
};

use super::{
    BufferId, DeviceResult, GraphicsDevice, MeshBuffers, ProgramId, StageId, TextureId, VertexArrayId,
};

/// [`GraphicsDevice`] backed by a `glow` OpenGL context
pub struct GlDevice {
    gl: glow::Context,
}

impl GlDevice {
    /// Wrap an existing `glow` context
    #[must_use]
    pub const fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Load GL function pointers through the window system's loader
    ///
    /// # Safety
    /// A GL 3.3 core context must be current on the calling thread and stay
    /// alive, and current, for as long as the device is used.
    pub unsafe fn from_loader<F>(mut loader: F) -> Self
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = glow::Context::from_loader_function(|name| loader(name));
        log::info!(
            "OpenGL {} on {}",
            gl.get_parameter_string(glow::VERSION),
            gl.get_parameter_string(glow::RENDERER)
        );
        Self { gl }
    }

    /// The underlying context
    #[must_use]
    pub const fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn upload_buffer(&self, target: u32, bytes: &[u8]) -> DeviceResult<glow::NativeBuffer> {
        unsafe {
            let buffer = self.gl.create_buffer()?;
            self.gl.bind_buffer(target, Some(buffer));
            self.gl.buffer_data_u8_slice(target, bytes, glow::STATIC_DRAW);
            Ok(buffer)
        }
    }

    fn attribute_buffer(&self, location: u32, components: usize, data: &[f32]) -> DeviceResult<glow::NativeBuffer> {
        let buffer = self.upload_buffer(glow::ARRAY_BUFFER, bytemuck::cast_slice(data))?;
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(location, components as i32, glow::FLOAT, false, 0, 0);
            self.gl.enable_vertex_attrib_array(location);
        }
        Ok(buffer)
    }

    fn delete_buffers(&self, buffers: &[glow::NativeBuffer]) {
        for &buffer in buffers {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<glow::NativeUniformLocation> {
        unsafe { self.gl.get_uniform_location(glow::NativeProgram(program.0), name) }
    }
}

const fn stage_kind(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

const fn wrap_mode(wrap: WrapMode) -> i32 {
    match wrap {
        WrapMode::Repeat => glow::REPEAT as i32,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
    }
}

const fn min_filter(filter: MinFilter) -> i32 {
    match filter {
        MinFilter::Nearest => glow::NEAREST as i32,
        MinFilter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST as i32,
        MinFilter::Linear => glow::LINEAR as i32,
    }
}

const fn mag_filter(filter: MagFilter) -> i32 {
    match filter {
        MagFilter::Nearest => glow::NEAREST as i32,
        MagFilter::Linear => glow::LINEAR as i32,
    }
}

impl GraphicsDevice for GlDevice {
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> DeviceResult<StageId> {
        unsafe {
            let shader = self.gl.create_shader(stage_kind(stage))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(log);
            }
            Ok(StageId(shader.0))
        }
    }

    fn link_program(&mut self, vertex: StageId, fragment: StageId) -> DeviceResult<ProgramId> {
        let vertex = glow::NativeShader(vertex.0);
        let fragment = glow::NativeShader(fragment.0);
        unsafe {
            let program = self.gl.create_program()?;
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(log);
            }
            Ok(ProgramId(program.0))
        }
    }

    fn delete_stage(&mut self, stage: StageId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(stage.0)) };
    }

    fn delete_program(&mut self, program: ProgramId) {
        unsafe { self.gl.delete_program(glow::NativeProgram(program.0)) };
    }

    fn bind_sampler_unit(&mut self, program: ProgramId, name: &str, unit: u32) {
        let location = self.uniform_location(program, name);
        unsafe {
            self.gl.use_program(Some(glow::NativeProgram(program.0)));
            self.gl.uniform_1_i32(location.as_ref(), unit as i32);
            self.gl.use_program(None);
        }
    }

    fn upload_texture(&mut self, data: &TextureData<'_>, sampling: SamplingPolicy) -> DeviceResult<TextureId> {
        let width = i32::try_from(data.width).map_err(|e| e.to_string())?;
        let height = i32::try_from(data.height).map_err(|e| e.to_string())?;

        unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));

            let wrap = wrap_mode(sampling.wrap);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min_filter(sampling.min_filter));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, mag_filter(sampling.mag_filter));

            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(data.pixels),
            );
            if sampling.generate_mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);

            Ok(TextureId(texture.0))
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        unsafe { self.gl.delete_texture(glow::NativeTexture(texture.0)) };
    }

    fn upload_mesh(&mut self, data: &MeshData<'_>) -> DeviceResult<MeshBuffers> {
        let vertex_array = unsafe {
            let vao = self.gl.create_vertex_array()?;
            self.gl.bind_vertex_array(Some(vao));
            vao
        };

        let mut created = Vec::with_capacity(4);
        let result = (|| {
            let positions = self.attribute_buffer(POSITION_LOCATION, POSITION_COMPONENTS, data.positions)?;
            created.push(positions);

            let colors = match data.colors {
                Some(colors) => {
                    let buffer = self.attribute_buffer(COLOR_LOCATION, COLOR_COMPONENTS, colors)?;
                    created.push(buffer);
                    Some(buffer)
                }
                None => None,
            };
            let uvs = match data.uvs {
                Some(uvs) => {
                    let buffer = self.attribute_buffer(TEXCOORD_LOCATION, TEXCOORD_COMPONENTS, uvs)?;
                    created.push(buffer);
                    Some(buffer)
                }
                None => None,
            };

            // Bound while the vertex array is, so the array records it.
            let indices = self.upload_buffer(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(data.indices))?;
            created.push(indices);

            Ok::<_, String>(MeshBuffers {
                vertex_array: VertexArrayId(vertex_array.0),
                positions: BufferId(positions.0),
                colors: colors.map(|b| BufferId(b.0)),
                uvs: uvs.map(|b| BufferId(b.0)),
                indices: BufferId(indices.0),
            })
        })();

        unsafe {
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }

        if result.is_err() {
            self.delete_buffers(&created);
            unsafe { self.gl.delete_vertex_array(vertex_array) };
        }
        result
    }

    fn delete_mesh(&mut self, buffers: &MeshBuffers) {
        let owned: Vec<_> = [Some(buffers.positions), buffers.colors, buffers.uvs, Some(buffers.indices)]
            .into_iter()
            .flatten()
            .map(|b| glow::NativeBuffer(b.0))
            .collect();
        self.delete_buffers(&owned);
        unsafe {
            self.gl
                .delete_vertex_array(glow::NativeVertexArray(buffers.vertex_array.0));
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_face_culling(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::CULL_FACE);
            } else {
                self.gl.disable(glow::CULL_FACE);
            }
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        unsafe { self.gl.use_program(Some(glow::NativeProgram(program.0))) };
    }

    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        let location = self.uniform_location(program, name);
        if location.is_none() {
            log::trace!("uniform {name} not active in program {}", program.get());
            return;
        }
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(location.as_ref(), false, value.as_slice());
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(glow::TEXTURE_2D, Some(glow::NativeTexture(texture.0)));
        }
    }

    fn bind_mesh(&mut self, vertex_array: VertexArrayId) {
        unsafe {
            self.gl
                .bind_vertex_array(Some(glow::NativeVertexArray(vertex_array.0)));
        }
    }

    fn set_front_face(&mut self, winding: Winding) {
        let mode = match winding {
            Winding::Clockwise => glow::CW,
            Winding::CounterClockwise => glow::CCW,
        };
        unsafe { self.gl.front_face(mode) };
    }

    fn draw_elements(&mut self, count: u32) {
        unsafe {
            self.gl
                .draw_elements(glow::TRIANGLES, count as i32, glow::UNSIGNED_INT, 0);
        }
    }

    fn present(&mut self) {
        unsafe { self.gl.flush() };
    }
}
