//! The renderer context
//!
//! [`Renderer`] owns everything a frame needs: the device, the resource
//! registry, the batcher, the camera and the configuration. There is no
//! global state; several renderers can coexist, each with its own pools.

use crate::config::RendererConfig;
use crate::foundation::collections::Handle;
use crate::foundation::math::Vec3;
use crate::render::batching::{BatchStats, Batcher};
use crate::render::camera::{Camera, CameraData};
use crate::render::device::GraphicsDevice;
use crate::render::resources::{
    DefaultResources, Mesh, MeshData, Model, PoolStats, Resource, ResourceRegistry, Shader,
    Texture, TextureData, VertexAttributes,
};
use crate::render::RenderResult;

/// What a call to [`Renderer::draw`] did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Frames drawn so far, this one included
    pub frame: u64,
    /// Delta time handed to `draw`
    pub delta_time: f32,
    /// 3D pass counters
    pub batch: BatchStats,
    /// Visible UI models collected
    pub ui_models: usize,
}

/// Immediate-mode renderer driving a [`GraphicsDevice`]
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    registry: ResourceRegistry,
    batcher: Batcher,
    camera: Camera,
    config: RendererConfig,
    defaults: DefaultResources,
    viewport: (u32, u32),
    frame: u64,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Build the renderer and inject the default resources
    ///
    /// # Errors
    /// Fails if `config` is invalid or a default resource cannot be created.
    /// The device is dropped in that case, with nothing left on it.
    pub fn new(mut device: D, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;

        let mut registry = ResourceRegistry::with_capacity(config.pool_capacity, config.diagnostics);
        let defaults = registry.inject_defaults(&mut device, config.diagnostics.show_test_model)?;

        let (width, height) = config.viewport;
        device.set_viewport(width, height);

        let renderer = Self {
            device,
            batcher: Batcher::with_capacity(config.draw_list_capacity),
            registry,
            camera: Camera::default(),
            defaults,
            viewport: config.viewport,
            frame: 0,
            config,
        };

        if renderer.config.diagnostics.verbose {
            log::info!("Renderer initialized with a {width}x{height} viewport");
            for stats in renderer.registry.stats() {
                log::info!("  {} pool: {}/{} slots used", stats.kind, stats.used, stats.capacity);
            }
        }
        Ok(renderer)
    }

    /// Draw one frame
    ///
    /// Clears, draws every visible 3D model sorted by GPU state, runs the UI
    /// pass and presents. Models with stale references are skipped; drawing
    /// itself never fails.
    pub fn draw(&mut self, delta_time: f32) -> FrameStats {
        self.frame += 1;

        self.device.set_face_culling(false);
        self.device.set_depth_test(true);
        self.device.clear(self.config.background);

        let (width, height) = self.viewport;
        let aspect = width as f32 / height as f32;
        let view = self.camera.view_matrix();
        let projection = self
            .camera
            .projection_matrix(aspect, self.config.near_clip, self.config.far_clip);

        self.batcher.prepare_draw_list(&self.registry);
        let batch = self
            .batcher
            .emit_draw_sequence(&mut self.device, &self.registry, &view, &projection);
        self.batcher.emit_ui_pass(&mut self.device, width, height);

        self.device.present();

        log::trace!(
            "Frame {} ({:.2} ms): {} draws, {} state changes",
            self.frame,
            delta_time * 1000.0,
            batch.draw_calls,
            batch.state_changes()
        );

        FrameStats {
            frame: self.frame,
            delta_time,
            batch,
            ui_models: self.batcher.ui_list().len(),
        }
    }

    /// Track a new framebuffer size; zero-sized (minimized) windows are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return;
        }
        self.viewport = (width, height);
        self.device.set_viewport(width, height);
    }

    /// Current viewport size
    #[must_use]
    pub const fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Set every camera parameter; angles and fov in degrees
    pub fn update_camera(&mut self, pitch: f32, yaw: f32, fov: f32, offset: f32, position: Vec3) {
        self.camera.update(pitch, yaw, fov, offset, position);
    }

    /// Read the camera back
    #[must_use]
    pub const fn camera_data(&self) -> CameraData {
        self.camera.data()
    }

    /// The camera
    #[must_use]
    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Handles of the built-in resources
    #[must_use]
    pub const fn defaults(&self) -> &DefaultResources {
        &self.defaults
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The resource registry
    #[must_use]
    pub const fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The device
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Pool occupancy
    #[must_use]
    pub fn stats(&self) -> [PoolStats; 4] {
        self.registry.stats()
    }

    /// Whether `handle` refers to a live resource
    #[must_use]
    pub fn is_in_use<T: Resource>(&self, handle: Handle<T>) -> bool {
        self.registry.is_in_use(handle)
    }

    /// See [`ResourceRegistry::create_shader`]
    ///
    /// # Errors
    /// Compile, link or allocation failures.
    pub fn create_shader(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        requirements: VertexAttributes,
    ) -> RenderResult<Handle<Shader>> {
        self.registry
            .create_shader(&mut self.device, vertex_source, fragment_source, requirements)
    }

    /// See [`ResourceRegistry::create_texture`]
    ///
    /// # Errors
    /// Invalid pixel data, device or allocation failures.
    pub fn create_texture(&mut self, data: &TextureData<'_>) -> RenderResult<Handle<Texture>> {
        self.registry.create_texture(&mut self.device, data)
    }

    /// See [`ResourceRegistry::create_mesh`]
    ///
    /// # Errors
    /// Invalid mesh data, device or allocation failures.
    pub fn create_mesh(&mut self, data: &MeshData<'_>) -> RenderResult<Handle<Mesh>> {
        self.registry.create_mesh(&mut self.device, data)
    }

    /// See [`ResourceRegistry::create_model`]
    ///
    /// # Errors
    /// Stale handles, no suitable default shader, or incompatible resources.
    pub fn create_model(&mut self, template: &Model, use_default_shader: bool) -> RenderResult<Handle<Model>> {
        self.registry.create_model(template, use_default_shader)
    }

    /// Borrow a model
    #[must_use]
    pub fn get_model(&self, model: Handle<Model>) -> Option<&Model> {
        self.registry.get_model(model)
    }

    /// See [`ResourceRegistry::update_model_transform`]
    ///
    /// # Errors
    /// Stale model handle.
    pub fn update_model_transform(
        &mut self,
        model: Handle<Model>,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
    ) -> RenderResult<()> {
        self.registry.update_model_transform(model, position, rotation, scale)
    }

    /// See [`ResourceRegistry::update_model_mesh`]
    ///
    /// # Errors
    /// Stale handles.
    pub fn update_model_mesh(&mut self, model: Handle<Model>, mesh: Handle<Mesh>) -> RenderResult<()> {
        self.registry.update_model_mesh(model, mesh)
    }

    /// See [`ResourceRegistry::update_model_texture`]
    ///
    /// # Errors
    /// Stale handles.
    pub fn update_model_texture(&mut self, model: Handle<Model>, texture: Handle<Texture>) -> RenderResult<()> {
        self.registry.update_model_texture(model, texture)
    }

    /// See [`ResourceRegistry::update_model_shader`]
    ///
    /// # Errors
    /// Stale handles.
    pub fn update_model_shader(&mut self, model: Handle<Model>, shader: Handle<Shader>) -> RenderResult<()> {
        self.registry.update_model_shader(model, shader)
    }

    /// See [`ResourceRegistry::update_model_visibility`]
    ///
    /// # Errors
    /// Stale model handle.
    pub fn update_model_visibility(&mut self, model: Handle<Model>, visible: bool) -> RenderResult<()> {
        self.registry.update_model_visibility(model, visible)
    }

    /// See [`ResourceRegistry::update_model`]
    ///
    /// # Errors
    /// Stale handles; valid parts are still applied.
    pub fn update_model(&mut self, model: Handle<Model>, template: &Model) -> RenderResult<()> {
        self.registry.update_model(model, template)
    }

    /// Release a shader; defaults and stale handles are refused
    pub fn release_shader(&mut self, shader: Handle<Shader>) -> bool {
        self.registry.release_shader(&mut self.device, shader)
    }

    /// Release a texture; defaults and stale handles are refused
    pub fn release_texture(&mut self, texture: Handle<Texture>) -> bool {
        self.registry.release_texture(&mut self.device, texture)
    }

    /// Release a mesh; defaults and stale handles are refused
    pub fn release_mesh(&mut self, mesh: Handle<Mesh>) -> bool {
        self.registry.release_mesh(&mut self.device, mesh)
    }

    /// Release a model; defaults and stale handles are refused
    pub fn release_model(&mut self, model: Handle<Model>) -> bool {
        self.registry.release_model(model)
    }
}

impl<D: GraphicsDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.registry.destroy_all(&mut self.device);
        if self.config.diagnostics.verbose {
            log::info!("Renderer shut down after {} frames", self.frame);
        }
    }
}
