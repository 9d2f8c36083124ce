//! Handle-based resource registry
//!
//! Owns one [`SlotPool`] per resource kind and is the only way to create,
//! look up, update and release resources. Every accessor goes through the
//! pool's validity check; nothing reads slot storage behind a stale handle.
//!
//! Creation is all-or-nothing: GPU objects are created first, and if a later
//! step fails (link, pool growth) everything created so far is destroyed
//! before the error is returned.

use crate::config::{DiagnosticsConfig, RendererConfig};
use crate::foundation::collections::{Handle, SlotPool};
use crate::foundation::math::Vec3;
use crate::render::device::GraphicsDevice;
use crate::render::{RenderError, RenderResult};

use super::{
    cube, error_texture, sources, Mesh, MeshData, Model, ResourceKind, SamplingPolicy, Shader,
    ShaderStage, Texture, TextureData, VertexAttributes, SAMPLER_UNIFORM,
};

/// A type stored in one of the registry's pools
pub trait Resource: Sized {
    /// Kind tag used in diagnostics
    const KIND: ResourceKind;

    /// The registry pool holding this kind
    fn pool(registry: &ResourceRegistry) -> &SlotPool<Self>;

    /// The registry pool holding this kind, mutably
    fn pool_mut(registry: &mut ResourceRegistry) -> &mut SlotPool<Self>;

    /// Whether `handle` is one of the built-in defaults
    fn is_default(defaults: &DefaultResources, handle: Handle<Self>) -> bool;

    /// Free the GPU objects behind this resource
    fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D);
}

impl Resource for Shader {
    const KIND: ResourceKind = ResourceKind::Shader;

    fn pool(registry: &ResourceRegistry) -> &SlotPool<Self> {
        &registry.shaders
    }

    fn pool_mut(registry: &mut ResourceRegistry) -> &mut SlotPool<Self> {
        &mut registry.shaders
    }

    fn is_default(defaults: &DefaultResources, handle: Handle<Self>) -> bool {
        [defaults.color_shader, defaults.texture_shader, defaults.both_shader].contains(&handle)
    }

    fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_program(self.program);
        device.delete_stage(self.vertex);
        device.delete_stage(self.fragment);
    }
}

impl Resource for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;

    fn pool(registry: &ResourceRegistry) -> &SlotPool<Self> {
        &registry.textures
    }

    fn pool_mut(registry: &mut ResourceRegistry) -> &mut SlotPool<Self> {
        &mut registry.textures
    }

    fn is_default(defaults: &DefaultResources, handle: Handle<Self>) -> bool {
        defaults.error_texture == handle
    }

    fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_texture(self.id);
    }
}

impl Resource for Mesh {
    const KIND: ResourceKind = ResourceKind::Mesh;

    fn pool(registry: &ResourceRegistry) -> &SlotPool<Self> {
        &registry.meshes
    }

    fn pool_mut(registry: &mut ResourceRegistry) -> &mut SlotPool<Self> {
        &mut registry.meshes
    }

    fn is_default(defaults: &DefaultResources, handle: Handle<Self>) -> bool {
        defaults.test_mesh == handle
    }

    fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_mesh(&self.buffers);
    }
}

impl Resource for Model {
    const KIND: ResourceKind = ResourceKind::Model;

    fn pool(registry: &ResourceRegistry) -> &SlotPool<Self> {
        &registry.models
    }

    fn pool_mut(registry: &mut ResourceRegistry) -> &mut SlotPool<Self> {
        &mut registry.models
    }

    fn is_default(defaults: &DefaultResources, handle: Handle<Self>) -> bool {
        defaults.test_model == handle
    }

    fn destroy<D: GraphicsDevice + ?Sized>(self, _device: &mut D) {}
}

/// Handles of the built-in resources
///
/// Created by [`ResourceRegistry::inject_defaults`]; on a fresh registry each
/// lands at index 0 of its pool (shaders at 0, 1 and 2). Defaults cannot be
/// released individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultResources {
    /// Vertex-color shader, requires [`VertexAttributes::COLOR`]
    pub color_shader: Handle<Shader>,
    /// Textured shader, requires [`VertexAttributes::TEXCOORD`]
    pub texture_shader: Handle<Shader>,
    /// Color-modulated textured shader, requires both attributes
    pub both_shader: Handle<Shader>,
    /// 2x2 purple and black checker
    pub error_texture: Handle<Texture>,
    /// Colored unit cube
    pub test_mesh: Handle<Mesh>,
    /// Cube model at (1, 0, 0), visible only with `show_test_model`
    pub test_model: Handle<Model>,
}

impl DefaultResources {
    /// Pick the default shader that consumes exactly the attributes offered
    #[must_use]
    pub fn shader_for(&self, attributes: VertexAttributes) -> Option<Handle<Shader>> {
        let color = attributes.contains(VertexAttributes::COLOR);
        let texcoord = attributes.contains(VertexAttributes::TEXCOORD);
        match (color, texcoord) {
            (true, true) => Some(self.both_shader),
            (true, false) => Some(self.color_shader),
            (false, true) => Some(self.texture_shader),
            (false, false) => None,
        }
    }
}

/// Occupancy of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Which pool
    pub kind: ResourceKind,
    /// Slots allocated
    pub capacity: usize,
    /// Slots occupied
    pub used: usize,
}

/// Owner of every shader, texture, mesh and model
#[derive(Debug)]
pub struct ResourceRegistry {
    shaders: SlotPool<Shader>,
    textures: SlotPool<Texture>,
    meshes: SlotPool<Mesh>,
    models: SlotPool<Model>,
    defaults: Option<DefaultResources>,
    diagnostics: DiagnosticsConfig,
}

impl ResourceRegistry {
    /// Create empty pools of `capacity` slots each, without defaults
    #[must_use]
    pub fn with_capacity(capacity: usize, diagnostics: DiagnosticsConfig) -> Self {
        Self {
            shaders: SlotPool::with_capacity(capacity),
            textures: SlotPool::with_capacity(capacity),
            meshes: SlotPool::with_capacity(capacity),
            models: SlotPool::with_capacity(capacity),
            defaults: None,
            diagnostics,
        }
    }

    /// Create the pools described by `config` and inject the defaults
    ///
    /// # Errors
    /// Fails if any default resource cannot be created; nothing is left on
    /// the device in that case.
    pub fn new<D: GraphicsDevice + ?Sized>(device: &mut D, config: &RendererConfig) -> RenderResult<Self> {
        let mut registry = Self::with_capacity(config.pool_capacity, config.diagnostics);
        registry.inject_defaults(device, config.diagnostics.show_test_model)?;
        Ok(registry)
    }

    /// Create the built-in shaders, error texture, test mesh and test model
    ///
    /// # Errors
    /// On failure every resource in the registry is destroyed and the error
    /// of the first default that could not be created is returned.
    pub fn inject_defaults<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        show_test_model: bool,
    ) -> RenderResult<DefaultResources> {
        match self.create_defaults(device, show_test_model) {
            Ok(defaults) => {
                self.defaults = Some(defaults);
                Ok(defaults)
            }
            Err(err) => {
                self.destroy_all(device);
                Err(err)
            }
        }
    }

    fn create_defaults<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        show_test_model: bool,
    ) -> RenderResult<DefaultResources> {
        let color_shader = self.create_shader(
            device,
            sources::COLOR_VERTEX,
            sources::COLOR_FRAGMENT,
            VertexAttributes::COLOR,
        )?;
        let texture_shader = self.create_shader(
            device,
            sources::TEXTURE_VERTEX,
            sources::TEXTURE_FRAGMENT,
            VertexAttributes::TEXCOORD,
        )?;
        let both_shader = self.create_shader(
            device,
            sources::BOTH_VERTEX,
            sources::BOTH_FRAGMENT,
            VertexAttributes::COLOR | VertexAttributes::TEXCOORD,
        )?;
        self.verbose(format_args!("created default shaders {color_shader}, {texture_shader}, {both_shader}"));

        let error_texture = self.create_texture(device, &error_texture())?;
        self.verbose(format_args!("created error texture {error_texture}"));

        let test_mesh = self.create_mesh(device, &cube::data())?;
        self.verbose(format_args!("created test mesh {test_mesh}"));

        let template = Model::new(test_mesh, error_texture, color_shader)
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_visible(show_test_model);
        let test_model = self.create_model(&template, false)?;
        self.verbose(format_args!("created test model {test_model}"));

        Ok(DefaultResources {
            color_shader,
            texture_shader,
            both_shader,
            error_texture,
            test_mesh,
            test_model,
        })
    }

    /// Handles of the built-in resources, once injected
    #[must_use]
    pub const fn defaults(&self) -> Option<&DefaultResources> {
        self.defaults.as_ref()
    }

    /// The validity predicate for any resource handle
    #[must_use]
    pub fn is_in_use<T: Resource>(&self, handle: Handle<T>) -> bool {
        T::pool(self).is_in_use(handle)
    }

    /// Borrow any resource behind a valid handle
    #[must_use]
    pub fn get<T: Resource>(&self, handle: Handle<T>) -> Option<&T> {
        T::pool(self).get(handle)
    }

    /// Borrow a model
    #[must_use]
    pub fn get_model(&self, model: Handle<Model>) -> Option<&Model> {
        self.models.get(model)
    }

    /// Iterate live models in handle order
    pub fn models(&self) -> impl Iterator<Item = (Handle<Model>, &Model)> + '_ {
        self.models.iter()
    }

    /// Capacity and occupancy of every pool
    #[must_use]
    pub fn stats(&self) -> [PoolStats; 4] {
        fn of<T: Resource>(registry: &ResourceRegistry) -> PoolStats {
            let pool = T::pool(registry);
            PoolStats {
                kind: T::KIND,
                capacity: pool.capacity(),
                used: pool.len(),
            }
        }
        [of::<Shader>(self), of::<Texture>(self), of::<Mesh>(self), of::<Model>(self)]
    }

    /// Compile, link and register a shader program
    ///
    /// If `requirements` includes [`VertexAttributes::TEXCOORD`], the `tex`
    /// sampler is bound to texture unit 0.
    ///
    /// # Errors
    /// [`RenderError::CompileFailure`] or [`RenderError::LinkFailure`] with
    /// the driver log, or [`RenderError::AllocationFailure`]. No stage or
    /// program survives a failure.
    pub fn create_shader<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        vertex_source: &str,
        fragment_source: &str,
        requirements: VertexAttributes,
    ) -> RenderResult<Handle<Shader>> {
        const CALLER: &str = "create_shader";

        let vertex = match device.compile_stage(ShaderStage::Vertex, vertex_source) {
            Ok(stage) => stage,
            Err(log) => {
                return self.failed(CALLER, RenderError::CompileFailure {
                    stage: ShaderStage::Vertex,
                    log,
                })
            }
        };
        let fragment = match device.compile_stage(ShaderStage::Fragment, fragment_source) {
            Ok(stage) => stage,
            Err(log) => {
                device.delete_stage(vertex);
                return self.failed(CALLER, RenderError::CompileFailure {
                    stage: ShaderStage::Fragment,
                    log,
                });
            }
        };
        let program = match device.link_program(vertex, fragment) {
            Ok(program) => program,
            Err(log) => {
                device.delete_stage(vertex);
                device.delete_stage(fragment);
                return self.failed(CALLER, RenderError::LinkFailure { log });
            }
        };

        let shader = Shader {
            vertex,
            fragment,
            program,
            requirements,
        };
        if shader.uses_texture() {
            device.bind_sampler_unit(program, SAMPLER_UNIFORM, 0);
        }

        self.store(device, shader, CALLER)
    }

    /// Upload RGBA8 pixels and register the texture
    ///
    /// # Errors
    /// [`RenderError::InvalidResourceData`] if the pixel buffer does not match
    /// the dimensions, [`RenderError::Device`] if the upload fails, or
    /// [`RenderError::AllocationFailure`].
    pub fn create_texture<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        data: &TextureData<'_>,
    ) -> RenderResult<Handle<Texture>> {
        const CALLER: &str = "create_texture";

        if let Err(err) = data.validate() {
            return self.failed(CALLER, err);
        }
        let id = match device.upload_texture(data, SamplingPolicy::default()) {
            Ok(id) => id,
            Err(message) => return self.failed(CALLER, RenderError::Device(message)),
        };

        let texture = Texture {
            id,
            width: data.width,
            height: data.height,
        };
        self.store(device, texture, CALLER)
    }

    /// Upload vertex and index arrays and register the mesh
    ///
    /// # Errors
    /// [`RenderError::InvalidResourceData`] for inconsistent arrays,
    /// [`RenderError::Device`] if the upload fails, or
    /// [`RenderError::AllocationFailure`].
    pub fn create_mesh<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        data: &MeshData<'_>,
    ) -> RenderResult<Handle<Mesh>> {
        const CALLER: &str = "create_mesh";

        if let Err(err) = data.validate() {
            return self.failed(CALLER, err);
        }
        let Ok(triangles) = u32::try_from(data.triangle_count()) else {
            return self.failed(CALLER, RenderError::InvalidResourceData {
                kind: ResourceKind::Mesh,
                reason: format!("{} triangles exceed the drawable range", data.triangle_count()),
            });
        };
        let buffers = match device.upload_mesh(data) {
            Ok(buffers) => buffers,
            Err(message) => return self.failed(CALLER, RenderError::Device(message)),
        };

        let mesh = Mesh {
            buffers,
            triangles,
            winding: data.winding,
            attributes: data.attributes(),
        };
        self.store(device, mesh, CALLER)
    }

    /// Register a model built from `template`
    ///
    /// With `use_default_shader` the template's shader is ignored and a
    /// default shader is chosen from the mesh's attributes: colors and uvs
    /// pick the combined shader, colors alone the color shader, uvs alone the
    /// texture shader.
    ///
    /// # Errors
    /// - [`RenderError::InvalidHandle`] for a stale mesh, texture or explicit
    ///   shader
    /// - [`RenderError::NoSuitableShader`] when a default shader is requested
    ///   for a mesh with neither colors nor uvs
    /// - [`RenderError::IncompatibleResources`] when the shader needs
    ///   attributes the mesh lacks
    pub fn create_model(&mut self, template: &Model, use_default_shader: bool) -> RenderResult<Handle<Model>> {
        const CALLER: &str = "create_model";

        let Some(mesh) = self.meshes.get(template.mesh).copied() else {
            return self.failed(CALLER, RenderError::invalid_handle(ResourceKind::Mesh, template.mesh));
        };

        let shader_handle = if use_default_shader {
            match self.defaults.and_then(|d| d.shader_for(mesh.attributes)) {
                Some(shader) => shader,
                None => {
                    return self.failed(CALLER, RenderError::NoSuitableShader { mesh: template.mesh })
                }
            }
        } else {
            template.shader
        };
        let Some(shader) = self.shaders.get(shader_handle).copied() else {
            return self.failed(CALLER, RenderError::invalid_handle(ResourceKind::Shader, shader_handle));
        };

        if !self.textures.is_in_use(template.texture) {
            return self.failed(CALLER, RenderError::invalid_handle(ResourceKind::Texture, template.texture));
        }

        let missing = shader.requirements.difference(mesh.attributes);
        if !missing.is_empty() {
            return self.failed(CALLER, RenderError::IncompatibleResources {
                mesh: template.mesh,
                shader: shader_handle,
                missing,
            });
        }

        let model = Model {
            shader: shader_handle,
            ..*template
        };
        match self.models.insert(model) {
            Ok(handle) => Ok(handle),
            Err(err) => self.failed(CALLER, RenderError::allocation(ResourceKind::Model, err)),
        }
    }

    /// Replace a model's pose
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if `model` is stale; nothing changes.
    pub fn update_model_transform(
        &mut self,
        model: Handle<Model>,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
    ) -> RenderResult<()> {
        let target = self.model_for_update(model, "update_model_transform")?;
        target.position = position;
        target.rotation = rotation;
        target.scale = scale;
        Ok(())
    }

    /// Point a model at another mesh
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if either handle is stale; nothing
    /// changes.
    pub fn update_model_mesh(&mut self, model: Handle<Model>, mesh: Handle<Mesh>) -> RenderResult<()> {
        self.check(mesh, "update_model_mesh")?;
        self.model_for_update(model, "update_model_mesh")?.mesh = mesh;
        Ok(())
    }

    /// Point a model at another texture
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if either handle is stale; nothing
    /// changes.
    pub fn update_model_texture(&mut self, model: Handle<Model>, texture: Handle<Texture>) -> RenderResult<()> {
        self.check(texture, "update_model_texture")?;
        self.model_for_update(model, "update_model_texture")?.texture = texture;
        Ok(())
    }

    /// Point a model at another shader
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if either handle is stale; nothing
    /// changes.
    pub fn update_model_shader(&mut self, model: Handle<Model>, shader: Handle<Shader>) -> RenderResult<()> {
        self.check(shader, "update_model_shader")?;
        self.model_for_update(model, "update_model_shader")?.shader = shader;
        Ok(())
    }

    /// Show or hide a model
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if `model` is stale.
    pub fn update_model_visibility(&mut self, model: Handle<Model>, visible: bool) -> RenderResult<()> {
        self.model_for_update(model, "update_model_visibility")?.visible = visible;
        Ok(())
    }

    /// Apply the pose, mesh, texture and shader of `template` to a model
    ///
    /// The four updates are applied independently: a stale resource handle
    /// in the template skips only that update. The first error is returned.
    ///
    /// # Errors
    /// [`RenderError::InvalidHandle`] if `model` or any template handle is
    /// stale.
    pub fn update_model(&mut self, model: Handle<Model>, template: &Model) -> RenderResult<()> {
        self.check(model, "update_model")?;

        let results = [
            self.update_model_transform(model, template.position, template.rotation, template.scale),
            self.update_model_mesh(model, template.mesh),
            self.update_model_texture(model, template.texture),
            self.update_model_shader(model, template.shader),
        ];
        results.into_iter().collect()
    }

    /// Release a shader and delete its program
    ///
    /// Returns whether anything was released. Stale handles and the default
    /// shaders are refused.
    pub fn release_shader<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, shader: Handle<Shader>) -> bool {
        self.release(device, shader)
    }

    /// Release a texture and delete it from the device
    ///
    /// Returns whether anything was released. Stale handles and the error
    /// texture are refused.
    pub fn release_texture<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, texture: Handle<Texture>) -> bool {
        self.release(device, texture)
    }

    /// Release a mesh and delete its buffers
    ///
    /// Returns whether anything was released. Stale handles and the test mesh
    /// are refused.
    pub fn release_mesh<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, mesh: Handle<Mesh>) -> bool {
        self.release(device, mesh)
    }

    /// Release a model
    ///
    /// Returns whether anything was released. Stale handles and the test
    /// model are refused.
    pub fn release_model(&mut self, model: Handle<Model>) -> bool {
        if !self.releasable(model) {
            return false;
        }
        self.models.release(model).is_some()
    }

    /// Release any resource, destroying its GPU objects
    pub fn release<T: Resource, D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, handle: Handle<T>) -> bool {
        if !self.releasable(handle) {
            return false;
        }
        match T::pool_mut(self).release(handle) {
            Some(resource) => {
                resource.destroy(device);
                log::debug!("released {} {}", T::KIND, handle);
                true
            }
            None => false,
        }
    }

    /// Destroy every resource, defaults included
    ///
    /// All outstanding handles become stale. Pool capacity is kept.
    pub fn destroy_all<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        let models = self.models.drain().len();
        let meshes = Self::destroy_pool(&mut self.meshes, device);
        let textures = Self::destroy_pool(&mut self.textures, device);
        let shaders = Self::destroy_pool(&mut self.shaders, device);
        self.defaults = None;

        log::debug!(
            "destroyed {shaders} shaders, {textures} textures, {meshes} meshes and {models} models"
        );
    }

    fn destroy_pool<T: Resource, D: GraphicsDevice + ?Sized>(pool: &mut SlotPool<T>, device: &mut D) -> usize {
        let resources = pool.drain();
        let count = resources.len();
        for resource in resources {
            resource.destroy(device);
        }
        count
    }

    fn releasable<T: Resource>(&self, handle: Handle<T>) -> bool {
        const CALLER: &str = "release";

        if self.check(handle, CALLER).is_err() {
            return false;
        }
        if self.defaults.is_some_and(|d| T::is_default(&d, handle)) {
            if self.diagnostics.errors {
                log::warn!("{CALLER}: refusing to release default {} {}", T::KIND, handle);
            }
            return false;
        }
        true
    }

    fn store<T: Resource, D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        resource: T,
        caller: &str,
    ) -> RenderResult<Handle<T>>
    where
        T: Copy,
    {
        match T::pool_mut(self).insert(resource) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                resource.destroy(device);
                self.failed(caller, RenderError::allocation(T::KIND, err))
            }
        }
    }

    fn check<T: Resource>(&self, handle: Handle<T>, caller: &str) -> RenderResult<()> {
        if T::pool(self).is_in_use(handle) {
            return Ok(());
        }
        let err = RenderError::invalid_handle(T::KIND, handle);
        if self.diagnostics.errors {
            log::warn!("{caller}: {err}");
        }
        Err(err)
    }

    fn model_for_update(&mut self, model: Handle<Model>, caller: &str) -> RenderResult<&mut Model> {
        self.check(model, caller)?;
        self.models
            .get_mut(model)
            .ok_or_else(|| RenderError::invalid_handle(ResourceKind::Model, model))
    }

    fn failed<T>(&self, caller: &str, err: RenderError) -> RenderResult<T> {
        if self.diagnostics.errors {
            log::error!("{caller}: {err}");
        }
        Err(err)
    }

    fn verbose(&self, message: std::fmt::Arguments<'_>) {
        if self.diagnostics.verbose {
            log::info!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{DeviceCommand, HeadlessDevice};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    const TRIANGLE_COLORS: [f32; 12] = [1.0; 12];
    const TRIANGLE_UVS: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

    fn setup() -> (HeadlessDevice, ResourceRegistry) {
        let mut device = HeadlessDevice::new();
        let registry = ResourceRegistry::new(&mut device, &RendererConfig::default()).unwrap();
        (device, registry)
    }

    fn mesh(
        device: &mut HeadlessDevice,
        registry: &mut ResourceRegistry,
        colors: bool,
        uvs: bool,
    ) -> Handle<Mesh> {
        let mut data = MeshData::new(&TRIANGLE, &TRIANGLE_INDICES);
        if colors {
            data = data.with_colors(&TRIANGLE_COLORS);
        }
        if uvs {
            data = data.with_uvs(&TRIANGLE_UVS);
        }
        registry.create_mesh(device, &data).unwrap()
    }

    #[test]
    fn test_defaults_land_at_start_of_pools() {
        let (_device, registry) = setup();
        let defaults = *registry.defaults().unwrap();

        assert_eq!(defaults.color_shader.index(), 0);
        assert_eq!(defaults.texture_shader.index(), 1);
        assert_eq!(defaults.both_shader.index(), 2);
        assert_eq!(defaults.error_texture.index(), 0);
        assert_eq!(defaults.test_mesh.index(), 0);
        assert_eq!(defaults.test_model.index(), 0);

        let test_model = registry.get_model(defaults.test_model).unwrap();
        assert!(!test_model.visible);
        assert_eq!(test_model.position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_reinjected_defaults_land_at_start_of_pools() {
        let (mut device, mut registry) = setup();
        registry.destroy_all(&mut device);
        let defaults = registry.inject_defaults(&mut device, false).unwrap();

        assert_eq!(defaults.color_shader.index(), 0);
        assert_eq!(defaults.texture_shader.index(), 1);
        assert_eq!(defaults.both_shader.index(), 2);
        assert_eq!(defaults.error_texture.index(), 0);
        assert_eq!(defaults.test_mesh.index(), 0);
        assert_eq!(defaults.test_model.index(), 0);
        assert_ne!(defaults.color_shader.generation(), 0);
    }

    #[test]
    fn test_texture_shaders_bind_sampler_to_unit_zero() {
        let (device, registry) = setup();
        let defaults = registry.defaults().unwrap();
        let program = |h| registry.get::<Shader>(h).unwrap().program();

        let bound: Vec<_> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindSamplerUnit { program, name, unit } => Some((*program, name.clone(), *unit)),
                _ => None,
            })
            .collect();

        assert_eq!(
            bound,
            vec![
                (program(defaults.texture_shader), "tex".to_string(), 0),
                (program(defaults.both_shader), "tex".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_default_shader_selection() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        let texture = defaults.error_texture;

        let cases = [
            (true, false, defaults.color_shader),
            (false, true, defaults.texture_shader),
            (true, true, defaults.both_shader),
        ];
        for (colors, uvs, expected) in cases {
            let mesh = mesh(&mut device, &mut registry, colors, uvs);
            // The template's own shader is ignored.
            let template = Model::new(mesh, texture, Handle::from_raw_parts(99, 0));
            let model = registry.create_model(&template, true).unwrap();
            assert_eq!(registry.get_model(model).unwrap().shader, expected);
        }

        let bare = mesh(&mut device, &mut registry, false, false);
        let err = registry
            .create_model(&Model::new(bare, texture, defaults.color_shader), true)
            .unwrap_err();
        assert!(matches!(err, RenderError::NoSuitableShader { mesh } if mesh == bare));
    }

    #[test]
    fn test_texture_shader_rejects_mesh_without_uvs() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        let colored = mesh(&mut device, &mut registry, true, false);
        let used = registry.stats()[3].used;

        let err = registry
            .create_model(&Model::new(colored, defaults.error_texture, defaults.texture_shader), false)
            .unwrap_err();

        match err {
            RenderError::IncompatibleResources { missing, .. } => {
                assert_eq!(missing, VertexAttributes::TEXCOORD);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.stats()[3].used, used);
    }

    #[test]
    fn test_create_model_checks_every_handle() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        let colored = mesh(&mut device, &mut registry, true, false);
        let stale_texture = Handle::<Texture>::from_raw_parts(0, 7);

        let err = registry
            .create_model(&Model::new(colored, stale_texture, defaults.color_shader), false)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidHandle {
                kind: ResourceKind::Texture,
                ..
            }
        ));

        let err = registry
            .create_model(
                &Model::new(Handle::from_raw_parts(500, 0), defaults.error_texture, defaults.color_shader),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidHandle { kind: ResourceKind::Mesh, .. }));
    }

    #[test]
    fn test_compile_failure_cleans_up_vertex_stage() {
        let (mut device, mut registry) = setup();
        let live = device.live_objects();

        device.fail_next_compile(ShaderStage::Fragment, "0:3: syntax error");
        let err = registry
            .create_shader(&mut device, "vs", "fs", VertexAttributes::COLOR)
            .unwrap_err();

        match err {
            RenderError::CompileFailure { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(log, "0:3: syntax error");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(device.live_objects(), live);
    }

    #[test]
    fn test_link_failure_deletes_both_stages() {
        let (mut device, mut registry) = setup();
        let live = device.live_objects();
        let shaders = registry.stats()[0].used;

        device.fail_next_link("missing main");
        let err = registry
            .create_shader(&mut device, "vs", "fs", VertexAttributes::COLOR)
            .unwrap_err();

        assert!(matches!(err, RenderError::LinkFailure { .. }));
        assert_eq!(device.live_objects(), live);
        assert_eq!(registry.stats()[0].used, shaders);
    }

    #[test]
    fn test_upload_failure_is_device_error() {
        let (mut device, mut registry) = setup();
        device.fail_next_upload("out of memory");
        let err = registry.create_texture(&mut device, &error_texture()).unwrap_err();
        assert!(matches!(err, RenderError::Device(ref msg) if msg == "out of memory"));
    }

    #[test]
    fn test_invalid_texture_never_reaches_device() {
        let (mut device, mut registry) = setup();
        let before = device.commands().len();
        let pixels = [0u8; 3];
        let err = registry
            .create_texture(&mut device, &TextureData::new(1, 1, &pixels))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidResourceData { .. }));
        assert_eq!(device.commands().len(), before);
    }

    #[test]
    fn test_updates_with_stale_handles_change_nothing() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        let colored = mesh(&mut device, &mut registry, true, false);
        let model = registry
            .create_model(&Model::new(colored, defaults.error_texture, defaults.color_shader), false)
            .unwrap();
        let before = *registry.get_model(model).unwrap();

        let stale_mesh = Handle::<Mesh>::from_raw_parts(colored.index(), colored.generation() + 1);
        assert!(registry.update_model_mesh(model, stale_mesh).is_err());
        assert!(registry
            .update_model_texture(model, Handle::from_raw_parts(40, 0))
            .is_err());

        let stale_model = Handle::<Model>::from_raw_parts(model.index(), model.generation() + 1);
        assert!(registry
            .update_model_transform(stale_model, Vec3::x(), Vec3::zeros(), Vec3::x())
            .is_err());

        assert_eq!(*registry.get_model(model).unwrap(), before);
    }

    #[test]
    fn test_update_model_applies_valid_parts() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        let colored = mesh(&mut device, &mut registry, true, false);
        let textured = mesh(&mut device, &mut registry, true, true);
        let model = registry
            .create_model(&Model::new(colored, defaults.error_texture, defaults.color_shader), false)
            .unwrap();

        let mut template = Model::new(textured, Handle::from_raw_parts(31, 0), defaults.both_shader)
            .with_position(Vec3::new(3.0, 0.0, 0.0));
        template.visible = false;

        let result = registry.update_model(model, &template);
        assert!(matches!(
            result,
            Err(RenderError::InvalidHandle {
                kind: ResourceKind::Texture,
                ..
            })
        ));

        let updated = registry.get_model(model).unwrap();
        assert_eq!(updated.position, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(updated.mesh, textured);
        assert_eq!(updated.texture, defaults.error_texture);
        assert_eq!(updated.shader, defaults.both_shader);
        // Visibility is not part of the update.
        assert!(updated.visible);
    }

    #[test]
    fn test_release_destroys_gpu_objects_and_invalidates_handle() {
        let (mut device, mut registry) = setup();
        let live = device.live_objects();
        let textured = mesh(&mut device, &mut registry, false, true);
        assert!(device.live_objects() > live);

        assert!(registry.release_mesh(&mut device, textured));
        assert_eq!(device.live_objects(), live);
        assert!(!registry.is_in_use(textured));
        assert!(!registry.release_mesh(&mut device, textured));
    }

    #[test]
    fn test_defaults_cannot_be_released() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();

        assert!(!registry.release_shader(&mut device, defaults.both_shader));
        assert!(!registry.release_texture(&mut device, defaults.error_texture));
        assert!(!registry.release_mesh(&mut device, defaults.test_mesh));
        assert!(!registry.release_model(defaults.test_model));
        assert!(registry.is_in_use(defaults.both_shader));
        assert!(registry.is_in_use(defaults.test_model));
    }

    #[test]
    fn test_released_slot_is_reused_with_new_generation() {
        let (mut device, mut registry) = setup();
        let first = mesh(&mut device, &mut registry, true, false);
        assert!(registry.release_mesh(&mut device, first));

        let second = mesh(&mut device, &mut registry, true, false);
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(!registry.is_in_use(first));
        assert!(registry.is_in_use(second));
    }

    #[test]
    fn test_pools_grow_past_initial_capacity() {
        let mut device = HeadlessDevice::new();
        let config = RendererConfig::default().with_pool_capacity(1);
        let mut registry = ResourceRegistry::new(&mut device, &config).unwrap();

        // Three default shaders in a pool of one: 1 -> 2 -> 4.
        assert_eq!(registry.stats()[0].capacity, 4);
        assert_eq!(registry.stats()[0].used, 3);

        let handles: Vec<_> = (0..5).map(|_| mesh(&mut device, &mut registry, true, false)).collect();
        assert!(handles.iter().all(|&h| registry.is_in_use(h)));
        assert_eq!(registry.stats()[2].capacity, 8);
    }

    #[test]
    fn test_destroy_all_leaves_nothing_on_device() {
        let (mut device, mut registry) = setup();
        let defaults = *registry.defaults().unwrap();
        mesh(&mut device, &mut registry, true, true);

        registry.destroy_all(&mut device);

        assert_eq!(device.live_objects(), 0);
        assert!(registry.defaults().is_none());
        assert!(!registry.is_in_use(defaults.color_shader));
        assert!(registry.stats().iter().all(|s| s.used == 0));
    }

    #[test]
    fn test_failed_defaults_leave_nothing_behind() {
        let mut device = HeadlessDevice::new();
        device.fail_next_link("driver says no");

        let err = ResourceRegistry::new(&mut device, &RendererConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::LinkFailure { .. }));
        assert_eq!(device.live_objects(), 0);
    }
}
