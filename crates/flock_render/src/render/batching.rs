//! # State-Sorted Batching
//!
//! Collects the frame's visible models, sorts them so models sharing GPU
//! state end up adjacent, and emits draw calls that touch device state only
//! when it actually changes.
//!
//! ## Cost Model
//!
//! Program switches are the most expensive transition, then texture binds,
//! then vertex array binds. Sorting by `(shader, texture, mesh)` groups the
//! expensive keys into the longest runs, so the number of binds of each kind
//! is bounded by the number of distinct runs of that key rather than by the
//! model count.
//!
//! ## Frame Memory
//!
//! The draw lists are reused across frames: they are cleared each frame but
//! never shrunk, so a steady scene stops allocating after the first frame.

use std::time::Instant;

use crate::foundation::collections::Handle;
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::render::device::GraphicsDevice;
use crate::render::resources::{
    Mesh, Model, ResourceRegistry, Shader, Texture, MODEL_UNIFORM, PROJECTION_UNIFORM, VIEW_UNIFORM,
};

/// One model scheduled for the 3D pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    /// Model being drawn
    pub model: Handle<Model>,
    /// Shader resolved for this frame
    pub shader: Handle<Shader>,
    /// Texture resolved for this frame
    pub texture: Handle<Texture>,
    /// Mesh resolved for this frame
    pub mesh: Handle<Mesh>,
}

impl DrawItem {
    /// Ordering key: most expensive state first
    #[must_use]
    pub const fn sort_key(&self) -> (Handle<Shader>, Handle<Texture>, Handle<Mesh>) {
        (self.shader, self.texture, self.mesh)
    }
}

/// Counters for one emitted draw sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Models collected for the 3D pass
    pub total_commands: usize,
    /// Models skipped because a referenced resource was gone
    pub skipped: usize,
    /// Program switches
    pub program_binds: usize,
    /// Texture unit 0 binds
    pub texture_binds: usize,
    /// Vertex array binds
    pub mesh_binds: usize,
    /// Indexed draw calls
    pub draw_calls: usize,
    /// Time spent collecting and sorting (microseconds)
    pub collection_time_us: u64,
    /// Time spent issuing device calls (microseconds)
    pub submission_time_us: u64,
}

impl BatchStats {
    /// Total GPU state transitions
    #[must_use]
    pub const fn state_changes(&self) -> usize {
        self.program_binds + self.texture_binds + self.mesh_binds
    }

    /// Total frame time in microseconds
    #[must_use]
    pub const fn total_time_us(&self) -> u64 {
        self.collection_time_us + self.submission_time_us
    }
}

/// Per-frame draw list builder and emitter
#[derive(Debug, Default)]
pub struct Batcher {
    items: Vec<DrawItem>,
    ui_items: Vec<Handle<Model>>,
    stats: BatchStats,
    // Skips found while collecting; emission adds its own on top.
    collected_skipped: usize,
}

impl Batcher {
    /// Create a batcher whose lists start with room for `capacity` models
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            ui_items: Vec::with_capacity(capacity),
            stats: BatchStats::default(),
            collected_skipped: 0,
        }
    }

    /// Collect and sort this frame's 3D models
    ///
    /// Walks the model pool in handle order and keeps every visible, non-UI
    /// model whose mesh, texture and shader are all still alive. Visible UI
    /// models go to a separate list. The 3D list is sorted by
    /// [`DrawItem::sort_key`]; the relative order of equal keys is
    /// unspecified.
    pub fn prepare_draw_list(&mut self, registry: &ResourceRegistry) -> &[DrawItem] {
        let start = Instant::now();
        self.items.clear();
        self.ui_items.clear();
        self.stats = BatchStats::default();

        for (handle, model) in registry.models() {
            if !model.visible {
                continue;
            }
            if model.ui {
                self.ui_items.push(handle);
                continue;
            }
            if !(registry.is_in_use(model.mesh)
                && registry.is_in_use(model.texture)
                && registry.is_in_use(model.shader))
            {
                log::debug!("skipping model {handle}: references a released resource");
                self.stats.skipped += 1;
                continue;
            }

            self.items.push(DrawItem {
                model: handle,
                shader: model.shader,
                texture: model.texture,
                mesh: model.mesh,
            });
        }

        self.items.sort_unstable_by_key(DrawItem::sort_key);
        self.collected_skipped = self.stats.skipped;
        self.stats.total_commands = self.items.len();
        self.stats.collection_time_us = start.elapsed().as_micros() as u64;
        &self.items
    }

    /// The sorted 3D list from the last [`Self::prepare_draw_list`]
    #[must_use]
    pub fn draw_list(&self) -> &[DrawItem] {
        &self.items
    }

    /// Visible UI models from the last [`Self::prepare_draw_list`]
    #[must_use]
    pub fn ui_list(&self) -> &[Handle<Model>] {
        &self.ui_items
    }

    /// Statistics of the last prepared and emitted frame
    #[must_use]
    pub const fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Issue the prepared 3D list to the device
    ///
    /// The program is switched only when the shader changes from the
    /// previous item, and `view` and `persp` are uploaded on each switch. The
    /// texture and mesh are rebound only when they change. Every item gets
    /// its own `model` uniform and one indexed draw. The emission counters
    /// describe this call only, so emitting the same list twice reports the
    /// same numbers both times.
    pub fn emit_draw_sequence<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        registry: &ResourceRegistry,
        view: &Mat4,
        projection: &Mat4,
    ) -> BatchStats {
        let start = Instant::now();
        self.stats = BatchStats {
            total_commands: self.stats.total_commands,
            skipped: self.collected_skipped,
            collection_time_us: self.stats.collection_time_us,
            ..BatchStats::default()
        };
        let mut current_shader: Option<Handle<Shader>> = None;
        let mut current_texture: Option<Handle<Texture>> = None;
        let mut current_mesh: Option<Handle<Mesh>> = None;

        for item in &self.items {
            let (Some(model), Some(shader), Some(texture), Some(mesh)) = (
                registry.get_model(item.model),
                registry.get::<Shader>(item.shader),
                registry.get::<Texture>(item.texture),
                registry.get::<Mesh>(item.mesh),
            ) else {
                self.stats.skipped += 1;
                continue;
            };

            if current_shader != Some(item.shader) {
                device.use_program(shader.program());
                device.set_uniform_mat4(shader.program(), VIEW_UNIFORM, view);
                device.set_uniform_mat4(shader.program(), PROJECTION_UNIFORM, projection);
                current_shader = Some(item.shader);
                self.stats.program_binds += 1;
            }

            if current_texture != Some(item.texture) {
                device.bind_texture(0, texture.id());
                current_texture = Some(item.texture);
                self.stats.texture_binds += 1;
            }

            if current_mesh != Some(item.mesh) {
                device.bind_mesh(mesh.buffers().vertex_array);
                device.set_front_face(mesh.winding());
                current_mesh = Some(item.mesh);
                self.stats.mesh_binds += 1;
            }

            device.set_uniform_mat4(shader.program(), MODEL_UNIFORM, &model.model_matrix());
            device.draw_elements(mesh.element_count());
            self.stats.draw_calls += 1;
        }

        self.stats.submission_time_us = start.elapsed().as_micros() as u64;
        log::trace!(
            "Emitted {} draws with {} state changes",
            self.stats.draw_calls,
            self.stats.state_changes()
        );
        self.stats
    }

    /// Switch to screen space for the UI pass
    ///
    /// Sets up an orthographic projection over `0..width` by `0..height`
    /// with depth `0..1` and disables depth testing. Returns the projection.
    pub fn emit_ui_pass<D: GraphicsDevice + ?Sized>(&self, device: &mut D, width: u32, height: u32) -> Mat4 {
        let projection = Mat4::orthographic(0.0, width as f32, 0.0, height as f32, 0.0, 1.0);
        device.set_depth_test(false);
        // TODO: sort and draw `ui_items` under `projection` once UI models
        // carry screen-space meshes.
        if !self.ui_items.is_empty() {
            log::trace!("{} UI models collected, UI drawing not enabled", self.ui_items.len());
        }
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiagnosticsConfig, RendererConfig};
    use crate::foundation::math::Vec3;
    use crate::render::device::{DeviceCommand, HeadlessDevice};
    use crate::render::resources::{DefaultResources, MeshData, TextureData};

    const QUAD: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    const QUAD_COLORS: [f32; 16] = [1.0; 16];
    const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];
    const WHITE: [u8; 4] = [255; 4];

    struct Scene {
        device: HeadlessDevice,
        registry: ResourceRegistry,
        defaults: DefaultResources,
    }

    impl Scene {
        fn new() -> Self {
            let mut device = HeadlessDevice::new();
            let registry = ResourceRegistry::new(&mut device, &RendererConfig::default()).unwrap();
            let defaults = *registry.defaults().unwrap();
            Self {
                device,
                registry,
                defaults,
            }
        }

        fn mesh(&mut self) -> Handle<Mesh> {
            let data = MeshData::new(&QUAD, &QUAD_INDICES)
                .with_colors(&QUAD_COLORS)
                .with_uvs(&QUAD_UVS);
            self.registry.create_mesh(&mut self.device, &data).unwrap()
        }

        fn texture(&mut self) -> Handle<Texture> {
            self.registry
                .create_texture(&mut self.device, &TextureData::new(1, 1, &WHITE))
                .unwrap()
        }

        fn model(&mut self, mesh: Handle<Mesh>, texture: Handle<Texture>, shader: Handle<Shader>) -> Handle<Model> {
            self.registry
                .create_model(&Model::new(mesh, texture, shader), false)
                .unwrap()
        }
    }

    fn count(device: &HeadlessDevice, matches: impl Fn(&DeviceCommand) -> bool) -> usize {
        device.commands().iter().filter(|c| matches(c)).count()
    }

    #[test]
    fn test_invisible_and_ui_models_are_not_drawn() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let shader = scene.defaults.both_shader;
        let texture = scene.defaults.error_texture;

        let shown = scene.model(mesh, texture, shader);
        let hidden = scene.model(mesh, texture, shader);
        scene.registry.update_model_visibility(hidden, false).unwrap();
        let ui = scene
            .registry
            .create_model(&Model::new(mesh, texture, shader).with_ui(true), false)
            .unwrap();

        let mut batcher = Batcher::with_capacity(4);
        let list = batcher.prepare_draw_list(&scene.registry);

        // The default test model is hidden unless enabled in the config.
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].model, shown);
        assert_eq!(batcher.ui_list(), &[ui]);
    }

    #[test]
    fn test_list_is_sorted_by_shader_then_texture() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let t0 = scene.defaults.error_texture;
        let t1 = scene.texture();
        let s_both = scene.defaults.both_shader;
        let s_tex = scene.defaults.texture_shader;

        scene.model(mesh, t1, s_both);
        scene.model(mesh, t0, s_tex);
        scene.model(mesh, t0, s_both);
        scene.model(mesh, t1, s_tex);

        let mut batcher = Batcher::default();
        let keys: Vec<_> = batcher
            .prepare_draw_list(&scene.registry)
            .iter()
            .map(|item| (item.shader, item.texture))
            .collect();

        assert_eq!(keys, vec![(s_tex, t0), (s_tex, t1), (s_both, t0), (s_both, t1)]);
    }

    #[test]
    fn test_binds_only_on_change() {
        let mut scene = Scene::new();
        let meshes = [scene.mesh(), scene.mesh()];
        let textures = [scene.defaults.error_texture, scene.texture()];
        let shaders = [scene.defaults.texture_shader, scene.defaults.both_shader];

        // Two models per (shader, texture) pair, all three kinds in use.
        for (s, shader) in shaders.iter().enumerate() {
            for (t, texture) in textures.iter().enumerate() {
                for _ in 0..2 {
                    scene.model(meshes[s ^ t], *texture, *shader);
                }
            }
        }

        let mut batcher = Batcher::with_capacity(2);
        batcher.prepare_draw_list(&scene.registry);
        scene.device.clear_commands();
        let stats = batcher.emit_draw_sequence(
            &mut scene.device,
            &scene.registry,
            &Mat4::identity(),
            &Mat4::identity(),
        );

        assert_eq!(stats.draw_calls, 8);
        assert_eq!(stats.program_binds, 2);
        assert!(stats.texture_binds <= 4);
        assert!(stats.mesh_binds <= 4);
        assert_eq!(count(&scene.device, |c| matches!(c, DeviceCommand::UseProgram(_))), 2);
        assert_eq!(count(&scene.device, |c| matches!(c, DeviceCommand::DrawElements(6))), 8);
    }

    #[test]
    fn test_emitting_twice_reports_same_stats() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let texture = scene.defaults.error_texture;
        scene.model(mesh, texture, scene.defaults.texture_shader);
        scene.model(mesh, texture, scene.defaults.both_shader);

        let mut batcher = Batcher::default();
        batcher.prepare_draw_list(&scene.registry);
        let first = batcher.emit_draw_sequence(&mut scene.device, &scene.registry, &Mat4::identity(), &Mat4::identity());
        let second = batcher.emit_draw_sequence(&mut scene.device, &scene.registry, &Mat4::identity(), &Mat4::identity());

        assert_eq!(first.draw_calls, 2);
        assert_eq!(second.draw_calls, first.draw_calls);
        assert_eq!(second.program_binds, first.program_binds);
        assert_eq!(second.texture_binds, first.texture_binds);
        assert_eq!(second.mesh_binds, first.mesh_binds);
        assert_eq!(second.total_commands, 2);
        assert_eq!(batcher.stats().draw_calls, 2);
    }

    #[test]
    fn test_view_and_projection_uploaded_per_program_switch() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let texture = scene.defaults.error_texture;
        scene.model(mesh, texture, scene.defaults.texture_shader);
        scene.model(mesh, texture, scene.defaults.texture_shader);
        scene.model(mesh, texture, scene.defaults.both_shader);

        let mut batcher = Batcher::default();
        batcher.prepare_draw_list(&scene.registry);
        scene.device.clear_commands();
        batcher.emit_draw_sequence(&mut scene.device, &scene.registry, &Mat4::identity(), &Mat4::identity());

        let uniform = |name: &str| {
            count(&scene.device, |c| {
                matches!(c, DeviceCommand::SetUniformMat4 { name: n, .. } if n == name)
            })
        };
        assert_eq!(uniform(VIEW_UNIFORM), 2);
        assert_eq!(uniform(PROJECTION_UNIFORM), 2);
        assert_eq!(uniform(MODEL_UNIFORM), 3);
    }

    #[test]
    fn test_model_uniform_carries_pose() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let model = scene.model(mesh, scene.defaults.error_texture, scene.defaults.both_shader);
        let position = Vec3::new(4.0, -1.0, 2.0);
        scene
            .registry
            .update_model_transform(model, position, Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
            .unwrap();

        let mut batcher = Batcher::default();
        batcher.prepare_draw_list(&scene.registry);
        batcher.emit_draw_sequence(&mut scene.device, &scene.registry, &Mat4::identity(), &Mat4::identity());

        let uploaded = scene.device.commands().iter().find_map(|c| match c {
            DeviceCommand::SetUniformMat4 { name, value, .. } if name == MODEL_UNIFORM => Some(*value),
            _ => None,
        });
        assert_eq!(uploaded, Some(Mat4::new_translation(&position)));
    }

    #[test]
    fn test_stale_references_are_skipped() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let texture = scene.texture();
        scene.model(mesh, texture, scene.defaults.both_shader);
        scene.model(mesh, scene.defaults.error_texture, scene.defaults.both_shader);
        assert!(scene.registry.release_texture(&mut scene.device, texture));

        let mut batcher = Batcher::default();
        assert_eq!(batcher.prepare_draw_list(&scene.registry).len(), 1);
        assert_eq!(batcher.stats().skipped, 1);
    }

    #[test]
    fn test_ui_pass_disables_depth_and_uses_ortho() {
        let mut device = HeadlessDevice::new();
        let registry = ResourceRegistry::with_capacity(2, DiagnosticsConfig::default());
        let mut batcher = Batcher::default();
        batcher.prepare_draw_list(&registry);

        let projection = batcher.emit_ui_pass(&mut device, 800, 600);

        assert_eq!(device.commands(), &[DeviceCommand::SetDepthTest(false)]);
        let corner = projection.transform_point(&crate::foundation::math::Point3::new(800.0, 600.0, 0.0));
        approx::assert_relative_eq!(corner.x, 1.0, epsilon = 1e-6);
        approx::assert_relative_eq!(corner.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lists_keep_capacity_between_frames() {
        let mut scene = Scene::new();
        let mesh = scene.mesh();
        let models: Vec<_> = (0..16)
            .map(|_| scene.model(mesh, scene.defaults.error_texture, scene.defaults.both_shader))
            .collect();

        let mut batcher = Batcher::with_capacity(1);
        batcher.prepare_draw_list(&scene.registry);
        let grown = batcher.items.capacity();
        assert!(grown >= 16);

        for model in models {
            scene.registry.release_model(model);
        }
        batcher.prepare_draw_list(&scene.registry);
        assert!(batcher.draw_list().is_empty());
        assert_eq!(batcher.items.capacity(), grown);
    }
}
