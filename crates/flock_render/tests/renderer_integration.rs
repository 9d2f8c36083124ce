//! End-to-end tests driving a renderer over the recording device

use flock_render::foundation::logging;
use flock_render::prelude::*;
use flock_render::render::DeviceCommand;

const QUAD: [f32; 12] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0];
const QUAD_COLORS: [f32; 16] = [1.0; 16];
const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];
const CHECKER: [u8; 16] = [
    255, 255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255, 255,
];

fn renderer() -> Renderer<HeadlessDevice> {
    logging::init_for_tests();
    Renderer::new(HeadlessDevice::new(), RendererConfig::default()).unwrap()
}

fn textured_quad(renderer: &mut Renderer<HeadlessDevice>) -> Handle<Mesh> {
    let data = MeshData::new(&QUAD, &QUAD_INDICES)
        .with_colors(&QUAD_COLORS)
        .with_uvs(&QUAD_UVS);
    renderer.create_mesh(&data).unwrap()
}

fn program_binds(renderer: &Renderer<HeadlessDevice>) -> usize {
    renderer
        .device()
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::UseProgram(_)))
        .count()
}

#[test]
fn test_eight_models_over_two_of_each_resource() {
    let mut renderer = renderer();
    let meshes = [textured_quad(&mut renderer), textured_quad(&mut renderer)];
    let textures = [
        renderer.defaults().error_texture,
        renderer
            .create_texture(&TextureData::new(2, 2, &CHECKER))
            .unwrap(),
    ];
    let shaders = [renderer.defaults().texture_shader, renderer.defaults().both_shader];

    // Created in an order that interleaves shaders so the sort has work to do.
    for i in 0..8usize {
        let shader = shaders[i % 2];
        let texture = textures[(i / 2) % 2];
        let mesh = meshes[(i % 2) ^ ((i / 2) % 2)];
        let template = Model::new(mesh, texture, shader).with_position(Vec3::new(i as f32, 0.0, 0.0));
        renderer.create_model(&template, false).unwrap();
    }

    renderer.device_mut().clear_commands();
    let frame = renderer.draw(1.0 / 60.0);

    assert_eq!(frame.batch.draw_calls, 8);
    assert_eq!(frame.batch.program_binds, 2);
    assert!(frame.batch.texture_binds <= 4);
    assert!(frame.batch.mesh_binds <= 4);
    assert_eq!(program_binds(&renderer), 2);
}

#[test]
fn test_default_shader_follows_mesh_attributes() {
    let mut renderer = renderer();
    let texture = renderer.defaults().error_texture;
    let placeholder = renderer.defaults().color_shader;

    let colored = renderer
        .create_mesh(&MeshData::new(&QUAD, &QUAD_INDICES).with_colors(&QUAD_COLORS))
        .unwrap();
    let uv_only = renderer
        .create_mesh(&MeshData::new(&QUAD, &QUAD_INDICES).with_uvs(&QUAD_UVS))
        .unwrap();
    let both = textured_quad(&mut renderer);
    let bare = renderer.create_mesh(&MeshData::new(&QUAD, &QUAD_INDICES)).unwrap();

    let shader_of = |renderer: &mut Renderer<HeadlessDevice>, mesh| {
        let model = renderer
            .create_model(&Model::new(mesh, texture, placeholder), true)
            .unwrap();
        renderer.get_model(model).unwrap().shader
    };

    assert_eq!(shader_of(&mut renderer, colored), renderer.defaults().color_shader);
    assert_eq!(shader_of(&mut renderer, uv_only), renderer.defaults().texture_shader);
    assert_eq!(shader_of(&mut renderer, both), renderer.defaults().both_shader);

    let err = renderer
        .create_model(&Model::new(bare, texture, placeholder), true)
        .unwrap_err();
    assert!(matches!(err, RenderError::NoSuitableShader { .. }));
}

#[test]
fn test_custom_shader_lifecycle() {
    let mut renderer = renderer();
    let shader = renderer
        .create_shader(
            flock_render::render::resources::sources::TEXTURE_VERTEX,
            flock_render::render::resources::sources::TEXTURE_FRAGMENT,
            VertexAttributes::TEXCOORD,
        )
        .unwrap();
    let mesh = textured_quad(&mut renderer);
    let texture = renderer.defaults().error_texture;
    let model = renderer
        .create_model(&Model::new(mesh, texture, shader), false)
        .unwrap();

    assert_eq!(renderer.draw(0.0).batch.draw_calls, 1);

    // Releasing the shader leaves the model in place but undrawable.
    assert!(renderer.release_shader(shader));
    assert!(renderer.is_in_use(model));
    let frame = renderer.draw(0.0);
    assert_eq!(frame.batch.draw_calls, 0);
    assert_eq!(frame.batch.skipped, 1);

    // Pointing it back at a live shader makes it drawable again.
    let both = renderer.defaults().both_shader;
    renderer.update_model_shader(model, both).unwrap();
    assert_eq!(renderer.draw(0.0).batch.draw_calls, 1);
}

#[test]
fn test_stale_model_updates_are_rejected() {
    let mut renderer = renderer();
    let mesh = textured_quad(&mut renderer);
    let texture = renderer.defaults().error_texture;
    let model = renderer
        .create_model(&Model::new(mesh, texture, renderer.defaults().both_shader), false)
        .unwrap();
    assert!(renderer.release_model(model));

    let err = renderer
        .update_model_transform(model, Vec3::x(), Vec3::zeros(), Vec3::x())
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidHandle { .. }));
    assert!(renderer.get_model(model).is_none());
}

#[test]
fn test_ui_models_collected_but_not_drawn() {
    let mut renderer = renderer();
    let mesh = textured_quad(&mut renderer);
    let texture = renderer.defaults().error_texture;
    let template = Model::new(mesh, texture, renderer.defaults().both_shader).with_ui(true);
    renderer.create_model(&template, false).unwrap();

    let frame = renderer.draw(0.0);
    assert_eq!(frame.ui_models, 1);
    assert_eq!(frame.batch.draw_calls, 0);
}

#[test]
fn test_independent_renderers_keep_separate_pools() {
    let mut first = renderer();
    let mut second = renderer();
    let mesh = textured_quad(&mut first);

    assert!(first.is_in_use(mesh));
    assert!(!second.is_in_use(mesh));
    assert!(!second.release_mesh(mesh));
    assert_eq!(first.stats()[2].used, second.stats()[2].used + 1);
}

#[test]
fn test_drop_releases_everything_on_the_device() {
    logging::init_for_tests();
    let mut device = HeadlessDevice::new();
    {
        let mut renderer = Renderer::new(&mut device, RendererConfig::default()).unwrap();
        let data = MeshData::new(&QUAD, &QUAD_INDICES).with_uvs(&QUAD_UVS);
        renderer.create_mesh(&data).unwrap();
        renderer
            .create_texture(&TextureData::new(2, 2, &CHECKER))
            .unwrap();
        renderer.draw(0.0);
        assert!(renderer.device().live_objects() > 0);
    }

    assert_eq!(device.live_objects(), 0);
    assert!(device
        .commands()
        .iter()
        .any(|c| matches!(c, DeviceCommand::DeleteProgram(_))));
}
