//! # Flock Render
//!
//! A small immediate-mode renderer for OpenGL 3.3 built around two ideas:
//!
//! - **Stable handles**: shaders, textures, meshes and models live in
//!   generational slot pools and are referred to by typed handles that
//!   survive pool growth and detect reuse of released slots.
//! - **State-sorted drawing**: each frame the visible models are sorted by
//!   shader, texture and mesh so the device is rebound only when state
//!   actually changes.
//!
//! ## Quick Start
//!
//! ```rust
//! use flock_render::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let mut renderer = Renderer::new(HeadlessDevice::new(), RendererConfig::default())?;
//!
//!     let cube = renderer.defaults().test_mesh;
//!     let texture = renderer.defaults().error_texture;
//!     let template = Model::new(cube, texture, renderer.defaults().color_shader)
//!         .with_position(Vec3::new(0.0, 0.0, -3.0));
//!     let model = renderer.create_model(&template, true)?;
//!
//!     renderer.update_camera(0.0, -90.0, 70.0, 0.0, Vec3::zeros());
//!     let frame = renderer.draw(1.0 / 60.0);
//!     assert_eq!(frame.batch.draw_calls, 1);
//!     assert!(renderer.release_model(model));
//!     Ok(())
//! }
//! ```
//!
//! With the default `gl` feature, [`render::GlDevice`] drives a real context
//! loaded through the window system's `get_proc_address`.

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::config::{Config, ConfigError, DiagnosticsConfig, RendererConfig};
    pub use crate::foundation::collections::Handle;
    pub use crate::foundation::math::{Mat4, Vec3};
    #[cfg(feature = "gl")]
    pub use crate::render::GlDevice;
    pub use crate::render::{
        Camera, CameraData, FrameStats, GraphicsDevice, HeadlessDevice, Mesh, MeshData, Model,
        RenderError, RenderResult, Renderer, Shader, ShaderStage, Texture, TextureData,
        VertexAttributes, Winding,
    };
}
