//! Boids demo: fly around a ring of spinning cubes
//!
//! WASD to move, space and left control to rise and sink, mouse to look and
//! the wheel to tune acceleration. Escape releases the cursor, a left click
//! captures it again, and closing the window quits.

mod config;
mod world;

use std::path::{Path, PathBuf};

use clap::Parser;
use flock_render::config::{Config, ConfigError};
use flock_render::foundation::logging;
use flock_render::prelude::*;
use glfw::{Action, Context, Key, MouseButton, WindowEvent};
use thiserror::Error;

use config::AppConfig;
use world::{Controls, Player, Scenery};

/// Startup and runtime failures of the demo
#[derive(Error, Debug)]
enum AppError {
    #[error("Window system error: {0}")]
    Window(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load texture {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
}

/// How chatty startup and shutdown are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Silent,
    Verbose,
    SuperVerbose,
}

/// Fly around a ring of spinning cubes
#[derive(Parser, Debug)]
#[command(name = "boids")]
struct Cli {
    /// Report errors only
    #[arg(short = 's', long, conflicts_with_all = ["verbose", "super_verbose"])]
    silent: bool,

    /// Report application milestones (default)
    #[arg(short = 'v', long, conflicts_with = "super_verbose")]
    verbose: bool,

    /// Also report renderer internals
    #[arg(short = 'V', long)]
    super_verbose: bool,

    /// Configuration file (TOML or RON)
    #[arg(short, long, default_value = "boids.toml")]
    config: PathBuf,
}

impl Cli {
    const fn verbosity(&self) -> Verbosity {
        if self.silent {
            Verbosity::Silent
        } else if self.super_verbose {
            Verbosity::SuperVerbose
        } else {
            Verbosity::Verbose
        }
    }
}

// Fields drop in order: the renderer must release its GL objects while the
// window, and with it the context, is still alive.
struct BoidsApp {
    renderer: Renderer<GlDevice>,
    scenery: Scenery,
    player: Player,
    captured: bool,
    last_cursor: Option<(f64, f64)>,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    glfw: glfw::Glfw,
}

impl BoidsApp {
    fn new(config: AppConfig) -> Result<Self, AppError> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|e| AppError::Window(e.to_string()))?;
        glfw.window_hint(glfw::WindowHint::ContextVersion(3, 3));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(glfw::OpenGlProfileHint::Core));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(true));
        glfw.window_hint(glfw::WindowHint::Resizable(config.window.resizable));

        let (mut window, events) = glfw
            .create_window(
                config.window.width,
                config.window.height,
                &config.window.title,
                glfw::WindowMode::Windowed,
            )
            .ok_or_else(|| AppError::Window("window creation failed".to_string()))?;
        window.make_current();
        glfw.set_swap_interval(glfw::SwapInterval::Sync(1));

        window.set_key_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_mode(glfw::CursorMode::Disabled);
        log::info!("Window created: {}x{}", config.window.width, config.window.height);

        #[allow(unsafe_code)]
        // SAFETY: the window's GL 3.3 context was made current above, and the
        // window is declared after the renderer so it is dropped later.
        let device = unsafe { GlDevice::from_loader(|name| window.get_proc_address(name) as *const _) };

        let (width, height) = window.get_framebuffer_size();
        let renderer_config = config
            .renderer
            .clone()
            .with_viewport(width.max(0) as u32, height.max(0) as u32);
        let mut renderer = Renderer::new(device, renderer_config)?;
        log::info!("Renderer initialized");

        let texture = match &config.scene.texture {
            Some(path) => Some(load_texture(&mut renderer, Path::new(path))?),
            None => None,
        };
        let scenery = Scenery::build(
            &mut renderer,
            config.scene.ring_size,
            config.scene.ring_radius,
            texture,
        )?;
        log::info!("Scenery ready with {} models", scenery.model_count());

        let player = Player {
            sensitivity: config.scene.sensitivity,
            inverted: config.scene.inverted,
            ..Player::default()
        };

        Ok(Self {
            renderer,
            scenery,
            player,
            captured: true,
            last_cursor: None,
            window,
            events,
            glfw,
        })
    }

    fn run(&mut self) -> Result<(), AppError> {
        let mut last = self.glfw.get_time();
        while !self.window.should_close() {
            let now = self.glfw.get_time();
            let delta_time = (now - last) as f32;
            last = now;

            let controls = self.poll_controls();
            self.player.update(delta_time, &controls, self.captured);
            self.player.apply_to(&mut self.renderer);
            self.scenery.tick(&mut self.renderer, delta_time)?;

            let frame = self.renderer.draw(delta_time);
            if frame.frame % 600 == 0 {
                log::debug!(
                    "Frame {}: {} draws, {} state changes in {}us",
                    frame.frame,
                    frame.batch.draw_calls,
                    frame.batch.state_changes(),
                    frame.batch.total_time_us()
                );
            }
            self.window.swap_buffers();
        }
        Ok(())
    }

    fn poll_controls(&mut self) -> Controls {
        self.glfw.poll_events();

        let events: Vec<WindowEvent> = glfw::flush_messages(&self.events).map(|(_, event)| event).collect();
        let mut controls = Controls::default();
        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    self.set_captured(false);
                }
                WindowEvent::MouseButton(MouseButton::Button1, Action::Press, _) => {
                    self.set_captured(true);
                }
                WindowEvent::CursorPos(x, y) => {
                    if let Some((last_x, last_y)) = self.last_cursor {
                        controls.mouse_delta.0 += x - last_x;
                        controls.mouse_delta.1 += y - last_y;
                    }
                    self.last_cursor = Some((x, y));
                }
                WindowEvent::Scroll(_, y) => controls.scroll += y,
                WindowEvent::FramebufferSize(width, height) => {
                    self.renderer.resize(width.max(0) as u32, height.max(0) as u32);
                }
                _ => {}
            }
        }

        let held = |key| self.window.get_key(key) == Action::Press;
        controls.forward = held(Key::W);
        controls.backward = held(Key::S);
        controls.left = held(Key::A);
        controls.right = held(Key::D);
        controls.up = held(Key::Space);
        controls.down = held(Key::LeftControl);
        controls
    }

    fn set_captured(&mut self, captured: bool) {
        if self.captured == captured {
            return;
        }
        self.captured = captured;
        self.last_cursor = None;
        self.window.set_cursor_mode(if captured {
            glfw::CursorMode::Disabled
        } else {
            glfw::CursorMode::Normal
        });
        log::debug!("Cursor {}", if captured { "captured" } else { "released" });
    }
}

/// Decode a PNG into RGBA8, flipped so row 0 is the bottom, and upload it
fn load_texture(renderer: &mut Renderer<GlDevice>, path: &Path) -> Result<Handle<Texture>, AppError> {
    let image = image::open(path)
        .map_err(|source| AppError::Image {
            path: path.display().to_string(),
            source,
        })?
        .flipv()
        .into_rgba8();
    let (width, height) = image.dimensions();
    let texture = renderer.create_texture(&TextureData::new(width, height, image.as_raw()))?;
    log::info!("Loaded texture {} ({width}x{height})", path.display());
    Ok(texture)
}

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();
    logging::init();

    let mut config = match AppConfig::load_or_default(&cli.config).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Bad configuration in {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    config.renderer.diagnostics.verbose = verbosity == Verbosity::SuperVerbose;

    let mut app = match BoidsApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Failed to start boids: {e}");
            std::process::exit(1);
        }
    };
    if verbosity != Verbosity::Silent {
        log::info!("Running; close the window to quit");
    }

    if let Err(e) = app.run() {
        log::error!("Stopped: {e}");
        std::process::exit(1);
    }
    if verbosity != Verbosity::Silent {
        log::info!("Shutting down");
    }
}
