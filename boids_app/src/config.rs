//! Demo configuration, read from `boids.toml` (or `.ron`) when present

use flock_render::config::{Config, ConfigError, RendererConfig};
use serde::{Deserialize, Serialize};

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "boids - flocking in Rust".to_string(),
            width: 800,
            height: 680,
            resizable: false,
        }
    }
}

/// Scene contents and player tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Number of spinning cubes placed around the origin
    pub ring_size: usize,
    /// Radius of the ring
    pub ring_radius: f32,
    /// Optional PNG drawn on a quad in the middle of the ring
    pub texture: Option<String>,
    /// Mouse look sensitivity in degrees per pixel
    pub sensitivity: f32,
    /// Moving the mouse up looks down
    pub inverted: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            ring_size: 12,
            ring_radius: 6.0,
            texture: None,
            sensitivity: 0.3,
            inverted: true,
        }
    }
}

/// Everything the demo reads at startup
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub renderer: RendererConfig,
}

impl Config for AppConfig {}

impl AppConfig {
    /// Check the parts the renderer does not validate itself
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        if self.scene.sensitivity.is_nan() || self.scene.sensitivity <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sensitivity {} must be positive",
                self.scene.sensitivity
            )));
        }
        self.renderer.validate()
    }
}
