use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Which diagnostics the renderer emits
///
/// Mirrors the three switches a host usually exposes: startup chatter,
/// error reports for rejected operations, and the built-in test model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log startup milestones and pool usage at `info`
    pub verbose: bool,
    /// Log rejected operations (invalid handles, refused releases) at `warn`
    pub errors: bool,
    /// Make the built-in test model visible
    pub show_test_model: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            errors: true,
            show_test_model: false,
        }
    }
}

/// # Renderer Configuration
///
/// Pool sizing, projection planes, clear color and diagnostics. Every field
/// has a default, so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial slot count of each resource pool
    pub pool_capacity: usize,
    /// Initial capacity of the per-frame draw lists
    pub draw_list_capacity: usize,
    /// Near clipping plane distance
    pub near_clip: f32,
    /// Far clipping plane distance
    pub far_clip: f32,
    /// Clear color as linear RGBA
    pub background: [f32; 4],
    /// Initial viewport size in pixels (width, height)
    pub viewport: (u32, u32),
    /// Diagnostic switches
    pub diagnostics: DiagnosticsConfig,
}

impl RendererConfig {
    /// Default clear color, a soft blue (0x6488ea)
    pub const DEFAULT_BACKGROUND: [f32; 4] = [100.0 / 255.0, 136.0 / 255.0, 234.0 / 255.0, 1.0];

    /// Set the pool capacity
    #[must_use]
    pub const fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Set the viewport size
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Set the diagnostics switches
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Rejects zero-sized pools or viewports and clip planes that are not
    /// `0 < near < far`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::Invalid("pool_capacity must be at least 1".to_string()));
        }
        if self.draw_list_capacity == 0 {
            return Err(ConfigError::Invalid("draw_list_capacity must be at least 1".to_string()));
        }
        if !(self.near_clip > 0.0 && self.near_clip < self.far_clip) {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near_clip, self.far_clip
            )));
        }
        if self.viewport.0 == 0 || self.viewport.1 == 0 {
            return Err(ConfigError::Invalid("viewport must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 20,
            draw_list_capacity: 10,
            near_clip: 0.001,
            far_clip: 1000.0,
            background: Self::DEFAULT_BACKGROUND,
            viewport: (800, 680),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Config for RendererConfig {}
