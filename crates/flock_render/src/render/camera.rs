//! # Orbit-Offset Camera
//!
//! A yaw/pitch camera that sits `offset` units behind a world-space anchor
//! (typically the player) and looks along its own forward direction.
//!
//! ## Conventions
//! - Angles are stored in degrees and converted when matrices are built
//! - Right-handed, Y-up world; `yaw = 0, pitch = 0` looks down +X
//! - Positive yaw turns toward +Z, positive pitch looks up

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// World up used for the look-at basis
pub const WORLD_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Default vertical field of view in degrees
pub const DEFAULT_FOV: f32 = 70.0;

/// Snapshot of the camera parameters
///
/// Returned by [`Camera::data`] and accepted by [`Camera::set_data`] so a
/// simulation can read the camera back, adjust it and write it again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// Elevation angle in degrees
    pub pitch: f32,
    /// Heading angle in degrees
    pub yaw: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Distance from the anchor back along the view direction
    pub offset: f32,
    /// World-space anchor
    pub position: Vec3,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            yaw: 0.0,
            fov: DEFAULT_FOV,
            offset: 0.0,
            position: Vec3::zeros(),
        }
    }
}

/// 3D camera driving the view and perspective matrices
///
/// Matrices are computed on demand; the renderer asks for each once per
/// frame.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    data: CameraData,
}

impl Camera {
    /// Create a camera from explicit parameters
    #[must_use]
    pub const fn new(data: CameraData) -> Self {
        Self { data }
    }

    /// Replace every parameter at once
    ///
    /// Called once per simulation tick.
    pub fn update(&mut self, pitch: f32, yaw: f32, fov: f32, offset: f32, position: Vec3) {
        self.data = CameraData {
            pitch,
            yaw,
            fov,
            offset,
            position,
        };
        log::trace!("Camera updated: {:?}", self.data);
    }

    /// Replace every parameter from a snapshot
    pub fn set_data(&mut self, data: CameraData) {
        self.data = data;
    }

    /// Current parameters
    #[must_use]
    pub const fn data(&self) -> CameraData {
        self.data
    }

    /// Unit view direction derived from yaw and pitch
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        let yaw = utils::deg_to_rad(self.data.yaw);
        let pitch = utils::deg_to_rad(self.data.pitch);

        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    /// Eye position: the anchor pulled back along the view direction
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.data.position - self.forward() * self.data.offset
    }

    /// Point one unit in front of the eye
    #[must_use]
    pub fn target(&self) -> Vec3 {
        self.eye() + self.forward()
    }

    /// Right-handed look-at view matrix
    ///
    /// Looking straight up or down (`pitch = ±90`) makes the basis
    /// degenerate; callers clamp pitch short of that.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.eye(), self.target(), WORLD_UP)
    }

    /// Perspective projection for the given aspect ratio and clip planes
    #[must_use]
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective(utils::deg_to_rad(self.data.fov), aspect, near, far)
    }
}
