//! Models: a mesh drawn with a shader and texture at a pose

use crate::foundation::collections::Handle;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

use super::{Mesh, Shader, Texture};

/// A drawable instance
///
/// The three resource handles are weak references: the registry checks them
/// when the model is created or updated, and the batcher re-checks them every
/// frame, skipping the model if any has gone stale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Model {
    /// Geometry
    pub mesh: Handle<Mesh>,
    /// Texture bound to unit 0
    pub texture: Handle<Texture>,
    /// Program used to draw the mesh
    pub shader: Handle<Shader>,
    /// World position
    pub position: Vec3,
    /// XYZ Euler angles in radians
    pub rotation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
    /// Drawn only when set
    pub visible: bool,
    /// Belongs to the screen-space UI pass rather than the 3D pass
    pub ui: bool,
}

impl Model {
    /// A visible 3D model at the origin with unit scale
    #[must_use]
    pub fn new(mesh: Handle<Mesh>, texture: Handle<Texture>, shader: Handle<Shader>) -> Self {
        Self {
            mesh,
            texture,
            shader,
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            visible: true,
            ui: false,
        }
    }

    /// Set the position
    #[must_use]
    pub const fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set the rotation (radians)
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the scale
    #[must_use]
    pub const fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Set visibility
    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Move the model to the UI pass
    #[must_use]
    pub const fn with_ui(mut self, ui: bool) -> Self {
        self.ui = ui;
        self
    }

    /// Local-to-world transform, `T * R * S`
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::model(self.position, self.rotation, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;

    fn template() -> Model {
        Model::new(
            Handle::from_raw_parts(0, 0),
            Handle::from_raw_parts(0, 0),
            Handle::from_raw_parts(0, 0),
        )
    }

    #[test]
    fn test_new_model_is_visible_3d_identity() {
        let model = template();
        assert!(model.visible);
        assert!(!model.ui);
        assert_relative_eq!(model.model_matrix(), Mat4::identity());
    }

    #[test]
    fn test_model_matrix_applies_pose() {
        let model = template()
            .with_position(Vec3::new(0.0, 2.0, 0.0))
            .with_rotation(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::new(2.0, 2.0, 2.0));

        // Scale to x=2, rotate a quarter turn about z onto +y, then lift by 2.
        let p = model.model_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 4.0, 0.0), epsilon = 1e-5);
    }
}
