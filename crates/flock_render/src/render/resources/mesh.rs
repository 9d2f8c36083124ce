//! Indexed triangle meshes

use serde::{Deserialize, Serialize};

use crate::render::device::MeshBuffers;
use crate::render::RenderError;

use super::{ResourceKind, VertexAttributes};

/// Attribute location of vertex positions (vec3)
pub const POSITION_LOCATION: u32 = 0;
/// Attribute location of vertex colors (vec4)
pub const COLOR_LOCATION: u32 = 1;
/// Attribute location of texture coordinates (vec2)
pub const TEXCOORD_LOCATION: u32 = 2;

/// Floats per position
pub const POSITION_COMPONENTS: usize = 3;
/// Floats per color
pub const COLOR_COMPONENTS: usize = 4;
/// Floats per texture coordinate
pub const TEXCOORD_COMPONENTS: usize = 2;

/// Which triangle winding faces the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Winding {
    /// Clockwise triangles are front-facing
    Clockwise,
    /// Counter-clockwise triangles are front-facing
    #[default]
    CounterClockwise,
}

/// Vertex and index arrays handed over by an asset loader
#[derive(Debug, Clone, Copy)]
pub struct MeshData<'a> {
    /// Packed `xyz` positions
    pub positions: &'a [f32],
    /// Packed `rgba` colors, one per vertex
    pub colors: Option<&'a [f32]>,
    /// Packed `uv` coordinates, one per vertex
    pub uvs: Option<&'a [f32]>,
    /// Triangle-list indices
    pub indices: &'a [u32],
    /// Front-face winding
    pub winding: Winding,
}

impl<'a> MeshData<'a> {
    /// Positions and indices only, counter-clockwise
    #[must_use]
    pub const fn new(positions: &'a [f32], indices: &'a [u32]) -> Self {
        Self {
            positions,
            colors: None,
            uvs: None,
            indices,
            winding: Winding::CounterClockwise,
        }
    }

    /// Attach per-vertex colors
    #[must_use]
    pub const fn with_colors(mut self, colors: &'a [f32]) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Attach per-vertex texture coordinates
    #[must_use]
    pub const fn with_uvs(mut self, uvs: &'a [f32]) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Set the front-face winding
    #[must_use]
    pub const fn with_winding(mut self, winding: Winding) -> Self {
        self.winding = winding;
        self
    }

    /// Number of vertices described by the position array
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_COMPONENTS
    }

    /// Number of triangles described by the index array
    #[must_use]
    pub const fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Optional attributes present in this data
    #[must_use]
    pub fn attributes(&self) -> VertexAttributes {
        let mut attributes = VertexAttributes::empty();
        attributes.set(VertexAttributes::COLOR, self.colors.is_some());
        attributes.set(VertexAttributes::TEXCOORD, self.uvs.is_some());
        attributes
    }

    /// Check array lengths and index ranges
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidResourceData`] if positions or indices
    /// are empty or not whole tuples, if an optional array does not hold one
    /// entry per vertex, or if an index points past the last vertex.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |reason: String| RenderError::InvalidResourceData {
            kind: ResourceKind::Mesh,
            reason,
        };

        if self.positions.is_empty() || self.positions.len() % POSITION_COMPONENTS != 0 {
            return Err(invalid(format!(
                "position array of {} floats is not a non-empty list of xyz triples",
                self.positions.len()
            )));
        }
        let vertices = self.vertex_count();
        if vertices > u32::MAX as usize {
            return Err(invalid(format!("{vertices} vertices cannot be indexed by u32")));
        }

        for (name, array, components) in [
            ("color", self.colors, COLOR_COMPONENTS),
            ("uv", self.uvs, TEXCOORD_COMPONENTS),
        ] {
            if let Some(array) = array {
                if array.len() != vertices * components {
                    return Err(invalid(format!(
                        "{name} array has {} floats, expected {} for {vertices} vertices",
                        array.len(),
                        vertices * components
                    )));
                }
            }
        }

        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index array of {} entries is not a non-empty triangle list",
                self.indices.len()
            )));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(invalid(format!("index {bad} out of range for {vertices} vertices")));
        }
        Ok(())
    }
}

/// A mesh living on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    pub(crate) buffers: MeshBuffers,
    pub(crate) triangles: u32,
    pub(crate) winding: Winding,
    pub(crate) attributes: VertexAttributes,
}

impl Mesh {
    /// Number of triangles drawn
    #[must_use]
    pub const fn triangles(&self) -> u32 {
        self.triangles
    }

    /// Number of indices drawn
    #[must_use]
    pub const fn element_count(&self) -> u32 {
        self.triangles * 3
    }

    /// Front-face winding
    #[must_use]
    pub const fn winding(&self) -> Winding {
        self.winding
    }

    /// Optional attributes the mesh provides
    #[must_use]
    pub const fn attributes(&self) -> VertexAttributes {
        self.attributes
    }

    /// Device buffers
    #[must_use]
    pub const fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }
}

/// Built-in colored cube used by the test model
pub mod cube {
    use super::{MeshData, Winding};

    /// Corner positions of a unit cube centered on the origin
    #[rustfmt::skip]
    pub const POSITIONS: [f32; 24] = [
        -0.5,  0.5,  0.5,
         0.5,  0.5,  0.5,
        -0.5, -0.5,  0.5,
         0.5, -0.5,  0.5,
        -0.5,  0.5, -0.5,
         0.5,  0.5, -0.5,
        -0.5, -0.5, -0.5,
         0.5, -0.5, -0.5,
    ];

    /// One color per corner
    #[rustfmt::skip]
    pub const COLORS: [f32; 32] = [
        0.0, 1.0, 1.0, 1.0,
        1.0, 1.0, 1.0, 1.0,
        0.0, 0.0, 1.0, 1.0,
        1.0, 0.0, 1.0, 1.0,
        0.0, 1.0, 0.0, 1.0,
        1.0, 1.0, 0.0, 1.0,
        0.0, 0.0, 0.0, 1.0,
        1.0, 0.0, 0.0, 1.0,
    ];

    /// Two clockwise triangles per face
    #[rustfmt::skip]
    pub const INDICES: [u32; 36] = [
        0, 1, 3, 0, 3, 2,
        1, 5, 7, 1, 7, 3,
        5, 4, 6, 5, 6, 7,
        4, 0, 2, 4, 2, 6,
        4, 5, 1, 4, 1, 0,
        2, 3, 7, 2, 7, 6,
    ];

    /// The cube as mesh data
    #[must_use]
    pub const fn data() -> MeshData<'static> {
        MeshData::new(&POSITIONS, &INDICES)
            .with_colors(&COLORS)
            .with_winding(Winding::Clockwise)
    }
}
