//! Shader programs and the vertex attributes they consume

use std::fmt;

use bitflags::bitflags;

use crate::render::device::{ProgramId, StageId};

bitflags! {
    /// Optional per-vertex attributes
    ///
    /// Used both as a shader's requirements and as a mesh's available
    /// attributes. Positions are always present and have no flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexAttributes: u8 {
        /// RGBA color at attribute location 1
        const COLOR = 1 << 0;
        /// 2D texture coordinate at attribute location 2
        const TEXCOORD = 1 << 1;
    }
}

/// Pipeline stage of a shader source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// A linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shader {
    pub(crate) vertex: StageId,
    pub(crate) fragment: StageId,
    pub(crate) program: ProgramId,
    pub(crate) requirements: VertexAttributes,
}

impl Shader {
    /// Attributes a mesh must provide to be drawn with this shader
    #[must_use]
    pub const fn requirements(&self) -> VertexAttributes {
        self.requirements
    }

    /// Whether the shader samples texture unit 0
    #[must_use]
    pub const fn uses_texture(&self) -> bool {
        self.requirements.contains(VertexAttributes::TEXCOORD)
    }

    /// Device program id
    #[must_use]
    pub const fn program(&self) -> ProgramId {
        self.program
    }
}

/// Name of the sampler uniform bound to texture unit 0
pub const SAMPLER_UNIFORM: &str = "tex";
/// Per-model transform uniform
pub const MODEL_UNIFORM: &str = "model";
/// View matrix uniform
pub const VIEW_UNIFORM: &str = "view";
/// Projection matrix uniform
pub const PROJECTION_UNIFORM: &str = "persp";

/// Sources of the built-in shaders, GLSL 330 core
pub mod sources {
    /// Vertex-color shader, vertex stage
    pub const COLOR_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 v_pos;
layout (location = 1) in vec4 v_col;
uniform mat4 model;
uniform mat4 persp;
uniform mat4 view;
out vec4 col;
void main()
{
    gl_Position = persp * view * model * vec4(v_pos, 1.0);
    col = v_col;
}
";

    /// Vertex-color shader, fragment stage
    pub const COLOR_FRAGMENT: &str = r"#version 330 core
in vec4 col;
out vec4 FragColor;
void main()
{
    FragColor = col;
}
";

    /// Textured shader, vertex stage
    pub const TEXTURE_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 v_pos;
layout (location = 2) in vec2 v_uv;
uniform mat4 model;
uniform mat4 persp;
uniform mat4 view;
out vec2 uv;
void main()
{
    gl_Position = persp * view * model * vec4(v_pos, 1.0);
    uv = v_uv;
}
";

    /// Textured shader, fragment stage
    pub const TEXTURE_FRAGMENT: &str = r"#version 330 core
in vec2 uv;
uniform sampler2D tex;
out vec4 FragColor;
void main()
{
    FragColor = texture(tex, uv);
}
";

    /// Color-modulated textured shader, vertex stage
    pub const BOTH_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 v_pos;
layout (location = 1) in vec4 v_col;
layout (location = 2) in vec2 v_uv;
uniform mat4 model;
uniform mat4 persp;
uniform mat4 view;
out vec4 col;
out vec2 uv;
void main()
{
    gl_Position = persp * view * model * vec4(v_pos, 1.0);
    col = v_col;
    uv = v_uv;
}
";

    /// Color-modulated textured shader, fragment stage
    pub const BOTH_FRAGMENT: &str = r"#version 330 core
in vec4 col;
in vec2 uv;
uniform sampler2D tex;
out vec4 FragColor;
void main()
{
    FragColor = texture(tex, uv) * col;
}
";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_attributes_cover_requirements() {
        let mesh = VertexAttributes::COLOR | VertexAttributes::TEXCOORD;
        assert!(mesh.contains(VertexAttributes::TEXCOORD));
        assert!(mesh.contains(VertexAttributes::empty()));
        assert!(!VertexAttributes::COLOR.contains(VertexAttributes::TEXCOORD));
        assert_eq!(
            VertexAttributes::TEXCOORD.difference(VertexAttributes::COLOR),
            VertexAttributes::TEXCOORD
        );
    }

    #[test]
    fn test_builtin_sources_declare_expected_uniforms() {
        for src in [sources::COLOR_VERTEX, sources::TEXTURE_VERTEX, sources::BOTH_VERTEX] {
            assert!(src.starts_with("#version 330 core"));
            for uniform in [MODEL_UNIFORM, VIEW_UNIFORM, PROJECTION_UNIFORM] {
                assert!(src.contains(&format!("uniform mat4 {uniform};")));
            }
        }
        assert!(sources::TEXTURE_FRAGMENT.contains(&format!("sampler2D {SAMPLER_UNIFORM}")));
        assert!(!sources::COLOR_FRAGMENT.contains("sampler2D"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
