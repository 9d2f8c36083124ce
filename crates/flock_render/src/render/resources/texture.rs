//! Textures and the pixel data they are built from

use serde::{Deserialize, Serialize};

use crate::render::device::TextureId;
use crate::render::RenderError;

use super::ResourceKind;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// How a texture is sampled
///
/// The registry always uses [`SamplingPolicy::default`]: repeat wrapping,
/// nearest-mipmap-nearest minification and nearest magnification, which
/// keeps pixel-art textures crisp at every distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Wrap mode on both axes
    pub wrap: WrapMode,
    /// Filter used when the texture is minified
    pub min_filter: MinFilter,
    /// Filter used when the texture is magnified
    pub mag_filter: MagFilter,
    /// Generate a mipmap chain after upload
    pub generate_mipmaps: bool,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Tile the texture
    Repeat,
    /// Clamp to the edge texel
    ClampToEdge,
}

/// Minification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinFilter {
    /// Nearest texel, no mipmaps
    Nearest,
    /// Nearest texel of the nearest mip level
    NearestMipmapNearest,
    /// Bilinear, no mipmaps
    Linear,
}

/// Magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            wrap: WrapMode::Repeat,
            min_filter: MinFilter::NearestMipmapNearest,
            mag_filter: MagFilter::Nearest,
            generate_mipmaps: true,
        }
    }
}

/// Decoded RGBA8 pixels handed over by an asset loader
///
/// Rows are tightly packed, `width * height * 4` bytes in total.
#[derive(Debug, Clone, Copy)]
pub struct TextureData<'a> {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel bytes
    pub pixels: &'a [u8],
}

impl<'a> TextureData<'a> {
    /// Wrap a pixel buffer
    #[must_use]
    pub const fn new(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Check dimensions against the buffer length
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidResourceData`] for empty dimensions or a
    /// buffer that is not exactly `width * height * 4` bytes.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |reason: String| RenderError::InvalidResourceData {
            kind: ResourceKind::Texture,
            reason,
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!("empty dimensions {}x{}", self.width, self.height)));
        }

        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| invalid(format!("dimensions {}x{} overflow", self.width, self.height)))?;

        if self.pixels.len() != expected {
            return Err(invalid(format!(
                "{}x{} RGBA needs {} bytes, got {}",
                self.width,
                self.height,
                expected,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// A texture living on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub(crate) id: TextureId,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Texture {
    /// Width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Device texture id
    #[must_use]
    pub const fn id(&self) -> TextureId {
        self.id
    }
}

const PURPLE: [u8; 4] = [255, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// The 2x2 purple and black checker used as the error texture
#[rustfmt::skip]
pub const ERROR_TEXTURE_PIXELS: [u8; 16] = [
    PURPLE[0], PURPLE[1], PURPLE[2], PURPLE[3],
    BLACK[0], BLACK[1], BLACK[2], BLACK[3],
    BLACK[0], BLACK[1], BLACK[2], BLACK[3],
    PURPLE[0], PURPLE[1], PURPLE[2], PURPLE[3],
];

/// Pixel data of the error texture
#[must_use]
pub const fn error_texture() -> TextureData<'static> {
    TextureData::new(2, 2, &ERROR_TEXTURE_PIXELS)
}
