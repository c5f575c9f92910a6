//! Texture decoding for imagery tiles.
//!
//! Two container formats are supported:
//! - PNG: Lossless, used for imagery with transparency
//! - JPEG: Lossy, used for most photographic base layers
//!
//! Both formats produce RGBA pixel data suitable for GPU upload.

use crate::error::{DecodeError, DecodeResult};

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Image container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG-compressed data.
    Png,
    /// JPEG-compressed data.
    Jpeg,
}

impl ImageFormat {
    fn codec(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// Decoded texture data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    /// RGBA pixel data (4 bytes per pixel).
    pub data: Vec<u8>,
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
}

impl DecodedTexture {
    /// Create a new decoded texture.
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Check if the texture data size is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }

    /// Size of the pixel data in bytes, used for cache accounting.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Detect the image format from the data signature.
pub fn detect_format(data: &[u8]) -> DecodeResult<ImageFormat> {
    if data.len() < 2 {
        return Err(DecodeError::BufferTooSmall {
            expected: 2,
            actual: data.len(),
        });
    }

    // JPEG starts with 0xFFD8.
    if data[0] == 0xFF && data[1] == 0xD8 {
        return Ok(ImageFormat::Jpeg);
    }

    if data.starts_with(&PNG_SIGNATURE) {
        return Ok(ImageFormat::Png);
    }

    Err(DecodeError::UnknownFormat)
}

/// Decode tile image bytes to RGBA, detecting the format from the signature.
///
/// # Errors
///
/// Returns an error if the signature is unknown or the codec fails.
pub fn decode_texture(data: &[u8]) -> DecodeResult<DecodedTexture> {
    let format = detect_format(data)?;
    let image = image::load_from_memory_with_format(data, format.codec()).map_err(|e| {
        DecodeError::InvalidImage {
            context: format.name(),
            detail: e.to_string(),
        }
    })?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedTexture::new(rgba.into_raw(), width, height))
}
