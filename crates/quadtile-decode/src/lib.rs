//! Decode raster tile images into RGBA texture data.
//!
//! This crate provides pure synchronous decoding functions for turning the
//! raw bytes of an imagery tile into pixel data ready for upload. All
//! functions can be called from any threading context; the caller decides
//! where decoding runs.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **User-controlled parallelism**: The fetch pipeline decides where to decode
//! - **Format sniffing**: The container format is detected from the signature

mod error;
pub mod texture;

pub use error::{DecodeError, DecodeResult};
pub use texture::{DecodedTexture, ImageFormat, decode_texture, detect_format};
