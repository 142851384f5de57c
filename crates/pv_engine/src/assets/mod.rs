//! Asset loading
//!
//! Thin adapters over the decoding crates: `tobj` for Wavefront OBJ geometry and
//! `image` for texture pixels. Both hand back plain CPU-side data; nothing in here
//! touches the GPU.

use thiserror::Error;

pub mod image_loader;
pub mod obj_loader;

pub use image_loader::ImageData;
pub use obj_loader::{FaceVertex, ObjLoader, RawModel};

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
