//! GPU resources: memory, images, buffers, textures and descriptors

pub mod memory;
pub mod image;
pub mod buffer;
pub mod texture;
pub mod descriptor_set;

pub use image::*;
pub use buffer::*;
pub use texture::*;
pub use descriptor_set::*;
