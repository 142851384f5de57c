//! Image loading utilities for texture data
//!
//! Every image is expanded to 8-bit RGBA regardless of its source layout.

use std::path::Path;
use crate::assets::AssetError;

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data, row-major, tightly packed
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Bytes per pixel of the decoded data
    pub const CHANNELS: u32 = 4;

    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(AssetError::NotFound(path_ref.display().to_string()));
        }

        log::debug!("Loading image from: {:?}", path_ref);

        let img = image::open(path_ref)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image {}: {e}", path_ref.display())))?;
        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        log::info!("Loaded image {}x{} from {:?}", width, height, path_ref);

        Self::from_rgba(width, height, rgba_img.into_raw())
    }

    /// Load image from memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {e}")))?;

        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        log::debug!("Loaded image {}x{} from memory", width, height);

        Self::from_rgba(width, height, rgba_img.into_raw())
    }

    /// Wrap already-decoded RGBA pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData(format!("Image has zero extent {width}x{height}")));
        }
        let expected = width as usize * height as usize * Self::CHANNELS as usize;
        if data.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "Expected {expected} bytes of RGBA data, got {}",
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_keeps_pixels() {
        let pixels = [255, 0, 0, 255].repeat(16);
        let img = ImageData::from_rgba(4, 4, pixels).unwrap();
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(ImageData::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            ImageData::from_rgba(2, 2, vec![0; 12]),
            Err(AssetError::InvalidData(_))
        ));
        assert!(matches!(
            ImageData::from_rgba(0, 2, Vec::new()),
            Err(AssetError::InvalidData(_))
        ));
    }

    #[test]
    fn test_png_bytes_expand_to_rgba() {
        let mut encoded = Vec::new();
        let gray = image::GrayImage::from_pixel(3, 2, image::Luma([128]));
        image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let img = ImageData::from_bytes(&encoded).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.size_bytes(), 3 * 2 * 4);
        assert_eq!(&img.data[0..4], &[128, 128, 128, 255]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = ImageData::from_file("definitely/not/here.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}
