//! Shader management
//!
//! SPIR-V is read from disk once at startup. Modules are created for each pipeline
//! build and destroyed as soon as the pipeline exists.

use ash::{vk, Device};
use std::ffi::CStr;
use std::path::Path;
use crate::core::config::ShaderConfig;
use crate::render::backends::vulkan::{VkResultExt, VulkanError, VulkanResult};

/// Entry point name shared by both stages
pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Decoded SPIR-V words
#[derive(Debug, Clone)]
pub struct SpirV(Vec<u32>);

impl SpirV {
    /// Decode SPIR-V from raw bytes; the length must be a whole number of words
    pub fn from_bytes(bytes: &[u8]) -> VulkanResult<Self> {
        ash::util::read_spv(&mut std::io::Cursor::new(bytes))
            .map(Self)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V: {e}")))
    }

    /// Read and decode a SPIR-V file
    pub fn from_file<P: AsRef<Path>>(path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to read shader {}: {e}", path.display()))
        })?;
        log::debug!("Loaded shader {:?} ({} bytes)", path, bytes.len());
        Self::from_bytes(&bytes)
    }

    /// Code words
    pub fn words(&self) -> &[u32] {
        &self.0
    }
}

/// Vertex and fragment code for the one fixed pipeline
#[derive(Debug, Clone)]
pub struct ShaderCode {
    /// Vertex stage code
    pub vertex: SpirV,
    /// Fragment stage code
    pub fragment: SpirV,
}

impl ShaderCode {
    /// Load both stages named by `config`
    pub fn load(config: &ShaderConfig) -> VulkanResult<Self> {
        Ok(Self {
            vertex: SpirV::from_file(&config.vertex_shader_path)?,
            fragment: SpirV::from_file(&config.fragment_shader_path)?,
        })
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from decoded SPIR-V
    pub fn new(device: &Device, code: &SpirV) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code.words());

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .vk_context("vkCreateShaderModule")?
        };

        Ok(Self { device: device.clone(), module })
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_decodes_little_endian_words() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let code = SpirV::from_bytes(&bytes).unwrap();
        assert_eq!(code.words(), &[SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_rejects_truncated_code() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00];
        assert!(SpirV::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = SpirV::from_file("no/such/shader.spv").unwrap_err();
        assert!(err.to_string().contains("no/such/shader.spv"));
    }
}
