//! Framebuffer management
//!
//! Framebuffers and the depth attachment shared by all of them

use ash::{vk, Device};
use crate::render::backends::vulkan::{Image, ImageView, VkResultExt, VulkanContext, VulkanError, VulkanResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose optimal tiling supports depth attachments
pub fn find_depth_format(
    candidates: &[vk::Format],
    format_properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> VulkanResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            format_properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| VulkanError::no_supported_depth_format())
}

/// Whether `format` carries a stencil aspect
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT)
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_create_info, None)
                .vk_context("vkCreateFramebuffer")?
        };

        Ok(Self {
            device: device.clone(),
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Depth attachment sized to the swapchain
pub struct DepthBuffer {
    view: ImageView,
    image: Image,
}

impl DepthBuffer {
    /// Create a depth image and view for `extent`
    pub fn new(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let format = find_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| context.format_properties(format))?;
        let image = Image::new(
            context,
            extent,
            1,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let view = image.create_view(vk::ImageAspectFlags::DEPTH)?;

        log::debug!(
            "Created {:?} depth buffer {}x{} (stencil: {})",
            format,
            extent.width,
            extent.height,
            has_stencil_component(format)
        );

        Ok(Self { view, image })
    }

    /// Get the depth format
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// Get the depth view handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supports(depth_formats: &[vk::Format]) -> impl Fn(vk::Format) -> vk::FormatProperties + '_ {
        move |format| vk::FormatProperties {
            optimal_tiling_features: if depth_formats.contains(&format) {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_first_supported_candidate() {
        let all = supports(&DEPTH_FORMAT_CANDIDATES);
        assert_eq!(find_depth_format(&DEPTH_FORMAT_CANDIDATES, all).unwrap(), vk::Format::D32_SFLOAT);

        let packed_only = [vk::Format::D24_UNORM_S8_UINT];
        let format = find_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&packed_only)).unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
        assert!(has_stencil_component(format));
    }

    #[test]
    fn test_no_depth_format_is_an_error() {
        let result = find_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&[]));
        assert!(matches!(result, Err(VulkanError::NoSupportedDepthFormat { .. })));
        assert!(result.unwrap_err().to_string().contains("framebuffer.rs:"));
    }

    #[test]
    fn test_linear_tiling_support_is_not_enough() {
        let linear_only = |_format: vk::Format| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert!(find_depth_format(&DEPTH_FORMAT_CANDIDATES, linear_only).is_err());
    }
}
