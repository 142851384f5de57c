//! Vulkan swapchain management
//!
//! Selection policy lives in free functions so it can be checked without a GPU.
//! [`SwapchainConfig::choose`] is deterministic: the same surface capabilities and
//! window size always produce the same configuration, which keeps recreation
//! idempotent.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};
use crate::render::backends::vulkan::{
    DepthBuffer, ImageView, PhysicalDeviceInfo, Surface, VkResultExt, VulkanContext, VulkanError, VulkanResult,
};

/// Preferred color format
pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// Preferred color space
pub const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Preferred present mode
pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// Present mode every implementation must support
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Preferred sRGB format, otherwise whatever the surface lists first
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|sf| sf.format == PREFERRED_FORMAT && sf.color_space == PREFERRED_COLOR_SPACE)
        .or_else(|| available.first())
        .copied()
}

/// Mailbox when offered, otherwise FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&PREFERRED_PRESENT_MODE) {
        PREFERRED_PRESENT_MODE
    } else {
        FALLBACK_PRESENT_MODE
    }
}

/// Surface-dictated extent, or the window size clamped into the allowed range
///
/// A `current_extent` width of `u32::MAX` means the surface lets the swapchain decide.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when the surface has one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Each swapchain image needs exactly one view and one framebuffer
pub fn check_attachment_counts(images: usize, views: usize, framebuffers: usize) -> VulkanResult<()> {
    if images == views && views == framebuffers {
        Ok(())
    } else {
        Err(VulkanError::InvalidOperation {
            reason: format!("{images} swapchain images but {views} views and {framebuffers} framebuffers"),
        })
    }
}

/// What the surface supports on the selected GPU
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query surface support for `physical_device`
    pub fn query(surface: &Surface, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        Ok(Self {
            capabilities: surface.capabilities(physical_device.device)?,
            formats: surface.formats(physical_device.device)?,
            present_modes: surface.present_modes(physical_device.device)?,
        })
    }
}

/// Immutable description of one swapchain build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    /// Color format of the images
    pub format: vk::Format,
    /// Color space the images are presented in
    pub color_space: vk::ColorSpaceKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size in pixels
    pub extent: vk::Extent2D,
    /// Minimum number of images requested
    pub image_count: u32,
    /// Transform applied on presentation
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    /// Apply the selection policy to queried support
    pub fn choose(support: &SwapchainSupport, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            VulkanError::InitializationFailed("Surface reports no formats".to_string())
        })?;

        Ok(Self {
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, window_extent),
            image_count: choose_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// Swapchain handle with RAII cleanup
///
/// The images belong to the swapchain and are released with it.
pub struct Swapchain {
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    config: SwapchainConfig,
}

impl Swapchain {
    /// Create a new swapchain from a chosen configuration
    pub fn new(context: &VulkanContext, config: SwapchainConfig) -> VulkanResult<Self> {
        let swapchain_loader = context.device.swapchain_loader.clone();
        let families = context.device.queue_families;
        let family_indices = families.unique();

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface.handle())
            .min_image_count(config.image_count)
            .image_format(config.format)
            .image_color_space(config.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        create_info = if family_indices.len() > 1 {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .vk_context("vkCreateSwapchainKHR")?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(result).vk_context("vkGetSwapchainImagesKHR");
            }
        };

        log::info!(
            "Created swapchain {}x{}, {} images, {:?}, {:?}",
            config.extent.width,
            config.extent.height,
            images.len(),
            config.format,
            config.present_mode
        );

        Ok(Self {
            swapchain_loader,
            swapchain,
            images,
            config,
        })
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Images owned by the swapchain
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Configuration the swapchain was built with
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Everything sized by the swapchain except the pipeline and framebuffers
///
/// Dropping releases image views, then the depth buffer, then the chain.
pub struct SwapchainState {
    image_views: Vec<ImageView>,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
}

impl SwapchainState {
    /// Query the surface, choose a configuration and build chain, views and depth buffer
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let support = SwapchainSupport::query(&context.surface, &context.physical_device)?;
        let config = SwapchainConfig::choose(&support, window_extent)?;

        let swapchain = Swapchain::new(context, config)?;
        let image_views = Self::create_image_views(context.raw_device(), &swapchain)?;
        let depth_buffer = DepthBuffer::new(context, config.extent)?;

        Ok(Self {
            image_views,
            depth_buffer,
            swapchain,
        })
    }

    fn create_image_views(device: &Device, swapchain: &Swapchain) -> VulkanResult<Vec<ImageView>> {
        let format = swapchain.config().format;
        swapchain
            .images()
            .iter()
            .map(|&image| ImageView::new(device, image, format, vk::ImageAspectFlags::COLOR, 1))
            .collect()
    }

    /// The chain itself
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Color format of the swapchain images
    pub fn format(&self) -> vk::Format {
        self.swapchain.config().format
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.config().extent
    }

    /// One view per swapchain image, same order
    pub fn image_views(&self) -> impl ExactSizeIterator<Item = vk::ImageView> + '_ {
        self.image_views.iter().map(ImageView::handle)
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.swapchain.images().len()
    }

    /// Number of image views built for the chain
    pub fn view_count(&self) -> usize {
        self.image_views.len()
    }

    /// Shared depth attachment
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn pair(chosen: Option<vk::SurfaceFormatKHR>) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        chosen.map(|sf| (sf.format, sf.color_space))
    }

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_prefers_srgb_bgra() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            pair(choose_surface_format(&available)),
            Some((vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(
            pair(choose_surface_format(&available)),
            Some((vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_present_mode_preference() {
        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&with_mailbox), vk::PresentModeKHR::MAILBOX);

        let without = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&without), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_current_extent_is_used_when_defined() {
        let caps = capabilities((1280, 720), (1, 1), (4096, 4096));
        assert_eq!(choose_extent(&caps, extent(800, 600)), extent(1280, 720));
    }

    #[test]
    fn test_undefined_extent_clamps_window_size() {
        let caps = capabilities((u32::MAX, u32::MAX), (100, 100), (1000, 500));
        assert_eq!(choose_extent(&caps, extent(1920, 50)), extent(1000, 100));
        assert_eq!(choose_extent(&caps, extent(640, 480)), extent(640, 480));
    }

    #[test]
    fn test_image_count_respects_maximum() {
        let mut caps = capabilities((800, 600), (1, 1), (800, 600));
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_config_choice_is_idempotent() {
        let support = SwapchainSupport {
            capabilities: capabilities((u32::MAX, u32::MAX), (1, 1), (2048, 2048)),
            formats: vec![format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };

        let first = SwapchainConfig::choose(&support, extent(1024, 768)).unwrap();
        let second = SwapchainConfig::choose(&support, extent(1024, 768)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.extent, extent(1024, 768));
        assert_eq!(first.present_mode, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_config_without_formats_fails() {
        let support = SwapchainSupport {
            capabilities: capabilities((800, 600), (1, 1), (800, 600)),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(SwapchainConfig::choose(&support, extent(800, 600)).is_err());
    }

    #[test]
    fn test_attachment_counts_must_match() {
        assert!(check_attachment_counts(3, 3, 3).is_ok());
        assert!(check_attachment_counts(3, 2, 3).is_err());
        assert!(check_attachment_counts(3, 3, 0).is_err());
        assert!(check_attachment_counts(2, 3, 3).is_err());
        assert!(check_attachment_counts(3, 3, 4).is_err());
    }
}
