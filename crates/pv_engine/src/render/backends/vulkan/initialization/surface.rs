//! Vulkan surface management
//!
//! Owns the window surface and answers the per-device presentation queries

use ash::extensions::khr;
use ash::{vk, Entry, Instance};
use crate::render::backends::vulkan::{VkResultExt, VulkanError, VulkanResult, Window};

/// Vulkan surface wrapper for presentation
pub struct Surface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for `window`
    pub fn new(entry: &Entry, instance: &Instance, window: &Window) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        Ok(Self {
            surface_loader,
            surface,
        })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface loader
    pub fn loader(&self) -> &khr::Surface {
        &self.surface_loader
    }

    /// Whether queue family `index` of `physical_device` can present here
    pub fn supports_queue_family(&self, physical_device: vk::PhysicalDevice, index: u32) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, index, self.surface)
                .vk_context("vkGetPhysicalDeviceSurfaceSupportKHR")
        }
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .vk_context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
        }
    }

    /// Get supported surface formats
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .vk_context("vkGetPhysicalDeviceSurfaceFormatsKHR")
        }
    }

    /// Get supported present modes
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
                .vk_context("vkGetPhysicalDeviceSurfacePresentModesKHR")
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
