//! Physical device selection and logical device creation
//!
//! Every enumerated GPU is summarized into [`DeviceCapabilities`]. Devices missing
//! a hard requirement are rejected; the rest are ranked by [`DeviceCapabilities::score`]
//! and the first device with the highest score wins.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};
use std::ffi::CStr;
use crate::render::backends::vulkan::{Surface, VkResultExt, VulkanError, VulkanResult};

/// Score added for discrete GPUs on top of `maxImageDimension2D`
///
/// The bonus is additive, so a device whose image-dimension limit exceeds a discrete
/// GPU's by more than this amount still scores higher.
pub const DISCRETE_GPU_BONUS: u32 = 10_000;

/// Queue family indices used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family that accepts graphics and transfer work
    pub graphics: u32,
    /// Family that can present to the surface
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Everything device selection needs to know about one GPU
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    /// Driver-reported device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// First family with graphics support
    pub graphics_family: Option<u32>,
    /// First family able to present to the surface
    pub present_family: Option<u32>,
    /// Whether `VK_KHR_swapchain` is available
    pub supports_swapchain: bool,
    /// Number of surface formats reported for the surface
    pub surface_format_count: usize,
    /// Number of present modes reported for the surface
    pub present_mode_count: usize,
    /// Whether anisotropic sampling can be enabled
    pub sampler_anisotropy: bool,
    /// `maxImageDimension2D` limit
    pub max_image_dimension_2d: u32,
    /// `maxSamplerAnisotropy` limit
    pub max_sampler_anisotropy: f32,
}

impl DeviceCapabilities {
    /// Query a physical device against the presentation surface
    pub fn query(instance: &Instance, surface: &Surface, device: vk::PhysicalDevice) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in queue_families.iter().enumerate() {
            let index = u32::try_from(index).map_err(|_| VulkanError::InvalidOperation {
                reason: "Queue family index out of range".to_string(),
            })?;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            if present_family.is_none() && surface.supports_queue_family(device, index)? {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .vk_context("vkEnumerateDeviceExtensionProperties")?
        };
        let supports_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });

        // Surface support is only meaningful once the extension exists
        let (surface_format_count, present_mode_count) = if supports_swapchain {
            (surface.formats(device)?.len(), surface.present_modes(device)?.len())
        } else {
            (0, 0)
        };

        Ok(Self {
            name: unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                .to_string_lossy()
                .into_owned(),
            device_type: properties.device_type,
            graphics_family,
            present_family,
            supports_swapchain,
            surface_format_count,
            present_mode_count,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
        })
    }

    /// Hard requirements this device fails, empty when suitable
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.graphics_family.is_none() {
            missing.push("graphics queue");
        }
        if self.present_family.is_none() {
            missing.push("present queue");
        }
        if !self.supports_swapchain {
            missing.push("VK_KHR_swapchain");
        }
        if self.surface_format_count == 0 {
            missing.push("surface formats");
        }
        if self.present_mode_count == 0 {
            missing.push("present modes");
        }
        if !self.sampler_anisotropy {
            missing.push("sampler anisotropy");
        }
        missing
    }

    /// Whether every hard requirement is met
    pub fn is_suitable(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Graphics and present families, when both exist
    pub fn queue_families(&self) -> Option<QueueFamilyIndices> {
        Some(QueueFamilyIndices {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }

    /// Ranking among suitable devices: discrete GPUs first, then larger image limits
    pub fn score(&self) -> u32 {
        let type_bonus = if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            DISCRETE_GPU_BONUS
        } else {
            0
        };
        type_bonus.saturating_add(self.max_image_dimension_2d)
    }
}

/// A physical device under consideration
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Physical device handle
    pub handle: vk::PhysicalDevice,
    /// Queried capabilities
    pub capabilities: DeviceCapabilities,
}

/// Highest scoring suitable candidate; on ties the earliest enumerated wins
pub fn select_best_candidate(candidates: &[DeviceCandidate]) -> Option<&DeviceCandidate> {
    candidates
        .iter()
        .filter(|candidate| candidate.capabilities.is_suitable())
        .fold(None, |best: Option<&DeviceCandidate>, candidate| match best {
            Some(current) if current.capabilities.score() >= candidate.capabilities.score() => Some(current),
            _ => Some(candidate),
        })
}

/// The physical device chosen for this session
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Capabilities that won the selection
    pub capabilities: DeviceCapabilities,
    /// Queue families to open
    pub queue_families: QueueFamilyIndices,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDeviceInfo {
    /// Select the best suitable physical device for rendering to `surface`
    pub fn select_suitable_device(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .vk_context("vkEnumeratePhysicalDevices")?
        };

        let mut candidates = Vec::with_capacity(devices.len());
        for handle in devices {
            let capabilities = DeviceCapabilities::query(instance, surface, handle)?;
            let missing = capabilities.missing_requirements();
            if missing.is_empty() {
                log::info!(
                    "GPU candidate {} ({:?}), score {}",
                    capabilities.name,
                    capabilities.device_type,
                    capabilities.score()
                );
            } else {
                log::info!("GPU {} rejected, missing: {}", capabilities.name, missing.join(", "));
            }
            candidates.push(DeviceCandidate { handle, capabilities });
        }

        let best = select_best_candidate(&candidates).ok_or_else(|| VulkanError::no_suitable_device())?;
        let queue_families = best
            .capabilities
            .queue_families()
            .ok_or_else(|| VulkanError::no_suitable_device())?;
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(best.handle) };

        log::info!("Selected GPU: {}", best.capabilities.name);

        Ok(Self {
            device: best.handle,
            capabilities: best.capabilities.clone(),
            queue_families,
            memory_properties,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics and transfer queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Families the queues were taken from
    pub queue_families: QueueFamilyIndices,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per unique family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device.queue_families;
        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .vk_context("vkCreateDevice")?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Created logical device (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            queue_families: families,
            swapchain_loader,
        })
    }

    /// Block until every queue is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().vk_context("vkDeviceWaitIdle") }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn capable(device_type: vk::PhysicalDeviceType, max_dimension: u32) -> DeviceCapabilities {
        DeviceCapabilities {
            name: format!("{device_type:?}"),
            device_type,
            graphics_family: Some(0),
            present_family: Some(0),
            supports_swapchain: true,
            surface_format_count: 2,
            present_mode_count: 3,
            sampler_anisotropy: true,
            max_image_dimension_2d: max_dimension,
            max_sampler_anisotropy: 16.0,
        }
    }

    fn candidate(raw: u64, capabilities: DeviceCapabilities) -> DeviceCandidate {
        DeviceCandidate { handle: vk::PhysicalDevice::from_raw(raw), capabilities }
    }

    #[test]
    fn test_discrete_beats_equally_capable_integrated() {
        let candidates = [
            candidate(1, capable(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384)),
            candidate(2, capable(vk::PhysicalDeviceType::DISCRETE_GPU, 16384)),
        ];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.handle.as_raw(), 2);
    }

    #[test]
    fn test_discrete_bonus_is_added_to_image_limit() {
        let integrated = capable(vk::PhysicalDeviceType::INTEGRATED_GPU, 9000);
        let discrete = capable(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        assert!(discrete.score() > integrated.score());
        assert_eq!(discrete.score(), DISCRETE_GPU_BONUS + 4096);
    }

    #[test]
    fn test_large_image_limit_can_outrank_discrete() {
        let candidates = [
            candidate(1, capable(vk::PhysicalDeviceType::DISCRETE_GPU, 16384)),
            candidate(2, capable(vk::PhysicalDeviceType::INTEGRATED_GPU, 32768)),
        ];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.handle.as_raw(), 2);
    }

    #[test]
    fn test_ties_keep_first_enumerated() {
        let candidates = [
            candidate(7, capable(vk::PhysicalDeviceType::DISCRETE_GPU, 8192)),
            candidate(8, capable(vk::PhysicalDeviceType::DISCRETE_GPU, 8192)),
        ];
        assert_eq!(select_best_candidate(&candidates).unwrap().handle.as_raw(), 7);
    }

    #[test]
    fn test_unsuitable_devices_are_never_selected() {
        let mut no_present = capable(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        no_present.present_family = None;
        let mut no_swapchain = capable(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        no_swapchain.supports_swapchain = false;
        no_swapchain.surface_format_count = 0;
        no_swapchain.present_mode_count = 0;

        assert_eq!(no_present.missing_requirements(), vec!["present queue"]);
        assert_eq!(
            no_swapchain.missing_requirements(),
            vec!["VK_KHR_swapchain", "surface formats", "present modes"]
        );

        let candidates = [
            candidate(1, no_present),
            candidate(2, no_swapchain),
            candidate(3, capable(vk::PhysicalDeviceType::CPU, 1024)),
        ];
        assert_eq!(select_best_candidate(&candidates).unwrap().handle.as_raw(), 3);
        assert!(select_best_candidate(&candidates[..2]).is_none());
    }

    #[test]
    fn test_missing_anisotropy_is_rejected() {
        let mut caps = capable(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        caps.sampler_anisotropy = false;
        assert!(!caps.is_suitable());
    }

    #[test]
    fn test_unique_queue_families() {
        let shared = QueueFamilyIndices { graphics: 0, present: 0 };
        assert_eq!(shared.unique(), vec![0]);
        let split = QueueFamilyIndices { graphics: 0, present: 2 };
        assert_eq!(split.unique(), vec![0, 2]);
    }
}
