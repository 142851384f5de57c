//! Vulkan synchronization primitives
//!
//! Frames are ordered on the GPU by two binary semaphores per frame slot. The CPU
//! side waits for the present queue to drain before reusing a slot, so no fences
//! are needed.

use ash::{vk, Device};
use crate::render::backends::vulkan::{VkResultExt, VulkanResult};

/// Number of semaphore pairs cycled through
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Binary semaphore wrapper with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .vk_context("vkCreateSemaphore")?
        };
        Ok(Self { device: device.clone(), semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Semaphores for one frame slot
pub struct FrameSync {
    /// Signalled when the acquired image may be rendered to
    pub image_available: Semaphore,
    /// Signalled when rendering finished and the image may be presented
    pub render_finished: Semaphore,
}

impl FrameSync {
    /// Create the semaphore pair
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
        })
    }

    /// One pair per frame slot
    pub fn for_frames_in_flight(device: &Device) -> VulkanResult<Vec<Self>> {
        (0..MAX_FRAMES_IN_FLIGHT).map(|_| Self::new(device)).collect()
    }
}
