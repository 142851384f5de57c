//! Device memory selection and allocation
//!
//! Each buffer or image gets its own dedicated allocation.

use ash::{vk, Device};
use crate::render::backends::vulkan::{VkResultExt, VulkanError, VulkanResult};

/// First memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .zip(0u32..)
        .find(|(memory_type, index)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(_, index)| index)
        .ok_or_else(|| VulkanError::no_suitable_memory_type())
}

/// Allocate memory satisfying `requirements` with the given properties
pub fn allocate(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(memory_properties, requirements.memory_type_bits, properties)?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { device.allocate_memory(&alloc_info, None).vk_context("vkAllocateMemory") }
}
