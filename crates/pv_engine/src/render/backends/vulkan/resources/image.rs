//! Device-local 2D images and views

use ash::{vk, Device};
use crate::render::backends::vulkan::{memory, VkResultExt, VulkanContext, VulkanResult};

/// 2D image with its own memory allocation
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
}

impl Image {
    /// Create an optimally tiled, single-sample 2D image
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        mip_levels: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device().clone();
        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
            .mip_levels(mip_levels)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.create_image(&create_info, None).vk_context("vkCreateImage")? };

        // From here on Drop releases whatever has been created
        let mut result = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            format,
            extent,
            mip_levels,
        };

        let requirements = unsafe { result.device.get_image_memory_requirements(image) };
        result.memory = memory::allocate(
            &result.device,
            &context.physical_device.memory_properties,
            requirements,
            properties,
        )?;
        unsafe {
            result
                .device
                .bind_image_memory(image, result.memory, 0)
                .vk_context("vkBindImageMemory")?;
        }

        Ok(result)
    }

    /// Create a view over every mip level
    pub fn create_view(&self, aspect: vk::ImageAspectFlags) -> VulkanResult<ImageView> {
        ImageView::new(&self.device, self.image, self.format, aspect, self.mip_levels)
    }

    /// Get the image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the base level extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// Create a 2D view with identity swizzle
    pub fn new(
        device: &Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe {
            device
                .create_image_view(&create_info, None)
                .vk_context("vkCreateImageView")?
        };

        Ok(Self { device: device.clone(), view })
    }

    /// Get the view handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}
