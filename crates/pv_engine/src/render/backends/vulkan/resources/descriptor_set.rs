//! Descriptor set layout, pool and writes
//!
//! The renderer uses exactly one set: binding 0 holds the transform uniform
//! buffer for the vertex stage, binding 1 the texture for the fragment stage.
//! The set is written once and outlives swapchain recreation.

use ash::{vk, Device};
use crate::render::backends::vulkan::{VkResultExt, VulkanError, VulkanResult};

/// Binding slot of the transform uniform buffer
pub const UNIFORM_BINDING: u32 = 0;
/// Binding slot of the combined image sampler
pub const TEXTURE_BINDING: u32 = 1;

/// Descriptor set layout builder
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .vk_context("vkCreateDescriptorSetLayout")?
        };

        Ok(DescriptorSetLayout {
            device: device.clone(),
            layout,
            bindings: self.bindings,
        })
    }
}

/// Builder preloaded with the uniform buffer and texture bindings
pub fn model_bindings() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
        .add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes covering `sets` copies of `bindings`, one entry per descriptor type
pub fn pool_sizes_for(bindings: &[vk::DescriptorSetLayoutBinding], sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * sets;
        match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(vk::DescriptorPoolSize { ty: binding.descriptor_type, descriptor_count: count }),
        }
    }
    sizes
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool holding exactly one set of `layout`
    pub fn for_single_set(device: &Device, layout: &DescriptorSetLayout) -> VulkanResult<Self> {
        let pool_sizes = pool_sizes_for(layout.bindings(), 1);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(1);

        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .vk_context("vkCreateDescriptorPool")?
        };

        Ok(Self { device: device.clone(), pool })
    }

    /// Allocate one set of `layout`; it is released together with the pool
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .vk_context("vkAllocateDescriptorSets")?
        };

        sets.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Descriptor set allocation returned nothing".to_string(),
        })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer { binding: u32, info: vk::DescriptorBufferInfo },
    Image { binding: u32, info: vk::DescriptorImageInfo },
}

/// Collects descriptor writes for one set and applies them in a single update
pub struct DescriptorSetWriter {
    set: vk::DescriptorSet,
    pending: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Start writing into `set`
    pub fn new(set: vk::DescriptorSet) -> Self {
        Self { set, pending: Vec::new() }
    }

    /// Bind the whole of `buffer` as a uniform buffer
    pub fn write_uniform_buffer(mut self, binding: u32, buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        self.pending.push(PendingWrite::Buffer {
            binding,
            info: vk::DescriptorBufferInfo { buffer, offset: 0, range },
        });
        self
    }

    /// Bind a shader-readable image view with its sampler
    pub fn write_combined_image(mut self, binding: u32, view: vk::ImageView, sampler: vk::Sampler) -> Self {
        self.pending.push(PendingWrite::Image {
            binding,
            info: vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        });
        self
    }

    /// Number of writes queued
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing has been queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every queued write
    pub fn update(self, device: &Device) {
        // Infos are borrowed from `pending`, which no longer grows
        let writes: Vec<vk::WriteDescriptorSet> = self
            .pending
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer { binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
                    .build(),
                PendingWrite::Image { binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build(),
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

/// The single descriptor set binding the uniform buffer and texture
pub struct DescriptorBinder {
    set: vk::DescriptorSet,
    // Owns the set; freed with it
    _pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

impl DescriptorBinder {
    /// Create the layout, pool and set
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let layout = model_bindings().build(device)?;
        let pool = DescriptorPool::for_single_set(device, &layout)?;
        let set = pool.allocate(&layout)?;
        Ok(Self { set, _pool: pool, layout })
    }

    /// Point both bindings at their resources; done once per session
    pub fn bind(
        &self,
        device: &Device,
        uniform_buffer: vk::Buffer,
        uniform_range: vk::DeviceSize,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        DescriptorSetWriter::new(self.set)
            .write_uniform_buffer(UNIFORM_BINDING, uniform_buffer, uniform_range)
            .write_combined_image(TEXTURE_BINDING, texture_view, sampler)
            .update(device);
        log::debug!("Descriptor set written");
    }

    /// Layout used when building the pipeline layout
    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    /// The bound set
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_bindings() {
        let builder = model_bindings();
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 2);

        assert_eq!(bindings[0].binding, UNIFORM_BINDING);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(bindings[1].binding, TEXTURE_BINDING);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_single_set_pool_is_exact() {
        let sizes = pool_sizes_for(model_bindings().bindings(), 1);
        assert_eq!(sizes.len(), 2);
        assert!(sizes.iter().any(|s| s.ty == vk::DescriptorType::UNIFORM_BUFFER && s.descriptor_count == 1));
        assert!(sizes
            .iter()
            .any(|s| s.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER && s.descriptor_count == 1));
    }

    #[test]
    fn test_pool_sizes_merge_types() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT);
        let sizes = pool_sizes_for(builder.bindings(), 3);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 6);
    }

    #[test]
    fn test_writer_queues_both_bindings() {
        let writer = DescriptorSetWriter::new(vk::DescriptorSet::null())
            .write_uniform_buffer(UNIFORM_BINDING, vk::Buffer::null(), 192)
            .write_combined_image(TEXTURE_BINDING, vk::ImageView::null(), vk::Sampler::null());
        assert_eq!(writer.len(), 2);
        assert!(!writer.is_empty());
    }
}
