//! Sampled textures with a full mip chain
//!
//! The mip chain is generated on the GPU with linear blits, so the texture format
//! must support linear filtering in optimal tiling.

use ash::{vk, Device};
use crate::assets::ImageData;
use crate::render::backends::vulkan::{
    Buffer, Image, ImageView, SingleTimeCommands, VkResultExt, VulkanContext, VulkanError,
    VulkanResult,
};

/// Format used for every uploaded texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Number of levels in a full mip chain: `floor(log2(max(w, h))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Size of the next smaller mip level along one axis
pub fn next_mip_extent(dimension: u32) -> u32 {
    (dimension / 2).max(1)
}

/// Access masks and pipeline stages for one image layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that waits for the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

/// Look up the barrier masks for a supported layout transition
pub fn layout_transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    use vk::ImageLayout as L;

    let masks = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_READ,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        _ => return Err(VulkanError::unsupported_layout_transition(old, new)),
    };

    Ok(masks)
}

/// Fail unless `format` supports linear filtering for optimally tiled images
pub fn require_linear_filtering(format: vk::Format, properties: vk::FormatProperties) -> VulkanResult<()> {
    let feature = vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
    if properties.optimal_tiling_features.contains(feature) {
        Ok(())
    } else {
        Err(VulkanError::unsupported_format_feature(format, feature))
    }
}

/// Record a layout transition for `level_count` levels starting at `base_level`
pub fn record_layout_transition(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    base_level: u32,
    level_count: u32,
) -> VulkanResult<()> {
    let masks = layout_transition_masks(old, new)?;
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range(base_level, level_count))
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            masks.src_stage,
            masks.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
    Ok(())
}

fn color_range(base_mip_level: u32, level_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level,
        level_count,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn blit_corner(width: u32, height: u32) -> VulkanResult<vk::Offset3D> {
    let to_offset = |value: u32| {
        i32::try_from(value).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("Texture dimension {} exceeds blit range", value),
        })
    };
    Ok(vk::Offset3D { x: to_offset(width)?, y: to_offset(height)?, z: 1 })
}

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering on all axes, repeat addressing, anisotropy at `max_anisotropy`
    pub fn new(device: &Device, mip_levels: u32, max_anisotropy: f32) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        let sampler = unsafe {
            device
                .create_sampler(&create_info, None)
                .vk_context("vkCreateSampler")?
        };

        Ok(Self { device: device.clone(), sampler })
    }

    /// Get the sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Device-local texture image with view and sampler
pub struct Texture {
    sampler: Sampler,
    view: ImageView,
    image: Image,
}

impl Texture {
    /// Upload `data` and generate its mip chain
    ///
    /// Blocks until the GPU has finished; every level ends in
    /// `SHADER_READ_ONLY_OPTIMAL`.
    pub fn from_image_data(
        context: &VulkanContext,
        commands: &SingleTimeCommands<'_>,
        data: &ImageData,
    ) -> VulkanResult<Self> {
        require_linear_filtering(TEXTURE_FORMAT, context.format_properties(TEXTURE_FORMAT))?;

        let mip_levels = mip_level_count(data.width, data.height);
        let extent = vk::Extent2D { width: data.width, height: data.height };

        let staging = Buffer::staging(context, &data.data)?;
        let image = Image::new(
            context,
            extent,
            mip_levels,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        commands.submit(|device, command_buffer| {
            record_layout_transition(
                device,
                command_buffer,
                image.handle(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                0,
                mip_levels,
            )?;

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(color_layers(0))
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });

            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image.handle(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region.build()],
                );
            }

            record_mip_chain(device, command_buffer, &image)
        })?;

        let view = image.create_view(vk::ImageAspectFlags::COLOR)?;
        let sampler = Sampler::new(
            context.raw_device(),
            mip_levels,
            context.physical_device.capabilities.max_sampler_anisotropy,
        )?;

        log::info!(
            "Uploaded {}x{} texture ({} bytes) with {} mip levels",
            extent.width,
            extent.height,
            data.size_bytes(),
            mip_levels
        );

        Ok(Self { sampler, view, image })
    }

    /// Get the image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Get the sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }
}

/// Blit each level from the one above it, leaving all levels shader-readable
fn record_mip_chain(device: &Device, command_buffer: vk::CommandBuffer, image: &Image) -> VulkanResult<()> {
    let mut width = image.extent().width;
    let mut height = image.extent().height;

    for level in 1..image.mip_levels() {
        let source = level - 1;
        record_layout_transition(
            device,
            command_buffer,
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            source,
            1,
        )?;

        let next_width = next_mip_extent(width);
        let next_height = next_mip_extent(height);
        let blit = vk::ImageBlit::builder()
            .src_offsets([vk::Offset3D { x: 0, y: 0, z: 0 }, blit_corner(width, height)?])
            .src_subresource(color_layers(source))
            .dst_offsets([vk::Offset3D { x: 0, y: 0, z: 0 }, blit_corner(next_width, next_height)?])
            .dst_subresource(color_layers(level));

        unsafe {
            device.cmd_blit_image(
                command_buffer,
                image.handle(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit.build()],
                vk::Filter::LINEAR,
            );
        }

        record_layout_transition(
            device,
            command_buffer,
            image.handle(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            source,
            1,
        )?;

        width = next_width;
        height = next_height;
    }

    // The last level was only ever a blit destination
    record_layout_transition(
        device,
        command_buffer,
        image.handle(),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        image.mip_levels() - 1,
        1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(100, 37), 7);
        assert_eq!(mip_level_count(37, 100), 7);
        assert_eq!(mip_level_count(1024, 1), 11);
    }

    #[test]
    fn test_next_mip_extent_never_reaches_zero() {
        assert_eq!(next_mip_extent(512), 256);
        assert_eq!(next_mip_extent(3), 1);
        assert_eq!(next_mip_extent(1), 1);
    }

    #[test]
    fn test_chain_ends_at_one_pixel() {
        let (mut width, mut height) = (100u32, 37u32);
        for _ in 1..mip_level_count(100, 37) {
            width = next_mip_extent(width);
            height = next_mip_extent(height);
        }
        assert_eq!((width, height), (1, 1));
    }

    #[test]
    fn test_upload_transition_masks() {
        let masks = layout_transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_shader_read_transition_masks() {
        let masks = layout_transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_unknown_transition_is_rejected() {
        let result = layout_transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(VulkanError::UnsupportedLayoutTransition { old, new, .. })
                if old == vk::ImageLayout::UNDEFINED && new == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        ));
    }

    #[test]
    fn test_linear_filtering_requirement() {
        let supported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(require_linear_filtering(TEXTURE_FORMAT, supported).is_ok());

        let unsupported = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(matches!(
            require_linear_filtering(TEXTURE_FORMAT, unsupported),
            Err(VulkanError::UnsupportedFormatFeature { .. })
        ));
    }

    #[test]
    fn test_blit_corner_rejects_huge_dimensions() {
        assert_eq!(blit_corner(4, 2).unwrap(), vk::Offset3D { x: 4, y: 2, z: 1 });
        assert!(blit_corner(u32::MAX, 1).is_err());
    }
}
