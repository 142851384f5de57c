//! Command buffer management
//!
//! A single pool serves both the per-image draw buffers and the one-shot transfer
//! buffers used during uploads.

use ash::{vk, Device};
use crate::render::backends::vulkan::{VkResultExt, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool for `queue_family_index`
    pub fn new(device: &Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .vk_context("vkCreateCommandPool")?
        };

        Ok(Self {
            device: device.clone(),
            command_pool,
        })
    }

    /// Allocate primary command buffers that are freed together on drop
    pub fn allocate(&self, count: u32) -> VulkanResult<CommandBuffers> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .vk_context("vkAllocateCommandBuffers")?
        };

        Ok(CommandBuffers {
            device: self.device.clone(),
            pool: self.command_pool,
            buffers,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees any buffers still allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Command buffers returned to their pool on drop
///
/// Must be dropped before the pool it came from.
pub struct CommandBuffers {
    device: Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    /// Buffer handles in allocation order
    pub fn handles(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers were allocated
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffer at `index`
    pub fn get(&self, index: usize) -> Option<vk::CommandBuffer> {
        self.buffers.get(index).copied()
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe {
                self.device.free_command_buffers(self.pool, &self.buffers);
            }
        }
    }
}

/// Scoped command context for blocking one-shot GPU work
///
/// Each [`SingleTimeCommands::submit`] allocates a buffer, records through the
/// closure, submits, waits for the queue to go idle and frees the buffer again.
pub struct SingleTimeCommands<'a> {
    device: &'a Device,
    pool: &'a CommandPool,
    queue: vk::Queue,
}

impl<'a> SingleTimeCommands<'a> {
    /// Bind a pool and the queue the work is submitted to
    pub fn new(device: &'a Device, pool: &'a CommandPool, queue: vk::Queue) -> Self {
        Self { device, pool, queue }
    }

    /// Record with `record`, submit and block until the queue is idle
    pub fn submit<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        let buffers = self.pool.allocate(1)?;
        let command_buffer = buffers.get(0).ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Command buffer allocation returned nothing".to_string(),
        })?;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .vk_context("vkBeginCommandBuffer")?;
        }

        record(self.device, command_buffer)?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .vk_context("vkEndCommandBuffer")?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .vk_context("vkQueueSubmit")?;
            self.device
                .queue_wait_idle(self.queue)
                .vk_context("vkQueueWaitIdle")?;
        }

        Ok(())
    }
}

/// Command buffer recorder for the per-image draw buffers
pub struct CommandRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Begin recording a buffer that may be pending while it is resubmitted
    pub fn begin(device: &'a Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .vk_context("vkBeginCommandBuffer")?;
        }

        Ok(Self { device, command_buffer })
    }

    /// Begin an inline render pass, ended when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_, 'a> {
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        ActiveRenderPass { recorder: self }
    }

    /// End command recording
    pub fn end(self) -> VulkanResult<vk::CommandBuffer> {
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .vk_context("vkEndCommandBuffer")?;
        }
        Ok(self.command_buffer)
    }
}

/// Render pass scope; dropping it records the end of the pass
pub struct ActiveRenderPass<'r, 'a> {
    recorder: &'r mut CommandRecorder<'a>,
}

impl ActiveRenderPass<'_, '_> {
    /// Bind graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind one vertex buffer at binding 0
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder
                .device
                .cmd_bind_vertex_buffers(self.recorder.command_buffer, 0, &[buffer], &[0]);
        }
    }

    /// Bind a 32-bit index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(
                self.recorder.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Draw one instance of `index_count` indices
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.recorder
                .device
                .cmd_draw_indexed(self.recorder.command_buffer, index_count, 1, 0, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_, '_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
