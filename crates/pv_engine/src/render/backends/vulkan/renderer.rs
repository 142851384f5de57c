//! Vulkan renderer
//!
//! Owns every GPU object of a session. Session-lifetime resources (mesh buffers,
//! texture, uniform buffer, descriptor set) are created once; everything sized by
//! the swapchain lives in [`Presentation`] and is rebuilt on recreation.
//!
//! Fields are declared in teardown order so that dropping the renderer releases
//! objects before the objects they were created from.

use ash::vk;
use crate::assets::ImageData;
use crate::core::config::VulkanRendererConfig;
use crate::render::backends::vulkan::{
    check_attachment_counts, CommandBuffers, CommandPool, CommandRecorder, DescriptorBinder,
    FrameSync, Framebuffer, MeshBuffers, PipelineConfig, RenderPassConfig, RenderPipelineState,
    ShaderCode, SingleTimeCommands, SwapchainState, Texture, UniformBuffer, VertexInputLayout,
    VkResultExt, VulkanContext, VulkanError, VulkanResult, Window,
};
use crate::render::frame::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::render::primitives::{Mesh, Vertex};
use crate::render::uniforms::UniformBufferObject;

/// Colour the colour attachment is cleared to
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Depth the depth attachment is cleared to
pub const CLEAR_DEPTH: f32 = 1.0;

/// Objects that depend on the swapchain, in teardown order
struct Presentation {
    command_buffers: CommandBuffers,
    framebuffers: Vec<Framebuffer>,
    pipeline: RenderPipelineState,
    swapchain: SwapchainState,
}

/// Renders one textured mesh with a rotating transform
pub struct VulkanRenderer {
    presentation: Option<Presentation>,
    sync: Vec<FrameSync>,
    descriptors: DescriptorBinder,
    uniform_buffer: UniformBuffer<UniformBufferObject>,
    texture: Texture,
    mesh: MeshBuffers,
    shaders: ShaderCode,
    command_pool: CommandPool,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Bring up Vulkan for `window`, upload `mesh` and `texture`, and build the
    /// presentation chain for `window_extent`
    pub fn new(
        window: &Window,
        config: &VulkanRendererConfig,
        mesh: &Mesh,
        texture: &ImageData,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        log::debug!("Creating VulkanRenderer...");

        mesh.validate().map_err(VulkanError::InvalidMesh)?;
        let shaders = ShaderCode::load(&config.shaders)?;

        let context = VulkanContext::new(
            window,
            &config.application_name,
            config.application_version,
            config.validation_enabled(),
        )?;
        let device = context.raw_device();
        let command_pool = CommandPool::new(device, context.graphics_queue_family())?;

        let (mesh, texture) = {
            let uploads = SingleTimeCommands::new(device, &command_pool, context.graphics_queue());
            (
                MeshBuffers::upload(&context, &uploads, mesh)?,
                Texture::from_image_data(&context, &uploads, texture)?,
            )
        };

        let uniform_buffer = UniformBuffer::<UniformBufferObject>::new(&context)?;
        let descriptors = DescriptorBinder::new(device)?;
        descriptors.bind(
            device,
            uniform_buffer.handle(),
            uniform_buffer.size(),
            texture.view(),
            texture.sampler(),
        );

        let sync = FrameSync::for_frames_in_flight(device)?;

        let mut renderer = Self {
            presentation: None,
            sync,
            descriptors,
            uniform_buffer,
            texture,
            mesh,
            shaders,
            command_pool,
            context,
        };
        renderer.presentation = Some(renderer.build_presentation(window_extent)?);

        log::debug!("VulkanRenderer created successfully");
        Ok(renderer)
    }

    fn build_presentation(&self, window_extent: vk::Extent2D) -> VulkanResult<Presentation> {
        let device = self.context.raw_device();
        let swapchain = SwapchainState::new(&self.context, window_extent)?;
        let extent = swapchain.extent();

        let pipeline = RenderPipelineState::new(
            device,
            &RenderPassConfig::forward(swapchain.format(), swapchain.depth_buffer().format()),
            &PipelineConfig::standard(extent),
            &self.shaders,
            &VertexInputLayout::of::<Vertex>(0),
            self.descriptors.layout().handle(),
        )?;

        let depth_view = swapchain.depth_buffer().view();
        let framebuffers = swapchain
            .image_views()
            .map(|view| {
                Framebuffer::new(device, pipeline.render_pass().handle(), &[view, depth_view], extent)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        check_attachment_counts(
            swapchain.image_count(),
            swapchain.view_count(),
            framebuffers.len(),
        )?;

        let count = u32::try_from(framebuffers.len()).map_err(|_| VulkanError::InvalidOperation {
            reason: "Too many swapchain images".to_string(),
        })?;
        let command_buffers = self.command_pool.allocate(count)?;
        self.record_draw_commands(&command_buffers, &framebuffers, &pipeline, extent)?;

        log::info!(
            "Presentation ready: {}x{}, {} images",
            extent.width,
            extent.height,
            framebuffers.len()
        );

        Ok(Presentation {
            command_buffers,
            framebuffers,
            pipeline,
            swapchain,
        })
    }

    /// Record one reusable draw for every swapchain image
    fn record_draw_commands(
        &self,
        command_buffers: &CommandBuffers,
        framebuffers: &[Framebuffer],
        pipeline: &RenderPipelineState,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let render_area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
        let clear_values = [
            vk::ClearValue { color: vk::ClearColorValue { float32: CLEAR_COLOR } },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: CLEAR_DEPTH, stencil: 0 },
            },
        ];

        for (&command_buffer, framebuffer) in command_buffers.handles().iter().zip(framebuffers) {
            let mut recorder = CommandRecorder::begin(device, command_buffer)?;
            {
                let mut pass = recorder.begin_render_pass(
                    pipeline.render_pass().handle(),
                    framebuffer.handle(),
                    render_area,
                    &clear_values,
                );
                pass.bind_pipeline(pipeline.pipeline().handle());
                pass.bind_vertex_buffer(self.mesh.vertex_buffer());
                pass.bind_index_buffer(self.mesh.index_buffer());
                pass.bind_descriptor_sets(pipeline.pipeline().layout(), &[self.descriptors.set()]);
                pass.draw_indexed(self.mesh.index_count());
            }
            recorder.end()?;
        }

        Ok(())
    }

    fn presentation(&self) -> VulkanResult<&Presentation> {
        self.presentation.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Swapchain is not built".to_string(),
        })
    }

    fn frame_sync(&self, frame: usize) -> VulkanResult<&FrameSync> {
        self.sync.get(frame).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No synchronization for frame slot {frame}"),
        })
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.presentation.as_ref().map(|p| p.swapchain.extent())
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.presentation.as_ref().map_or(0, |p| p.swapchain.image_count())
    }

    /// Number of semaphore sets cycled through
    pub fn frames_in_flight(&self) -> usize {
        self.sync.len()
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.device.wait_idle()
    }
}

impl FrameBackend for VulkanRenderer {
    fn wait_for_presentation(&mut self) -> VulkanResult<()> {
        unsafe {
            self.context
                .raw_device()
                .queue_wait_idle(self.context.present_queue())
                .vk_context("vkQueueWaitIdle")
        }
    }

    fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome> {
        let swapchain = self.presentation()?.swapchain.swapchain();
        let semaphore = self.frame_sync(frame)?.image_available.handle();

        let acquired = unsafe {
            swapchain
                .loader()
                .acquire_next_image(swapchain.handle(), u64::MAX, semaphore, vk::Fence::null())
        };

        match acquired {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(result) => Err(result).vk_context("vkAcquireNextImageKHR"),
        }
    }

    fn update_uniforms(&mut self, elapsed_seconds: f32) -> VulkanResult<()> {
        let extent = self.presentation()?.swapchain.extent();
        let aspect = UniformBufferObject::aspect_ratio(extent.width, extent.height);
        self.uniform_buffer.write(&UniformBufferObject::at_time(elapsed_seconds, aspect));
        Ok(())
    }

    fn submit(&mut self, frame: usize, image_index: u32) -> VulkanResult<()> {
        let command_buffer = self
            .presentation()?
            .command_buffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No command buffer for swapchain image {image_index}"),
            })?;
        let sync = self.frame_sync(frame)?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .raw_device()
                .queue_submit(self.context.graphics_queue(), &[submit_info.build()], vk::Fence::null())
                .vk_context("vkQueueSubmit")
        }
    }

    fn present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let swapchain = self.presentation()?.swapchain.swapchain();
        let wait_semaphores = [self.frame_sync(frame)?.render_finished.handle()];
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match presented {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::NeedsRecreate),
            Err(result) => Err(result).vk_context("vkQueuePresentKHR"),
        }
    }

    fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> VulkanResult<()> {
        self.wait_idle()?;
        let previous_images = self.image_count();

        // The old chain must be gone before the surface accepts a new one
        self.presentation = None;
        self.presentation = Some(self.build_presentation(window_extent)?);

        log::info!(
            "Swapchain recreated for {}x{} ({} -> {} images)",
            window_extent.width,
            window_extent.height,
            previous_images,
            self.image_count()
        );
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {}", e);
        }
        log::debug!("VulkanRenderer dropped");
    }
}
