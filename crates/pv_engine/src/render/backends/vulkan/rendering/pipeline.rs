//! Graphics pipeline construction
//!
//! [`PipelineConfig::standard`] fixes every piece of state the viewer uses. The
//! viewport and scissor are baked in, so the pipeline is rebuilt with the swapchain.

use ash::{vk, Device};
use crate::render::backends::vulkan::{
    RenderPass, RenderPassConfig, ShaderCode, ShaderModule, VertexInputLayout, VkResultExt, VulkanError, VulkanResult,
};

/// Fixed-function state for the graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Viewport and scissor size
    pub extent: vk::Extent2D,
    /// Primitive assembly
    pub topology: vk::PrimitiveTopology,
    /// Faces to cull
    pub cull_mode: vk::CullModeFlags,
    /// Winding that counts as front-facing
    pub front_face: vk::FrontFace,
    /// Rasterization samples
    pub samples: vk::SampleCountFlags,
    /// Depth test and write enabled
    pub depth_test: bool,
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
    /// Color blending enabled
    pub blend_enable: bool,
}

impl PipelineConfig {
    /// Triangle list, back-face culling with counter-clockwise front faces,
    /// single sample, depth `LESS` with writes, no blending
    pub fn standard(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_compare: vk::CompareOp::LESS,
            blend_enable: false,
        }
    }

    /// Full-extent viewport with a 0..1 depth range
    #[allow(clippy::cast_precision_loss)]
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Full-extent scissor
    pub fn scissor(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create the pipeline and its layout
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        shaders: &ShaderCode,
        vertex_layout: &VertexInputLayout,
        descriptor_set_layout: vk::DescriptorSetLayout,
        config: &PipelineConfig,
    ) -> VulkanResult<Self> {
        let vertex_shader = ShaderModule::new(device, &shaders.vertex)?;
        let fragment_shader = ShaderModule::new(device, &shaders.fragment)?;
        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input_info = vertex_layout.create_info();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        let viewports = [config.viewport()];
        let scissors = [config.scissor()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(config.samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_test)
            .depth_compare_op(config.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(config.blend_enable)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .vk_context("vkCreatePipelineLayout")?
        };

        // Drop releases the layout if pipeline creation fails below
        let mut result = Self {
            device: device.clone(),
            pipeline: vk::Pipeline::null(),
            layout,
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, result)| result)
                .vk_context("vkCreateGraphicsPipelines")?
        };
        result.pipeline = pipelines.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Pipeline creation returned no pipeline".to_string(),
        })?;

        Ok(result)
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Pipeline and render pass rebuilt with every swapchain
///
/// Drops the pipeline before the render pass it was created against.
pub struct RenderPipelineState {
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
}

impl RenderPipelineState {
    /// Build the render pass, then the pipeline against it
    pub fn new(
        device: &Device,
        render_pass_config: &RenderPassConfig,
        pipeline_config: &PipelineConfig,
        shaders: &ShaderCode,
        vertex_layout: &VertexInputLayout,
        descriptor_set_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let render_pass = RenderPass::new(device, render_pass_config)?;
        let pipeline = GraphicsPipeline::new(
            device,
            render_pass.handle(),
            shaders,
            vertex_layout,
            descriptor_set_layout,
            pipeline_config,
        )?;

        log::debug!(
            "Built graphics pipeline for {}x{}",
            pipeline_config.extent.width,
            pipeline_config.extent.height
        );

        Ok(Self { pipeline, render_pass })
    }

    /// The graphics pipeline
    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    /// The render pass
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_state() {
        let config = PipelineConfig::standard(vk::Extent2D { width: 800, height: 600 });
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(config.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(config.samples, vk::SampleCountFlags::TYPE_1);
        assert!(config.depth_test);
        assert_eq!(config.depth_compare, vk::CompareOp::LESS);
        assert!(!config.blend_enable);
    }

    #[test]
    fn test_viewport_covers_extent() {
        let config = PipelineConfig::standard(vk::Extent2D { width: 1024, height: 768 });
        let viewport = config.viewport();
        assert!((viewport.width - 1024.0).abs() < f32::EPSILON);
        assert!((viewport.height - 768.0).abs() < f32::EPSILON);
        assert!((viewport.max_depth - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.scissor().extent, config.extent);
    }
}
