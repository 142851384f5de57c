//! Vulkan vertex input state derived from [`VertexInput`] types

use ash::vk;
use crate::render::primitives::{AttributeKind, VertexInput};

/// Attribute kind to Vulkan format, indexed by the kind's discriminant
pub const ATTRIBUTE_FORMATS: [(AttributeKind, vk::Format); 3] = [
    (AttributeKind::Float2, vk::Format::R32G32_SFLOAT),
    (AttributeKind::Float3, vk::Format::R32G32B32_SFLOAT),
    (AttributeKind::Float4, vk::Format::R32G32B32A32_SFLOAT),
];

/// Vulkan format used for an attribute kind
pub const fn attribute_format(kind: AttributeKind) -> vk::Format {
    ATTRIBUTE_FORMATS[kind as usize].1
}

/// Binding and attribute descriptions for one interleaved vertex stream
#[derive(Debug, Clone)]
pub struct VertexInputLayout {
    binding: vk::VertexInputBindingDescription,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputLayout {
    /// Layout of `V` bound at `binding`, one attribute location per field
    pub fn of<V: VertexInput>(binding: u32) -> Self {
        let binding_description = vk::VertexInputBindingDescription {
            binding,
            stride: u32_of(V::stride()),
            input_rate: vk::VertexInputRate::VERTEX,
        };

        let attributes = V::ATTRIBUTES
            .iter()
            .zip(0u32..)
            .map(|(attribute, location)| vk::VertexInputAttributeDescription {
                location,
                binding,
                format: attribute_format(attribute.kind),
                offset: u32_of(attribute.offset),
            })
            .collect();

        Self {
            binding: binding_description,
            attributes,
        }
    }

    /// Binding description
    pub fn binding(&self) -> &vk::VertexInputBindingDescription {
        &self.binding
    }

    /// Attribute descriptions in location order
    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }

    /// Vertex input state borrowing this layout
    pub fn create_info(&self) -> vk::PipelineVertexInputStateCreateInfoBuilder<'_> {
        vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(std::slice::from_ref(&self.binding))
            .vertex_attribute_descriptions(&self.attributes)
    }
}

// Vertex strides and offsets are a few dozen bytes
#[allow(clippy::cast_possible_truncation)]
const fn u32_of(value: usize) -> u32 {
    value as u32
}
