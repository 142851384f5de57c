//! Vulkan backend implementation
//!
//! Organized into initialization, state, rendering and resources modules, with
//! [`VulkanRenderer`] tying them together.

/// Error type and result checking
pub mod error;

/// Vulkan initialization types (window, instance, surface, devices)
pub mod initialization;

/// Swapchain, depth buffer, framebuffers and semaphores
pub mod state;

/// Render pass, pipeline, shaders and command recording
pub mod rendering;

/// Memory, buffers, textures and descriptors
pub mod resources;

/// Main Vulkan renderer implementation
pub mod renderer;

pub use error::*;
pub use initialization::*;
pub use state::*;
pub use rendering::*;
pub use resources::*;

pub use renderer::VulkanRenderer;
