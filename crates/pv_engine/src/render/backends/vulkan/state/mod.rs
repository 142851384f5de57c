//! Swapchain-sized state and frame synchronization

pub mod framebuffer;
pub mod swapchain;
pub mod sync;

pub use framebuffer::*;
pub use swapchain::*;
pub use sync::*;
