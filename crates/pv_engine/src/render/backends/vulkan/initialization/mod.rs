//! Vulkan initialization components

pub mod context;
pub mod device;
pub mod surface;
pub mod window;

pub use context::*;
pub use device::*;
pub use surface::*;
pub use window::*;
