//! # Rendering
//!
//! Backend-agnostic geometry and transform types, the frame scheduler, and the
//! Vulkan backend that implements it.

pub mod primitives;
pub mod uniforms;
pub mod frame;

/// Graphics backend implementations
pub mod backends;

pub use frame::{AcquireOutcome, FrameBackend, FrameResult, FrameScheduler, FrameState, PresentOutcome};
pub use primitives::{Mesh, Vertex};
pub use uniforms::UniformBufferObject;
