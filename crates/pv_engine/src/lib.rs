//! # PV Engine
//!
//! A minimal renderer built directly on Vulkan. It opens a window, selects a GPU,
//! uploads one textured mesh and presents it every frame with a rotating
//! model-view-projection transform.
//!
//! ## Layout
//!
//! - **Device selection**: scores every physical device and opens one logical device
//! - **Swapchain management**: picks surface format, present mode and extent, and
//!   rebuilds the presentation chain when the window changes
//! - **Pipeline building**: fixed render pass, descriptor layout and graphics pipeline
//! - **Resource uploads**: staged buffers, mipmapped textures, persistently mapped uniforms
//! - **Frame scheduling**: the acquire, submit and present loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pv_engine::core::config::ApplicationConfig;
//! use pv_engine::Application;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     pv_engine::foundation::logging::init();
//!     let mut app = Application::new(ApplicationConfig::default())?;
//!     app.run()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod config;
pub mod foundation;
pub mod assets;
pub mod render;

mod application;

pub use application::{AppError, Application};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Application, AppError,
        core::config::{ApplicationConfig, AssetConfig, ShaderConfig, VulkanRendererConfig, WindowConfig},
        config::Config,
        foundation::math::{Mat4, Vec2, Vec3},
        render::{FrameScheduler, Mesh, Vertex, UniformBufferObject},
    };
}
