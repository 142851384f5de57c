//! Viewer lifecycle: load assets, open the window, bring up the renderer and run
//! the frame loop until the window closes

use ash::vk;
use thiserror::Error;
use crate::assets::{AssetError, ImageData, ObjLoader};
use crate::config::ConfigError;
use crate::core::config::ApplicationConfig;
use crate::render::backends::vulkan::{VulkanError, VulkanRenderer, Window, WindowError};
use crate::render::frame::{FrameResult, FrameScheduler};

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Fatal Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Model or texture could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Configuration is unusable
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// The model viewer
pub struct Application {
    scheduler: FrameScheduler,
    renderer: VulkanRenderer,
    window: Window,
    config: ApplicationConfig,
}

impl Application {
    /// Load assets and initialize the window and renderer
    pub fn new(config: ApplicationConfig) -> Result<Self, AppError> {
        config.validate()?;

        log::info!("Loading model from {}", config.assets.model_path);
        let mesh = ObjLoader::load_mesh(&config.assets.model_path)?;
        log::info!(
            "Model has {} unique vertices, {} triangles",
            mesh.vertices.len(),
            mesh.triangle_count()
        );

        log::info!("Loading texture from {}", config.assets.texture_path);
        let texture = ImageData::from_file(&config.assets.texture_path)?;

        let window = Window::new(&config.window.title, config.window.width, config.window.height)?;
        let extent = framebuffer_extent(&window);
        let renderer = VulkanRenderer::new(&window, &config.renderer, &mesh, &texture, extent)?;
        let scheduler = FrameScheduler::new(renderer.frames_in_flight(), extent);

        Ok(Self {
            scheduler,
            renderer,
            window,
            config,
        })
    }

    /// Run the frame loop until the window is closed
    pub fn run(&mut self) -> Result<(), AppError> {
        log::info!("Entering frame loop");

        while !self.window.should_close() {
            self.window.poll_events();
            self.scheduler.observe_window_extent(framebuffer_extent(&self.window));

            if self.scheduler.draw_frame(&mut self.renderer)? == FrameResult::Skipped {
                // Minimized; sleep until something happens
                self.window.wait_events();
            }
        }

        self.renderer.wait_idle()?;
        log::info!("Frame loop finished after {} frames", self.scheduler.frames_presented());
        Ok(())
    }

    /// Configuration the application was started with
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }
}

fn framebuffer_extent(window: &Window) -> vk::Extent2D {
    let (width, height) = window.get_framebuffer_size();
    vk::Extent2D { width, height }
}
