//! Render pass, pipeline, shaders and command recording

pub mod commands;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;

pub use commands::*;
pub use pipeline::*;
pub use render_pass::*;
pub use shader::*;
pub use vertex_layout::*;
