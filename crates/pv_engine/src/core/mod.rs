//! Core engine types
//!
//! Holds the configuration structures shared by the renderer and the application.

pub mod config;
