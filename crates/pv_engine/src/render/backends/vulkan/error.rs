//! Vulkan backend error types
//!
//! Every fallible ash call is checked on the spot through [`VkResultExt::vk_context`],
//! which records the operation name and the calling source location. Anything that
//! surfaces as a [`VulkanError`] is fatal for the session. Recoverable presentation
//! states (an outdated or suboptimal swapchain) are reported as values instead; see
//! [`crate::render::frame`].

use ash::vk;
use std::panic::Location;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A Vulkan call returned a failure code
    #[error("{operation} failed with {result:?} at {location}")]
    Api {
        /// Name of the Vulkan entry point that failed
        operation: &'static str,
        /// Result code returned by the driver
        result: vk::Result,
        /// Source location of the checked call
        location: &'static Location<'static>,
    },

    /// No enumerated physical device met the hard requirements
    #[error("No suitable GPU found at {location}")]
    NoSuitableDevice {
        /// Where the selection gave up
        location: &'static Location<'static>,
    },

    /// No memory type matched the requested filter and properties
    #[error("No suitable memory type found at {location}")]
    NoSuitableMemoryType {
        /// Where the lookup failed
        location: &'static Location<'static>,
    },

    /// None of the candidate depth formats can be used as a depth attachment
    #[error("No supported depth format found at {location}")]
    NoSupportedDepthFormat {
        /// Where the lookup failed
        location: &'static Location<'static>,
    },

    /// Requested image layout transition is not one the uploader knows
    #[error("Unsupported layout transition {old:?} -> {new:?} at {location}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
        /// Where the transition was requested
        location: &'static Location<'static>,
    },

    /// A format lacks a feature the renderer depends on
    #[error("Format {format:?} does not support {feature:?} at {location}")]
    UnsupportedFormatFeature {
        /// Format that was queried
        format: vk::Format,
        /// Missing feature bits
        feature: vk::FormatFeatureFlags,
        /// Where the feature check failed
        location: &'static Location<'static>,
    },

    /// Mesh data cannot be drawn
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

impl VulkanError {
    /// [`VulkanError::NoSuitableDevice`] tagged with the caller's location
    #[track_caller]
    pub fn no_suitable_device() -> Self {
        Self::NoSuitableDevice { location: Location::caller() }
    }

    /// [`VulkanError::NoSuitableMemoryType`] tagged with the caller's location
    #[track_caller]
    pub fn no_suitable_memory_type() -> Self {
        Self::NoSuitableMemoryType { location: Location::caller() }
    }

    /// [`VulkanError::NoSupportedDepthFormat`] tagged with the caller's location
    #[track_caller]
    pub fn no_supported_depth_format() -> Self {
        Self::NoSupportedDepthFormat { location: Location::caller() }
    }

    /// [`VulkanError::UnsupportedLayoutTransition`] tagged with the caller's location
    #[track_caller]
    pub fn unsupported_layout_transition(old: vk::ImageLayout, new: vk::ImageLayout) -> Self {
        Self::UnsupportedLayoutTransition { old, new, location: Location::caller() }
    }

    /// [`VulkanError::UnsupportedFormatFeature`] tagged with the caller's location
    #[track_caller]
    pub fn unsupported_format_feature(format: vk::Format, feature: vk::FormatFeatureFlags) -> Self {
        Self::UnsupportedFormatFeature { format, feature, location: Location::caller() }
    }

    /// Source location recorded for this error, if the variant carries one
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Self::Api { location, .. }
            | Self::NoSuitableDevice { location }
            | Self::NoSuitableMemoryType { location }
            | Self::NoSupportedDepthFormat { location }
            | Self::UnsupportedLayoutTransition { location, .. }
            | Self::UnsupportedFormatFeature { location, .. } => Some(location),
            Self::InvalidMesh(_) | Self::InitializationFailed(_) | Self::InvalidOperation { .. } => None,
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Attaches an operation name and call site to raw ash results
pub trait VkResultExt<T> {
    /// Convert a raw `vk::Result` failure into [`VulkanError::Api`]
    fn vk_context(self, operation: &'static str) -> VulkanResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[track_caller]
    fn vk_context(self, operation: &'static str) -> VulkanResult<T> {
        let location = Location::caller();
        self.map_err(|result| VulkanError::Api { operation, result, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_records_operation_and_call_site() {
        let line = line!() + 1;
        let err = Err::<(), _>(vk::Result::ERROR_DEVICE_LOST).vk_context("vkQueueSubmit").unwrap_err();

        match &err {
            VulkanError::Api { operation, result, location } => {
                assert_eq!(*operation, "vkQueueSubmit");
                assert_eq!(*result, vk::Result::ERROR_DEVICE_LOST);
                assert_eq!(location.line(), line);
                assert!(location.file().ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let message = err.to_string();
        assert!(message.contains("vkQueueSubmit"));
        assert!(message.contains("ERROR_DEVICE_LOST"));
    }

    #[test]
    fn test_lookup_failures_carry_their_call_site() {
        let line = line!() + 2;
        let errors = [
            VulkanError::no_suitable_device(),
            VulkanError::no_suitable_memory_type(),
            VulkanError::no_supported_depth_format(),
            VulkanError::unsupported_layout_transition(
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
            VulkanError::unsupported_format_feature(
                vk::Format::R8G8B8A8_SRGB,
                vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ),
        ];

        for err in &errors {
            let location = err.location().unwrap();
            assert!(location.file().ends_with("error.rs"));
            assert!(location.line() >= line);
            assert!(err.to_string().contains(&format!("error.rs:{}", location.line())), "{err}");
        }

        assert!(VulkanError::InvalidMesh("empty".into()).location().is_none());
    }

    #[test]
    fn test_success_passes_through() {
        let value = Ok::<_, vk::Result>(7).vk_context("vkCreateBuffer").unwrap();
        assert_eq!(value, 7);
    }
}
