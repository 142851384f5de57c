//! Frame scheduling
//!
//! [`FrameScheduler`] drives one acquire, submit and present cycle per call and
//! decides when the presentation chain must be rebuilt. The GPU side sits behind
//! [`FrameBackend`] so the control flow can run against a mock.

use ash::vk;
use std::time::Instant;
use crate::render::backends::vulkan::VulkanResult;

/// Where the scheduler is within the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Waiting for the previous present and acquiring an image
    Acquiring,
    /// Updating uniforms and submitting the command buffer
    Submitting,
    /// Queueing the image for presentation
    Presenting,
}

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available
    Ready {
        /// Swapchain image to render into
        image_index: u32,
        /// The swapchain still works but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The swapchain can no longer be used with the surface
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented with a matching swapchain
    Presented,
    /// Presented or dropped, and the swapchain is out of date or suboptimal
    NeedsRecreate,
}

/// What happened during one [`FrameScheduler::draw_frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// A frame reached the presentation engine
    Presented,
    /// The presentation chain was rebuilt
    Recreated,
    /// Nothing was drawn because the window has no area
    Skipped,
}

/// GPU operations the scheduler sequences
pub trait FrameBackend {
    /// Block until earlier presentation work has finished
    fn wait_for_presentation(&mut self) -> VulkanResult<()>;

    /// Acquire the next image, signalling the image-available semaphore of `frame`
    fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome>;

    /// Write the transform for `elapsed_seconds` into the uniform buffer
    fn update_uniforms(&mut self, elapsed_seconds: f32) -> VulkanResult<()>;

    /// Submit the recorded command buffer for `image_index`
    fn submit(&mut self, frame: usize, image_index: u32) -> VulkanResult<()>;

    /// Present `image_index` once rendering of `frame` has finished
    fn present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Rebuild every swapchain-dependent object for `window_extent`
    fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> VulkanResult<()>;
}

/// Per-frame control flow and swapchain recreation policy
pub struct FrameScheduler {
    state: FrameState,
    current_frame: usize,
    frames_in_flight: usize,
    window_extent: vk::Extent2D,
    resized: bool,
    frames_presented: u64,
    started: Instant,
}

impl FrameScheduler {
    /// Create a scheduler cycling through `frames_in_flight` semaphore sets
    pub fn new(frames_in_flight: usize, window_extent: vk::Extent2D) -> Self {
        Self {
            state: FrameState::Idle,
            current_frame: 0,
            frames_in_flight: frames_in_flight.max(1),
            window_extent,
            resized: false,
            frames_presented: 0,
            started: Instant::now(),
        }
    }

    /// Record the framebuffer size seen by the event loop
    pub fn observe_window_extent(&mut self, extent: vk::Extent2D) {
        if extent != self.window_extent {
            log::debug!(
                "Window resized {}x{} -> {}x{}",
                self.window_extent.width,
                self.window_extent.height,
                extent.width,
                extent.height
            );
            self.window_extent = extent;
            self.resized = true;
        }
    }

    /// Draw one frame using the time since the scheduler was created
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<FrameResult> {
        let elapsed = self.started.elapsed().as_secs_f32();
        self.draw_frame_at(backend, elapsed)
    }

    /// Draw one frame for an explicit animation time
    pub fn draw_frame_at<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        elapsed_seconds: f32,
    ) -> VulkanResult<FrameResult> {
        if self.window_extent.width == 0 || self.window_extent.height == 0 {
            return Ok(FrameResult::Skipped);
        }

        self.state = FrameState::Acquiring;
        backend.wait_for_presentation()?;

        let (image_index, suboptimal) = match backend.acquire_next_image(self.current_frame)? {
            AcquireOutcome::Ready { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date on acquire, recreating");
                self.state = FrameState::Idle;
                self.recreate(backend)?;
                return Ok(FrameResult::Recreated);
            }
        };

        self.state = FrameState::Submitting;
        backend.update_uniforms(elapsed_seconds)?;
        backend.submit(self.current_frame, image_index)?;

        self.state = FrameState::Presenting;
        let outcome = backend.present(self.current_frame, image_index)?;

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        self.state = FrameState::Idle;

        if outcome == PresentOutcome::NeedsRecreate || suboptimal {
            log::warn!("Swapchain no longer matches the surface, recreating");
        }
        if outcome == PresentOutcome::NeedsRecreate || suboptimal || self.resized {
            self.recreate(backend)?;
            return Ok(FrameResult::Recreated);
        }

        self.frames_presented += 1;
        Ok(FrameResult::Presented)
    }

    fn recreate<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<()> {
        backend.recreate_swapchain(self.window_extent)?;
        self.resized = false;
        Ok(())
    }

    /// Current position within the frame
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Index of the semaphore set the next frame uses
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Frames presented without triggering a rebuild
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Last window extent recorded
    pub fn window_extent(&self) -> vk::Extent2D {
        self.window_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::{check_attachment_counts, VulkanError};
    use std::collections::VecDeque;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Wait,
        Acquire(usize),
        Uniforms,
        Submit(usize, u32),
        Present(usize, u32),
        Recreate(vk::Extent2D),
    }

    struct MockBackend {
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        surface_image_count: usize,
        images: Vec<u64>,
        views: Vec<u64>,
        framebuffers: Vec<u64>,
        fail_submit: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                surface_image_count: 3,
                images: vec![1, 2, 3],
                views: vec![11, 12, 13],
                framebuffers: vec![21, 22, 23],
                fail_submit: false,
            }
        }

        fn attachments_consistent(&self) -> bool {
            check_attachment_counts(self.images.len(), self.views.len(), self.framebuffers.len()).is_ok()
        }

        fn submitted(&self) -> bool {
            self.calls.iter().any(|call| matches!(call, Call::Submit(..)))
        }

        fn recreations(&self) -> usize {
            self.calls.iter().filter(|call| matches!(call, Call::Recreate(_))).count()
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_presentation(&mut self) -> VulkanResult<()> {
            self.calls.push(Call::Wait);
            Ok(())
        }

        fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(frame));
            Ok(self
                .acquires
                .pop_front()
                .unwrap_or(AcquireOutcome::Ready { image_index: 0, suboptimal: false }))
        }

        fn update_uniforms(&mut self, _elapsed_seconds: f32) -> VulkanResult<()> {
            self.calls.push(Call::Uniforms);
            Ok(())
        }

        fn submit(&mut self, frame: usize, image_index: u32) -> VulkanResult<()> {
            self.calls.push(Call::Submit(frame, image_index));
            if self.fail_submit {
                return Err(VulkanError::Api {
                    operation: "vkQueueSubmit",
                    result: vk::Result::ERROR_DEVICE_LOST,
                    location: std::panic::Location::caller(),
                });
            }
            Ok(())
        }

        fn present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
            self.calls.push(Call::Present(frame, image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> VulkanResult<()> {
            self.calls.push(Call::Recreate(window_extent));
            let generation = self.recreations() as u64 * 100;
            self.images = (0..self.surface_image_count as u64).map(|i| generation + i).collect();
            self.views = self.images.iter().map(|image| image + 10).collect();
            self.framebuffers = self.views.iter().map(|view| view + 10).collect();
            Ok(())
        }
    }

    #[test]
    fn test_frame_sequence() {
        let mut backend = MockBackend::new();
        backend.acquires.push_back(AcquireOutcome::Ready { image_index: 2, suboptimal: false });
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        let result = scheduler.draw_frame_at(&mut backend, 0.5).unwrap();

        assert_eq!(result, FrameResult::Presented);
        assert_eq!(
            backend.calls,
            vec![Call::Wait, Call::Acquire(0), Call::Uniforms, Call::Submit(0, 2), Call::Present(0, 2)]
        );
        assert_eq!(scheduler.state(), FrameState::Idle);
        assert_eq!(scheduler.frames_presented(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_recreates_without_submitting() {
        let mut backend = MockBackend::new();
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        backend.surface_image_count = 4;
        let mut scheduler = FrameScheduler::new(2, EXTENT);
        assert!(backend.attachments_consistent());

        let result = scheduler.draw_frame_at(&mut backend, 0.0).unwrap();

        assert_eq!(result, FrameResult::Recreated);
        assert!(!backend.submitted());
        assert_eq!(backend.recreations(), 1);
        assert_eq!(backend.images.len(), 4);
        assert!(!backend.framebuffers.contains(&21));
        assert!(backend.attachments_consistent());
        assert_eq!(scheduler.current_frame(), 0);
        assert_eq!(scheduler.state(), FrameState::Idle);
    }

    #[test]
    fn test_frame_slots_cycle() {
        let mut backend = MockBackend::new();
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        for _ in 0..3 {
            scheduler.draw_frame_at(&mut backend, 0.0).unwrap();
        }

        let acquired: Vec<_> = backend
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Acquire(frame) => Some(*frame),
                _ => None,
            })
            .collect();
        assert_eq!(acquired, vec![0, 1, 0]);
    }

    #[test]
    fn test_present_out_of_date_recreates() {
        let mut backend = MockBackend::new();
        backend.presents.push_back(PresentOutcome::NeedsRecreate);
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        let result = scheduler.draw_frame_at(&mut backend, 0.0).unwrap();

        assert_eq!(result, FrameResult::Recreated);
        assert!(backend.submitted());
        assert_eq!(backend.recreations(), 1);
        assert_eq!(scheduler.frames_presented(), 0);
    }

    #[test]
    fn test_suboptimal_acquire_still_draws() {
        let mut backend = MockBackend::new();
        backend.acquires.push_back(AcquireOutcome::Ready { image_index: 1, suboptimal: true });
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        let result = scheduler.draw_frame_at(&mut backend, 0.0).unwrap();

        assert!(backend.calls.contains(&Call::Present(0, 1)));
        assert_eq!(result, FrameResult::Recreated);
    }

    #[test]
    fn test_resize_recreates_with_new_extent_once() {
        let mut backend = MockBackend::new();
        let mut scheduler = FrameScheduler::new(2, EXTENT);
        let resized = vk::Extent2D { width: 1024, height: 768 };

        scheduler.observe_window_extent(resized);
        assert_eq!(scheduler.draw_frame_at(&mut backend, 0.0).unwrap(), FrameResult::Recreated);
        assert_eq!(scheduler.draw_frame_at(&mut backend, 0.0).unwrap(), FrameResult::Presented);

        assert_eq!(backend.recreations(), 1);
        assert!(backend.calls.contains(&Call::Recreate(resized)));
    }

    #[test]
    fn test_unchanged_extent_is_not_a_resize() {
        let mut backend = MockBackend::new();
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        scheduler.observe_window_extent(EXTENT);
        assert_eq!(scheduler.draw_frame_at(&mut backend, 0.0).unwrap(), FrameResult::Presented);
        assert_eq!(backend.recreations(), 0);
    }

    #[test]
    fn test_minimized_window_skips_frames() {
        let mut backend = MockBackend::new();
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        scheduler.observe_window_extent(vk::Extent2D { width: 0, height: 0 });
        assert_eq!(scheduler.draw_frame_at(&mut backend, 0.0).unwrap(), FrameResult::Skipped);
        assert!(backend.calls.is_empty());

        scheduler.observe_window_extent(EXTENT);
        assert_eq!(scheduler.draw_frame_at(&mut backend, 0.0).unwrap(), FrameResult::Recreated);
        assert!(backend.calls.contains(&Call::Recreate(EXTENT)));
    }

    #[test]
    fn test_fatal_errors_propagate() {
        let mut backend = MockBackend::new();
        backend.fail_submit = true;
        let mut scheduler = FrameScheduler::new(2, EXTENT);

        let result = scheduler.draw_frame_at(&mut backend, 0.0);

        assert!(matches!(result, Err(VulkanError::Api { operation: "vkQueueSubmit", .. })));
        assert!(!backend.calls.iter().any(|call| matches!(call, Call::Present(..))));
    }
}
