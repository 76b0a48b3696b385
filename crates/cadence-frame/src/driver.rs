//! Frame driver.
//!
//! Runs the per-frame cycle:
//!
//! ```text
//! acquire slot (may block) → reset → acquire image → record → submit
//!     → signal fence → record target → present → advance cursor
//! ```
//!
//! The wait inside slot acquisition is the only place the CPU blocks during
//! steady-state rendering.

use std::time::{Duration, Instant};

use cadence_core::{Extent2d, FrameConfig, WaitPolicy};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{GpuApi, GpuQueue, PresentStatus};
use crate::error::{FrameError, Result};
use crate::fence::FenceTracker;
use crate::images::SwapchainImageSet;
use crate::recorder::{CommandRecorder, SceneContent};
use crate::slots::FrameSlotPool;

/// Position in the frame ring.
///
/// Only [`FrameDriver`] moves it, once per presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    slot: usize,
    slot_count: usize,
    frame_number: u64,
}

impl FrameCursor {
    pub const fn new(slot_count: usize) -> Self {
        Self {
            slot: 0,
            slot_count,
            frame_number: 0,
        }
    }

    /// Slot used by the next frame.
    pub const fn slot(&self) -> usize {
        self.slot
    }

    pub const fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of frames presented so far.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Move on to the next frame.
    pub fn advance(&mut self) {
        self.slot = (self.slot + 1) % self.slot_count;
        self.frame_number += 1;
    }
}

/// What happened during one [`FrameDriver::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_number: u64,
    pub slot: usize,
    pub image_index: u32,
    pub fence_target: u64,
    /// Time spent blocked waiting for the slot to come back from the GPU.
    pub waited: Duration,
    pub present: PresentStatus,
}

impl FrameReport {
    /// Whether the swapchain should be re-created before the next frame.
    pub const fn needs_resize(&self) -> bool {
        self.present.needs_resize()
    }
}

/// Running totals over the driver's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames submitted and presented.
    pub frames: u64,
    /// Frames dropped before they were presented.
    pub abandoned: u64,
    pub total_wait: Duration,
    pub max_wait: Duration,
}

impl FrameStats {
    fn record(&mut self, waited: Duration) {
        self.frames += 1;
        self.total_wait += waited;
        self.max_wait = self.max_wait.max(waited);
    }

    /// Mean backpressure wait per presented frame.
    pub fn average_wait(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.total_wait / u32::try_from(self.frames).unwrap_or(u32::MAX)
    }
}

/// Backend objects the driver takes ownership of.
pub struct DriverParts<A: GpuApi> {
    pub queue: A::Queue,
    pub fence: A::Fence,
    /// One command allocator per frame in flight.
    pub allocators: Vec<A::Allocator>,
    pub presenter: A::Presenter,
}

/// Owns every per-frame resource and runs the frame cycle.
pub struct FrameDriver<A: GpuApi> {
    queue: A::Queue,
    fences: FenceTracker<A>,
    slots: FrameSlotPool<A>,
    images: SwapchainImageSet<A>,
    recorder: CommandRecorder,
    cursor: FrameCursor,
    wait_policy: WaitPolicy,
    depth: bool,
    stats: FrameStats,
    drained: bool,
}

impl<A: GpuApi> FrameDriver<A> {
    /// Build a driver over `parts`.
    ///
    /// `parts.allocators` must hold exactly `config.frames_in_flight` allocators.
    pub fn new(parts: DriverParts<A>, config: &FrameConfig) -> Result<Self> {
        config.validate()?;
        if parts.allocators.len() != config.frames_in_flight {
            return Err(FrameError::Config(format!(
                "expected {} command allocators, got {}",
                config.frames_in_flight,
                parts.allocators.len()
            )));
        }

        let fences = FenceTracker::new(parts.fence)?;
        let slots = FrameSlotPool::new(parts.allocators)?;
        let images = SwapchainImageSet::new(parts.presenter);

        info!(
            frames_in_flight = slots.slot_count(),
            images = images.image_count(),
            wait_policy = ?config.wait_policy,
            "frame driver created"
        );

        Ok(Self {
            queue: parts.queue,
            fences,
            cursor: FrameCursor::new(slots.slot_count()),
            slots,
            images,
            recorder: CommandRecorder::new(),
            wait_policy: config.wait_policy,
            depth: config.depth,
            stats: FrameStats::default(),
            drained: true,
        })
    }

    /// Render and present one frame of `scene`.
    ///
    /// On error the frame is abandoned and the cursor does not move. Failures
    /// before submission leave the slot reusable by the next call. A failed
    /// submission or fence signal is reported as [`FrameError::DeviceLost`].
    pub fn render_frame(&mut self, scene: &mut dyn SceneContent<A>) -> Result<FrameReport> {
        let frame_number = self.cursor.frame_number();
        let slot_index = self.cursor.slot();

        let started = Instant::now();
        let ready = self
            .slots
            .acquire(frame_number, &self.fences, self.wait_policy)?;
        let waited = started.elapsed();
        debug_assert_eq!(ready.index(), slot_index);

        let mut slot = ready.reset()?;

        let image_index = match self.images.acquire_next(&mut self.queue, slot_index) {
            Ok(index) => index,
            Err(err) => {
                drop(slot);
                self.stats.abandoned += 1;
                return Err(err);
            }
        };

        let depth = if self.depth {
            self.images.depth_view()
        } else {
            None
        };
        let recorded = self.images.color_target(image_index).and_then(|target| {
            let commands = self.recorder.record(&mut slot, &target, depth, scene)?;
            Ok((commands, self.images.borrowed_sync(image_index)?))
        });
        let (commands, sync) = match recorded {
            Ok(recorded) => recorded,
            Err(err) => {
                drop(slot);
                self.abandon_frame(slot_index, &err);
                return Err(err);
            }
        };

        if let Err(err) = self.queue.submit(&commands, sync) {
            let err = lost("submit", err);
            drop(slot);
            self.abandon_frame(slot_index, &err);
            return Err(err);
        }

        // The queue owns the commands now, whatever happens below.
        self.drained = false;
        slot.mark_submitted()?;
        let fence_target = self.fences.next_target();
        if let Err(err) = self.fences.signal(&mut self.queue, fence_target) {
            let err = lost("fence signal", err);
            drop(slot);
            self.stats.abandoned += 1;
            error!(
                slot = slot_index,
                fence_target,
                %err,
                "submitted frame is not covered by a fence"
            );
            // The submission signals the image's present semaphore, so presenting hands it back.
            if let Err(present_err) = self.images.present(&mut self.queue, image_index) {
                warn!(%present_err, "failed to hand back swapchain image");
            }
            return Err(err);
        }
        slot.record_target(fence_target)?;
        drop(slot);

        let present = self.images.present(&mut self.queue, image_index)?;

        self.cursor.advance();
        self.stats.record(waited);

        trace!(
            frame = frame_number,
            slot = slot_index,
            image_index,
            fence_target,
            waited_us = waited.as_micros(),
            "frame presented"
        );

        Ok(FrameReport {
            frame_number,
            slot: slot_index,
            image_index,
            fence_target,
            waited,
            present,
        })
    }

    fn abandon_frame(&mut self, slot: usize, err: &FrameError) {
        self.stats.abandoned += 1;
        warn!(slot, %err, "frame abandoned");
        if let Err(release_err) = self.images.abandon(&mut self.queue) {
            warn!(%release_err, "failed to hand back swapchain image");
        }
    }

    /// Block until every submitted frame has completed.
    ///
    /// Calling it again without rendering in between is a no-op. Fails with
    /// [`FrameError::DeviceLost`] if submitted work was never covered by a fence,
    /// since its completion can no longer be observed.
    pub fn drain(&mut self) -> Result<()> {
        if self.drained {
            return Ok(());
        }
        if let Some(slot) = self.slots.uncovered() {
            return Err(FrameError::DeviceLost(format!(
                "slot {slot} holds submitted work without a fence target"
            )));
        }

        let target = self.fences.last_signaled();
        self.fences.wait_until(target, self.wait_policy)?;
        let completed = self.fences.completed_value()?;
        let retired = self.slots.retire_completed(completed);
        self.drained = true;

        debug!(target, completed, retired, "all frames drained");
        Ok(())
    }

    /// Drain, then re-create the swapchain images at `extent`.
    ///
    /// Zero-area sizes (a minimized window) are ignored.
    pub fn resize(&mut self, extent: Extent2d) -> Result<()> {
        if extent.is_empty() {
            debug!(?extent, "ignoring resize to empty extent");
            return Ok(());
        }

        self.drain()?;
        self.images.resize(extent)?;
        info!(
            width = extent.width,
            height = extent.height,
            images = self.images.image_count(),
            "swapchain resized"
        );
        Ok(())
    }

    /// Drain and return the final statistics.
    pub fn shutdown(mut self) -> Result<FrameStats> {
        self.drain()?;
        let stats = self.stats;
        info!(
            frames = stats.frames,
            abandoned = stats.abandoned,
            avg_wait_us = stats.average_wait().as_micros(),
            max_wait_us = stats.max_wait.as_micros(),
            "frame driver shut down"
        );
        Ok(stats)
    }

    pub const fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    pub const fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    pub const fn slots(&self) -> &FrameSlotPool<A> {
        &self.slots
    }

    pub const fn fences(&self) -> &FenceTracker<A> {
        &self.fences
    }

    pub const fn images(&self) -> &SwapchainImageSet<A> {
        &self.images
    }

    pub const fn queue(&self) -> &A::Queue {
        &self.queue
    }

    /// Whether no submitted work is outstanding.
    pub const fn is_drained(&self) -> bool {
        self.drained
    }
}

/// Submission-side failures leave the queue in an unknown state.
fn lost(step: &str, err: FrameError) -> FrameError {
    match err {
        FrameError::DeviceLost(_) => err,
        other => FrameError::DeviceLost(format!("{step} failed: {other}")),
    }
}

impl<A: GpuApi> Drop for FrameDriver<A> {
    fn drop(&mut self) {
        if let Err(err) = self.drain() {
            error!(%err, "failed to drain frames on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_and_counts() {
        let mut cursor = FrameCursor::new(3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let slot = cursor.slot();
                cursor.advance();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.frame_number(), 7);
        assert_eq!(cursor.slot(), 1);
    }

    #[test]
    fn single_slot_cursor_stays_put() {
        let mut cursor = FrameCursor::new(1);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.slot(), 0);
        assert_eq!(cursor.frame_number(), 2);
    }

    #[test]
    fn stats_track_waits() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.average_wait(), Duration::ZERO);

        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(6));
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.max_wait, Duration::from_millis(6));
        assert_eq!(stats.average_wait(), Duration::from_millis(4));
    }

    #[test]
    fn present_status_resize_hint() {
        assert!(!PresentStatus::Optimal.needs_resize());
        assert!(PresentStatus::Suboptimal.needs_resize());
        assert!(PresentStatus::OutOfDate.needs_resize());
    }
}
