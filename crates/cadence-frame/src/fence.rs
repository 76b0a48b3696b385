//! Fence tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use cadence_core::WaitPolicy;
use tracing::trace;

use crate::backend::{GpuApi, GpuQueue, TimelineFence};
use crate::error::{FrameError, Result};

/// Wraps the backend fence and hands out strictly increasing target values.
///
/// The completed value reported here never decreases, even if the backend
/// momentarily reports an older reading.
pub struct FenceTracker<A: GpuApi> {
    fence: A::Fence,
    /// Last value returned by [`Self::next_target`].
    last_issued: u64,
    /// Highest value passed to [`Self::signal`].
    last_signaled: u64,
    /// Highest completed value observed so far.
    completed: AtomicU64,
}

impl<A: GpuApi> FenceTracker<A> {
    /// Start tracking `fence` from its current completed value.
    pub fn new(fence: A::Fence) -> Result<Self> {
        let initial = fence.completed_value()?;
        Ok(Self {
            fence,
            last_issued: initial,
            last_signaled: initial,
            completed: AtomicU64::new(initial),
        })
    }

    /// Allocate the target value for the next submission.
    pub fn next_target(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    /// Enqueue a GPU signal of `value` after all work already on `queue`.
    pub fn signal(&mut self, queue: &mut A::Queue, value: u64) -> Result<()> {
        if value <= self.last_signaled {
            return Err(FrameError::InvalidFenceTarget {
                value,
                reason: "not greater than the last signaled value",
            });
        }
        if value > self.last_issued {
            return Err(FrameError::InvalidFenceTarget {
                value,
                reason: "not issued by next_target",
            });
        }

        queue.signal(&self.fence, value)?;
        self.last_signaled = value;
        trace!(value, "fence signal queued");
        Ok(())
    }

    /// Current completed value. Never blocks.
    pub fn completed_value(&self) -> Result<u64> {
        let raw = self.fence.completed_value()?;
        let previous = self.completed.fetch_max(raw, Ordering::AcqRel);
        Ok(previous.max(raw))
    }

    /// Whether `value` has been reached.
    pub fn is_complete(&self, value: u64) -> Result<bool> {
        Ok(self.completed_value()? >= value)
    }

    /// Block until `value` has been reached.
    ///
    /// `value` must have been signaled. An elapsed deadline is reported as
    /// [`FrameError::TimeoutExceeded`] under [`WaitPolicy::Diagnostic`] and as
    /// [`FrameError::DeviceLost`] otherwise.
    pub fn wait_until(&self, value: u64, policy: WaitPolicy) -> Result<()> {
        if value > self.last_signaled {
            return Err(FrameError::InvalidFenceTarget {
                value,
                reason: "waited on a value that was never signaled",
            });
        }
        if self.is_complete(value)? {
            return Ok(());
        }

        trace!(value, ?policy, "waiting on fence");
        let timeout = policy.timeout();
        if self.fence.wait(value, timeout)? {
            self.completed.fetch_max(value, Ordering::AcqRel);
            return Ok(());
        }

        let completed = self.completed_value()?;
        match timeout {
            Some(timeout) if policy.is_diagnostic() => Err(FrameError::TimeoutExceeded {
                target: value,
                completed,
                timeout,
            }),
            Some(timeout) => Err(FrameError::DeviceLost(format!(
                "fence stuck at {completed} after waiting {timeout:?} for {value}"
            ))),
            None => Err(FrameError::DeviceLost(format!(
                "unbounded fence wait for {value} returned at {completed}"
            ))),
        }
    }

    /// Highest value ever signaled. Waiting on it drains all submitted work.
    pub const fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// The wrapped backend fence.
    pub const fn fence(&self) -> &A::Fence {
        &self.fence
    }
}
