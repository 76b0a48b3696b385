//! Frame slot pool.
//!
//! Each slot owns the command memory for one frame in flight. Ownership moves
//! CPU → GPU at submission and back to the CPU only once the slot's fence target
//! has been reached. The state tag on every slot makes that handoff explicit:
//!
//! ```text
//! Idle ──reset──▶ Recording ──submit──▶ Submitted ──fence wait──▶ Idle
//! ```
//!
//! [`FrameSlotPool::acquire`] is the only way to obtain a [`ReadySlot`], and a
//! `ReadySlot` is the only way to reset a slot, so command memory cannot be
//! reset while the GPU may still read it.

use cadence_core::WaitPolicy;
use tracing::{debug, trace};

use crate::backend::{CommandAllocator, GpuApi};
use crate::error::{FrameError, Result};
use crate::fence::FenceTracker;

/// Ownership state of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// CPU-owned and not in use.
    Idle,
    /// CPU-owned, commands being recorded.
    Recording,
    /// GPU-owned until the fence target is reached.
    Submitted,
}

/// Per-frame recording resources.
pub struct FrameSlot<A: GpuApi> {
    index: usize,
    allocator: A::Allocator,
    fence_target: Option<u64>,
    state: SlotState,
    reset_count: u64,
}

impl<A: GpuApi> FrameSlot<A> {
    /// Position of this slot in the ring.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current ownership state.
    pub const fn state(&self) -> SlotState {
        self.state
    }

    /// Fence value marking the slot's submitted work as complete.
    pub const fn fence_target(&self) -> Option<u64> {
        self.fence_target
    }

    /// How many times the slot's command memory has been reset.
    pub const fn reset_count(&self) -> u64 {
        self.reset_count
    }

    /// The slot's command allocator.
    pub const fn allocator(&self) -> &A::Allocator {
        &self.allocator
    }
}

/// Fixed ring of frame slots.
pub struct FrameSlotPool<A: GpuApi> {
    slots: Vec<FrameSlot<A>>,
}

impl<A: GpuApi> FrameSlotPool<A> {
    /// Create one slot per allocator.
    pub fn new(allocators: Vec<A::Allocator>) -> Result<Self> {
        if allocators.is_empty() {
            return Err(FrameError::Config(
                "frame slot pool needs at least one allocator".to_string(),
            ));
        }

        let slots = allocators
            .into_iter()
            .enumerate()
            .map(|(index, allocator)| FrameSlot {
                index,
                allocator,
                fence_target: None,
                state: SlotState::Idle,
                reset_count: 0,
            })
            .collect();

        Ok(Self { slots })
    }

    /// Number of slots, i.e. frames that may be in flight.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot index used for `frame_index`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn slot_index(&self, frame_index: u64) -> usize {
        (frame_index % self.slots.len() as u64) as usize
    }

    /// Look up a slot by position.
    pub fn slot(&self, index: usize) -> Option<&FrameSlot<A>> {
        self.slots.get(index)
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot<A>> {
        self.slots.iter()
    }

    /// Number of slots whose work is still owned by the GPU.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Submitted)
            .count()
    }

    /// First slot that was submitted but never given a fence target.
    pub fn uncovered(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.state == SlotState::Submitted && slot.fence_target.is_none())
            .map(|slot| slot.index)
    }

    /// Take the slot for `frame_index`, blocking until the GPU has finished with it.
    ///
    /// This is the backpressure point bounding how far the CPU runs ahead.
    pub fn acquire(
        &mut self,
        frame_index: u64,
        fences: &FenceTracker<A>,
        policy: WaitPolicy,
    ) -> Result<ReadySlot<'_, A>> {
        let index = self.slot_index(frame_index);
        let slot = &mut self.slots[index];

        match slot.state {
            SlotState::Idle => {}
            SlotState::Recording => {
                return Err(FrameError::InvalidSlotState {
                    slot: index,
                    found: slot.state,
                    expected: "Idle or Submitted",
                });
            }
            SlotState::Submitted => {
                let target = slot.fence_target.ok_or(FrameError::InvalidFenceTarget {
                    value: 0,
                    reason: "slot was submitted without a fence target",
                })?;
                fences.wait_until(target, policy)?;
                slot.state = SlotState::Idle;
                trace!(slot = index, target, "slot retired");
            }
        }

        Ok(ReadySlot { slot })
    }

    /// Move every submitted slot whose target is at or below `completed` back to idle.
    ///
    /// Returns how many slots were retired.
    pub fn retire_completed(&mut self, completed: u64) -> usize {
        let mut retired = 0;
        for slot in &mut self.slots {
            if slot.state == SlotState::Submitted
                && slot.fence_target.is_some_and(|target| target <= completed)
            {
                slot.state = SlotState::Idle;
                retired += 1;
            }
        }
        retired
    }
}

/// A slot whose previous work is known to be complete.
pub struct ReadySlot<'a, A: GpuApi> {
    slot: &'a mut FrameSlot<A>,
}

impl<'a, A: GpuApi> ReadySlot<'a, A> {
    /// Position of the slot in the ring.
    pub fn index(&self) -> usize {
        self.slot.index
    }

    /// Reset the slot's command memory and start recording.
    pub fn reset(self) -> Result<RecordingSlot<'a, A>> {
        let slot = self.slot;
        slot.allocator.reset()?;
        slot.reset_count += 1;
        slot.fence_target = None;
        slot.state = SlotState::Recording;
        trace!(slot = slot.index, resets = slot.reset_count, "slot reset");
        Ok(RecordingSlot { slot })
    }
}

/// A slot that is recording, or has been submitted this frame.
///
/// Dropping it before [`Self::mark_submitted`] abandons the frame and returns the
/// slot to idle.
pub struct RecordingSlot<'a, A: GpuApi> {
    slot: &'a mut FrameSlot<A>,
}

impl<A: GpuApi> RecordingSlot<'_, A> {
    /// Position of the slot in the ring.
    pub fn index(&self) -> usize {
        self.slot.index
    }

    /// Current ownership state.
    pub fn state(&self) -> SlotState {
        self.slot.state
    }

    /// Start a command list in the slot's memory.
    pub fn begin_commands(&mut self) -> Result<A::CommandList> {
        self.expect_state(SlotState::Recording, "Recording")?;
        self.slot.allocator.begin()
    }

    /// Record that the slot's commands now belong to the GPU queue.
    pub fn mark_submitted(&mut self) -> Result<()> {
        self.expect_state(SlotState::Recording, "Recording")?;
        self.slot.state = SlotState::Submitted;
        Ok(())
    }

    /// Store the fence value that marks this slot's work as complete.
    pub fn record_target(&mut self, value: u64) -> Result<()> {
        self.expect_state(SlotState::Submitted, "Submitted")?;
        if self.slot.fence_target.is_some() {
            return Err(FrameError::InvalidFenceTarget {
                value,
                reason: "slot already has a fence target for this frame",
            });
        }
        self.slot.fence_target = Some(value);
        Ok(())
    }

    fn expect_state(&self, expected: SlotState, name: &'static str) -> Result<()> {
        if self.slot.state == expected {
            Ok(())
        } else {
            Err(FrameError::InvalidSlotState {
                slot: self.slot.index,
                found: self.slot.state,
                expected: name,
            })
        }
    }
}

impl<A: GpuApi> Drop for RecordingSlot<'_, A> {
    fn drop(&mut self) {
        if self.slot.state == SlotState::Recording {
            self.slot.state = SlotState::Idle;
            debug!(slot = self.slot.index, "frame abandoned; slot returned to idle");
        }
    }
}
