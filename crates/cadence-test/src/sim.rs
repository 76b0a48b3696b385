//! Simulated GPU backend.
//!
//! The GPU timeline is a queue of pending fence signals. With auto-completion
//! on, every signal completes as soon as it is queued. With it off, the test
//! completes signals explicitly (or from a helper thread via
//! [`SimGpu::complete_after`]), which is how slow GPUs are modelled.
//!
//! The simulation checks the rules a real driver would leave undefined:
//! resetting an allocator whose work is still executing, recording into an
//! allocator that was not reset, submitting an open command list and
//! resizing while work is in flight. Each one is recorded as a violation and
//! returned as an error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cadence_core::Extent2d;
use cadence_frame::{
    AcquiredImage, ColorTarget, CommandAllocator, CommandList, DriverParts, FrameError, GpuApi,
    GpuQueue, PresentStatus, Presenter, ResourceState, SceneContent, TimelineFence,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

use crate::SimError;

/// The simulated backend.
#[derive(Debug, Clone, Copy)]
pub struct SimApi;

impl GpuApi for SimApi {
    type Fence = SimFence;
    type Queue = SimQueue;
    type Allocator = SimAllocator;
    type CommandList = SimCommandList;
    type Presenter = SimPresenter;
    type Image = SimImage;
    type RenderTargetView = SimView;
    type ImageSync = SimImageSync;
}

/// A swapchain image. `generation` changes on every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimImage {
    pub generation: u32,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimView {
    Color(SimImage),
    Depth { generation: u32 },
}

/// Ties an acquisition to the slot that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimImageSync {
    pub slot: usize,
    pub image_index: u32,
}

/// Backend steps that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimStep {
    Transition,
    BeginRendering,
    EndRendering,
    Finish,
    Submit,
    /// Queueing the fence signal after a successful submit.
    Signal,
}

/// A recorded command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Transition {
        image: SimImage,
        from: ResourceState,
        to: ResourceState,
    },
    BeginRendering {
        image_index: u32,
        depth: bool,
        clear_color: [f32; 4],
    },
    Draw {
        vertices: u32,
    },
    EndRendering,
}

/// Everything that happened on the simulated device, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Reset { allocator: usize },
    Submit { allocator: usize, image_index: u32 },
    Signal(u64),
    Complete(u64),
    Acquire { slot: usize, image_index: u32 },
    Present { image_index: u32 },
    Release { image_index: u32 },
    Resize(Extent2d),
}

/// A submitted command list.
#[derive(Debug, Clone)]
pub struct SimSubmission {
    pub allocator: usize,
    pub sync: SimImageSync,
    pub commands: Vec<SimCommand>,
    /// The first fence signal queued after this submission.
    pub covered_by: Option<u64>,
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub image_count: u32,
    /// Order in which acquire hands out image indices, cycled. Defaults to
    /// `0..image_count`.
    pub image_order: Option<Vec<u32>>,
    pub extent: Extent2d,
    pub depth: bool,
    pub auto_complete: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            image_order: None,
            extent: Extent2d::new(1600, 900),
            depth: true,
            auto_complete: true,
        }
    }
}

impl SimConfig {
    #[must_use]
    pub const fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count;
        self
    }

    #[must_use]
    pub fn with_image_order(mut self, order: Vec<u32>) -> Self {
        self.image_count = u32::try_from(order.len()).unwrap_or(u32::MAX);
        self.image_order = Some(order);
        self
    }

    /// Leave fence signals pending until the test completes them.
    #[must_use]
    pub const fn manual(mut self) -> Self {
        self.auto_complete = false;
        self
    }
}

#[derive(Default)]
struct GpuState {
    auto_complete: bool,
    completed: u64,
    pending_signals: VecDeque<u64>,
    signals: Vec<u64>,
    submissions: Vec<SimSubmission>,
    /// Per allocator: submitted since the last reset.
    dirty: Vec<bool>,
    resets: Vec<usize>,
    events: Vec<SimEvent>,
    violations: Vec<SimError>,
    device_lost: bool,
    fail_next: Option<SimStep>,
    fail_next_acquire: Option<FrameError>,
    next_present_status: Option<PresentStatus>,
}

impl GpuState {
    fn is_done(&self, submission: &SimSubmission) -> bool {
        submission.covered_by.is_some_and(|value| value <= self.completed)
    }

    fn in_flight(&self) -> usize {
        self.submissions.iter().filter(|s| !self.is_done(s)).count()
    }

    fn complete_through(&mut self, value: u64) -> usize {
        let mut completed = 0;
        while let Some(&next) = self.pending_signals.front() {
            if next > value {
                break;
            }
            self.pending_signals.pop_front();
            self.completed = self.completed.max(next);
            self.events.push(SimEvent::Complete(next));
            completed += 1;
        }
        completed
    }

    fn take_failure(&mut self, step: SimStep) -> Result<(), SimError> {
        if self.fail_next == Some(step) {
            self.fail_next = None;
            return Err(SimError::Injected(step));
        }
        Ok(())
    }

    fn violation(&mut self, err: SimError) -> FrameError {
        tracing::warn!(%err, "simulation rule violated");
        self.violations.push(err.clone());
        err.into()
    }

    fn check_alive(&self) -> Result<(), FrameError> {
        if self.device_lost {
            return Err(SimError::DeviceLost.into());
        }
        Ok(())
    }
}

struct Shared {
    state: Mutex<GpuState>,
    progressed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, GpuState> {
        self.state.lock()
    }
}

/// Control and inspection handle for one simulated device.
#[derive(Clone)]
pub struct SimGpu {
    shared: Arc<Shared>,
    config: SimConfig,
}

impl Default for SimGpu {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimGpu {
    pub fn new(config: SimConfig) -> Self {
        let state = GpuState {
            auto_complete: config.auto_complete,
            ..GpuState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                progressed: Condvar::new(),
            }),
            config,
        }
    }

    /// Backend objects for a driver with `slot_count` frames in flight.
    pub fn parts(&self, slot_count: usize) -> DriverParts<SimApi> {
        self.shared.lock().dirty = vec![false; slot_count];
        self.shared.lock().resets = vec![0; slot_count];

        let order = self
            .config
            .image_order
            .clone()
            .unwrap_or_else(|| (0..self.config.image_count).collect());

        DriverParts {
            queue: SimQueue {
                shared: Arc::clone(&self.shared),
            },
            fence: SimFence {
                shared: Arc::clone(&self.shared),
            },
            allocators: (0..slot_count)
                .map(|id| SimAllocator {
                    shared: Arc::clone(&self.shared),
                    id,
                })
                .collect(),
            presenter: SimPresenter {
                shared: Arc::clone(&self.shared),
                order,
                next: 0,
                extent: self.config.extent,
                generation: 0,
                depth: self.config.depth,
            },
        }
    }

    /// Switch auto-completion. Turning it on completes everything pending.
    pub fn set_auto_complete(&self, enabled: bool) {
        let mut state = self.shared.lock();
        state.auto_complete = enabled;
        if enabled {
            state.complete_through(u64::MAX);
            self.shared.progressed.notify_all();
        }
    }

    /// Complete pending signals up to and including `value`.
    pub fn complete_through(&self, value: u64) -> usize {
        let completed = self.shared.lock().complete_through(value);
        self.shared.progressed.notify_all();
        completed
    }

    pub fn complete_all(&self) -> usize {
        self.complete_through(u64::MAX)
    }

    /// Complete pending signals up to `value` from another thread after `delay`.
    pub fn complete_after(&self, delay: Duration, value: u64) -> JoinHandle<()> {
        let gpu = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            gpu.complete_through(value);
        })
    }

    /// Fail every subsequent fence wait, submission and acquisition.
    pub fn lose_device(&self) {
        self.shared.lock().device_lost = true;
        self.shared.progressed.notify_all();
    }

    /// Make the next occurrence of `step` fail.
    pub fn fail_next(&self, step: SimStep) {
        self.shared.lock().fail_next = Some(step);
    }

    /// Make the next acquisition return `err`.
    pub fn fail_next_acquire(&self, err: FrameError) {
        self.shared.lock().fail_next_acquire = Some(err);
    }

    /// Status returned by the next present.
    pub fn set_next_present_status(&self, status: PresentStatus) {
        self.shared.lock().next_present_status = Some(status);
    }

    pub fn completed(&self) -> u64 {
        self.shared.lock().completed
    }

    pub fn pending_signals(&self) -> Vec<u64> {
        self.shared.lock().pending_signals.iter().copied().collect()
    }

    /// Every value ever signaled, in queue order.
    pub fn signals(&self) -> Vec<u64> {
        self.shared.lock().signals.clone()
    }

    pub fn submissions(&self) -> Vec<SimSubmission> {
        self.shared.lock().submissions.clone()
    }

    /// Number of submissions the GPU has not finished.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight()
    }

    /// Reset count per allocator.
    pub fn resets(&self) -> Vec<usize> {
        self.shared.lock().resets.clone()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.shared.lock().events.clone()
    }

    pub fn violations(&self) -> Vec<SimError> {
        self.shared.lock().violations.clone()
    }
}

/// The device's single timeline fence.
pub struct SimFence {
    shared: Arc<Shared>,
}

impl TimelineFence for SimFence {
    fn completed_value(&self) -> cadence_frame::Result<u64> {
        let state = self.shared.lock();
        state.check_alive()?;
        Ok(state.completed)
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> cadence_frame::Result<bool> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.shared.lock();
        loop {
            state.check_alive()?;
            if state.completed >= value {
                return Ok(true);
            }
            match deadline {
                None => self.shared.progressed.wait(&mut state),
                Some(deadline) => {
                    if self
                        .shared
                        .progressed
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        state.check_alive()?;
                        return Ok(state.completed >= value);
                    }
                }
            }
        }
    }
}

pub struct SimQueue {
    shared: Arc<Shared>,
}

impl GpuQueue<SimApi> for SimQueue {
    fn submit(&mut self, commands: &SimCommandList, sync: SimImageSync) -> cadence_frame::Result<()> {
        let mut state = self.shared.lock();
        state.check_alive()?;
        state.take_failure(SimStep::Submit)?;
        if !commands.finished {
            return Err(state.violation(SimError::UnfinishedCommandList {
                allocator: commands.allocator,
            }));
        }

        if let Some(dirty) = state.dirty.get_mut(commands.allocator) {
            *dirty = true;
        }
        state.submissions.push(SimSubmission {
            allocator: commands.allocator,
            sync,
            commands: commands.commands.clone(),
            covered_by: None,
        });
        state.events.push(SimEvent::Submit {
            allocator: commands.allocator,
            image_index: sync.image_index,
        });
        trace!(allocator = commands.allocator, image_index = sync.image_index, "sim submit");
        Ok(())
    }

    fn signal(&mut self, _fence: &SimFence, value: u64) -> cadence_frame::Result<()> {
        let mut state = self.shared.lock();
        state.check_alive()?;
        state.take_failure(SimStep::Signal)?;

        for submission in &mut state.submissions {
            submission.covered_by.get_or_insert(value);
        }
        state.signals.push(value);
        state.pending_signals.push_back(value);
        state.events.push(SimEvent::Signal(value));

        if state.auto_complete {
            state.complete_through(value);
            self.shared.progressed.notify_all();
        }
        Ok(())
    }
}

pub struct SimAllocator {
    shared: Arc<Shared>,
    id: usize,
}

impl CommandAllocator<SimApi> for SimAllocator {
    fn reset(&mut self) -> cadence_frame::Result<()> {
        let mut state = self.shared.lock();
        let pending = state
            .submissions
            .iter()
            .filter(|s| s.allocator == self.id && !state.is_done(s))
            .count();
        if pending > 0 {
            return Err(state.violation(SimError::PrematureReuse {
                allocator: self.id,
                pending,
            }));
        }

        if let Some(dirty) = state.dirty.get_mut(self.id) {
            *dirty = false;
        }
        if let Some(resets) = state.resets.get_mut(self.id) {
            *resets += 1;
        }
        state.events.push(SimEvent::Reset { allocator: self.id });
        Ok(())
    }

    fn begin(&mut self) -> cadence_frame::Result<SimCommandList> {
        let mut state = self.shared.lock();
        if state.dirty.get(self.id).copied().unwrap_or(false) {
            return Err(state.violation(SimError::StaleAllocator { allocator: self.id }));
        }
        Ok(SimCommandList {
            shared: Arc::clone(&self.shared),
            allocator: self.id,
            commands: Vec::new(),
            finished: false,
        })
    }
}

pub struct SimCommandList {
    shared: Arc<Shared>,
    allocator: usize,
    commands: Vec<SimCommand>,
    finished: bool,
}

impl SimCommandList {
    /// Record a draw call.
    pub fn draw(&mut self, vertices: u32) -> cadence_frame::Result<()> {
        self.push(None, SimCommand::Draw { vertices })
    }

    pub fn commands(&self) -> &[SimCommand] {
        &self.commands
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    fn push(&mut self, step: Option<SimStep>, command: SimCommand) -> cadence_frame::Result<()> {
        self.check(step)?;
        self.commands.push(command);
        Ok(())
    }

    fn check(&self, step: Option<SimStep>) -> cadence_frame::Result<()> {
        if self.finished {
            return Err(SimError::ListClosed.into());
        }
        if let Some(step) = step {
            self.shared.lock().take_failure(step)?;
        }
        Ok(())
    }
}

impl CommandList<SimApi> for SimCommandList {
    fn transition(
        &mut self,
        image: SimImage,
        from: ResourceState,
        to: ResourceState,
    ) -> cadence_frame::Result<()> {
        self.push(
            Some(SimStep::Transition),
            SimCommand::Transition { image, from, to },
        )
    }

    fn begin_rendering(
        &mut self,
        target: &ColorTarget<SimApi>,
        depth: Option<SimView>,
        clear_color: [f32; 4],
    ) -> cadence_frame::Result<()> {
        self.push(
            Some(SimStep::BeginRendering),
            SimCommand::BeginRendering {
                image_index: target.image_index,
                depth: depth.is_some(),
                clear_color,
            },
        )
    }

    fn end_rendering(&mut self) -> cadence_frame::Result<()> {
        self.push(Some(SimStep::EndRendering), SimCommand::EndRendering)
    }

    fn finish(&mut self) -> cadence_frame::Result<()> {
        self.check(Some(SimStep::Finish))?;
        self.finished = true;
        Ok(())
    }
}

pub struct SimPresenter {
    shared: Arc<Shared>,
    order: Vec<u32>,
    next: usize,
    extent: Extent2d,
    generation: u32,
    depth: bool,
}

impl Presenter<SimApi> for SimPresenter {
    fn acquire(&mut self, slot: usize) -> cadence_frame::Result<AcquiredImage<SimApi>> {
        let mut state = self.shared.lock();
        state.check_alive()?;
        if let Some(err) = state.fail_next_acquire.take() {
            return Err(err);
        }

        let index = self.order[self.next % self.order.len()];
        self.next += 1;
        state.events.push(SimEvent::Acquire {
            slot,
            image_index: index,
        });
        Ok(AcquiredImage {
            index,
            sync: SimImageSync {
                slot,
                image_index: index,
            },
        })
    }

    fn present(
        &mut self,
        _queue: &mut SimQueue,
        image: AcquiredImage<SimApi>,
    ) -> cadence_frame::Result<PresentStatus> {
        let mut state = self.shared.lock();
        state.check_alive()?;
        state.events.push(SimEvent::Present {
            image_index: image.index,
        });
        Ok(state.next_present_status.take().unwrap_or(PresentStatus::Optimal))
    }

    fn release(
        &mut self,
        _queue: &mut SimQueue,
        image: AcquiredImage<SimApi>,
    ) -> cadence_frame::Result<()> {
        self.shared.lock().events.push(SimEvent::Release {
            image_index: image.index,
        });
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.order.len()
    }

    fn image(&self, index: u32) -> Option<SimImage> {
        ((index as usize) < self.order.len()).then_some(SimImage {
            generation: self.generation,
            index,
        })
    }

    fn render_target_view(&self, index: u32) -> Option<SimView> {
        self.image(index).map(SimView::Color)
    }

    fn depth_view(&self) -> Option<SimView> {
        self.depth.then_some(SimView::Depth {
            generation: self.generation,
        })
    }

    fn extent(&self) -> Extent2d {
        self.extent
    }

    fn resize(&mut self, extent: Extent2d) -> cadence_frame::Result<()> {
        let mut state = self.shared.lock();
        let pending = state.in_flight();
        if pending > 0 {
            return Err(state.violation(SimError::ResizeWhileBusy { pending }));
        }

        self.generation += 1;
        self.extent = extent;
        state.events.push(SimEvent::Resize(extent));
        Ok(())
    }
}

/// Scene content that records draws and can be told to fail.
#[derive(Debug, Clone)]
pub struct SimScene {
    pub clear_color: [f32; 4],
    pub vertices: u32,
    /// Zero-based draw call that fails.
    pub fail_on_draw: Option<u64>,
    pub draws: u64,
    /// Image index of every target drawn into.
    pub targets: Vec<u32>,
}

impl Default for SimScene {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.2, 0.4, 1.0],
            vertices: 3,
            fail_on_draw: None,
            draws: 0,
            targets: Vec::new(),
        }
    }
}

impl SimScene {
    #[must_use]
    pub const fn failing_on(mut self, draw: u64) -> Self {
        self.fail_on_draw = Some(draw);
        self
    }
}

impl SceneContent<SimApi> for SimScene {
    fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    fn draw(
        &mut self,
        commands: &mut SimCommandList,
        target: &ColorTarget<SimApi>,
    ) -> cadence_frame::Result<()> {
        let draw = self.draws;
        self.draws += 1;
        self.targets.push(target.image_index);
        if self.fail_on_draw == Some(draw) {
            return Err(FrameError::RecordingFailure(format!(
                "scene failed on draw {draw}"
            )));
        }
        commands.draw(self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_signals_complete_in_order() {
        let gpu = SimGpu::new(SimConfig::default().manual());
        let DriverParts {
            mut queue, fence, ..
        } = gpu.parts(1);

        queue.signal(&fence, 1).unwrap();
        queue.signal(&fence, 2).unwrap();
        assert_eq!(fence.completed_value().unwrap(), 0);

        assert_eq!(gpu.complete_through(1), 1);
        assert_eq!(fence.completed_value().unwrap(), 1);
        assert_eq!(gpu.pending_signals(), vec![2]);

        assert!(!fence.wait(2, Some(Duration::from_millis(5))).unwrap());
        gpu.set_auto_complete(true);
        assert!(fence.wait(2, None).unwrap());
    }

    #[test]
    fn reset_with_work_in_flight_is_a_violation() {
        let gpu = SimGpu::new(SimConfig::default().manual());
        let DriverParts {
            mut queue,
            fence,
            mut allocators,
            ..
        } = gpu.parts(1);
        let allocator = &mut allocators[0];

        allocator.reset().unwrap();
        let mut list = allocator.begin().unwrap();
        list.finish().unwrap();
        queue
            .submit(&list, SimImageSync {
                slot: 0,
                image_index: 0,
            })
            .unwrap();
        queue.signal(&fence, 1).unwrap();

        assert!(allocator.reset().is_err());
        assert_eq!(
            gpu.violations(),
            vec![SimError::PrematureReuse {
                allocator: 0,
                pending: 1
            }]
        );

        gpu.complete_all();
        allocator.reset().unwrap();
    }

    #[test]
    fn permuted_order_cycles() {
        let gpu = SimGpu::new(SimConfig::default().with_image_order(vec![2, 0, 1]));
        let mut presenter = gpu.parts(1).presenter;
        let indices: Vec<u32> = (0..4).map(|_| presenter.acquire(0).unwrap().index).collect();
        assert_eq!(indices, vec![2, 0, 1, 2]);
    }

    #[test]
    fn lost_device_fails_waits() {
        let gpu = SimGpu::new(SimConfig::default().manual());
        let DriverParts {
            mut queue, fence, ..
        } = gpu.parts(1);
        queue.signal(&fence, 1).unwrap();

        let waiter = thread::spawn(move || fence.wait(1, None));
        thread::sleep(Duration::from_millis(10));
        gpu.lose_device();

        let err = waiter.join().unwrap().unwrap_err();
        assert!(err.is_device_lost());
    }
}
