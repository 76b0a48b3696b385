//! Slot reuse, fence targets and draining.

use std::time::Duration;

use cadence_core::{FrameConfig, WaitPolicy};
use cadence_frame::{FenceTracker, FrameDriver, FrameError, SlotState};
use cadence_test::{init_test_logging, SimApi, SimConfig, SimEvent, SimGpu, SimScene};

/// Bounded so a broken test fails instead of hanging in the driver's drop.
const PATIENT: WaitPolicy = WaitPolicy::DeviceLostAfter(Duration::from_secs(10));

fn driver(gpu: &SimGpu, slots: usize) -> FrameDriver<SimApi> {
    let config = FrameConfig::default()
        .with_frames_in_flight(slots)
        .with_wait_policy(PATIENT);
    FrameDriver::new(gpu.parts(slots), &config).unwrap()
}

#[test]
fn slot_waits_for_its_fence_before_reset() {
    init_test_logging();
    let gpu = SimGpu::new(SimConfig::default().manual());
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    let first = driver.render_frame(&mut scene).unwrap();
    let second = driver.render_frame(&mut scene).unwrap();
    assert_eq!((first.slot, first.fence_target), (0, 1));
    assert_eq!((second.slot, second.fence_target), (1, 2));
    assert_eq!(gpu.completed(), 0);

    let delay = Duration::from_millis(40);
    let completer = gpu.complete_after(delay, 1);
    let third = driver.render_frame(&mut scene).unwrap();
    completer.join().unwrap();

    assert_eq!(third.slot, 0);
    assert!(
        third.waited >= Duration::from_millis(20),
        "frame 2 should have blocked on value 1, waited {:?}",
        third.waited
    );
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());

    // The second reset of allocator 0 comes after value 1 completed.
    let events = gpu.events();
    let completed_one = events
        .iter()
        .position(|e| *e == SimEvent::Complete(1))
        .unwrap();
    let second_reset = events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == SimEvent::Reset { allocator: 0 })
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    assert!(completed_one < second_reset);

    gpu.set_auto_complete(true);
}

#[test]
fn no_reset_while_gpu_is_behind() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let mut driver = driver(&gpu, 3);
    let mut scene = SimScene::default();

    // Complete each value only well after the CPU has queued it.
    let mut completers = Vec::new();
    for frame in 0..12u64 {
        let report = driver.render_frame(&mut scene).unwrap();
        assert_eq!(report.fence_target, frame + 1);
        completers.push(gpu.complete_after(Duration::from_millis(5), report.fence_target));
    }
    for completer in completers {
        completer.join().unwrap();
    }

    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
    gpu.set_auto_complete(true);
}

#[test]
fn fence_targets_strictly_increase() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    let targets: Vec<u64> = (0..10)
        .map(|_| driver.render_frame(&mut scene).unwrap().fence_target)
        .collect();

    assert_eq!(targets, (1..=10).collect::<Vec<_>>());
    assert_eq!(gpu.signals(), targets);
}

#[test]
fn fence_tracker_rejects_invalid_targets() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let parts = gpu.parts(1);
    let mut queue = parts.queue;
    let mut fences = FenceTracker::<SimApi>::new(parts.fence).unwrap();

    // Not issued yet.
    assert!(matches!(
        fences.signal(&mut queue, 1),
        Err(FrameError::InvalidFenceTarget { value: 1, .. })
    ));

    let target = fences.next_target();
    fences.signal(&mut queue, target).unwrap();

    // Reused.
    assert!(matches!(
        fences.signal(&mut queue, target),
        Err(FrameError::InvalidFenceTarget { .. })
    ));
    // Never signaled.
    assert!(matches!(
        fences.wait_until(target + 1, WaitPolicy::Infinite),
        Err(FrameError::InvalidFenceTarget { .. })
    ));
    assert_eq!(gpu.signals(), vec![1]);
}

#[test]
fn completed_value_never_goes_backwards() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let parts = gpu.parts(1);
    let mut queue = parts.queue;
    let mut fences = FenceTracker::<SimApi>::new(parts.fence).unwrap();

    for _ in 0..3 {
        let target = fences.next_target();
        fences.signal(&mut queue, target).unwrap();
    }

    let mut last = 0;
    for value in 1..=3 {
        gpu.complete_through(value);
        let completed = fences.completed_value().unwrap();
        assert!(completed >= last);
        last = completed;
    }
    assert!(fences.is_complete(3).unwrap());
}

#[test]
fn cursor_cycles_and_resets_each_slot_once_per_lap() {
    const SLOTS: usize = 3;
    const LAPS: u64 = 4;

    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, SLOTS);
    let mut scene = SimScene::default();

    for frame in 0..LAPS * SLOTS as u64 {
        let report = driver.render_frame(&mut scene).unwrap();
        assert_eq!(report.frame_number, frame);
        assert_eq!(report.slot as u64, frame % SLOTS as u64);
    }

    assert_eq!(driver.cursor().slot(), 0);
    assert_eq!(driver.cursor().frame_number(), LAPS * SLOTS as u64);
    for slot in driver.slots().iter() {
        assert_eq!(slot.reset_count(), LAPS, "slot {}", slot.index());
    }
    assert_eq!(gpu.resets(), vec![LAPS as usize; SLOTS]);
    assert_eq!(driver.stats().frames, LAPS * SLOTS as u64);
}

#[test]
fn single_slot_serializes_frames() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 1);
    let mut scene = SimScene::default();

    for _ in 0..5 {
        let report = driver.render_frame(&mut scene).unwrap();
        assert_eq!(report.slot, 0);
    }
    assert_eq!(gpu.resets(), vec![5]);
}

#[test]
fn drain_waits_for_everything() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    driver.render_frame(&mut scene).unwrap();
    assert_eq!(driver.slots().in_flight(), 2);
    assert!(!driver.is_drained());

    let completer = gpu.complete_after(Duration::from_millis(20), u64::MAX);
    driver.drain().unwrap();
    completer.join().unwrap();

    assert!(gpu.completed() >= driver.fences().last_signaled());
    assert_eq!(driver.slots().in_flight(), 0);
    assert!(driver
        .slots()
        .iter()
        .all(|slot| slot.state() == SlotState::Idle));
    assert!(driver.is_drained());

    // Idempotent.
    driver.drain().unwrap();
    assert_eq!(gpu.in_flight(), 0);
}

#[test]
fn shutdown_reports_stats() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    for _ in 0..4 {
        driver.render_frame(&mut scene).unwrap();
    }
    let stats = driver.shutdown().unwrap();

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.abandoned, 0);
    assert!(stats.max_wait >= stats.average_wait());
}

#[test]
fn allocator_count_must_match_config() {
    let gpu = SimGpu::default();
    let config = FrameConfig::default().with_frames_in_flight(3);
    assert!(matches!(
        FrameDriver::new(gpu.parts(2), &config),
        Err(FrameError::Config(_))
    ));
}
