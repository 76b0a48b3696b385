//! Frame abandonment and wait policies.

use std::time::Duration;

use cadence_core::{Extent2d, FrameConfig, WaitPolicy};
use cadence_frame::{FrameDriver, FrameError, SlotState};
use cadence_test::{SimApi, SimConfig, SimEvent, SimGpu, SimScene, SimStep};

const PATIENT: WaitPolicy = WaitPolicy::DeviceLostAfter(Duration::from_secs(10));

fn driver(gpu: &SimGpu, slots: usize, policy: WaitPolicy) -> FrameDriver<SimApi> {
    let config = FrameConfig::default()
        .with_frames_in_flight(slots)
        .with_wait_policy(policy);
    FrameDriver::new(gpu.parts(slots), &config).unwrap()
}

#[test]
fn failed_draw_leaves_pool_usable() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default().failing_on(2);

    driver.render_frame(&mut scene).unwrap();
    driver.render_frame(&mut scene).unwrap();

    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(matches!(err, FrameError::RecordingFailure(_)), "{err:?}");
    assert_eq!(driver.cursor().frame_number(), 2);
    assert_eq!(driver.slots().slot(0).unwrap().state(), SlotState::Idle);
    assert_eq!(driver.stats().abandoned, 1);
    assert_eq!(driver.images().current_image_index(), None);
    assert!(gpu.events().contains(&SimEvent::Release { image_index: 2 }));

    let retry = driver.render_frame(&mut scene).unwrap();
    assert_eq!((retry.frame_number, retry.slot), (2, 0));
    assert_eq!(gpu.submissions().len(), 3);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}

#[test]
fn backend_recording_errors_become_recording_failures() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default();

    for step in [
        SimStep::Transition,
        SimStep::BeginRendering,
        SimStep::EndRendering,
        SimStep::Finish,
    ] {
        gpu.fail_next(step);
        let err = driver.render_frame(&mut scene).unwrap_err();
        assert!(
            matches!(err, FrameError::RecordingFailure(_)),
            "{step:?}: {err:?}"
        );
        driver.render_frame(&mut scene).unwrap();
    }

    assert_eq!(driver.stats().abandoned, 4);
    assert_eq!(driver.stats().frames, 4);
}

#[test]
fn failed_submit_is_device_loss() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default();

    gpu.fail_next(SimStep::Submit);
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(err.is_device_lost(), "{err:?}");
    assert!(gpu.submissions().is_empty());
    assert!(gpu.signals().is_empty());
    assert!(gpu.events().contains(&SimEvent::Release { image_index: 0 }));
    assert_eq!(driver.slots().slot(0).unwrap().state(), SlotState::Idle);
    assert_eq!(driver.stats().abandoned, 1);
    assert_eq!(driver.cursor().frame_number(), 0);
    driver.drain().unwrap();
}

#[test]
fn failed_signal_after_submit_is_never_reported_drained() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default();

    gpu.fail_next(SimStep::Signal);
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(err.is_device_lost(), "{err:?}");
    assert_eq!(gpu.submissions().len(), 1);
    assert!(gpu.signals().is_empty());

    let slot = driver.slots().slot(0).unwrap();
    assert_eq!(slot.state(), SlotState::Submitted);
    assert_eq!(slot.fence_target(), None);
    assert_eq!(driver.slots().uncovered(), Some(0));

    assert_eq!(driver.images().current_image_index(), None);
    assert!(gpu.events().contains(&SimEvent::Present { image_index: 0 }));
    assert_eq!(driver.stats().abandoned, 1);

    assert!(!driver.is_drained());
    assert!(driver.drain().unwrap_err().is_device_lost());
    assert!(!driver.is_drained());
    assert!(driver
        .resize(Extent2d::new(800, 600))
        .unwrap_err()
        .is_device_lost());
}

#[test]
fn out_of_date_acquire_abandons_frame() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default();

    gpu.fail_next_acquire(FrameError::SurfaceOutOfDate);
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(err.is_out_of_date());
    assert_eq!(driver.stats().abandoned, 1);
    assert_eq!(scene.draws, 0);

    driver.render_frame(&mut scene).unwrap();
    assert_eq!(driver.cursor().frame_number(), 1);
}

#[test]
fn diagnostic_timeout_is_recoverable() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let policy = WaitPolicy::Diagnostic(Duration::from_millis(20));
    let mut driver = driver(&gpu, 1, policy);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(
        matches!(
            err,
            FrameError::TimeoutExceeded {
                target: 1,
                completed: 0,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(driver.cursor().frame_number(), 1);
    assert_eq!(driver.slots().slot(0).unwrap().state(), SlotState::Submitted);

    gpu.complete_all();
    let report = driver.render_frame(&mut scene).unwrap();
    assert_eq!(report.frame_number, 1);

    gpu.set_auto_complete(true);
}

#[test]
fn bounded_timeout_reports_device_loss() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let policy = WaitPolicy::DeviceLostAfter(Duration::from_millis(20));
    let mut driver = driver(&gpu, 1, policy);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(err.is_device_lost(), "{err:?}");

    gpu.set_auto_complete(true);
}

#[test]
fn device_loss_is_reported() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2, PATIENT);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    gpu.lose_device();

    let err = driver.render_frame(&mut scene).unwrap_err();
    assert!(err.is_device_lost(), "{err:?}");
    assert!(driver.drain().unwrap_err().is_device_lost());
}
