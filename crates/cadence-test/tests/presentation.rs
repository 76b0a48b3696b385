//! Image acquisition order, presentation and resize.

use std::time::Duration;

use cadence_core::{Extent2d, FrameConfig, WaitPolicy};
use cadence_frame::{FrameDriver, FrameError, PresentStatus, ResourceState};
use cadence_test::{SimApi, SimCommand, SimConfig, SimEvent, SimGpu, SimImage, SimScene};

const PATIENT: WaitPolicy = WaitPolicy::DeviceLostAfter(Duration::from_secs(10));

fn driver(gpu: &SimGpu, slots: usize) -> FrameDriver<SimApi> {
    let config = FrameConfig::default()
        .with_frames_in_flight(slots)
        .with_wait_policy(PATIENT);
    FrameDriver::new(gpu.parts(slots), &config).unwrap()
}

#[test]
fn image_index_comes_from_the_presenter() {
    let gpu = SimGpu::new(SimConfig::default().with_image_order(vec![2, 0, 1]));
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    let reports: Vec<_> = (0..6)
        .map(|_| driver.render_frame(&mut scene).unwrap())
        .collect();

    let slots: Vec<usize> = reports.iter().map(|r| r.slot).collect();
    let images: Vec<u32> = reports.iter().map(|r| r.image_index).collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
    assert_eq!(images, vec![2, 0, 1, 2, 0, 1]);
    assert_eq!(scene.targets, images);

    for (submission, image_index) in gpu.submissions().iter().zip(&images) {
        assert_eq!(submission.sync.image_index, *image_index);
        let image = SimImage {
            generation: 0,
            index: *image_index,
        };
        assert_eq!(
            submission.commands.first(),
            Some(&SimCommand::Transition {
                image,
                from: ResourceState::Present,
                to: ResourceState::RenderTarget,
            })
        );
        assert_eq!(
            submission.commands.last(),
            Some(&SimCommand::Transition {
                image,
                from: ResourceState::RenderTarget,
                to: ResourceState::Present,
            })
        );
        assert!(submission.commands.iter().any(|c| matches!(
            c,
            SimCommand::BeginRendering { image_index: i, .. } if i == image_index
        )));
    }
}

#[test]
fn out_of_range_image_is_handed_back() {
    let gpu = SimGpu::new(SimConfig::default().with_image_order(vec![0, 5]));
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    let err = driver.render_frame(&mut scene).unwrap_err();
    assert_eq!(err, FrameError::InvalidImageIndex { index: 5, count: 2 });
    assert!(gpu.events().contains(&SimEvent::Release { image_index: 5 }));
    assert_eq!(driver.images().current_image_index(), None);
    assert_eq!(scene.draws, 1);

    let retry = driver.render_frame(&mut scene).unwrap();
    assert_eq!((retry.frame_number, retry.image_index), (1, 0));
}

#[test]
fn recorded_frame_clears_and_draws() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();

    let submission = &gpu.submissions()[0];
    let image = SimImage {
        generation: 0,
        index: 0,
    };
    assert_eq!(
        submission.commands,
        vec![
            SimCommand::Transition {
                image,
                from: ResourceState::Present,
                to: ResourceState::RenderTarget,
            },
            SimCommand::BeginRendering {
                image_index: 0,
                depth: true,
                clear_color: scene.clear_color,
            },
            SimCommand::Draw { vertices: 3 },
            SimCommand::EndRendering,
            SimCommand::Transition {
                image,
                from: ResourceState::RenderTarget,
                to: ResourceState::Present,
            },
        ]
    );
}

#[test]
fn depth_can_be_disabled() {
    let gpu = SimGpu::default();
    let config = FrameConfig::default()
        .with_frames_in_flight(2)
        .with_depth(false);
    let mut driver = FrameDriver::new(gpu.parts(2), &config).unwrap();

    driver.render_frame(&mut SimScene::default()).unwrap();

    assert!(gpu.submissions()[0]
        .commands
        .iter()
        .any(|c| matches!(c, SimCommand::BeginRendering { depth: false, .. })));
}

#[test]
fn resize_drains_before_recreating_images() {
    let gpu = SimGpu::new(SimConfig::default().manual());
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    driver.render_frame(&mut scene).unwrap();
    driver.render_frame(&mut scene).unwrap();

    let extent = Extent2d::new(800, 600);
    let completer = gpu.complete_after(Duration::from_millis(20), u64::MAX);
    driver.resize(extent).unwrap();
    completer.join().unwrap();

    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
    assert_eq!(driver.images().extent(), extent);

    let events = gpu.events();
    let resized = events
        .iter()
        .position(|e| *e == SimEvent::Resize(extent))
        .unwrap();
    let last_complete = events
        .iter()
        .rposition(|e| *e == SimEvent::Complete(2))
        .unwrap();
    assert!(last_complete < resized);

    // New images carry the new generation.
    gpu.set_auto_complete(true);
    driver.render_frame(&mut scene).unwrap();
    let last = gpu.submissions().pop().unwrap();
    assert!(matches!(
        last.commands.first(),
        Some(SimCommand::Transition {
            image: SimImage { generation: 1, .. },
            ..
        })
    ));
}

#[test]
fn empty_resize_is_ignored() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2);

    driver.resize(Extent2d::new(0, 600)).unwrap();

    assert_eq!(driver.images().extent(), Extent2d::new(1600, 900));
    assert!(!gpu
        .events()
        .iter()
        .any(|e| matches!(e, SimEvent::Resize(_))));
}

#[test]
fn suboptimal_present_asks_for_resize() {
    let gpu = SimGpu::default();
    let mut driver = driver(&gpu, 2);
    let mut scene = SimScene::default();

    gpu.set_next_present_status(PresentStatus::Suboptimal);
    let report = driver.render_frame(&mut scene).unwrap();
    assert!(report.needs_resize());

    let report = driver.render_frame(&mut scene).unwrap();
    assert!(!report.needs_resize());
}
