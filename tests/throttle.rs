use std::sync::Arc;

use image::RgbImage;
use yolov3_gaze::{Bbox, DetectionResult, DetectionThrottler, Detector, DetectorError, ThrottleState};

/// 记录调用次数的假检测器
#[derive(Default)]
struct FakeDetector {
    calls: usize,
    fail_next: bool,
}

impl Detector for FakeDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(DetectorError::Inference("session lost".into()));
        }
        self.calls += 1;
        Ok(DetectionResult::new(vec![Bbox::new(
            0.,
            0.,
            frame.width() as f32,
            frame.height() as f32,
            self.calls,
            0.9,
        )]))
    }
}

fn frames(n: usize) -> Vec<RgbImage> {
    (0..n).map(|_| RgbImage::new(8, 6)).collect()
}

#[test]
fn default_interval_detects_on_frames_zero_and_six() {
    let mut det = FakeDetector::default();
    let mut throttler = DetectionThrottler::default();
    assert_eq!(throttler.period(), 6);

    let outcomes: Vec<_> = frames(13)
        .iter()
        .map(|f| throttler.step(&mut det, f).unwrap())
        .collect();

    assert_eq!(det.calls, 2);
    let fresh: Vec<u64> = outcomes.iter().filter(|o| o.fresh).map(|o| o.frame_index).collect();
    assert_eq!(fresh, vec![0, 6]);

    for o in &outcomes[1..6] {
        assert!(Arc::ptr_eq(&o.result, &outcomes[0].result));
    }
    for o in &outcomes[7..] {
        assert!(Arc::ptr_eq(&o.result, &outcomes[6].result));
    }
}

#[test]
fn interval_one_detects_every_frame() {
    let mut det = FakeDetector::default();
    let mut throttler = DetectionThrottler::from_interval(1).unwrap();
    for f in frames(5) {
        assert!(throttler.step(&mut det, &f).unwrap().fresh);
    }
    assert_eq!(det.calls, 5);
}

#[test]
fn state_machine_tracks_cache() {
    let mut det = FakeDetector::default();
    let mut throttler = DetectionThrottler::from_interval(3).unwrap();
    assert!(matches!(throttler.state(), ThrottleState::NeedsDetection));

    let f = RgbImage::new(4, 4);
    throttler.step(&mut det, &f).unwrap();
    assert!(matches!(
        throttler.state(),
        ThrottleState::HasCachedResult { phase: 1, .. }
    ));
    throttler.step(&mut det, &f).unwrap();
    assert!(matches!(
        throttler.state(),
        ThrottleState::HasCachedResult { phase: 2, .. }
    ));
    throttler.step(&mut det, &f).unwrap();
    assert!(throttler.needs_detection());
}

#[test]
fn detector_error_surfaces_and_is_retried() {
    let mut det = FakeDetector::default();
    let mut throttler = DetectionThrottler::from_interval(2).unwrap();
    let f = RgbImage::new(4, 4);

    throttler.step(&mut det, &f).unwrap();
    throttler.step(&mut det, &f).unwrap();
    det.fail_next = true;
    assert!(throttler.step(&mut det, &f).is_err());
    assert!(matches!(throttler.state(), ThrottleState::NeedsDetection));

    let out = throttler.step(&mut det, &f).unwrap();
    assert!(out.fresh);
    assert_eq!(out.frame_index, 2);
    assert_eq!(det.calls, 2);
}
