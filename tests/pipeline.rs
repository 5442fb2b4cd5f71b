use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;
use yolov3_gaze::detection::{DetectionThrottler, Detector, DetectorError, ThrottleOutcome};
use yolov3_gaze::input::FrameSource;
use yolov3_gaze::pipeline::{run_stream, Control, FrameSink, StreamEnd};
use yolov3_gaze::DetectionResult;

/// 固定帧数的输入源, 记录释放次数
struct CountedSource {
    remaining: usize,
    released: Rc<Cell<usize>>,
}

impl FrameSource for CountedSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::new(4, 4)))
    }

    fn release(self: Box<Self>) {
        self.released.set(self.released.get() + 1);
    }
}

struct EmptyDetector;

impl Detector for EmptyDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
        Ok(DetectionResult::empty())
    }
}

struct BrokenDetector;

impl Detector for BrokenDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
        Err(DetectorError::EmptyFrame {
            width: frame.width(),
            height: frame.height(),
        })
    }
}

/// 第 `quit_at` 帧返回 Quit; 记录 finish 次数
struct RecordingSink {
    quit_at: Option<u64>,
    finished: Rc<Cell<usize>>,
}

impl FrameSink for RecordingSink {
    fn consume(&mut self, _frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control> {
        if Some(outcome.frame_index) == self.quit_at {
            return Ok(Control::Quit);
        }
        Ok(Control::Continue)
    }

    fn finish(self) -> Result<()> {
        self.finished.set(self.finished.get() + 1);
        Ok(())
    }
}

fn fixture(frames: usize, quit_at: Option<u64>) -> (CountedSource, RecordingSink, Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let released = Rc::new(Cell::new(0));
    let finished = Rc::new(Cell::new(0));
    (
        CountedSource {
            remaining: frames,
            released: Rc::clone(&released),
        },
        RecordingSink {
            quit_at,
            finished: Rc::clone(&finished),
        },
        released,
        finished,
    )
}

#[test]
fn exhausted_stream_releases_once() {
    let (source, sink, released, finished) = fixture(13, None);
    let mut throttler = DetectionThrottler::from_interval(6).unwrap();
    let summary = run_stream(source, &mut EmptyDetector, &mut throttler, sink).unwrap();

    assert_eq!(summary.end, StreamEnd::Exhausted);
    assert_eq!(summary.frames, 13);
    assert_eq!(summary.detections, 2);
    assert_eq!(released.get(), 1);
    assert_eq!(finished.get(), 1);
}

#[test]
fn quit_on_a_skip_frame_releases_once() {
    let (source, sink, released, finished) = fixture(100, Some(9));
    let mut throttler = DetectionThrottler::from_interval(6).unwrap();
    let summary = run_stream(source, &mut EmptyDetector, &mut throttler, sink).unwrap();

    assert_eq!(summary.end, StreamEnd::Quit);
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.detections, 2);
    assert_eq!(released.get(), 1);
    assert_eq!(finished.get(), 1);
}

#[test]
fn detector_failure_still_releases_and_propagates() {
    let (source, sink, released, finished) = fixture(5, None);
    let mut throttler = DetectionThrottler::default();
    let err = run_stream(source, &mut BrokenDetector, &mut throttler, sink).unwrap_err();

    assert!(err.downcast_ref::<DetectorError>().is_some());
    assert_eq!(released.get(), 1);
    assert_eq!(finished.get(), 1);
    assert_eq!(throttler.frames(), 0);
}

#[test]
fn empty_results_are_cached_across_skip_frames() {
    struct SharedSink(Rc<std::cell::RefCell<Vec<Arc<DetectionResult>>>>);

    impl FrameSink for SharedSink {
        fn consume(&mut self, _frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control> {
            self.0.borrow_mut().push(Arc::clone(&outcome.result));
            Ok(Control::Continue)
        }

        fn finish(self) -> Result<()> {
            Ok(())
        }
    }

    let (source, _, _, _) = fixture(4, None);
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut throttler = DetectionThrottler::from_interval(4).unwrap();
    run_stream(source, &mut EmptyDetector, &mut throttler, SharedSink(Rc::clone(&seen))).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|r| r.is_empty()));
    assert!(seen.iter().all(|r| Arc::ptr_eq(r, &seen[0])));
}
