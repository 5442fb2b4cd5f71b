//! 三种模式的帧输出端

use std::io::Write;
use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use log::{debug, info, warn};

use super::clock::FrameClock;
use super::{Control, FrameSink};
use crate::detection::ThrottleOutcome;
use crate::gaze::{GazeEstimator, GazeReading};
use crate::output::{DetectionLog, DetectionLogRecord, VideoWriter};
use crate::renderer::{Overlay, PreviewHandle};

/// 摄像头模式的逐对象控制台输出, 准确率为百分比
pub fn object_line(label: &str, confidence: f32, frame: u64, yolo_time: f64, fps: f64) -> String {
    format!(
        "Object : {} - Accuracy : {:.6} - Frame : {} - Yolo_Time = {}s - FPS = {}",
        label,
        confidence * 100.0,
        frame,
        yolo_time,
        fps
    )
}

/// 图片模式: 绘制检测框后送预览窗口
pub struct ImageSink {
    overlay: Overlay,
    preview: PreviewHandle,
}

impl ImageSink {
    pub fn new(overlay: Overlay, preview: PreviewHandle) -> Self {
        Self { overlay, preview }
    }
}

impl FrameSink for ImageSink {
    fn consume(&mut self, mut frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control> {
        self.overlay.draw_detections(&mut frame, &outcome.result);
        Ok(self.preview.present(&frame))
    }

    fn finish(self) -> Result<()> {
        Ok(())
    }
}

/// 视频模式: 标注帧写入 MJPEG
pub struct VideoSink {
    overlay: Overlay,
    writer: VideoWriter,
}

impl VideoSink {
    pub fn new(overlay: Overlay, writer: VideoWriter) -> Self {
        Self { overlay, writer }
    }
}

impl FrameSink for VideoSink {
    fn consume(&mut self, mut frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control> {
        self.overlay.draw_detections(&mut frame, &outcome.result);
        self.writer.write(&frame)?;
        Ok(Control::Continue)
    }

    fn finish(self) -> Result<()> {
        info!("[INFO] Cleaning up...");
        self.writer.finish()?;
        Ok(())
    }
}

/// 摄像头模式: 视线叠加 + FPS/运行时长 + 逐对象日志 + 预览
pub struct WebcamSink<G, W: Write> {
    overlay: Overlay,
    clock: FrameClock,
    gaze: G,
    gaze_failed: bool,
    log: DetectionLog<W>,
    preview: PreviewHandle,
}

impl<G: GazeEstimator, W: Write> WebcamSink<G, W> {
    pub fn new(overlay: Overlay, gaze: G, log: DetectionLog<W>, preview: PreviewHandle) -> Self {
        Self {
            overlay,
            clock: FrameClock::default(),
            gaze,
            gaze_failed: false,
            log,
            preview,
        }
    }

    /// 视线估计只影响显示, 失败时记为 `Unknown`
    fn read_gaze(&mut self, frame: &RgbImage) -> GazeReading {
        match self.gaze.refresh(frame) {
            Ok(r) => r,
            Err(e) if !self.gaze_failed => {
                warn!("⚠️ 视线估计失败: {:#}", e);
                self.gaze_failed = true;
                GazeReading::unknown()
            }
            Err(e) => {
                debug!("视线估计失败: {:#}", e);
                GazeReading::unknown()
            }
        }
    }
}

impl<G: GazeEstimator, W: Write> FrameSink for WebcamSink<G, W> {
    fn consume(&mut self, mut frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control> {
        let now = Instant::now();
        let fps = self.clock.tick(now);

        let reading = self.read_gaze(&frame);
        self.overlay.draw_gaze(&mut frame, &reading);
        self.overlay.draw_detections(&mut frame, &outcome.result);

        let yolo_time = outcome.latency.as_secs_f64();
        for bbox in outcome.result.iter() {
            let label = self.overlay.label(bbox.id());
            info!(
                "{}",
                object_line(&label, bbox.confidence(), outcome.frame_index, yolo_time, fps)
            );
            self.log.record(&DetectionLogRecord {
                object: label,
                accuracy: bbox.confidence(),
                frame: outcome.frame_index,
                yolo_time,
                fps,
            })?;
        }

        self.overlay.draw_fps(&mut frame, fps);
        self.overlay.draw_performance(&mut frame, self.clock.elapsed(now));

        Ok(self.preview.present(&frame))
    }

    fn finish(self) -> Result<()> {
        let rows = self.log.finish()?;
        info!("💾 检测日志已写出 ({} 行)", rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{preview, WaitMode};
    use crate::ui_config::UiConfig;
    use crate::{Bbox, DetectionResult};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingGaze;

    impl GazeEstimator for FailingGaze {
        fn refresh(&mut self, _frame: &RgbImage) -> Result<GazeReading> {
            anyhow::bail!("no face")
        }
    }

    fn outcome(frame_index: u64, fresh: bool) -> ThrottleOutcome {
        ThrottleOutcome {
            frame_index,
            result: Arc::new(DetectionResult::new(vec![
                Bbox::new(1., 1., 5., 5., 0, 0.75),
                Bbox::new(10., 10., 5., 5., 1, 0.5),
            ])),
            fresh,
            latency: Duration::from_millis(250),
        }
    }

    #[test]
    fn webcam_logs_every_object_including_carried_over_frames() {
        let overlay = Overlay::with_font(vec!["person".into(), "cup".into()], None, &UiConfig::default());
        let (handle, window) = preview("test", WaitMode::UntilQuitKey);
        let log = DetectionLog::from_writer(Vec::new()).unwrap();
        let mut sink = WebcamSink::new(overlay, FailingGaze, log, handle);

        let frame = RgbImage::new(32, 32);
        assert_eq!(sink.consume(frame.clone(), &outcome(0, true)).unwrap(), Control::Continue);
        assert_eq!(sink.consume(frame, &outcome(1, false)).unwrap(), Control::Continue);
        assert_eq!(sink.log.rows(), 4);
        assert!(sink.gaze_failed);

        let text = String::from_utf8(sink.log.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Object,Accuracy,Frame No,Yolo_Time,FPS");
        assert!(lines[1].starts_with("person,0.75,0,0.25,"));
        assert!(lines[4].starts_with("cup,0.5,1,0.25,"));
        drop(window);
    }

    #[test]
    fn object_line_prints_accuracy_with_six_decimals() {
        assert_eq!(
            object_line("person", 0.5, 12, 0.25, 30.0),
            "Object : person - Accuracy : 50.000000 - Frame : 12 - Yolo_Time = 0.25s - FPS = 30"
        );
    }

    #[test]
    fn webcam_reports_quit_when_window_closes() {
        let overlay = Overlay::with_font(vec![], None, &UiConfig::default());
        let (handle, window) = preview("test", WaitMode::UntilQuitKey);
        drop(window);
        let mut sink = WebcamSink::new(
            overlay,
            crate::gaze::NoGaze,
            DetectionLog::from_writer(Vec::new()).unwrap(),
            handle,
        );
        let out = ThrottleOutcome {
            frame_index: 0,
            result: Arc::new(DetectionResult::empty()),
            fresh: true,
            latency: Duration::ZERO,
        };
        assert_eq!(sink.consume(RgbImage::new(4, 4), &out).unwrap(), Control::Quit);
        sink.finish().unwrap();
    }
}
