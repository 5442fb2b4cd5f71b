/// 检测流水线 (Detection Pipeline)
///
/// 单一处理循环: 输入源 → 检测节流 → (检测器 | 缓存结果) → 输出端
/// - Image:  单张图片, 预览窗口按任意键关闭
/// - Video:  视频文件, 标注帧写入 MJPEG
/// - Webcam: 摄像头, 视线叠加 + CSV 日志, 按 `q` 退出
///
/// 预览窗口占用主线程, 图片/摄像头模式的处理循环在工作线程上运行
pub mod clock;
pub mod sinks;

pub use clock::FrameClock;
pub use sinks::{ImageSink, VideoSink, WebcamSink};

use std::path::Path;
use std::thread;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use log::info;

use crate::detection::{DetectionThrottler, Detector, ThrottleOutcome};
use crate::gaze::{GazeEstimator, LandmarkGaze, NoGaze};
use crate::input::{CameraSource, FrameSource, StillImage, VideoFileSource};
use crate::models::download_model;
use crate::output::{DetectionLog, VideoWriter};
use crate::renderer::{preview, Overlay, PreviewWindow, WaitMode};
use crate::ui_config::UiConfig;
use crate::{Args, InputMode, YOLOv3};

/// 每帧处理后的控制信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// 输入源耗尽
    Exhausted,
    /// 用户退出
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub end: StreamEnd,
    pub frames: u64,
    pub detections: u64,
}

/// 帧输出端: 显示/写出/记录
pub trait FrameSink {
    fn consume(&mut self, frame: RgbImage, outcome: &ThrottleOutcome) -> Result<Control>;

    /// 会话结束时调用且只调用一次 (正常结束/退出/出错都会调用)
    fn finish(self) -> Result<()>
    where
        Self: Sized;
}

/// 驱动一个完整会话
///
/// 无论以何种方式结束, 输入源与输出端都恰好释放一次; 处理循环的错误优先于释放错误返回
pub fn run_stream<S, D, K>(
    mut source: S,
    detector: &mut D,
    throttler: &mut DetectionThrottler,
    mut sink: K,
) -> Result<StreamSummary>
where
    S: FrameSource,
    D: Detector + ?Sized,
    K: FrameSink,
{
    let end = (|| -> Result<StreamEnd> {
        while let Some(frame) = source.next_frame()? {
            let outcome = throttler.step(detector, &frame)?;
            if sink.consume(frame, &outcome)? == Control::Quit {
                return Ok(StreamEnd::Quit);
            }
        }
        Ok(StreamEnd::Exhausted)
    })();

    Box::new(source).release();
    let finished = sink.finish();
    let end = end?;
    finished?;

    Ok(StreamSummary {
        end,
        frames: throttler.frames(),
        detections: throttler.detections(),
    })
}

/// 程序入口: 校验参数 → 加载配置 → 按输入模式运行
pub fn run(mut args: Args) -> Result<()> {
    args.validate()?;
    let ui = UiConfig::load(&args.ui_config).with_detect_interval(args.detect_interval);
    ui.print_summary();

    if args.download_model {
        if let Some(url) = &args.model_url {
            if args.weights.is_file() {
                info!("✅ 模型已存在, 跳过下载: {}", args.weights.display());
            } else {
                let target = args.download_target();
                if !target.is_file() {
                    download_model(url, &target)?;
                }
                args.weights = target;
            }
        }
    }

    match args.input_mode() {
        InputMode::Image(path) => run_image(&args, &ui, &path),
        InputMode::Video(path) => run_video(&args, &ui, &path),
        InputMode::Webcam(index) => {
            info!("Neither path to an image or path to video provided");
            info!("Starting Inference on Webcam");
            run_webcam(&args, &ui, index)
        }
    }
}

/// 主线程运行窗口, 工作线程运行处理循环; 窗口关闭后等待工作线程结束
fn with_preview<F>(window: PreviewWindow, work: F) -> Result<StreamSummary>
where
    F: FnOnce() -> Result<StreamSummary> + Send + 'static,
{
    let worker = thread::Builder::new()
        .name("pipeline".into())
        .spawn(work)
        .context("无法创建处理线程")?;
    window.run();
    worker
        .join()
        .map_err(|_| anyhow!("处理线程 panic"))?
}

pub fn run_image(args: &Args, ui: &UiConfig, path: &Path) -> Result<()> {
    // 在打开窗口前检查图片, 路径错误直接返回
    let source = StillImage::open(path)?;
    let (handle, window) = preview("Image Demonstration", WaitMode::UntilAnyKey);
    let (args, ui) = (args.clone(), ui.clone());

    let summary = with_preview(window, move || {
        let mut model = YOLOv3::new(&args)?;
        let overlay = Overlay::new(model.labels().to_vec(), &args.font, &ui);
        // 单帧, 必然检测
        let mut throttler = DetectionThrottler::from_interval(1)?;
        run_stream(source, &mut model, &mut throttler, ImageSink::new(overlay, handle))
    })?;
    info!("✅ 图片处理完成 ({} 个检测帧)", summary.detections);
    Ok(())
}

pub fn run_video(args: &Args, ui: &UiConfig, path: &Path) -> Result<()> {
    let mut model = YOLOv3::new(args)?;
    let source = VideoFileSource::open(path)?;
    let overlay = Overlay::new(model.labels().to_vec(), &args.font, ui);
    let writer = VideoWriter::new(&args.video_output_path, ui.output_fps);

    // 默认逐帧检测
    let interval = if args.throttle_video {
        ui.detect_interval
    } else {
        1
    };
    let mut throttler = DetectionThrottler::from_interval(interval)?;

    let summary = run_stream(
        source,
        &mut model,
        &mut throttler,
        VideoSink::new(overlay, writer),
    )?;
    info!(
        "✅ 视频处理完成: {} 帧, {} 次检测 → {}",
        summary.frames,
        summary.detections,
        args.video_output_path.display()
    );
    Ok(())
}

pub fn run_webcam(args: &Args, ui: &UiConfig, index: usize) -> Result<()> {
    let (handle, window) = preview("Webcam Demonstration", WaitMode::UntilQuitKey);
    let log_path = args.log_path.clone();
    let (args, ui) = (args.clone(), ui.clone());

    let summary = with_preview(window, move || {
        let mut model = YOLOv3::new(&args)?;
        let gaze: Box<dyn GazeEstimator> = match &args.gaze_model {
            Some(path) => Box::new(LandmarkGaze::new(path, args.execution_provider())?),
            None => {
                info!("📝 未指定 --gaze-model, 视线叠加显示为空");
                Box::new(NoGaze)
            }
        };
        let log = DetectionLog::create(&args.log_path)?;
        let overlay = Overlay::new(model.labels().to_vec(), &args.font, &ui);
        let source = CameraSource::open(index)?;
        let mut throttler = DetectionThrottler::from_interval(ui.detect_interval)?;

        run_stream(
            source,
            &mut model,
            &mut throttler,
            WebcamSink::new(overlay, gaze, log, handle),
        )
    })?;

    info!(
        "✅ 摄像头会话结束 ({:?}): {} 帧, {} 次检测, 日志 {}",
        summary.end,
        summary.frames,
        summary.detections,
        log_path.display()
    );
    Ok(())
}
