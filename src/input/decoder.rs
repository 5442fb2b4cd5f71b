/// 视频文件解码器
///
/// 解码在独立线程上运行, 帧通过容量为 2 的有界通道交给处理循环;
/// 打开失败在第一帧之前就返回错误
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use log::{error, info};

use super::decode_filter::{RgbFilter, PIXEL_FORMAT_FILTER};
use super::FrameSource;

/// 解码线程与消费者之间的帧缓冲
pub const FRAME_CHANNEL_CAPACITY: usize = 2;

/// 解码线程句柄: 通道接收端 + 停止标志 + 线程
pub struct FfmpegSource {
    name: String,
    rx: Option<Receiver<RgbImage>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FfmpegSource {
    /// 在新线程上构建并启动 FFmpeg 上下文
    ///
    /// `make_input` 在解码线程内调用; 上下文构建/启动的结果通过一次性通道返回,
    /// 失败时本函数直接返回错误
    pub fn spawn<F>(name: impl Into<String>, make_input: F) -> Result<Self>
    where
        F: Fn() -> Input + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = bounded::<RgbImage>(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_name = name.clone();
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(format!("decode-{}", thread_name))
            .spawn(move || decode_loop(&thread_name, make_input, tx, ready_tx, thread_stop))
            .context("无法创建解码线程")?;

        let mut source = Self {
            name,
            rx: Some(rx),
            stop,
            handle: Some(handle),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(source),
            Ok(Err(e)) => {
                source.shutdown();
                Err(anyhow!("{} 打开失败: {}", source.name, e))
            }
            Err(_) => {
                source.shutdown();
                Err(anyhow!("{} 解码线程意外退出", source.name))
            }
        }
    }

    pub(crate) fn recv(&mut self) -> Option<RgbImage> {
        self.rx.as_ref().and_then(|rx| rx.recv().ok())
    }

    /// 停止解码并等待线程退出; 可重复调用, 只生效一次
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // 先丢弃接收端, 阻塞在 send 上的解码线程会立即返回
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("❌ {} 解码线程 panic", self.name);
            } else {
                info!("📹 {} 已释放", self.name);
            }
        }
    }

    pub fn release(mut self) {
        self.shutdown();
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_loop<F>(
    name: &str,
    make_input: F,
    tx: Sender<RgbImage>,
    ready: Sender<Result<(), String>>,
    stop: Arc<AtomicBool>,
) where
    F: Fn() -> Input,
{
    let filter = RgbFilter::new(name, tx, stop);
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("rgb", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(make_input())
        .filter_descs([PIXEL_FORMAT_FILTER].into())
        .output(out)
        .build();
    let ctx = match ctx {
        Ok(c) => c,
        Err(e) => {
            let _ = ready.send(Err(format!("构建失败: {}", e)));
            return;
        }
    };

    let sch = match ctx.start() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(format!("启动失败: {}", e)));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    info!("✅ {} 开始解码", name);

    if let Err(e) = sch.wait() {
        // 主动停止时解码器以错误返回, 不算异常
        info!("📹 {} 解码结束: {}", name, e);
    }
}

/// 视频文件输入
pub struct VideoFileSource {
    inner: FfmpegSource,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("无法打开视频文件: {}", path.display());
        }
        info!("📹 打开视频: {}", path.display());

        let url = path.to_string_lossy().into_owned();
        let inner = FfmpegSource::spawn("video", move || Input::new(url.clone()))?;
        Ok(Self { inner })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.inner.recv())
    }

    fn release(self: Box<Self>) {
        self.inner.release();
    }
}
