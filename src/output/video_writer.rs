//! MJPEG 视频写出
//!
//! 标注后的 RGB 帧以 rawvideo 形式经读回调喂给 FFmpeg, 编码为 mjpeg 写入 `.avi`.
//! 写出器在收到第一帧时才打开 (尺寸取自第一帧)

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;
use log::{error, info};

/// FFmpeg `AVERROR_EOF`
pub const AVERROR_EOF: i32 = -541478725;

/// 默认输出帧率
pub const DEFAULT_OUTPUT_FPS: u32 = 30;

/// 读回调的数据源: 从通道取整帧字节, 按 FFmpeg 请求的块大小拷出
pub struct FrameFeed {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl FrameFeed {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// 返回拷贝的字节数; 发送端全部关闭且缓冲读完时返回 `AVERROR_EOF`
    pub fn read(&mut self, buf: &mut [u8]) -> i32 {
        if buf.is_empty() {
            return 0;
        }
        while self.offset >= self.pending.len() {
            match self.rx.recv() {
                Ok(bytes) => {
                    self.pending = bytes;
                    self.offset = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }

        let n = buf
            .len()
            .min(self.pending.len() - self.offset)
            .min(i32::MAX as usize);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        n as i32
    }
}

struct Running {
    tx: Sender<Vec<u8>>,
    handle: JoinHandle<Result<()>>,
    size: (u32, u32),
}

pub struct VideoWriter {
    path: PathBuf,
    fps: u32,
    running: Option<Running>,
    frames: usize,
}

impl VideoWriter {
    pub fn new(path: &Path, fps: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            fps: fps.max(1),
            running: None,
            frames: 0,
        }
    }

    /// 写入一帧; 第一帧决定输出尺寸, 之后尺寸必须一致
    pub fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if self.running.is_none() {
            self.running = Some(self.open(frame.dimensions())?);
        }
        let Some(running) = self.running.as_ref() else {
            bail!("视频写出器未打开");
        };
        if running.size != frame.dimensions() {
            bail!(
                "帧尺寸变化: {:?} → {:?}",
                running.size,
                frame.dimensions()
            );
        }

        if running.tx.send(frame.as_raw().clone()).is_err() {
            // 编码线程已退出, 取回它的错误
            let err = match self.running.take() {
                Some(r) => join(r.handle).err(),
                None => None,
            };
            return Err(err.unwrap_or_else(|| anyhow!("编码线程已退出")));
        }
        self.frames += 1;
        Ok(())
    }

    fn open(&self, (w, h): (u32, u32)) -> Result<Running> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("无法创建输出目录: {}", parent.display()))?;
            }
        }
        info!(
            "📹 打开视频写出器: {} ({}x{} @ {}fps, mjpeg)",
            self.path.display(),
            w,
            h,
            self.fps
        );

        let (tx, rx) = bounded::<Vec<u8>>(2);
        let path = self.path.to_string_lossy().into_owned();
        let fps = self.fps;
        let handle = std::thread::Builder::new()
            .name("mjpeg-writer".into())
            .spawn(move || encode(FrameFeed::new(rx), &path, (w, h), fps))
            .context("无法创建编码线程")?;

        Ok(Running {
            tx,
            handle,
            size: (w, h),
        })
    }

    /// 关闭输入并等待编码完成; 没有写入任何帧时不产生文件
    pub fn finish(mut self) -> Result<usize> {
        if let Some(running) = self.running.take() {
            drop(running.tx);
            join(running.handle)?;
            info!(
                "✅ 视频已写出: {} ({} 帧)",
                self.path.display(),
                self.frames
            );
        }
        Ok(self.frames)
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            drop(running.tx);
            if let Err(e) = join(running.handle) {
                error!("❌ 视频写出失败: {:#}", e);
            }
        }
    }
}

fn join(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow!("编码线程 panic"))?
}

fn encode(mut feed: FrameFeed, path: &str, (w, h): (u32, u32), fps: u32) -> Result<()> {
    let video_size = format!("{}x{}", w, h);
    let framerate = fps.to_string();

    let input = Input::new_by_read_callback(move |buf: &mut [u8]| feed.read(buf))
        .set_format("rawvideo")
        .set_input_opts(
            [
                ("video_size", video_size.as_str()),
                ("pixel_format", "rgb24"),
                ("framerate", framerate.as_str()),
            ]
            .into(),
        );
    let output = Output::from(path).set_video_codec("mjpeg");

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs(["format=yuvj420p"].into())
        .output(output)
        .build()
        .map_err(|e| anyhow!("构建失败: {}", e))?;
    let sch = ctx.start().map_err(|e| anyhow!("启动失败: {}", e))?;
    sch.wait().map_err(|e| anyhow!("编码失败: {}", e))?;
    Ok(())
}
