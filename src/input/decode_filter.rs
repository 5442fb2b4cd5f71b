/// FFmpeg解码过滤器模块
///
/// 上游滤镜图已经把像素格式转成 rgb24, 这里只负责按行拷贝出 `RgbImage`
/// 并送入有界通道 (通道满时阻塞解码线程, 形成背压)
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use log::{debug, info, warn};

/// 解码后送入通道的 rgb24 像素格式描述
pub const PIXEL_FORMAT_FILTER: &str = "format=rgb24";

/// FFmpeg解码过滤器: 视频流 → RGB帧
pub struct RgbFilter {
    tx: Option<Sender<RgbImage>>,
    stop: Arc<AtomicBool>,
    name: String,
    total_frames: usize,
    dropped_frames: usize,
    count: usize,
    last: Instant,
}

impl RgbFilter {
    pub fn new(name: impl Into<String>, tx: Sender<RgbImage>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx: Some(tx),
            stop,
            name: name.into(),
            total_frames: 0,
            dropped_frames: 0,
            count: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for RgbFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ {} 解码线程启动", self.name);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("decoder stopped".to_string());
        }

        let image = unsafe {
            self.total_frames += 1;

            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.total_frames);
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            let row_bytes = w as usize * 3;

            if w == 0 || h == 0 || data.is_null() || stride < row_bytes {
                self.dropped_frames += 1;
                warn!(
                    "⚠️ 丢弃帧 #{}: 非法帧 {}x{} stride={}",
                    self.total_frames, w, h, stride
                );
                return Ok(None);
            }

            let mut buffer = Vec::with_capacity(row_bytes * h as usize);
            for y in 0..h as usize {
                let row = std::slice::from_raw_parts(data.add(y * stride), row_bytes);
                buffer.extend_from_slice(row);
            }
            RgbImage::from_raw(w, h, buffer)
        };

        let Some(image) = image else {
            self.dropped_frames += 1;
            return Ok(None);
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            debug!(
                "📺 {} 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.name, fps, self.total_frames, self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        match &self.tx {
            // 接收端已关闭 (消费者退出), 终止解码
            Some(tx) => tx
                .send(image)
                .map_err(|_| "frame receiver closed".to_string())?,
            None => return Err("decoder already finished".to_string()),
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        // 释放发送端, 消费者随后收到断开信号即视为流结束
        self.tx.take();
        info!(
            "✅ {} 解码线程退出 (总帧{}, 丢弃{})",
            self.name, self.total_frames, self.dropped_frames
        );
    }
}
