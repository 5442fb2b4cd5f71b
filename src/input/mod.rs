/// 帧输入系统 (Frame Input System)
///
/// - StillImage: 单张图片 (只产出一帧)
/// - VideoFileSource: 视频文件解码 (独立解码线程 + 有界通道)
/// - CameraSource: 本地摄像头 (DirectShow/AVFoundation/V4L2)
/// - RgbFilter: FFmpeg 帧过滤器, rgb24 帧 → `RgbImage`
pub mod camera;
pub mod decode_filter;
pub mod decoder;
pub mod image;

pub use camera::CameraSource;
pub use decode_filter::RgbFilter;
pub use decoder::{FfmpegSource, VideoFileSource, FRAME_CHANNEL_CAPACITY};
pub use self::image::StillImage;

use ::image::RgbImage;
use anyhow::Result;

/// 连续产出帧的输入源
pub trait FrameSource {
    /// 下一帧; 流结束返回 `Ok(None)`
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// 释放底层资源 (解码线程/设备); 只会被调用一次
    fn release(self: Box<Self>) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn release(self: Box<Self>) {
        S::release(*self)
    }
}
