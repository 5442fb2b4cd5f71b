//! 摄像头输入模块
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use std::time::Duration;

use anyhow::Result;
use ez_ffmpeg::Input;
use image::RgbImage;
use log::{info, warn};

use super::decoder::FfmpegSource;
use super::FrameSource;

/// 打开失败时的重试次数 (摄像头可能被其他程序短暂占用)
const MAX_RETRIES: usize = 3;

#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "linux")]
const CAPTURE_FORMAT: &str = "v4l2";
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
const CAPTURE_FORMAT: &str = "video4linux2";

/// 摄像头输入
pub struct CameraSource {
    inner: FfmpegSource,
}

impl CameraSource {
    pub fn open(device_index: usize) -> Result<Self> {
        let url = camera_url(device_index)?;
        info!(
            "📷 打开摄像头 #{} (格式: {}, 输入: {})",
            device_index, CAPTURE_FORMAT, url
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let url = url.clone();
            match FfmpegSource::spawn("camera", move || {
                Input::new(url.clone()).set_format(CAPTURE_FORMAT)
            }) {
                Ok(inner) => {
                    info!("✅ 摄像头连接成功");
                    return Ok(Self { inner });
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(
                        "⚠️ 摄像头忙或无法打开, 1秒后重试... ({}/{}): {:#}",
                        attempt, MAX_RETRIES, e
                    );
                    std::thread::sleep(Duration::from_secs(1));
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "摄像头 #{} 打开失败 (重试{}次), 请检查设备或关闭占用摄像头的程序",
                        device_index, MAX_RETRIES
                    )))
                }
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.inner.recv())
    }

    fn release(self: Box<Self>) {
        self.inner.release();
    }
}

/// 按平台把设备索引转换为 FFmpeg 输入地址
fn camera_url(index: usize) -> Result<String> {
    #[cfg(target_os = "windows")]
    {
        // dshow 需要设备名而不是索引
        let devices = ez_ffmpeg::device::get_input_video_devices()
            .map_err(|e| anyhow::anyhow!("获取摄像头列表失败: {}", e))?;
        let name = devices
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("找不到摄像头 #{}", index))?;
        Ok(format!("video={}", name))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(format!("{}", index))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(format!("/dev/video{}", index))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        Ok(format!("{}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_camera_url_uses_v4l2_device_node() {
        assert_eq!(camera_url(2).unwrap(), "/dev/video2");
        assert_eq!(CAPTURE_FORMAT, "v4l2");
    }
}
