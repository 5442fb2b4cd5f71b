//! 预览窗口 (macroquad, 必须运行在主线程)
//!
//! 处理线程通过 `PreviewHandle` 推送标注后的帧; 窗口按 `q` 或关闭时置位退出标志,
//! 处理线程在下一帧检查到后结束会话

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use image::RgbImage;
use log::info;
use macroquad::prelude::*;
use macroquad::window::Conf;

use crate::pipeline::Control;

pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PreviewFrame {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let mut rgba = Vec::with_capacity(img.as_raw().len() / 3 * 4);
        for px in img.as_raw().chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        Self {
            width: img.width(),
            height: img.height(),
            rgba,
        }
    }
}

/// 窗口何时关闭
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// 帧流结束或按下 `q` 时关闭 (摄像头)
    UntilQuitKey,
    /// 帧流结束后保持最后一帧, 按任意键关闭 (图片)
    UntilAnyKey,
}

/// 处理线程一侧
#[derive(Clone)]
pub struct PreviewHandle {
    tx: Sender<PreviewFrame>,
    quit: Arc<AtomicBool>,
}

impl PreviewHandle {
    /// 推送一帧; 窗口已关闭或已请求退出时返回 `Quit`
    pub fn present(&self, frame: &RgbImage) -> Control {
        if self.quit_requested() {
            return Control::Quit;
        }
        match self.tx.send(PreviewFrame::from_rgb(frame)) {
            Ok(()) => Control::Continue,
            Err(_) => Control::Quit,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}

/// 主线程一侧
pub struct PreviewWindow {
    title: String,
    mode: WaitMode,
    rx: Receiver<PreviewFrame>,
    quit: Arc<AtomicBool>,
}

/// 创建一对预览通道端点
pub fn preview(title: &str, mode: WaitMode) -> (PreviewHandle, PreviewWindow) {
    let (tx, rx) = bounded(2);
    let quit = Arc::new(AtomicBool::new(false));
    (
        PreviewHandle {
            tx,
            quit: Arc::clone(&quit),
        },
        PreviewWindow {
            title: title.to_string(),
            mode,
            rx,
            quit,
        },
    )
}

impl PreviewWindow {
    /// 阻塞运行窗口事件循环, 直到关闭
    pub fn run(self) {
        let conf = Conf {
            window_title: self.title.clone(),
            window_width: 640,
            window_height: 480,
            window_resizable: true,
            ..Default::default()
        };
        let (rx, quit, mode) = (self.rx, self.quit, self.mode);
        macroquad::Window::from_config(conf, async move {
            event_loop(rx, quit, mode).await;
        });
    }
}

async fn event_loop(rx: Receiver<PreviewFrame>, quit: Arc<AtomicBool>, mode: WaitMode) {
    prevent_quit();
    let mut texture: Option<Texture2D> = None;
    let mut received = false;
    let mut finished = false;

    loop {
        // 只保留最新一帧
        let mut latest = None;
        loop {
            match rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }

        if let Some(frame) = latest {
            received = true;
            let same_size = texture.as_ref().is_some_and(|t| {
                t.width() == frame.width as f32 && t.height() == frame.height as f32
            });
            if same_size {
                if let Some(tex) = &texture {
                    tex.update(&Image {
                        bytes: frame.rgba,
                        width: frame.width as u16,
                        height: frame.height as u16,
                    });
                }
            } else {
                let tex = Texture2D::from_rgba8(frame.width as u16, frame.height as u16, &frame.rgba);
                tex.set_filter(FilterMode::Linear);
                texture = Some(tex);
            }
        }

        if is_key_pressed(KeyCode::Q) || is_quit_requested() {
            info!("👋 收到退出信号");
            quit.store(true, Ordering::Relaxed);
            break;
        }
        if finished {
            match mode {
                WaitMode::UntilQuitKey => break,
                WaitMode::UntilAnyKey if !received || get_last_key_pressed().is_some() => break,
                WaitMode::UntilAnyKey => {}
            }
        }

        clear_background(BLACK);
        if let Some(tex) = &texture {
            draw_texture_ex(
                tex,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
        }
        next_frame().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_is_expanded_to_opaque_rgba() {
        let img = RgbImage::from_pixel(2, 1, image::Rgb([1, 2, 3]));
        let f = PreviewFrame::from_rgb(&img);
        assert_eq!((f.width, f.height), (2, 1));
        assert_eq!(f.rgba, vec![1, 2, 3, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn present_reports_quit_once_window_is_gone() {
        let (handle, window) = preview("test", WaitMode::UntilQuitKey);
        let img = RgbImage::new(2, 2);
        assert_eq!(handle.present(&img), Control::Continue);
        drop(window);
        assert_eq!(handle.present(&img), Control::Quit);
    }

    #[test]
    fn quit_flag_stops_before_sending() {
        let (handle, window) = preview("test", WaitMode::UntilQuitKey);
        window.quit.store(true, Ordering::Relaxed);
        assert_eq!(handle.present(&RgbImage::new(1, 1)), Control::Quit);
        assert!(window.rx.is_empty());
    }
}
