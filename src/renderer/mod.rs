/// 渲染系统
///
/// - Overlay: 在 `RgbImage` 上绘制检测框与信息文字 (imageproc + ab_glyph)
/// - PreviewWindow: macroquad 预览窗口, 主线程运行
pub mod overlay;
pub mod window;

pub use overlay::{box_text, random_palette, Overlay};
pub use window::{preview, PreviewFrame, PreviewHandle, PreviewWindow, WaitMode};
