//! 帧叠加绘制: 检测框 + 类别文字, 视线/瞳孔/FPS/运行时长信息
//!
//! 文字坐标沿用基线左端的约定 (与 OpenCV putText 一致), 绘制时换算为左上角

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::gaze::GazeReading;
use crate::ui_config::UiConfig;
use crate::DetectionResult;

/// 瞳孔十字标记颜色
const PUPIL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PUPIL_ARM: f32 = 5.0;

/// 检测框文字: `label: 0.8765`
pub fn box_text(label: &str, confidence: f32) -> String {
    format!("{}: {:.4}", label, confidence)
}

/// 每个类别一个随机颜色
pub fn random_palette(n: usize, seed: Option<u64>) -> Vec<Rgb<u8>> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    (0..n).map(|_| Rgb([rng.gen(), rng.gen(), rng.gen()])).collect()
}

pub struct Overlay {
    font: Option<FontVec>,
    labels: Vec<String>,
    palette: Vec<Rgb<u8>>,
    cfg: UiConfig,
}

impl Overlay {
    /// 字体加载失败时只绘制边框 (告警一次)
    pub fn new(labels: Vec<String>, font_path: &Path, cfg: &UiConfig) -> Self {
        let font = match std::fs::read(font_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()))
        {
            Ok(font) => {
                info!("✅ 字体已加载: {}", font_path.display());
                Some(font)
            }
            Err(e) => {
                warn!(
                    "⚠️ 无法加载字体 {} ({}), 只绘制检测框",
                    font_path.display(),
                    e
                );
                None
            }
        };
        Self::with_font(labels, font, cfg)
    }

    pub fn with_font(labels: Vec<String>, font: Option<FontVec>, cfg: &UiConfig) -> Self {
        let palette = random_palette(labels.len().max(1), cfg.palette_seed);
        Self {
            font,
            labels,
            palette,
            cfg: cfg.clone(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn label(&self, id: usize) -> String {
        self.labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn color(&self, id: usize) -> Rgb<u8> {
        self.palette[id % self.palette.len()]
    }

    fn text(&self, img: &mut RgbImage, (x, y): (i32, i32), scale: f32, color: Rgb<u8>, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(font) = &self.font {
            draw_text_mut(img, color, x, y - scale as i32, PxScale::from(scale), font, text);
        }
    }

    pub fn draw_detections(&self, img: &mut RgbImage, result: &DetectionResult) {
        for bbox in result.iter() {
            let color = self.color(bbox.id());
            let (x, y) = (bbox.xmin().round() as i32, bbox.ymin().round() as i32);
            let (w, h) = (bbox.width().round() as i32, bbox.height().round() as i32);

            for t in 0..self.cfg.box_thickness as i32 {
                let (rw, rh) = (w - 2 * t, h - 2 * t);
                if rw <= 0 || rh <= 0 {
                    break;
                }
                draw_hollow_rect_mut(img, Rect::at(x + t, y + t).of_size(rw as u32, rh as u32), color);
            }

            let text = box_text(&self.label(bbox.id()), bbox.confidence());
            self.text(img, (x, y - 5), self.cfg.label_scale, color, &text);
        }
    }

    pub fn draw_gaze(&self, img: &mut RgbImage, reading: &GazeReading) {
        for (x, y) in [reading.left_pupil, reading.right_pupil].into_iter().flatten() {
            let (x, y) = (x as f32, y as f32);
            draw_line_segment_mut(img, (x - PUPIL_ARM, y), (x + PUPIL_ARM, y), PUPIL_COLOR);
            draw_line_segment_mut(img, (x, y - PUPIL_ARM), (x, y + PUPIL_ARM), PUPIL_COLOR);
        }

        let color = Rgb(self.cfg.info_color);
        let scale = self.cfg.info_scale;
        self.text(img, self.cfg.gaze_text_pos, scale, color, reading.text());
        self.text(
            img,
            self.cfg.left_pupil_pos,
            scale,
            color,
            &format!("Left pupil:  {}", reading.left_pupil_text()),
        );
        self.text(
            img,
            self.cfg.right_pupil_pos,
            scale,
            color,
            &format!("Right pupil: {}", reading.right_pupil_text()),
        );
    }

    pub fn draw_fps(&self, img: &mut RgbImage, fps: f64) {
        self.text(
            img,
            self.cfg.fps_pos,
            self.cfg.fps_scale,
            Rgb(self.cfg.fps_color),
            &format!("{:.2}", fps),
        );
    }

    pub fn draw_performance(&self, img: &mut RgbImage, elapsed_secs: f64) {
        self.text(
            img,
            self.cfg.performance_pos,
            self.cfg.info_scale,
            Rgb(self.cfg.info_color),
            &format!("Performance: {:.2}", elapsed_secs),
        );
    }
}
