//! 基于人脸关键点的视线估计
//!
//! 关键点模型: 输入整帧 (拉伸到模型尺寸, NCHW 0~1), 输出 68 个点的归一化坐标 (136 个值)

use std::path::Path;

use anyhow::{bail, Result};
use image::RgbImage;
use log::info;

use super::pupil::{blink_ratio, locate_pupil, EyeBox};
use super::{GazeDirection, GazeEstimator, GazeReading};
use crate::models::image_to_nchw;
use crate::{OrtBackend, OrtConfig, OrtEP};

pub const NUM_LANDMARKS: usize = 68;
/// 动态输入尺寸时的默认边长
const DEFAULT_INPUT_SIZE: u32 = 112;

const LEFT_EYE: std::ops::Range<usize> = 36..42;
const RIGHT_EYE: std::ops::Range<usize> = 42..48;

pub struct LandmarkGaze {
    engine: OrtBackend,
    width: u32,
    height: u32,
}

impl LandmarkGaze {
    pub fn new(model: &Path, ep: OrtEP) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: model.to_path_buf(),
            ep,
            trt_fp16: false,
        })?;
        let width = engine.width().unwrap_or(DEFAULT_INPUT_SIZE);
        let height = engine.height().unwrap_or(DEFAULT_INPUT_SIZE);
        info!(
            "✅ 人脸关键点模型已加载: {} ({}x{})",
            model.display(),
            width,
            height
        );
        Ok(Self {
            engine,
            width,
            height,
        })
    }

    fn landmarks(&mut self, frame: &RgbImage) -> Result<Vec<(f32, f32)>> {
        let x = image_to_nchw(frame, self.width, self.height)?;
        let ys = self.engine.run(x, false)?;
        let Some(y) = ys.first() else {
            bail!("关键点模型没有输出");
        };
        let values: Vec<f32> = y.iter().copied().collect();
        if values.len() < NUM_LANDMARKS * 2 {
            bail!(
                "关键点输出长度 {} 小于 {}",
                values.len(),
                NUM_LANDMARKS * 2
            );
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        Ok(values[..NUM_LANDMARKS * 2]
            .chunks_exact(2)
            .map(|p| (p[0] * w, p[1] * h))
            .collect())
    }
}

impl GazeEstimator for LandmarkGaze {
    fn refresh(&mut self, frame: &RgbImage) -> Result<GazeReading> {
        let points = self.landmarks(frame)?;
        Ok(read_gaze(frame, &points))
    }
}

struct EyeReading {
    pupil: (i32, i32),
    horizontal: f32,
    blink: Option<f32>,
}

fn read_eye(frame: &RgbImage, contour: &[(f32, f32)]) -> Option<EyeReading> {
    let contour: &[(f32, f32); 6] = contour.try_into().ok()?;
    let eye = EyeBox::from_points(contour, frame.dimensions())?;
    let (px, py) = locate_pupil(frame, &eye)?;
    Some(EyeReading {
        pupil: ((eye.x as f32 + px).round() as i32, (eye.y as f32 + py).round() as i32),
        horizontal: px / eye.width as f32,
        blink: blink_ratio(contour),
    })
}

fn mean(xs: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, n) = xs.fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    (n > 0).then(|| sum / n as f32)
}

/// 由 68 点关键点 (原图像素坐标) 计算视线读数; 关键点不足时返回 `Unknown`
pub fn read_gaze(frame: &RgbImage, landmarks: &[(f32, f32)]) -> GazeReading {
    if landmarks.len() < NUM_LANDMARKS {
        return GazeReading::unknown();
    }
    let left = read_eye(frame, &landmarks[LEFT_EYE]);
    let right = read_eye(frame, &landmarks[RIGHT_EYE]);
    let eyes = || left.iter().chain(right.iter());

    let horizontal = mean(eyes().map(|e| e.horizontal));
    let blink = mean(eyes().filter_map(|e| e.blink));

    GazeReading {
        direction: GazeDirection::classify(horizontal, blink),
        left_pupil: left.as_ref().map(|e| e.pupil),
        right_pupil: right.as_ref().map(|e| e.pupil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 在 (ox, oy) 处放一只 20x8 的眼睛, 瞳孔中心在 `pupil_dx`
    fn eye(ox: f32, oy: f32) -> [(f32, f32); 6] {
        [
            (ox, oy + 4.),
            (ox + 7., oy),
            (ox + 13., oy),
            (ox + 20., oy + 4.),
            (ox + 13., oy + 8.),
            (ox + 7., oy + 8.),
        ]
    }

    fn face(pupil_dx: u32) -> (RgbImage, Vec<(f32, f32)>) {
        let mut img = RgbImage::from_pixel(100, 60, Rgb([230, 230, 230]));
        for (ox, oy) in [(10u32, 20u32), (60, 20)] {
            for y in oy + 3..oy + 6 {
                for x in ox + pupil_dx - 1..ox + pupil_dx + 2 {
                    img.put_pixel(x, y, Rgb([5, 5, 5]));
                }
            }
        }
        let mut pts = vec![(0.0, 0.0); NUM_LANDMARKS];
        pts[LEFT_EYE].copy_from_slice(&eye(10., 20.));
        pts[RIGHT_EYE].copy_from_slice(&eye(60., 20.));
        (img, pts)
    }

    #[test]
    fn centered_pupils_look_center() {
        let (img, pts) = face(10);
        let r = read_gaze(&img, &pts);
        assert_eq!(r.direction, GazeDirection::Center);
        assert_eq!(r.left_pupil, Some((20, 24)));
        assert_eq!(r.right_pupil, Some((70, 24)));
    }

    #[test]
    fn pupils_near_outer_corner_look_right() {
        let (img, pts) = face(3);
        assert_eq!(read_gaze(&img, &pts).direction, GazeDirection::Right);
    }

    #[test]
    fn pupils_near_inner_corner_look_left() {
        let (img, pts) = face(17);
        assert_eq!(read_gaze(&img, &pts).direction, GazeDirection::Left);
    }

    #[test]
    fn too_few_landmarks_is_unknown() {
        let img = RgbImage::new(10, 10);
        assert_eq!(read_gaze(&img, &[(1., 1.); 10]), GazeReading::unknown());
    }
}
