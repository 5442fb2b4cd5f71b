//! 眼部几何与瞳孔定位
//!
//! 眼睛轮廓为 68 点人脸关键点中的 6 个点, 顺序: 外眼角, 上缘两点, 内眼角, 下缘两点

use image::RgbImage;

/// 瞳孔阈值: 最暗亮度 + 该值以内的像素视为瞳孔
const DARK_RANGE: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl EyeBox {
    /// 眼睛轮廓点的外接框, 裁剪到图像范围内; 面积为 0 时返回 None
    pub fn from_points(points: &[(f32, f32)], (w, h): (u32, u32)) -> Option<Self> {
        if points.is_empty() || w == 0 || h == 0 {
            return None;
        }
        let (mut x0, mut y0) = (f32::MAX, f32::MAX);
        let (mut x1, mut y1) = (f32::MIN, f32::MIN);
        for &(x, y) in points {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        let x0 = x0.floor().clamp(0., (w - 1) as f32) as u32;
        let y0 = y0.floor().clamp(0., (h - 1) as f32) as u32;
        let x1 = x1.ceil().clamp(0., w as f32) as u32;
        let y1 = y1.ceil().clamp(0., h as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

#[inline]
fn luma(px: &image::Rgb<u8>) -> u8 {
    (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) as u8
}

/// 瞳孔位置 (相对眼框左上角): 眼框内最暗像素附近区域的加权质心, 越暗权重越大
pub fn locate_pupil(frame: &RgbImage, eye: &EyeBox) -> Option<(f32, f32)> {
    if eye.x + eye.width > frame.width() || eye.y + eye.height > frame.height() {
        return None;
    }

    let mut min_val = u8::MAX;
    for dy in 0..eye.height {
        for dx in 0..eye.width {
            min_val = min_val.min(luma(frame.get_pixel(eye.x + dx, eye.y + dy)));
        }
    }
    let threshold = min_val.saturating_add(DARK_RANGE);

    let (mut sum_x, mut sum_y, mut total) = (0.0f32, 0.0f32, 0.0f32);
    for dy in 0..eye.height {
        for dx in 0..eye.width {
            let l = luma(frame.get_pixel(eye.x + dx, eye.y + dy));
            if l <= threshold {
                // +1 保证最暗阈值边界上的像素也参与
                let w = (threshold - l) as f32 + 1.0;
                sum_x += dx as f32 * w;
                sum_y += dy as f32 * w;
                total += w;
            }
        }
    }

    (total > 0.0).then(|| (sum_x / total, sum_y / total))
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn midpoint(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// 眼宽 / 眼高; 闭眼时眼高趋近 0, 比值变大
pub fn blink_ratio(points: &[(f32, f32); 6]) -> Option<f32> {
    let width = distance(points[0], points[3]);
    let top = midpoint(points[1], points[2]);
    let bottom = midpoint(points[5], points[4]);
    let height = distance(top, bottom);
    if height <= f32::EPSILON {
        return None;
    }
    Some(width / height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn eye_points() -> [(f32, f32); 6] {
        [
            (10., 20.),
            (14., 17.),
            (18., 17.),
            (22., 20.),
            (18., 23.),
            (14., 23.),
        ]
    }

    #[test]
    fn eye_box_covers_points_and_clamps() {
        let b = EyeBox::from_points(&eye_points(), (100, 100)).unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (10, 17, 12, 6));

        let b = EyeBox::from_points(&[(-5., -5.), (3., 3.)], (100, 100)).unwrap();
        assert_eq!((b.x, b.y), (0, 0));
        assert!(EyeBox::from_points(&[(5., 5.)], (100, 100)).is_none());
    }

    #[test]
    fn pupil_is_centroid_of_dark_blob() {
        let mut img = RgbImage::from_pixel(20, 10, Rgb([220, 220, 220]));
        for y in 4..7 {
            for x in 13..16 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let eye = EyeBox {
            x: 0,
            y: 0,
            width: 20,
            height: 10,
        };
        let (px, py) = locate_pupil(&img, &eye).unwrap();
        assert!((px - 14.0).abs() < 1e-3);
        assert!((py - 5.0).abs() < 1e-3);
    }

    #[test]
    fn pupil_outside_frame_is_none() {
        let img = RgbImage::new(10, 10);
        let eye = EyeBox {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        };
        assert!(locate_pupil(&img, &eye).is_none());
    }

    #[test]
    fn blink_ratio_grows_as_eye_closes() {
        let open = blink_ratio(&eye_points()).unwrap();
        assert!((open - 2.0).abs() < 1e-4);

        let mut closed = eye_points();
        closed[1].1 = 19.5;
        closed[2].1 = 19.5;
        closed[4].1 = 20.5;
        closed[5].1 = 20.5;
        assert!(blink_ratio(&closed).unwrap() > 3.8);

        let mut flat = eye_points();
        for p in flat.iter_mut() {
            p.1 = 20.;
        }
        assert!(blink_ratio(&flat).is_none());
    }
}
