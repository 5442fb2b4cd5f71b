/// 视线追踪 (Gaze Tracking)
///
/// - GazeEstimator: 视线估计接口, 每帧刷新一次
/// - LandmarkGaze: 68 点人脸关键点模型 + 暗瞳孔定位
/// - NoGaze: 未配置关键点模型时使用, 始终返回 `Unknown`
///
/// 视线叠加层只用于显示, 估计失败不会中断检测会话
pub mod landmark;
pub mod pupil;

pub use landmark::LandmarkGaze;

use std::fmt;

use anyhow::Result;
use image::RgbImage;

/// 闭眼判定阈值 (眼宽/眼高)
pub const BLINK_THRESHOLD: f32 = 3.8;
/// 水平比例 <= 该值判定为向右看
pub const RIGHT_THRESHOLD: f32 = 0.35;
/// 水平比例 >= 该值判定为向左看
pub const LEFT_THRESHOLD: f32 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GazeDirection {
    Blinking,
    Right,
    Left,
    Center,
    #[default]
    Unknown,
}

impl GazeDirection {
    /// 闭眼优先, 其次右/左, 最后居中
    ///
    /// `horizontal`: 瞳孔 x / 眼宽 (0 = 最右, 1 = 最左, 画面未镜像)
    /// `blink`: 眼宽 / 眼高
    pub fn classify(horizontal: Option<f32>, blink: Option<f32>) -> Self {
        if blink.is_some_and(|b| b > BLINK_THRESHOLD) {
            return Self::Blinking;
        }
        match horizontal {
            Some(h) if h <= RIGHT_THRESHOLD => Self::Right,
            Some(h) if h >= LEFT_THRESHOLD => Self::Left,
            Some(_) => Self::Center,
            None => Self::Unknown,
        }
    }

    /// 叠加层显示文字; `Unknown` 为空字符串
    pub fn text(&self) -> &'static str {
        match self {
            Self::Blinking => "Blinking",
            Self::Right => "Looking right",
            Self::Left => "Looking left",
            Self::Center => "Looking center",
            Self::Unknown => "",
        }
    }
}

/// 单帧视线估计结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GazeReading {
    pub direction: GazeDirection,
    /// 左/右瞳孔在原图中的像素坐标
    pub left_pupil: Option<(i32, i32)>,
    pub right_pupil: Option<(i32, i32)>,
}

impl GazeReading {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &'static str {
        self.direction.text()
    }

    pub fn left_pupil_text(&self) -> String {
        PupilText(self.left_pupil).to_string()
    }

    pub fn right_pupil_text(&self) -> String {
        PupilText(self.right_pupil).to_string()
    }
}

struct PupilText(Option<(i32, i32)>);

impl fmt::Display for PupilText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some((x, y)) => write!(f, "({}, {})", x, y),
            None => write!(f, "None"),
        }
    }
}

pub trait GazeEstimator {
    fn refresh(&mut self, frame: &RgbImage) -> Result<GazeReading>;
}

impl<G: GazeEstimator + ?Sized> GazeEstimator for Box<G> {
    fn refresh(&mut self, frame: &RgbImage) -> Result<GazeReading> {
        (**self).refresh(frame)
    }
}

/// 空实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGaze;

impl GazeEstimator for NoGaze {
    fn refresh(&mut self, _frame: &RgbImage) -> Result<GazeReading> {
        Ok(GazeReading::unknown())
    }
}
