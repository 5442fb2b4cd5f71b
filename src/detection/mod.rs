/// 检测系统 (Detection System)
///
/// - Detector:  目标检测器接口 (外部推理引擎的接缝)
/// - Throttle:  检测节流, 每 K 帧检测一次, 其余帧复用上一次结果
pub mod throttle;

pub use throttle::{DetectionThrottler, ThrottleOutcome, ThrottleState, DEFAULT_DETECT_INTERVAL};

use image::RgbImage;
use thiserror::Error;

use crate::DetectionResult;

/// 检测器错误 (需要检测的帧上失败时必须向上传递, 不能用旧结果顶替)
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("输入帧为空 ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("预处理失败: {0}")]
    Preprocess(String),
    #[error("推理失败: {0}")]
    Inference(String),
    #[error("后处理失败: {0}")]
    Postprocess(String),
}

/// 目标检测器: 对一帧图像做一次完整的前向推理
pub trait Detector {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
        (**self).detect(frame)
    }
}
