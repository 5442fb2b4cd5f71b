#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行参数
pub mod detection; // 检测器接口与检测节流
pub mod gaze; // 视线追踪
pub mod input; // 帧输入系统 (图片/视频/摄像头)
pub mod models; // 模型接口与 YOLOv3 实现
pub mod output; // MJPEG 视频写出 + CSV 检测日志
pub mod pipeline; // 三种运行模式
pub mod renderer; // 叠加绘制 + 预览窗口
pub mod ui_config; // 叠加层/节流配置面板

pub mod ort_backend;

pub use crate::config::{Args, InputMode};
pub use crate::detection::{
    DetectionThrottler, Detector, DetectorError, ThrottleOutcome, ThrottleState,
};
pub use crate::models::{Model, YOLOv3};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

/// 类别无关的非极大值抑制 (与 OpenCV NMSBoxes 行为一致)
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 单帧检测结果: 一组检测框 (可以为空)
///
/// 由检测器一次性生成, 生成后不可变; 节流器通过 `Arc` 在跳过帧之间共享同一份结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    bboxes: Vec<Bbox>,
}

impl DetectionResult {
    pub fn new(bboxes: Vec<Bbox>) -> Self {
        Self { bboxes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bbox> {
        self.bboxes.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // 左上角 + 宽高, 原图像素坐标
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    /// 由中心点 + 宽高构造 (Darknet 输出格式)
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32, id: usize, confidence: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., w, h, id, confidence)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}
