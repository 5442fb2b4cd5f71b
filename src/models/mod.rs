/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **YOLOv3**: Darknet 网络 (导出为 ONNX) 的完整实现
///   - 模型加载 (new): 读取 `.cfg` 得到输入尺寸/类别数
///   - 预处理 (preprocess): 拉伸缩放 + 归一化
///   - 推理 (run)
///   - 后处理 (postprocess): Darknet 输出行解码 + NMS
///   - 文件: `yolov3.rs`
///
/// ## Model Trait
/// 统一的模型接口，定义标准流程: preprocess → run → postprocess
///
/// ## 使用示例
/// ```ignore
/// use yolov3_gaze::models::{Model, YOLOv3};
/// use yolov3_gaze::Args;
///
/// let mut model = YOLOv3::new(&args)?;
/// let ys = model.run(model.preprocess(&images)?, false)?;
/// let results = model.postprocess(ys, &images)?;
/// ```
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::DetectionResult;

pub mod darknet_cfg;
pub mod download;
pub mod yolov3;

pub use darknet_cfg::DarknetCfg;
pub use download::download_model;
pub use yolov3::{decode_darknet_rows, YOLOv3};

/// 统一的深度学习模型接口
///
/// ## 核心流程
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测结果
/// ```
pub trait Model {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[RgbImage]) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 推理: 执行模型前向传播, 返回原始输出(未解码)
    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测结果 (`xs0` 用于坐标还原)
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[RgbImage],
    ) -> Result<Vec<DetectionResult>>;

    /// 打印模型信息
    fn summary(&self);
}

/// 读取标签文件: 每行一个类别名, 忽略首尾空白
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("无法读取标签文件: {}", path.display()))?;
    let labels = parse_labels(&text);
    if labels.is_empty() {
        bail!("标签文件为空: {}", path.display());
    }
    Ok(labels)
}

pub fn parse_labels(text: &str) -> Vec<String> {
    text.trim()
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// 拉伸缩放到 `width x height` 并转换为 NCHW f32 (0~1), 对应 OpenCV `blobFromImage(1/255, swapRB)`
pub fn image_to_nchw(img: &RgbImage, width: u32, height: u32) -> Result<Array<f32, IxDyn>> {
    if img.width() == 0 || img.height() == 0 {
        bail!("空图像 {}x{}", img.width(), img.height());
    }

    let src_image = fr::images::Image::from_vec_u8(
        img.width(),
        img.height(),
        img.as_raw().clone(),
        fr::PixelType::U8x3,
    )?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    let (w, h) = (width as usize, height as usize);
    let mut ys = Array::zeros((1, 3, h, w)).into_dyn();
    for (i, px) in dst_image.buffer().chunks_exact(3).enumerate() {
        let (y, x) = (i / w, i % w);
        ys[[0, 0, y, x]] = px[0] as f32 / 255.0;
        ys[[0, 1, y, x]] = px[1] as f32 / 255.0;
        ys[[0, 2, y, x]] = px[2] as f32 / 255.0;
    }
    Ok(ys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_labels_strips_trailing_newline_and_blank_lines() {
        let labels = parse_labels("person\nbicycle\n\ncar\n");
        assert_eq!(labels, vec!["person", "bicycle", "car"]);
    }

    #[test]
    fn load_labels_reports_missing_file() {
        let err = load_labels(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("标签文件"));
    }

    #[test]
    fn image_to_nchw_normalizes_and_keeps_channel_order() {
        let img = RgbImage::from_pixel(8, 4, image::Rgb([255, 0, 51]));
        let x = image_to_nchw(&img, 4, 2).unwrap();
        assert_eq!(x.shape(), &[1, 3, 2, 4]);
        assert!((x[[0, 0, 1, 3]] - 1.0).abs() < 1e-2);
        assert!(x[[0, 1, 0, 0]].abs() < 1e-2);
        assert!((x[[0, 2, 0, 2]] - 0.2).abs() < 1e-2);
    }
}
