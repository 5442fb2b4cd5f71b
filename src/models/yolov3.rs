// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv3 (Darknet) 模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Result};
use image::RgbImage;
use log::{info, warn};
use ndarray::{Array, IxDyn};

use super::{image_to_nchw, load_labels, DarknetCfg, Model};
use crate::detection::{Detector, DetectorError};
use crate::{non_max_suppression, Args, Bbox, DetectionResult, OrtBackend, OrtConfig};

/// Darknet 默认输入尺寸
const DEFAULT_INPUT_SIZE: u32 = 416;

pub struct YOLOv3 {
    engine: OrtBackend,
    nc: usize,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    labels: Vec<String>,
    profile: bool,
}

impl YOLOv3 {
    pub fn new(config: &Args) -> Result<Self> {
        let labels = load_labels(&config.labels)?;

        // .cfg 缺失时只告警, 回退到模型自身的输入尺寸与标签数量
        let cfg = match DarknetCfg::load(&config.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("⚠️ {e:#}, 使用模型默认参数");
                DarknetCfg::default()
            }
        };

        let engine = OrtBackend::build(OrtConfig {
            f: config.weights.clone(),
            ep: config.execution_provider(),
            trt_fp16: config.fp16,
        })?;

        let width = engine.width().or(cfg.width).unwrap_or(DEFAULT_INPUT_SIZE);
        let height = engine.height().or(cfg.height).unwrap_or(DEFAULT_INPUT_SIZE);
        let nc = cfg.classes.unwrap_or(labels.len());
        if nc != labels.len() {
            warn!(
                "⚠️ 类别数 ({}) 与标签数 ({}) 不一致, 超出部分显示为类别编号",
                nc,
                labels.len()
            );
        }

        let model = Self {
            engine,
            nc,
            height,
            width,
            conf: config.confidence,
            iou: config.threshold,
            labels,
            profile: config.show_time,
        };
        model.summary();
        Ok(model)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Model for YOLOv3 {
    fn preprocess(&mut self, images: &[RgbImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        images
            .iter()
            .map(|img| image_to_nchw(img, self.width, self.height))
            .collect()
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        // 每张图片单独推理, 所有输出按顺序拼接
        let mut ys = Vec::new();
        for x in xs {
            ys.push(self.engine.run(x, profile || self.profile)?);
        }
        Ok(ys.into_iter().flatten().collect())
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[RgbImage],
    ) -> Result<Vec<DetectionResult>> {
        let stride = self.nc + 5;
        let per_image = self.engine.output_names().len().max(1);
        if xs.len() != per_image * xs0.len() {
            bail!(
                "输出数量不匹配: 期望 {} 个, 实际 {} 个",
                per_image * xs0.len(),
                xs.len()
            );
        }

        let mut results = Vec::with_capacity(xs0.len());
        for (outputs, img) in xs.chunks(per_image).zip(xs0) {
            let (w0, h0) = (img.width() as f32, img.height() as f32);
            let mut bboxes = Vec::new();
            for y in outputs {
                match y.shape().last() {
                    Some(&d) if d == stride => {}
                    _ => bail!(
                        "输出形状 {:?} 与类别数不符, 每行应为 {} 个值",
                        y.shape(),
                        stride
                    ),
                }
                let data: Vec<f32> = y.iter().copied().collect();
                bboxes.extend(decode_darknet_rows(&data, self.nc, self.conf, (w0, h0)));
            }
            non_max_suppression(&mut bboxes, self.iou);
            results.push(DetectionResult::new(bboxes));
        }
        Ok(results)
    }

    fn summary(&self) {
        info!(
            "✅ YOLOv3 已加载: 输入 {}x{}, 类别 {}, 输出层 {}, 后端 {:?}, conf={}, nms={}",
            self.width,
            self.height,
            self.nc,
            self.engine.output_names().len(),
            self.engine.ep(),
            self.conf,
            self.iou
        );
    }
}

impl Detector for YOLOv3 {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DetectorError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let t = std::time::Instant::now();
        let frames = std::slice::from_ref(frame);
        let xs = self
            .preprocess(frames)
            .map_err(|e| DetectorError::Preprocess(format!("{e:#}")))?;
        let ys = self
            .run(xs, false)
            .map_err(|e| DetectorError::Inference(format!("{e:#}")))?;
        let result = self
            .postprocess(ys, frames)
            .map_err(|e| DetectorError::Postprocess(format!("{e:#}")))?
            .pop()
            .unwrap_or_default();

        if self.profile {
            info!("[INFO] YOLOv3 took {:.6} seconds", t.elapsed().as_secs_f64());
        }
        Ok(result)
    }
}

/// 解码 Darknet 输出行: `[cx, cy, w, h, obj, score_0 .. score_{nc-1}]`, 坐标为 0~1 归一化值
///
/// 置信度取最高类别分数; 低于 `conf` 的行被丢弃; 坐标按原图尺寸 `(w0, h0)` 还原.
/// 不足一行的尾部数据被忽略
pub fn decode_darknet_rows(data: &[f32], nc: usize, conf: f32, (w0, h0): (f32, f32)) -> Vec<Bbox> {
    let stride = nc + 5;
    let mut ys = Vec::new();
    for row in data.chunks_exact(stride) {
        let scores = &row[5..];
        let (id, &confidence) = match scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            Some(best) => best,
            None => continue,
        };
        // NaN 分数不通过阈值
        if !(confidence > conf) {
            continue;
        }

        let (cx, cy, w, h) = (row[0] * w0, row[1] * h0, row[2] * w0, row[3] * h0);
        // OpenCV 取整到整数像素
        let (x, y) = ((cx - w / 2.).trunc(), (cy - h / 2.).trunc());
        ys.push(Bbox::new(x, y, w.trunc(), h.trunc(), id, confidence));
    }
    ys
}
