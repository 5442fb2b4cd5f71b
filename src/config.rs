//! 命令行参数

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::OrtEP;

/// YOLOv3 图片/视频/摄像头检测 + 视线追踪
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "YOLOv3 图片/视频/摄像头检测 + 视线追踪", long_about = None)]
pub struct Args {
    /// 模型权重与配置文件所在目录 (--download-model 时作为下载目录)
    #[arg(short = 'm', long, default_value = "./yolov3-coco/")]
    pub model_path: PathBuf,

    /// YOLOv3 权重 (由 Darknet .cfg/.weights 导出的 ONNX)
    #[arg(short = 'w', long, default_value = "./yolov3-coco/yolov3.onnx")]
    pub weights: PathBuf,

    /// Darknet 网络配置文件 (读取输入尺寸与类别数)
    #[arg(long = "config", visible_alias = "cfg", default_value = "./yolov3-coco/yolov3.cfg")]
    pub config: PathBuf,

    /// 图片路径
    #[arg(short = 'i', long)]
    pub image_path: Option<PathBuf>,

    /// 视频路径
    #[arg(short = 'v', long)]
    pub video_path: Option<PathBuf>,

    /// 输出视频路径 (MJPEG)
    #[arg(long, visible_alias = "vo", default_value = "./output.avi")]
    pub video_output_path: PathBuf,

    /// 标签文件 (每行一个类别名)
    #[arg(short = 'l', long, default_value = "./yolov3-coco/coco-labels")]
    pub labels: PathBuf,

    /// 置信度阈值, 低于该值的检测框被丢弃
    #[arg(short = 'c', long, default_value_t = 0.5)]
    pub confidence: f32,

    /// NMS 的 IoU 阈值
    #[arg(long, visible_alias = "th", default_value_t = 0.3)]
    pub threshold: f32,

    /// 本地没有模型时先下载 (需要 --model-url)
    #[arg(long)]
    pub download_model: bool,

    /// 模型下载地址
    #[arg(long)]
    pub model_url: Option<String>,

    /// 打印每次推理耗时
    #[arg(short = 't', long)]
    pub show_time: bool,

    /// 检测间隔 K: 每 K 帧运行一次检测, 其余帧复用上一次结果 (默认读取 ui_config.json)
    #[arg(long)]
    pub detect_interval: Option<usize>,

    /// 视频模式也启用检测节流 (默认逐帧检测)
    #[arg(long)]
    pub throttle_video: bool,

    /// 摄像头设备索引
    #[arg(long, default_value_t = 0)]
    pub camera: usize,

    /// 人脸68关键点 ONNX 模型 (启用视线追踪叠加层)
    #[arg(long)]
    pub gaze_model: Option<PathBuf>,

    /// 摄像头模式的检测日志 (CSV)
    #[arg(long, default_value = "logs.csv")]
    pub log_path: PathBuf,

    /// 叠加文字字体
    #[arg(long, default_value = "assets/font/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// 叠加层/节流参数配置文件 (JSON)
    #[arg(long, default_value = "ui_config.json")]
    pub ui_config: PathBuf,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// TensorRT FP16
    #[arg(long)]
    pub fp16: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,
}

/// 输入模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Image(PathBuf),
    Video(PathBuf),
    Webcam(usize),
}

impl Args {
    /// 图片优先, 其次视频, 都没有则使用摄像头
    pub fn input_mode(&self) -> InputMode {
        if let Some(path) = &self.image_path {
            InputMode::Image(path.clone())
        } else if let Some(path) = &self.video_path {
            InputMode::Video(path.clone())
        } else {
            InputMode::Webcam(self.camera)
        }
    }

    pub fn execution_provider(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    /// 下载目标: `model_path` 目录下与 `weights` 同名的文件
    pub fn download_target(&self) -> PathBuf {
        match self.weights.file_name() {
            Some(name) => self.model_path.join(name),
            None => self.model_path.join("yolov3.onnx"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            bail!("--confidence 必须在 0~1 之间, 当前: {}", self.confidence);
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("--threshold 必须在 0~1 之间, 当前: {}", self.threshold);
        }
        if self.detect_interval == Some(0) {
            bail!("--detect-interval 必须 >= 1");
        }
        if self.download_model && self.model_url.is_none() {
            bail!("--download-model 需要同时指定 --model-url");
        }
        Ok(())
    }
}
