// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// 推理执行后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    pub trt_fp16: bool,
}

/// ONNX Runtime 会话封装
///
/// 只处理单输入 NCHW 模型; 输入尺寸为动态维度时 `height()`/`width()` 返回 `None`,
/// 由调用方决定实际尺寸
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    input_shape: Vec<i64>,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn build(args: OrtConfig) -> Result<Self> {
        if !args.f.is_file() {
            bail!("模型文件不存在: {}", args.f.display());
        }

        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        let builder = match args.ep {
            OrtEP::Trt(device_id) => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .with_fp16(args.trt_fp16)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::CUDA(device_id) => builder.with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::CPU => builder,
        };
        let session = builder
            .commit_from_file(&args.f)
            .with_context(|| format!("加载模型失败: {}", args.f.display()))?;

        let input = session
            .inputs
            .first()
            .context("模型没有输入节点")?;
        let input_name = input.name.clone();
        let input_shape = input
            .input_type
            .tensor_dimensions()
            .cloned()
            .context("模型输入不是张量")?;
        if input_shape.len() != 4 {
            bail!("模型输入应为 NCHW 四维张量, 实际: {:?}", input_shape);
        }
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            session,
            ep: args.ep,
            input_name,
            input_shape,
            output_names,
        })
    }

    /// 执行前向推理, 按输出节点顺序返回所有输出张量
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();
        let ys = self
            .session
            .run(ort::inputs![self.input_name.as_str() => xs.view()]?)?;
        if profile {
            log::info!("[ORT {:?}]: {:?}", self.ep, t.elapsed());
        }

        let mut outputs = Vec::with_capacity(self.output_names.len());
        for (_name, value) in ys.iter() {
            let y = value.try_extract_tensor::<f32>()?.view().to_owned();
            outputs.push(y);
        }
        Ok(outputs)
    }

    fn dim(&self, index: usize) -> Option<u32> {
        match self.input_shape.get(index) {
            Some(&d) if d > 0 => Some(d as u32),
            _ => None,
        }
    }

    pub fn height(&self) -> Option<u32> {
        self.dim(2)
    }

    pub fn width(&self) -> Option<u32> {
        self.dim(3)
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
