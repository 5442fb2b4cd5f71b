//! 检测日志 (CSV)
//!
//! 每帧每个检测对象一行, 跳过帧记录的是沿用的上一次检测结果

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// 表头; 没有任何检测时日志也只含这一行
pub const LOG_HEADER: [&str; 5] = ["Object", "Accuracy", "Frame No", "Yolo_Time", "FPS"];

/// CSV 行, 字段顺序与 `LOG_HEADER` 一致
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionLogRecord {
    #[serde(rename = "Object")]
    pub object: String,
    #[serde(rename = "Accuracy")]
    pub accuracy: f32,
    #[serde(rename = "Frame No")]
    pub frame: u64,
    #[serde(rename = "Yolo_Time")]
    pub yolo_time: f64,
    #[serde(rename = "FPS")]
    pub fps: f64,
}

pub struct DetectionLog<W: Write = File> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl DetectionLog<File> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("无法创建检测日志: {}", path.display()))?;
        Self::from_writer(file)
    }
}

impl<W: Write> DetectionLog<W> {
    /// 创建时立即写出表头
    pub fn from_writer(w: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(w);
        writer.write_record(LOG_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn record(&mut self, record: &DetectionLogRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 刷新并关闭, 返回写入的行数
    pub fn finish(self) -> Result<usize> {
        let rows = self.rows;
        let mut w = self.writer;
        w.flush()?;
        Ok(rows)
    }

    /// 取回底层 writer (测试用)
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("刷新检测日志失败: {}", e.error()))
    }
}
