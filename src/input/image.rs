//! 单张图片输入

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use log::info;

use super::FrameSource;

/// 只产出一帧的输入源
pub struct StillImage {
    path: PathBuf,
    frame: Option<RgbImage>,
}

impl StillImage {
    /// 立即解码, 路径不可读时在处理前报错
    pub fn open(path: &Path) -> Result<Self> {
        let frame = image::open(path)
            .with_context(|| format!("无法读取图片: {}", path.display()))?
            .to_rgb8();
        info!(
            "🖼️ 图片已加载: {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );
        Ok(Self::from_image(path, frame))
    }

    pub fn from_image(path: &Path, frame: RgbImage) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: Some(frame),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frame.take())
    }
}
