//! 叠加层与检测节流配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::DEFAULT_DETECT_INTERVAL;
use crate::output::DEFAULT_OUTPUT_FPS;

/// 叠加层/节流参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    // === 检测节流 ===
    pub detect_interval: usize, // 每 K 帧检测一次

    // === 视频写出 ===
    pub output_fps: u32, // MJPEG 输出帧率

    // === 检测框 ===
    pub box_thickness: u32, // 边框线宽(像素)
    pub label_scale: f32,   // 类别文字高度(像素)
    pub palette_seed: Option<u64>, // 类别颜色随机种子, None 为每次随机

    // === 摄像头信息叠加 ===
    pub info_scale: f32,              // 视线/瞳孔/性能文字高度
    pub fps_scale: f32,               // FPS 文字高度
    pub gaze_text_pos: (i32, i32),    // 视线方向
    pub left_pupil_pos: (i32, i32),   // 左瞳孔坐标
    pub right_pupil_pos: (i32, i32),  // 右瞳孔坐标
    pub fps_pos: (i32, i32),          // FPS
    pub performance_pos: (i32, i32),  // 运行时长
    pub info_color: [u8; 3],          // 信息文字颜色 (RGB)
    pub fps_color: [u8; 3],           // FPS 文字颜色 (RGB)
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            detect_interval: DEFAULT_DETECT_INTERVAL,

            output_fps: DEFAULT_OUTPUT_FPS,

            box_thickness: 2,
            label_scale: 16.0,
            palette_seed: None,

            info_scale: 14.0,
            fps_scale: 48.0,
            gaze_text_pos: (5, 450),
            left_pupil_pos: (5, 470),
            right_pupil_pos: (255, 470),
            fps_pos: (20, 75),
            performance_pos: (455, 470),
            info_color: [31, 58, 147],
            fps_color: [0, 255, 100],
        }
    }
}

impl UiConfig {
    /// 从JSON文件加载配置; 文件不存在时写出默认配置, 解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 命令行优先
    pub fn with_detect_interval(mut self, interval: Option<usize>) -> Self {
        if let Some(k) = interval {
            self.detect_interval = k;
        }
        self
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前叠加层配置:");
        info!("  检测间隔: 每 {} 帧", self.detect_interval);
        info!("  输出帧率: {} fps", self.output_fps);
        info!("  边框线宽: {}px", self.box_thickness);
        match self.palette_seed {
            Some(seed) => info!("  颜色种子: {}", seed),
            None => info!("  颜色种子: 随机"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_config.json");
        let cfg = UiConfig::load(&path);
        assert_eq!(cfg, UiConfig::default());
        assert!(path.exists());
        assert_eq!(UiConfig::load(&path), cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_config.json");
        fs::write(&path, r#"{ "detect_interval": 3, "palette_seed": 7 }"#).unwrap();
        let cfg = UiConfig::load(&path);
        assert_eq!(cfg.detect_interval, 3);
        assert_eq!(cfg.palette_seed, Some(7));
        assert_eq!(cfg.fps_pos, (20, 75));
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(UiConfig::load(&path), UiConfig::default());
    }

    #[test]
    fn cli_interval_overrides_file() {
        let cfg = UiConfig::default().with_detect_interval(Some(2));
        assert_eq!(cfg.detect_interval, 2);
        let cfg = UiConfig::default().with_detect_interval(None);
        assert_eq!(cfg.detect_interval, DEFAULT_DETECT_INTERVAL);
    }
}
