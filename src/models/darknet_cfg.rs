//! Darknet `.cfg` 解析
//!
//! 只读取推理需要的字段: `[net]` 段的 `width`/`height`/`channels`,
//! 以及 `[yolo]` 段的 `classes`

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\s*([A-Za-z0-9_]+)\s*\]$").unwrap());
static KEY_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)\s*=\s*(.*?)\s*$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DarknetCfg {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u32>,
    pub classes: Option<usize>,
    /// `[yolo]` 输出层数量 (YOLOv3 为 3)
    pub yolo_layers: usize,
}

impl DarknetCfg {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取 Darknet 配置文件: {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut cfg = DarknetCfg::default();
        let mut section = String::new();

        for line in text.lines() {
            // '#' 与 ';' 开头为注释
            let line = line.split(['#', ';']).next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = SECTION_RE.captures(line) {
                section = caps[1].to_ascii_lowercase();
                if section == "yolo" {
                    cfg.yolo_layers += 1;
                }
                continue;
            }

            let Some(caps) = KEY_VALUE_RE.captures(line) else {
                continue;
            };
            let (key, value) = (&caps[1], &caps[2]);
            match (section.as_str(), key) {
                ("net" | "network", "width") => cfg.width = value.parse().ok(),
                ("net" | "network", "height") => cfg.height = value.parse().ok(),
                ("net" | "network", "channels") => cfg.channels = value.parse().ok(),
                ("yolo" | "region", "classes") => {
                    if cfg.classes.is_none() {
                        cfg.classes = value.parse().ok();
                    }
                }
                _ => {}
            }
        }
        cfg
    }
}
