//! 模型下载 (--download-model)

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

/// 下载模型到 `dest`; 先写入 `.part` 临时文件, 完成后再改名
pub fn download_model(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建模型目录: {}", parent.display()))?;
        }
    }

    info!("⬇️ 下载模型: {} → {}", url, dest.display());
    let t = std::time::Instant::now();
    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("下载失败: {}", url))?;

    let bytes = save_via_part(&mut resp.into_reader(), dest)?;
    info!(
        "✅ 模型下载完成: {:.1} MB, 耗时 {:.1}s",
        bytes as f64 / 1024.0 / 1024.0,
        t.elapsed().as_secs_f64()
    );
    Ok(())
}

/// 写入 `dest.part` 后改名为 `dest`; 任一步失败都删除 `.part`, `dest` 保持不变
fn save_via_part(reader: &mut impl Read, dest: &Path) -> Result<u64> {
    let part = dest.with_extension("part");
    let written = (|| -> Result<u64> {
        let mut file =
            File::create(&part).with_context(|| format!("无法创建文件: {}", part.display()))?;
        let bytes = io::copy(reader, &mut file).context("下载中断")?;
        file.sync_all()?;
        drop(file);
        fs::rename(&part, dest)
            .with_context(|| format!("无法写入模型文件: {}", dest.display()))?;
        Ok(bytes)
    })();

    if written.is_err() && part.exists() {
        if let Err(e) = fs::remove_file(&part) {
            warn!("⚠️ 无法删除临时文件 {}: {}", part.display(), e);
        }
    }
    written
}
