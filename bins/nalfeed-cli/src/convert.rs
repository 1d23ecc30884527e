//! `convert` 子命令: Annex B → 长度前缀 (AVCC).

use std::path::Path;

use anyhow::{Context, bail};

use nalfeed_codec::parsers::h264::annex_b_to_length_prefixed;

use crate::ConvertArgs;

pub fn run(args: &ConvertArgs) -> anyhow::Result<()> {
    ensure_writable(&args.output, args.overwrite)?;

    let data = std::fs::read(&args.input)
        .with_context(|| format!("无法读取输入文件 '{}'", args.input.display()))?;
    let converted = annex_b_to_length_prefixed(&data)
        .with_context(|| format!("转换 '{}' 失败", args.input.display()))?;
    if converted.is_empty() {
        bail!("输入中没有找到 4 字节起始码: '{}'", args.input.display());
    }

    std::fs::write(&args.output, &converted)
        .with_context(|| format!("无法写入输出文件 '{}'", args.output.display()))?;
    log::info!(
        "已转换 {} → {} ({} → {} 字节)",
        args.input.display(),
        args.output.display(),
        data.len(),
        converted.len()
    );
    eprintln!(
        "已写出 {} 字节到 '{}'",
        converted.len(),
        args.output.display()
    );
    Ok(())
}

/// 输出文件已存在且未指定 `-y` 时报错
pub fn ensure_writable(path: &Path, overwrite: bool) -> anyhow::Result<()> {
    if !overwrite && path.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", path.display());
    }
    Ok(())
}
