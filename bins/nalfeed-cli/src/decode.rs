//! `decode` 子命令: 用注册表中的后端跑完整的解码会话.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, bail};
use serde::Serialize;

use nalfeed_codec::parsers::h264::{NalUnit, scan_nal_units};
use nalfeed_codec::session::{DecoderSession, FrameSink, SessionStats};
use nalfeed_codec::{BackendRegistry, VideoFrame};
use nalfeed_core::FeedResult;

use crate::DecodeArgs;
use crate::config;
use crate::convert::ensure_writable;
use crate::probe::summarize;

// ============================================================
// 原始帧输出
// ============================================================

/// 把解码帧按平面顺序写成原始像素文件
///
/// 每个平面只写可见区域, 跳过 stride 对齐的填充.
pub struct RawFrameWriter<W: Write> {
    out: Option<W>,
    frames: u64,
    bytes: u64,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(out: Option<W>) -> Self {
        Self {
            out,
            frames: 0,
            bytes: 0,
        }
    }

    /// 已写出的 (帧数, 字节数)
    pub fn written(&self) -> (u64, u64) {
        (self.frames, self.bytes)
    }

    /// 刷新缓冲
    pub fn finish(&mut self) -> std::io::Result<()> {
        match self.out.as_mut() {
            Some(out) => out.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> FrameSink for RawFrameWriter<W> {
    fn consume(&mut self, frame: &VideoFrame) -> FeedResult<()> {
        self.frames += 1;
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        let pf = frame.pixel_format;
        for plane in 0..frame.data.len() {
            let Some((data, stride)) = frame.plane(plane) else {
                continue;
            };
            let row_bytes = pf.plane_linesize(plane, frame.width).unwrap_or(stride);
            let rows = pf.plane_height(plane, frame.height).unwrap_or(0);
            for row in 0..rows {
                let start = row * stride;
                let Some(line) = data.get(start..start + row_bytes) else {
                    break;
                };
                out.write_all(line)?;
                self.bytes += line.len() as u64;
            }
        }
        Ok(())
    }
}

// ============================================================
// 统计输出
// ============================================================

#[derive(Serialize)]
struct DecodeReport<'a> {
    input: String,
    backend: &'a str,
    policy: String,
    nal_units: u64,
    parameter_sets: u64,
    parameter_sets_submitted: u64,
    units_submitted: u64,
    skipped_before_ready: u64,
    dropped_not_ready: u64,
    submit_errors: u64,
    output_errors: u64,
    sink_errors: u64,
    frames_delivered: u64,
    malformed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    bytes_written: u64,
}

// ============================================================
// 主逻辑
// ============================================================

pub fn run(args: &DecodeArgs) -> anyhow::Result<()> {
    let settings = config::resolve(args)?;
    if let Some(path) = &args.output {
        ensure_writable(path, args.overwrite)?;
    }

    let data = std::fs::read(&args.input)
        .with_context(|| format!("无法读取输入文件 '{}'", args.input.display()))?;
    let units: Vec<NalUnit> = scan_nal_units(&data).collect();
    check_parameter_sets(&units)?;

    let mut registry = BackendRegistry::new();
    nalfeed_codec::register_all(&mut registry);
    let backend = registry.create(&settings.backend)?;

    let out = match &args.output {
        Some(path) => Some(open_output(path)?),
        None => None,
    };
    let policy = settings.session.readiness.to_string();
    let mut session = DecoderSession::new(backend, settings.session, RawFrameWriter::new(out));

    session.open().context("打开解码会话失败")?;
    for nal in &units {
        session.feed(&data, nal)?;
    }
    let stats = session.close()?;
    session.sink_mut().finish().context("写出帧数据失败")?;
    let (_, bytes_written) = session.sink().written();

    let report = DecodeReport {
        input: args.input.display().to_string(),
        backend: &settings.backend,
        policy,
        output: args.output.as_ref().map(|p| p.display().to_string()),
        bytes_written,
        ..report_from(&stats)
    };
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("序列化统计失败")?
        );
    } else {
        print_text(&report);
    }
    Ok(())
}

/// 没有 SPS 或 PPS 的码流无法解码, 提前报错
fn check_parameter_sets(units: &[NalUnit]) -> anyhow::Result<()> {
    let summary = summarize(units);
    if summary.nal_units == 0 {
        bail!("输入中没有找到任何 NAL 单元");
    }
    if !summary.has_parameter_sets {
        bail!(
            "未找到 SPS 和 PPS (SPS {}, PPS {})",
            summary.sps,
            summary.pps
        );
    }
    Ok(())
}

fn open_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
    Ok(BufWriter::new(file))
}

fn report_from<'a>(stats: &SessionStats) -> DecodeReport<'a> {
    DecodeReport {
        input: String::new(),
        backend: "",
        policy: String::new(),
        nal_units: stats.nal_units,
        parameter_sets: stats.parameter_sets,
        parameter_sets_submitted: stats.parameter_sets_submitted,
        units_submitted: stats.units_submitted,
        skipped_before_ready: stats.skipped_before_ready,
        dropped_not_ready: stats.dropped_not_ready,
        submit_errors: stats.submit_errors,
        output_errors: stats.output_errors,
        sink_errors: stats.sink_errors,
        frames_delivered: stats.frames_delivered,
        malformed: stats.malformed,
        output: None,
        bytes_written: 0,
    }
}

fn print_text(r: &DecodeReport<'_>) {
    println!("输入: {}", r.input);
    println!("后端: {} (就绪策略 {})", r.backend, r.policy);
    println!(
        "NAL 单元 {}: 参数集 {} (送入 {}), 送入 {}",
        r.nal_units, r.parameter_sets, r.parameter_sets_submitted, r.units_submitted
    );
    println!(
        "跳过 {} (参数集未就绪), 丢弃 {} (后端未就绪), 格式错误 {}",
        r.skipped_before_ready, r.dropped_not_ready, r.malformed
    );
    println!(
        "错误: 送入 {}, 输出 {}, 写出 {}",
        r.submit_errors, r.output_errors, r.sink_errors
    );
    println!("解码帧: {}", r.frames_delivered);
    if let Some(output) = &r.output {
        println!("输出: {} ({} 字节)", output, r.bytes_written);
    }
}
