//! `probe` 子命令: 扫描码流并列出 NAL 单元.

use anyhow::Context;
use serde::Serialize;

use nalfeed_codec::parsers::h264::{NalType, NalUnit, ParameterSetCache, scan_nal_units};

use crate::ProbeArgs;

// ============================================================
// JSON 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
pub struct ProbeOutput {
    pub filename: String,
    pub size: usize,
    pub summary: ProbeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<NalInfo>>,
}

/// 单个 NAL 单元
#[derive(Serialize)]
pub struct NalInfo {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nal_unit_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ref_idc: u8,
}

/// 汇总
#[derive(Serialize, Default, Debug, PartialEq, Eq)]
pub struct ProbeSummary {
    pub nal_units: usize,
    pub sps: usize,
    pub pps: usize,
    pub slices: usize,
    pub idr_slices: usize,
    pub other: usize,
    pub empty: usize,
    pub payload_bytes: usize,
    /// 首个切片之前 SPS/PPS 是否都已出现
    pub ready_before_first_slice: bool,
    /// 全文件是否同时含有 SPS 和 PPS
    pub has_parameter_sets: bool,
}

// ============================================================
// 主逻辑
// ============================================================

pub fn run(args: &ProbeArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("无法读取输入文件 '{}'", args.input.display()))?;
    let units: Vec<NalUnit> = scan_nal_units(&data).collect();
    let summary = summarize(&units);
    log::info!(
        "{}: {} 个 NAL 单元, SPS {} / PPS {}",
        args.input.display(),
        summary.nal_units,
        summary.sps,
        summary.pps
    );

    let output = ProbeOutput {
        filename: args.input.display().to_string(),
        size: data.len(),
        summary,
        units: (!args.summary).then(|| units.iter().enumerate().map(|(i, n)| describe(i, n)).collect()),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("序列化探测结果失败")?;
        println!("{json}");
    } else {
        print_text(&output);
    }
    Ok(())
}

fn describe(index: usize, nal: &NalUnit) -> NalInfo {
    NalInfo {
        index,
        offset: nal.span.offset,
        size: nal.span.len,
        kind: nal.nal_type.to_string(),
        nal_unit_type: nal.header.map(|h| h.type_id()),
        name: nal.header.map(|h| h.to_string()),
        ref_idc: nal.ref_idc,
    }
}

/// 统计各类单元
pub fn summarize(units: &[NalUnit]) -> ProbeSummary {
    let mut summary = ProbeSummary::default();
    let mut cache = ParameterSetCache::new();
    let mut seen_slice = false;

    for nal in units {
        summary.nal_units += 1;
        summary.payload_bytes += nal.span.payload_len();
        if nal.is_empty() {
            summary.empty += 1;
            continue;
        }
        cache.observe(nal);
        match nal.nal_type {
            NalType::Sps => summary.sps += 1,
            NalType::Pps => summary.pps += 1,
            NalType::Slice => {
                summary.slices += 1;
                if nal.header.is_some_and(|h| h.is_idr()) {
                    summary.idr_slices += 1;
                }
                if !seen_slice {
                    seen_slice = true;
                    summary.ready_before_first_slice = cache.is_ready();
                }
            }
            NalType::Other => summary.other += 1,
        }
    }
    summary.has_parameter_sets = cache.is_ready();
    summary
}

fn print_text(output: &ProbeOutput) {
    println!("文件: {} ({} 字节)", output.filename, output.size);
    if let Some(units) = &output.units {
        println!("{:>6}  {:>10}  {:>8}  {:<6}  {:<12}  ref", "#", "offset", "size", "kind", "type");
        for u in units {
            println!(
                "{:>6}  {:>10}  {:>8}  {:<6}  {:<12}  {}",
                u.index,
                u.offset,
                u.size,
                u.kind,
                u.name.as_deref().unwrap_or("-"),
                u.ref_idc
            );
        }
    }
    let s = &output.summary;
    println!(
        "共 {} 个 NAL 单元: SPS {}, PPS {}, 切片 {} (IDR {}), 其他 {}, 空 {}",
        s.nal_units, s.sps, s.pps, s.slices, s.idr_slices, s.other, s.empty
    );
    println!(
        "参数集: {}, 首个切片前就绪: {}",
        if s.has_parameter_sets { "完整" } else { "缺失" },
        if s.ready_before_first_slice { "是" } else { "否" }
    );
}
