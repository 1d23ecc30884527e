//! nalfeed-cli - H.264 Annex B 码流工具
//!
//! - `probe`: 列出 NAL 单元与参数集情况
//! - `convert`: 转换为长度前缀 (AVCC) 封装
//! - `decode`: 用指定后端跑完整的解码会话

mod config;
mod convert;
mod decode;
mod logging;
mod probe;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "nalfeed-cli", version, about = "H.264 Annex B 送流工具")]
struct Cli {
    /// 日志详细程度 (控制台: 默认 warn, -v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 扫描码流, 列出每个 NAL 单元
    Probe(ProbeArgs),
    /// 转换为长度前缀封装
    Convert(ConvertArgs),
    /// 驱动解码会话
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// 输入 Annex B 文件
    pub input: PathBuf,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,

    /// 只输出汇总, 不列出每个单元
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// 输入 Annex B 文件
    pub input: PathBuf,

    /// 输出文件
    pub output: PathBuf,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    pub overwrite: bool,
}

/// 就绪等待策略
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    /// 只查询一次
    OneShot,
    /// 有限次轮询
    Bounded,
    /// 轮询到超时
    Deadline,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// 输入 Annex B 文件
    pub input: PathBuf,

    /// 解码后端名称 (默认 null)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// JSON 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 解码帧输出文件 (按平面顺序写出原始像素)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 输入尺寸 (如 "1280x720")
    #[arg(short = 's', long)]
    pub size: Option<String>,

    /// 输入帧率 (如 "25" 或 "30000/1001")
    #[arg(short = 'r', long)]
    pub rate: Option<String>,

    /// 输出像素格式 (nv12, yuv420p)
    #[arg(long)]
    pub pix_fmt: Option<String>,

    /// 就绪等待策略
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// 轮询次数 (bounded)
    #[arg(long)]
    pub poll_attempts: Option<u32>,

    /// 轮询间隔毫秒 (bounded)
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// 超时毫秒 (deadline)
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// 单元送入失败后的最大尝试次数
    #[arg(long)]
    pub submit_attempts: Option<u32>,

    /// 输出 JSON 格式的统计
    #[arg(long)]
    pub json: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    pub overwrite: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("nalfeed-cli", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    let result = match &cli.command {
        Command::Probe(args) => probe::run(args),
        Command::Convert(args) => convert::run(args),
        Command::Decode(args) => decode::run(args),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}
