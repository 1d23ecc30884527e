//! 会话配置文件 (JSON) 与命令行参数叠加.
//!
//! 优先级: 命令行 > 配置文件 > `SessionConfig::default()`.
//!
//! ```json
//! {
//!   "backend": "null",
//!   "width": 1280,
//!   "height": 720,
//!   "frame_rate": "30000/1001",
//!   "output_pixel_format": "nv12",
//!   "readiness": { "policy": "bounded", "attempts": 8, "interval_ms": 2 },
//!   "max_submit_attempts": 1,
//!   "submit_parameter_sets": true
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use nalfeed_codec::session::{ReadinessPolicy, SessionConfig};
use nalfeed_core::{PixelFormat, Rational};

use crate::{DecodeArgs, PolicyArg};

/// 默认后端
pub const DEFAULT_BACKEND: &str = "null";

const DEFAULT_POLL_ATTEMPTS: u32 = 8;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2;
const DEFAULT_DEADLINE_MS: u64 = 50;

/// 配置文件内容
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub backend: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<String>,
    pub output_pixel_format: Option<String>,
    pub readiness: Option<ReadinessConfig>,
    pub max_submit_attempts: Option<u32>,
    pub submit_parameter_sets: Option<bool>,
}

/// 配置文件中的就绪策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ReadinessConfig {
    OneShot,
    Bounded {
        #[serde(default = "default_poll_attempts")]
        attempts: u32,
        #[serde(default = "default_poll_interval_ms")]
        interval_ms: u64,
    },
    Deadline {
        #[serde(default = "default_deadline_ms")]
        timeout_ms: u64,
    },
}

fn default_poll_attempts() -> u32 {
    DEFAULT_POLL_ATTEMPTS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

impl From<ReadinessConfig> for ReadinessPolicy {
    fn from(c: ReadinessConfig) -> Self {
        match c {
            ReadinessConfig::OneShot => Self::OneShot,
            ReadinessConfig::Bounded {
                attempts,
                interval_ms,
            } => Self::BoundedPoll {
                attempts,
                interval: Duration::from_millis(interval_ms),
            },
            ReadinessConfig::Deadline { timeout_ms } => {
                Self::Deadline(Duration::from_millis(timeout_ms))
            }
        }
    }
}

impl FileConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件 '{}' 失败", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("解析配置文件 '{}' 失败", path.display()))
    }

    /// 写入会话配置
    pub fn apply(&self, config: &mut SessionConfig) -> anyhow::Result<()> {
        if let Some(w) = self.width {
            config.width = w;
        }
        if let Some(h) = self.height {
            config.height = h;
        }
        if let Some(rate) = &self.frame_rate {
            config.frame_rate = parse_rate(rate)?;
        }
        if let Some(pf) = &self.output_pixel_format {
            config.output_pixel_format = parse_pixel_format(pf)?;
        }
        if let Some(readiness) = self.readiness {
            config.readiness = readiness.into();
        }
        if let Some(n) = self.max_submit_attempts {
            config.max_submit_attempts = n;
        }
        if self.submit_parameter_sets.is_some() {
            config.submit_parameter_sets = self.submit_parameter_sets;
        }
        Ok(())
    }
}

/// 解析后的解码设置
#[derive(Debug)]
pub struct DecodeSettings {
    pub backend: String,
    pub session: SessionConfig,
}

/// 合并默认值, 配置文件和命令行参数
pub fn resolve(args: &DecodeArgs) -> anyhow::Result<DecodeSettings> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let mut session = SessionConfig::default();
    file.apply(&mut session)?;

    if let Some(size) = &args.size {
        let (w, h) = parse_size(size)?;
        session.width = w;
        session.height = h;
    }
    if let Some(rate) = &args.rate {
        session.frame_rate = parse_rate(rate)?;
    }
    if let Some(pf) = &args.pix_fmt {
        session.output_pixel_format = parse_pixel_format(pf)?;
    }
    if let Some(n) = args.submit_attempts {
        session.max_submit_attempts = n;
    }
    if let Some(policy) = args.policy {
        session.readiness = policy_from_args(policy, args);
    } else if args.poll_attempts.is_some() || args.poll_interval_ms.is_some() {
        session.readiness = policy_from_args(PolicyArg::Bounded, args);
    } else if args.deadline_ms.is_some() {
        session.readiness = policy_from_args(PolicyArg::Deadline, args);
    }

    if session.width == 0 || session.height == 0 {
        bail!("尺寸不能为 0: {}x{}", session.width, session.height);
    }

    let backend = args
        .backend
        .clone()
        .or(file.backend)
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string());

    Ok(DecodeSettings { backend, session })
}

fn policy_from_args(policy: PolicyArg, args: &DecodeArgs) -> ReadinessPolicy {
    match policy {
        PolicyArg::OneShot => ReadinessPolicy::OneShot,
        PolicyArg::Bounded => ReadinessPolicy::BoundedPoll {
            attempts: args.poll_attempts.unwrap_or(DEFAULT_POLL_ATTEMPTS),
            interval: Duration::from_millis(
                args.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        },
        PolicyArg::Deadline => ReadinessPolicy::Deadline(Duration::from_millis(
            args.deadline_ms.unwrap_or(DEFAULT_DEADLINE_MS),
        )),
    }
}

/// 解析尺寸字符串 (如 "1280x720")
pub fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("尺寸格式错误 '{s}', 应为 WxH"))?;
    let w = w.trim().parse().with_context(|| format!("宽度无效 '{w}'"))?;
    let h = h.trim().parse().with_context(|| format!("高度无效 '{h}'"))?;
    Ok((w, h))
}

fn parse_rate(s: &str) -> anyhow::Result<Rational> {
    let rate: Rational = s.parse().with_context(|| format!("帧率无效 '{s}'"))?;
    if !rate.is_valid() || rate.num <= 0 {
        bail!("帧率必须为正数: '{s}'");
    }
    Ok(rate)
}

fn parse_pixel_format(s: &str) -> anyhow::Result<PixelFormat> {
    s.parse()
        .with_context(|| format!("像素格式无效 '{s}'"))
}
