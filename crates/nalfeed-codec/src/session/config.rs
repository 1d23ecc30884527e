//! 会话配置与就绪等待策略.

use std::time::{Duration, Instant};

use nalfeed_core::{PixelFormat, Rational};

use super::backend::FormatDescriptor;

/// 就绪等待策略
///
/// 决定后端报告 "暂不可输入" 时驱动如何处理.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// 只查询一次, 未就绪即丢弃当前单元
    OneShot,
    /// 最多查询 `attempts` 次, 每次之间先取出已就绪的输出, 再休眠 `interval`
    BoundedPoll {
        /// 最大查询次数 (至少 1)
        attempts: u32,
        /// 两次查询之间的休眠
        interval: Duration,
    },
    /// 持续查询直到就绪或超时, 轮询间隔 1ms
    Deadline(Duration),
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::BoundedPoll {
            attempts: 8,
            interval: Duration::from_millis(2),
        }
    }
}

impl ReadinessPolicy {
    /// Deadline 策略的轮询间隔
    pub const DEADLINE_INTERVAL: Duration = Duration::from_millis(1);

    /// 开始一次等待
    pub(crate) fn start(&self) -> PollBudget {
        match *self {
            Self::OneShot => PollBudget {
                remaining: Some(1),
                deadline: None,
                interval: Duration::ZERO,
                queried: false,
            },
            Self::BoundedPoll { attempts, interval } => PollBudget {
                remaining: Some(attempts.max(1)),
                deadline: None,
                interval,
                queried: false,
            },
            Self::Deadline(timeout) => PollBudget {
                remaining: None,
                deadline: Some(Instant::now() + timeout),
                interval: Self::DEADLINE_INTERVAL,
                queried: false,
            },
        }
    }
}

impl std::fmt::Display for ReadinessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot => write!(f, "one-shot"),
            Self::BoundedPoll { attempts, interval } => {
                write!(f, "bounded({attempts}x{}ms)", interval.as_millis())
            }
            Self::Deadline(timeout) => write!(f, "deadline({}ms)", timeout.as_millis()),
        }
    }
}

/// 一次等待的剩余预算
#[derive(Debug)]
pub(crate) struct PollBudget {
    remaining: Option<u32>,
    deadline: Option<Instant>,
    interval: Duration,
    queried: bool,
}

impl PollBudget {
    /// 消耗一次查询机会, 预算用尽返回 `false`
    ///
    /// 第一次查询总是允许, 超时只约束之后的重试.
    pub(crate) fn take(&mut self) -> bool {
        let first = !self.queried;
        self.queried = true;
        if let Some(n) = self.remaining.as_mut() {
            if *n == 0 {
                return false;
            }
            *n -= 1;
            return true;
        }
        first || self.deadline.is_none_or(|d| Instant::now() < d)
    }

    /// 是否还有剩余机会 (决定失败后是否值得休眠)
    pub(crate) fn has_more(&self) -> bool {
        match (self.remaining, self.deadline) {
            (Some(n), _) => n > 0,
            (None, Some(d)) => Instant::now() < d,
            (None, None) => false,
        }
    }

    /// 两次查询之间的休眠
    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }
}

/// 解码会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 输入宽度 (像素)
    pub width: u32,
    /// 输入高度 (像素)
    pub height: u32,
    /// 输入帧率, 同时用于生成时间戳
    pub frame_rate: Rational,
    /// 期望的输出像素格式
    pub output_pixel_format: PixelFormat,
    /// 输入就绪等待策略
    pub readiness: ReadinessPolicy,
    /// 单个单元送入失败后的最大尝试次数 (1 表示不重试)
    pub max_submit_attempts: u32,
    /// 覆盖后端的参数集送入需求, `None` 表示按后端决定
    pub submit_parameter_sets: Option<bool>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: Rational::new(30, 1),
            output_pixel_format: PixelFormat::Nv12,
            readiness: ReadinessPolicy::default(),
            max_submit_attempts: 1,
            submit_parameter_sets: None,
        }
    }
}

impl SessionConfig {
    /// 由配置生成 H.264 输入格式描述
    pub fn input_format(&self) -> FormatDescriptor {
        FormatDescriptor {
            frame_rate: self.frame_rate,
            ..FormatDescriptor::h264(self.width, self.height)
        }
    }
}
