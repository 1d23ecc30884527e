//! 统一错误类型定义.
//!
//! 所有 nalfeed crate 共用的错误类型. 按致命程度分两类:
//! - 致命: `Configuration`, `SessionStart`, `InvalidState`, 会话随之终止
//! - 可恢复: `InputSubmit`, `OutputRetrieve`, `MalformedStream`, 仅丢弃当前单元

use thiserror::Error;

/// nalfeed 统一错误类型
#[derive(Debug, Error)]
pub enum FeedError {
    /// 解码器拒绝输入格式, 或没有匹配的输出格式
    #[error("配置失败: {0}")]
    Configuration(String),

    /// 会话启动控制信号 (flush/begin/start) 失败
    #[error("会话启动失败: {0}")]
    SessionStart(String),

    /// 单个输入单元送入失败
    #[error("输入提交失败: {0}")]
    InputSubmit(String),

    /// 单个输出单元取出失败
    #[error("输出获取失败: {0}")]
    OutputRetrieve(String),

    /// 截断或为空的 NAL 单元
    #[error("码流格式错误: {0}")]
    MalformedStream(String),

    /// 在错误的会话状态下调用
    #[error("会话状态错误: {0}")]
    InvalidState(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 未找到指定的解码后端
    #[error("未找到解码后端: {0}")]
    BackendNotFound(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// 是否为致命错误 (会话必须终止)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::SessionStart(_) | Self::InvalidState(_)
        )
    }
}

/// nalfeed 统一 Result 类型
pub type FeedResult<T> = Result<T, FeedError>;
