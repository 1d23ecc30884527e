//! 编解码器标识符.
//!
//! 会话协商时用于区分输入 (压缩码流) 与输出 (原始像素) 格式描述.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// H.264 / AVC / MPEG-4 Part 10
    H264,
    /// Raw 视频 (未压缩, 解码器输出侧)
    RawVideo,
}

impl CodecId {
    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::H264 => "h264",
            Self::RawVideo => "rawvideo",
        }
    }

    /// 是否为压缩码流
    pub const fn is_compressed(&self) -> bool {
        matches!(self, Self::H264)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
