//! 送入解码器的输入单元 (Packet).
//!
//! 一个 Packet 对应一个 NAL 单元, 已按后端要求的封装方式处理.
//! 起始码封装时直接借用输入缓冲区, 只有长度前缀封装才会产生新的字节.

use std::borrow::Cow;

use crate::parsers::h264::{FramingMode, NalType};

/// 输入单元
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    /// 已封装的 NAL 数据
    pub data: Cow<'a, [u8]>,
    /// 时间戳 (100ns 单位), 参数集固定为 0
    pub pts: i64,
    /// NAL 粗分类
    pub nal_type: NalType,
    /// 数据的封装方式
    pub framing: FramingMode,
}

impl<'a> Packet<'a> {
    /// 从已封装的数据创建
    pub fn new(data: impl Into<Cow<'a, [u8]>>, pts: i64, nal_type: NalType, framing: FramingMode) -> Self {
        Self {
            data: data.into(),
            pts,
            nal_type,
            framing,
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为参数集
    pub fn is_parameter_set(&self) -> bool {
        self.nal_type.is_parameter_set()
    }
}
