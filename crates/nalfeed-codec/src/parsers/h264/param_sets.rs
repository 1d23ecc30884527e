//! SPS/PPS 参数集缓存.
//!
//! 只保留最近一次出现的 SPS 和 PPS (后写覆盖), 不区分参数集 ID.
//! 两者都出现过之后才允许送入切片.

use super::nal::{NalType, NalUnit};
use super::scanner::ByteSpan;

/// 参数集缓存
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterSetCache {
    sps: Option<ByteSpan>,
    pps: Option<ByteSpan>,
}

impl ParameterSetCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察一个 NAL 单元, SPS/PPS 覆盖旧值, 其他类型忽略
    ///
    /// 返回该单元是否被缓存.
    pub fn observe(&mut self, nal: &NalUnit) -> bool {
        match nal.nal_type {
            NalType::Sps => self.sps = Some(nal.span),
            NalType::Pps => self.pps = Some(nal.span),
            NalType::Slice | NalType::Other => return false,
        }
        true
    }

    /// SPS 与 PPS 是否都已出现
    pub fn is_ready(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// 最近的 SPS 区间 (含起始码)
    pub fn sps(&self) -> Option<ByteSpan> {
        self.sps
    }

    /// 最近的 PPS 区间 (含起始码)
    pub fn pps(&self) -> Option<ByteSpan> {
        self.pps
    }

    /// 最近的 SPS 载荷
    pub fn sps_payload<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        self.sps.map(|s| s.payload(buf))
    }

    /// 最近的 PPS 载荷
    pub fn pps_payload<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        self.pps.map(|s| s.payload(buf))
    }
}
