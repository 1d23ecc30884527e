//! Annex B 与长度前缀 (AVCC) 封装转换.
//!
//! # AVCC 格式
//!
//! 每个 NAL 单元前为 4 字节大端长度:
//! ```text
//! [length: 4 bytes BE] [NAL data: length bytes]
//! ```
//!
//! 起始码转换为长度前缀后无法还原 (起始码被丢弃), 需要原始形式的调用方应保留区间.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};
use nalfeed_core::{FeedError, FeedResult};

use super::scanner::{NalScanner, START_CODE, START_CODE_LEN};

/// 长度前缀字段宽度 (字节)
pub const LENGTH_FIELD_LEN: usize = 4;

/// NAL 封装方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FramingMode {
    /// 4 字节起始码 (Annex B)
    #[default]
    StartCode,
    /// 4 字节大端长度前缀 (AVCC)
    LengthPrefixed,
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartCode => write!(f, "annexb"),
            Self::LengthPrefixed => write!(f, "avcc"),
        }
    }
}

/// 把含起始码的 NAL 转换为长度前缀形式
///
/// 输出长度与输入相同: 4 字节起始码被替换为 4 字节大端载荷长度.
pub fn to_length_prefixed(nal: &[u8]) -> FeedResult<Vec<u8>> {
    if nal.len() < START_CODE_LEN {
        return Err(FeedError::MalformedStream(format!(
            "H.264: NAL 区间不足起始码长度, len={}",
            nal.len()
        )));
    }
    let payload = &nal[START_CODE_LEN..];
    let payload_len = length_field(payload.len())?;

    let mut out = vec![0u8; LENGTH_FIELD_LEN + payload.len()];
    BigEndian::write_u32(&mut out[..LENGTH_FIELD_LEN], payload_len);
    out[LENGTH_FIELD_LEN..].copy_from_slice(payload);
    Ok(out)
}

/// 长度字段只有 32 位, 超过 4 GiB 的载荷无法表示
fn length_field(payload_len: usize) -> FeedResult<u32> {
    u32::try_from(payload_len).map_err(|_| {
        FeedError::MalformedStream(format!("H.264: NAL 载荷过大, len={payload_len}"))
    })
}

/// 把含起始码的 NAL 转换为目标封装
///
/// 目标为起始码时直接借用, 不复制.
pub fn frame_for(mode: FramingMode, nal: &[u8]) -> FeedResult<Cow<'_, [u8]>> {
    match mode {
        FramingMode::StartCode => Ok(Cow::Borrowed(nal)),
        FramingMode::LengthPrefixed => to_length_prefixed(nal).map(Cow::Owned),
    }
}

/// 为不含起始码的载荷补上起始码
pub fn to_start_code(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(START_CODE_LEN + payload.len());
    out.extend_from_slice(&START_CODE);
    out.extend_from_slice(payload);
    out
}

/// 将整段 Annex B 码流转换为 AVCC 格式
///
/// 起始码之前的字节被丢弃, 与扫描器行为一致. 任一载荷超过 4 GiB 时返回
/// `MalformedStream`.
pub fn annex_b_to_length_prefixed(data: &[u8]) -> FeedResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    for span in NalScanner::new(data) {
        let mut len_field = [0u8; LENGTH_FIELD_LEN];
        BigEndian::write_u32(&mut len_field, length_field(span.payload_len())?);
        out.extend_from_slice(&len_field);
        out.extend_from_slice(span.payload(data));
    }
    Ok(out)
}

/// 从 AVCC 数据中切出各 NAL 载荷
///
/// 遇到截断的单元即停止.
pub fn split_length_prefixed(data: &[u8]) -> Vec<&[u8]> {
    let mut nalus = Vec::new();
    let mut pos = 0;

    while pos + LENGTH_FIELD_LEN <= data.len() {
        let nal_len = BigEndian::read_u32(&data[pos..pos + LENGTH_FIELD_LEN]) as usize;
        pos += LENGTH_FIELD_LEN;

        if nal_len > data.len() - pos {
            break;
        }
        nalus.push(&data[pos..pos + nal_len]);
        pos += nal_len;
    }

    nalus
}
