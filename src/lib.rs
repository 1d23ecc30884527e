//! # nalfeed
//!
//! H.264 Annex B 码流解复用与解码器送流管线.
//!
//! - **扫描**: 按 4 字节起始码切分 NAL 单元, 只记录区间不复制数据
//! - **分类**: 识别 SPS / PPS / 切片
//! - **封装转换**: 起始码 ↔ 4 字节大端长度前缀 (AVCC)
//! - **会话驱动**: 按解码后端的就绪信号送入数据, 取出解码帧
//!
//! # 快速开始
//!
//! ```rust
//! use nalfeed::codec::parsers::h264::{NalType, scan_nal_units};
//!
//! let stream = [
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F,
//!     0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80,
//!     0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00,
//! ];
//! let types: Vec<NalType> = scan_nal_units(&stream).map(|n| n.nal_type).collect();
//! assert_eq!(types, [NalType::Sps, NalType::Pps, NalType::Slice]);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `nalfeed-core` | 错误类型, 像素格式, 有理数 |
//! | `nalfeed-codec` | 码流解析, 解码后端协议, 会话驱动 |

/// 核心类型
pub use nalfeed_core as core;

/// 码流解析与解码会话
pub use nalfeed_codec as codec;

/// 获取 nalfeed 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置后端的注册表
pub fn default_backend_registry() -> nalfeed_codec::BackendRegistry {
    let mut registry = nalfeed_codec::BackendRegistry::new();
    nalfeed_codec::register_all(&mut registry);
    registry
}
