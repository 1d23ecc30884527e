//! H.264/AVC Annex B 码流解析.
//!
//! - 4 字节起始码扫描
//! - NAL 单元类型识别
//! - Annex B ↔ AVCC 封装转换
//! - SPS/PPS 参数集缓存

pub mod framing;
pub mod nal;
pub mod param_sets;
pub mod scanner;

pub use framing::{
    FramingMode, annex_b_to_length_prefixed, frame_for, split_length_prefixed, to_length_prefixed,
    to_start_code,
};
pub use nal::{NalType, NalUnit, NalUnitType, classify, scan_nal_units};
pub use param_sets::ParameterSetCache;
pub use scanner::{ByteSpan, NalScanner, START_CODE, START_CODE_LEN};
