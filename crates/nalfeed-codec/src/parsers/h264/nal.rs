//! H.264 NAL (Network Abstraction Layer) 单元分类.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 类型总是取自起始码之后的第一个字节 (载荷第 0 字节).

use super::scanner::{ByteSpan, NalScanner};

/// NAL 单元类型 (完整 H.264 类型表)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// 未列出的类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 头部字节创建 (只看低 5 位)
    pub fn from_header(header: u8) -> Self {
        match header & 0x1F {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            other => Self::Unknown(other),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为关键帧 (IDR)
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 送流管线关心的粗分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalType {
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 图像切片 (VCL)
    Slice,
    /// 其他 (SEI, AUD, 空载荷等)
    Other,
}

impl NalType {
    /// 从 NAL 头部字节分类
    pub fn from_header(header: u8) -> Self {
        NalUnitType::from_header(header).into()
    }

    /// 是否为参数集 (SPS/PPS)
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

impl From<NalUnitType> for NalType {
    fn from(t: NalUnitType) -> Self {
        match t {
            NalUnitType::Sps => Self::Sps,
            NalUnitType::Pps => Self::Pps,
            t if t.is_vcl() => Self::Slice,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for NalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::Slice => "Slice",
            Self::Other => "Other",
        };
        write!(f, "{name}")
    }
}

/// 分类后的 NAL 单元, 只记录区间, 数据仍在原缓冲区中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit {
    /// 含起始码的区间
    pub span: ByteSpan,
    /// 粗分类
    pub nal_type: NalType,
    /// 完整头部类型, 载荷为空时为 `None`
    pub header: Option<NalUnitType>,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
}

impl NalUnit {
    /// 载荷是否为空 (只有起始码)
    pub fn is_empty(&self) -> bool {
        self.header.is_none()
    }

    /// 取出起始码之后的载荷
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        self.span.payload(buf)
    }

    /// 取出含起始码的完整字节
    pub fn bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        self.span.get(buf).unwrap_or(&[])
    }

    /// 是否为一帧图像的第一个切片
    ///
    /// 切片头以 ue(v) 编码的 first_mb_in_slice 开头, 值为 0 时编码为单个 `1` 比特,
    /// 即头部之后第一个字节的最高位.
    pub fn starts_picture(&self, buf: &[u8]) -> bool {
        // 数据分区 B/C 以 slice_id 开头, 不携带 first_mb_in_slice
        if !matches!(
            self.header,
            Some(NalUnitType::Slice | NalUnitType::SliceDpa | NalUnitType::SliceIdr)
        ) {
            return false;
        }
        self.payload(buf).get(1).is_some_and(|b| b & 0x80 != 0)
    }
}

/// 对扫描器产生的区间分类
///
/// 载荷不足 1 字节时返回 `Other`, 不会 panic.
pub fn classify(buf: &[u8], span: ByteSpan) -> NalUnit {
    match span.payload(buf).first() {
        Some(&header) => {
            let unit_type = NalUnitType::from_header(header);
            NalUnit {
                span,
                nal_type: unit_type.into(),
                header: Some(unit_type),
                ref_idc: (header >> 5) & 0x03,
            }
        }
        None => NalUnit {
            span,
            nal_type: NalType::Other,
            header: None,
            ref_idc: 0,
        },
    }
}

/// 扫描并分类缓冲区中的全部 NAL 单元 (惰性)
pub fn scan_nal_units(buf: &[u8]) -> impl Iterator<Item = NalUnit> + '_ {
    NalScanner::new(buf).map(move |span| classify(buf, span))
}
