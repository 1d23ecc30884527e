//! Annex B 起始码扫描.
//!
//! 只识别 4 字节起始码 `00 00 00 01`, 不处理 3 字节起始码,
//! 也不移除 emulation prevention 字节. 载荷按原样透传给解码器.
//!
//! ```text
//! 00 00 00 01 67 ... | 00 00 00 01 68 ... | 00 00 00 01 65 ... <EOF>
//! └──── span 0 ─────┘ └──── span 1 ─────┘ └──── span 2 ────────┘
//! ```

use std::iter::FusedIterator;

/// 4 字节 Annex B 起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// 起始码长度
pub const START_CODE_LEN: usize = START_CODE.len();

/// 缓冲区内的一段区间 (offset, len), 不持有数据
///
/// 扫描器产生的区间包含开头的 4 字节起始码.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteSpan {
    /// 起始偏移
    pub offset: usize,
    /// 长度 (字节)
    pub len: usize,
}

impl ByteSpan {
    /// 创建区间
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// 结束偏移 (不含)
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// 载荷长度 (去掉起始码后)
    pub const fn payload_len(&self) -> usize {
        self.len.saturating_sub(START_CODE_LEN)
    }

    /// 取出区间对应的字节, 越界时返回 `None`
    pub fn get<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        buf.get(self.offset..self.end())
    }

    /// 取出起始码之后的载荷, 区间不足 4 字节或越界时返回空切片
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        self.get(buf)
            .and_then(|s| s.get(START_CODE_LEN..))
            .unwrap_or(&[])
    }
}

/// 惰性、可重启的 NAL 区间扫描器
///
/// 借用输入缓冲区, 不能比缓冲区活得更久.
#[derive(Debug, Clone)]
pub struct NalScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> NalScanner<'a> {
    /// 从缓冲区开头扫描
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_offset(data, 0)
    }

    /// 从指定偏移开始扫描, 偏移之前的字节被忽略
    pub fn with_offset(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: offset.min(data.len()),
        }
    }

    /// 下一次扫描的起点
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 重新从 `offset` 开始扫描
    pub fn reset(&mut self, offset: usize) {
        self.pos = offset.min(self.data.len());
    }

    /// 被扫描的缓冲区
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl Iterator for NalScanner<'_> {
    type Item = ByteSpan;

    fn next(&mut self) -> Option<ByteSpan> {
        let Some(start) = find_start_code(self.data, self.pos) else {
            // 没有更多起始码, 尾部的无主字节直接跳过
            self.pos = self.data.len();
            return None;
        };
        let end = find_start_code(self.data, start + START_CODE_LEN).unwrap_or(self.data.len());
        self.pos = end;
        Some(ByteSpan::new(start, end - start))
    }
}

impl FusedIterator for NalScanner<'_> {}

/// 从 `from` 开始查找下一个 4 字节起始码的位置
///
/// 与逐字节比较的结果完全一致, 只是改用窗口搜索.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(START_CODE_LEN)
        .position(|w| w == START_CODE)
        .map(|p| p + from)
}
