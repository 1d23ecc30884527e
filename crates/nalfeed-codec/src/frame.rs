//! 解码后的视频帧.
//!
//! 解码后端从自身输出样本中构造 `VideoFrame`, 交给 `FrameSink` 消费.
//! 平面数据使用 `Bytes`, 消费者需要保留帧时可以廉价克隆, 不依赖后端缓冲区.

use bytes::Bytes;
use nalfeed_core::PixelFormat;

/// 视频帧
///
/// 多平面存储, 例如 NV12 有 2 个平面 (Y, UV).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据
    pub data: Vec<Bytes>,
    /// 各平面每行的字节数 (linesize / stride)
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 显示时间戳 (100ns 单位), 未知时为 -1
    pub pts: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl VideoFrame {
    /// 创建空的视频帧, 平面数按像素格式分配
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let plane_count = pixel_format.plane_count() as usize;
        Self {
            data: vec![Bytes::new(); plane_count],
            linesize: vec![0; plane_count],
            width,
            height,
            pixel_format,
            pts: -1,
            is_keyframe: false,
        }
    }

    /// 按最小 stride 分配并填充零数据的帧
    pub fn zeroed(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let mut frame = Self::new(width, height, pixel_format);
        for plane in 0..frame.data.len() {
            let ls = pixel_format.plane_linesize(plane, width).unwrap_or(0);
            let rows = pixel_format.plane_height(plane, height).unwrap_or(0);
            frame.linesize[plane] = ls;
            frame.data[plane] = Bytes::from(vec![0u8; ls * rows]);
        }
        frame
    }

    /// 获取 (平面数据, stride)
    pub fn plane(&self, index: usize) -> Option<(&[u8], usize)> {
        Some((self.data.get(index)?.as_ref(), *self.linesize.get(index)?))
    }

    /// 所有平面数据总字节数
    pub fn byte_len(&self) -> usize {
        self.data.iter().map(Bytes::len).sum()
    }
}
