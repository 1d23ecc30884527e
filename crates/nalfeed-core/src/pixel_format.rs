//! 解码输出像素格式.
//!
//! 只收录硬件解码器常见的输出格式. 色彩转换与 RGBA 打包不在本库范围内,
//! 这里仅描述平面布局, 供会话协商输出格式和下游消费者按平面读取.

use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// NV12: Y 平面 + UV 交错, 4:2:0, 8 位 (硬件解码默认输出)
    Nv12,
    /// YUV 4:2:0 三平面, 8 位 (软件解码常用)
    Yuv420p,
    /// GBR 三平面, 8 位 (平面顺序 G, B, R)
    Gbrp,
    /// RGBA 各 8 位, 打包
    Rgba,
}

impl PixelFormat {
    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Nv12 => 2,
            Self::Yuv420p | Self::Gbrp => 3,
            Self::Rgba => 1,
        }
    }

    /// 计算指定平面每行的最小字节数
    ///
    /// 硬件输出的实际 stride 可能更大, 以 `VideoFrame::linesize` 为准.
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let w = width as usize;
        Some(match self {
            // plane1 为 UV 交错: (w/2)*2 = w
            Self::Nv12 => w,
            Self::Yuv420p => {
                if plane == 0 {
                    w
                } else {
                    w.div_ceil(2)
                }
            }
            Self::Gbrp => w,
            Self::Rgba => w * 4,
            Self::None => return None,
        })
    }

    /// 计算指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let h = height as usize;
        Some(match self {
            Self::Nv12 | Self::Yuv420p if plane > 0 => h.div_ceil(2),
            _ => h,
        })
    }

    /// 计算整帧的字节数 (按最小 stride)
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() as usize {
            total += self.plane_linesize(plane, width)? * self.plane_height(plane, height)?;
        }
        Some(total)
    }

    /// 格式名称 (与 FFmpeg 命名一致)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Nv12 => "nv12",
            Self::Yuv420p => "yuv420p",
            Self::Gbrp => "gbrp",
            Self::Rgba => "rgba",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nv12" => Ok(Self::Nv12),
            "yuv420p" => Ok(Self::Yuv420p),
            "gbrp" => Ok(Self::Gbrp),
            "rgba" => Ok(Self::Rgba),
            other => Err(FeedError::InvalidArgument(format!(
                "不支持的像素格式: {other}"
            ))),
        }
    }
}
