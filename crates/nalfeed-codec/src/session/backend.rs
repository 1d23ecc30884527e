//! 解码后端 trait 定义.
//!
//! 硬件/软件解码器都以同一套会话协议接入, 会话驱动只依赖此 trait:
//!
//! 1. `configure_input()` 设置输入格式
//! 2. 按索引 `output_format()` 枚举候选输出格式, `configure_output()` 选定
//! 3. `send_control()` 发送 Flush / BeginStreaming / StartOfStream
//! 4. `input_ready()` + `submit_input()` 送入数据
//! 5. `output_ready()` + `retrieve_output()` 取出帧, `release_sample()` 归还样本
//! 6. `send_control(Drain)` 排空, 最后 `release()`

use nalfeed_core::{FeedResult, PixelFormat, Rational};

use crate::codec_id::CodecId;
use crate::frame::VideoFrame;
use crate::packet::Packet;
use crate::parsers::h264::FramingMode;

/// 格式描述 (输入或输出)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式, 压缩输入为 `None`
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 像素宽高比
    pub sample_aspect_ratio: Rational,
    /// 码流封装方式 (仅输入侧有意义)
    pub framing: FramingMode,
}

impl FormatDescriptor {
    /// H.264 输入格式, 30fps, 方形像素
    pub fn h264(width: u32, height: u32) -> Self {
        Self {
            codec_id: CodecId::H264,
            width,
            height,
            pixel_format: PixelFormat::None,
            frame_rate: Rational::new(30, 1),
            sample_aspect_ratio: Rational::new(1, 1),
            framing: FramingMode::StartCode,
        }
    }

    /// 原始视频输出格式
    pub fn raw_video(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            codec_id: CodecId::RawVideo,
            pixel_format,
            ..Self::h264(width, height)
        }
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{} {} @{}",
            self.codec_id, self.width, self.height, self.pixel_format, self.frame_rate
        )
    }
}

/// 会话控制信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSignal {
    /// 清空解码器内部状态
    Flush,
    /// 通知开始流式处理
    BeginStreaming,
    /// 通知流开始
    StartOfStream,
    /// 输入结束, 要求吐出所有待输出帧
    Drain,
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Flush => "flush",
            Self::BeginStreaming => "begin-streaming",
            Self::StartOfStream => "start-of-stream",
            Self::Drain => "drain",
        };
        write!(f, "{name}")
    }
}

/// 后端持有的输出样本
///
/// `id` 由后端分配, 驱动在消费完 `frame` 后必须调用 `release_sample(id)`.
#[derive(Debug)]
pub struct OutputSample {
    /// 样本标识
    pub id: u64,
    /// 解码帧
    pub frame: VideoFrame,
}

/// 解码后端 trait
///
/// 所有查询都是非阻塞的. 具体后端 (硬件 API, 软件解码, 测试桩) 都实现此 trait,
/// 在配置阶段通过 `BackendRegistry` 选定.
pub trait DecoderBackend {
    /// 获取后端名称
    fn name(&self) -> &str;

    /// 后端期望的码流封装方式
    fn bitstream_format(&self) -> FramingMode;

    /// 是否需要把 SPS/PPS 作为独立输入单元送入 (时间戳 0)
    ///
    /// 通过其他途径获得参数集的后端返回 `false`, 此时只收到切片等单元.
    fn requires_parameter_sets(&self) -> bool {
        true
    }

    /// 设置输入格式
    fn configure_input(&mut self, format: &FormatDescriptor) -> FeedResult<()>;

    /// 按索引枚举候选输出格式, 越界返回 `Ok(None)`
    fn output_format(&mut self, index: usize) -> FeedResult<Option<FormatDescriptor>>;

    /// 选定输出格式
    fn configure_output(&mut self, format: &FormatDescriptor) -> FeedResult<()>;

    /// 发送控制信号
    fn send_control(&mut self, signal: ControlSignal) -> FeedResult<()>;

    /// 当前是否可以接收输入
    fn input_ready(&mut self) -> FeedResult<bool>;

    /// 送入一个输入单元
    fn submit_input(&mut self, packet: &Packet<'_>) -> FeedResult<()>;

    /// 当前是否有可取出的输出
    fn output_ready(&mut self) -> FeedResult<bool>;

    /// 取出一个输出样本
    fn retrieve_output(&mut self) -> FeedResult<OutputSample>;

    /// 归还输出样本
    fn release_sample(&mut self, id: u64);

    /// 释放后端全部资源
    fn release(&mut self);
}
