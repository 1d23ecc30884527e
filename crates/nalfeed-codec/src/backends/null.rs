//! 空解码后端.
//!
//! 接受任何输入, 从不产生帧. 只统计送入的单元数和字节数,
//! 用于在没有真实解码器时演练整条送流路径.

use log::debug;
use nalfeed_core::{FeedError, FeedResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::packet::Packet;
use crate::parsers::h264::{FramingMode, NalType};
use crate::session::{ControlSignal, DecoderBackend, FormatDescriptor, OutputSample};

/// 起始码封装的空后端名称
pub const NULL_BACKEND: &str = "null";

/// 长度前缀封装的空后端名称
pub const NULL_AVCC_BACKEND: &str = "null-avcc";

/// 提供的输出像素格式, 按优先级排列
const OUTPUT_CANDIDATES: [PixelFormat; 2] = [PixelFormat::Nv12, PixelFormat::Yuv420p];

/// 空解码后端
#[derive(Debug)]
pub struct NullBackend {
    /// 注册名称
    name: &'static str,
    /// 期望的封装方式
    framing: FramingMode,
    /// 已设置的输入格式
    input: Option<FormatDescriptor>,
    /// 已选定的输出格式
    output: Option<FormatDescriptor>,
    /// 收到的控制信号
    signals: Vec<ControlSignal>,
    /// 送入的参数集数
    parameter_sets: u64,
    /// 送入的其他单元数
    units: u64,
    /// 送入的总字节数
    bytes: u64,
    /// 是否已释放
    released: bool,
}

impl NullBackend {
    /// 创建指定封装方式的空后端
    pub fn new(framing: FramingMode) -> Self {
        let name = match framing {
            FramingMode::StartCode => NULL_BACKEND,
            FramingMode::LengthPrefixed => NULL_AVCC_BACKEND,
        };
        Self {
            name,
            framing,
            input: None,
            output: None,
            signals: Vec::new(),
            parameter_sets: 0,
            units: 0,
            bytes: 0,
            released: false,
        }
    }

    /// 注册表工厂: 起始码封装
    pub fn create() -> FeedResult<Box<dyn DecoderBackend>> {
        Ok(Box::new(Self::new(FramingMode::StartCode)))
    }

    /// 注册表工厂: 长度前缀封装
    pub fn create_length_prefixed() -> FeedResult<Box<dyn DecoderBackend>> {
        Ok(Box::new(Self::new(FramingMode::LengthPrefixed)))
    }

    /// 收到的控制信号
    pub fn signals(&self) -> &[ControlSignal] {
        &self.signals
    }

    /// 送入的 (参数集数, 其他单元数, 字节数)
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.parameter_sets, self.units, self.bytes)
    }

    /// 选定的输出格式
    pub fn selected_output(&self) -> Option<&FormatDescriptor> {
        self.output.as_ref()
    }

    fn ensure_open(&self) -> FeedResult<()> {
        if self.released {
            return Err(FeedError::InvalidState("null 后端已释放".into()));
        }
        Ok(())
    }
}

impl DecoderBackend for NullBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn bitstream_format(&self) -> FramingMode {
        self.framing
    }

    fn configure_input(&mut self, format: &FormatDescriptor) -> FeedResult<()> {
        self.ensure_open()?;
        if format.codec_id != CodecId::H264 {
            return Err(FeedError::Configuration(format!(
                "null 后端只接受 H.264 输入, 收到 {}",
                format.codec_id
            )));
        }
        if format.width == 0 || format.height == 0 {
            return Err(FeedError::Configuration("宽度和高度不能为 0".into()));
        }
        self.input = Some(format.clone());
        Ok(())
    }

    fn output_format(&mut self, index: usize) -> FeedResult<Option<FormatDescriptor>> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| FeedError::Configuration("尚未设置输入格式".into()))?;
        Ok(OUTPUT_CANDIDATES.get(index).map(|&pf| FormatDescriptor {
            frame_rate: input.frame_rate,
            sample_aspect_ratio: input.sample_aspect_ratio,
            ..FormatDescriptor::raw_video(input.width, input.height, pf)
        }))
    }

    fn configure_output(&mut self, format: &FormatDescriptor) -> FeedResult<()> {
        if !OUTPUT_CANDIDATES.contains(&format.pixel_format) {
            return Err(FeedError::Configuration(format!(
                "null 后端不支持输出 {}",
                format.pixel_format
            )));
        }
        self.output = Some(format.clone());
        Ok(())
    }

    fn send_control(&mut self, signal: ControlSignal) -> FeedResult<()> {
        self.ensure_open()?;
        self.signals.push(signal);
        Ok(())
    }

    fn input_ready(&mut self) -> FeedResult<bool> {
        Ok(!self.released)
    }

    fn submit_input(&mut self, packet: &Packet<'_>) -> FeedResult<()> {
        self.ensure_open()?;
        if packet.framing != self.framing {
            return Err(FeedError::InputSubmit(format!(
                "封装方式不匹配: 期望 {}, 收到 {}",
                self.framing, packet.framing
            )));
        }
        match packet.nal_type {
            NalType::Sps | NalType::Pps => self.parameter_sets += 1,
            NalType::Slice | NalType::Other => self.units += 1,
        }
        self.bytes += packet.size() as u64;
        Ok(())
    }

    fn output_ready(&mut self) -> FeedResult<bool> {
        Ok(false)
    }

    fn retrieve_output(&mut self) -> FeedResult<OutputSample> {
        Err(FeedError::OutputRetrieve("null 后端不产生输出".into()))
    }

    fn release_sample(&mut self, _id: u64) {}

    fn release(&mut self) {
        if !self.released {
            debug!(
                "释放 {} 后端: 参数集 {}, 单元 {}, 字节 {}",
                self.name, self.parameter_sets, self.units, self.bytes
            );
        }
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_输出候选按索引枚举() {
        let mut backend = NullBackend::new(FramingMode::StartCode);
        assert!(backend.output_format(0).is_err(), "未设置输入时应报错");

        backend
            .configure_input(&FormatDescriptor::h264(640, 480))
            .unwrap();
        let first = backend.output_format(0).unwrap().unwrap();
        assert_eq!(first.pixel_format, PixelFormat::Nv12);
        assert_eq!((first.width, first.height), (640, 480));
        let second = backend.output_format(1).unwrap().unwrap();
        assert_eq!(second.pixel_format, PixelFormat::Yuv420p);
        assert!(backend.output_format(2).unwrap().is_none());
    }

    #[test]
    fn test_拒绝非h264输入() {
        let mut backend = NullBackend::new(FramingMode::StartCode);
        let format = FormatDescriptor::raw_video(640, 480, PixelFormat::Nv12);
        assert!(matches!(
            backend.configure_input(&format),
            Err(FeedError::Configuration(_))
        ));
    }

    #[test]
    fn test_统计送入数据() {
        let mut backend = NullBackend::new(FramingMode::LengthPrefixed);
        let sps = [0u8, 0, 0, 2, 0x67, 0x42];
        let idr = [0u8, 0, 0, 3, 0x65, 0x88, 0x80];
        backend
            .submit_input(&Packet::new(&sps[..], 0, NalType::Sps, FramingMode::LengthPrefixed))
            .unwrap();
        backend
            .submit_input(&Packet::new(&idr[..], 0, NalType::Slice, FramingMode::LengthPrefixed))
            .unwrap();
        assert_eq!(backend.counters(), (1, 1, 13));

        let wrong = Packet::new(&idr[..], 0, NalType::Slice, FramingMode::StartCode);
        assert!(backend.submit_input(&wrong).is_err());

        backend.release();
        assert!(!backend.input_ready().unwrap());
        assert!(backend.submit_input(&Packet::new(&sps[..], 0, NalType::Sps, FramingMode::LengthPrefixed)).is_err());
    }
}
