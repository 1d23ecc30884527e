//! 解码会话驱动.
//!
//! 状态机: `Unconfigured → Configured → Streaming → Draining → Closed`.
//!
//! 一个会话从头到尾只服务一条码流, 不可复用. 后端资源在所有退出路径上释放:
//! 正常 `close()`, 配置/启动阶段的致命错误, 以及未关闭就被丢弃的会话 (`Drop`).

use std::fmt;
use std::thread;

use log::{debug, info, trace, warn};
use nalfeed_core::{FeedError, FeedResult};

use super::backend::{ControlSignal, DecoderBackend, FormatDescriptor, OutputSample};
use super::config::SessionConfig;
use super::sink::FrameSink;
use crate::frame::VideoFrame;
use crate::packet::Packet;
use crate::parsers::h264::{NalType, NalUnit, ParameterSetCache, frame_for, scan_nal_units};

/// 时间戳时钟频率 (100ns 单位)
pub const TIMESTAMP_CLOCK_RATE: i64 = 10_000_000;

/// 排空阶段最多取出的帧数, 防止后端一直报告就绪
const MAX_DRAIN_FRAMES: usize = 4096;

/// 启动阶段的控制信号, 顺序固定
const START_SIGNALS: [ControlSignal; 3] = [
    ControlSignal::Flush,
    ControlSignal::BeginStreaming,
    ControlSignal::StartOfStream,
];

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// 尚未协商格式
    Unconfigured,
    /// 输入/输出格式已协商
    Configured,
    /// 正在送流
    Streaming,
    /// 输入结束, 正在排空
    Draining,
    /// 资源已释放
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// 会话统计, 可恢复错误在这里计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// 收到的 NAL 单元总数
    pub nal_units: u64,
    /// 收到的 SPS/PPS 数
    pub parameter_sets: u64,
    /// 单独送入后端的 SPS/PPS 数
    pub parameter_sets_submitted: u64,
    /// 送入后端的切片及其他单元数
    pub units_submitted: u64,
    /// 参数集就绪前被跳过的单元数
    pub skipped_before_ready: u64,
    /// 后端未就绪而被丢弃的单元数
    pub dropped_not_ready: u64,
    /// 送入失败数
    pub submit_errors: u64,
    /// 输出查询/获取失败数
    pub output_errors: u64,
    /// 消费端拒绝的帧数
    pub sink_errors: u64,
    /// 交付给消费端的帧数
    pub frames_delivered: u64,
    /// 空载荷或截断的单元数
    pub malformed: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nal={} ps={}/{} submitted={} skipped={} dropped={} submit_err={} output_err={} sink_err={} frames={} malformed={}",
            self.nal_units,
            self.parameter_sets_submitted,
            self.parameter_sets,
            self.units_submitted,
            self.skipped_before_ready,
            self.dropped_not_ready,
            self.submit_errors,
            self.output_errors,
            self.sink_errors,
            self.frames_delivered,
            self.malformed,
        )
    }
}

/// 单个 NAL 单元的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// 参数集已缓存, `submitted` 表示是否单独送入了后端
    ParameterSet { submitted: bool },
    /// 已送入后端, `frame_delivered` 表示随后是否取出一帧
    Submitted { frame_delivered: bool },
    /// SPS/PPS 未就绪, 跳过
    SkippedBeforeReady,
    /// 后端未就绪, 丢弃
    DroppedNotReady,
    /// 送入失败, 丢弃
    SubmitFailed,
    /// 空载荷或截断, 跳过
    Malformed,
}

/// 取出一帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetrieveOutcome {
    Delivered,
    SinkFailed,
    RetrieveFailed,
}

/// 输出样本守卫, 离开作用域时归还样本
struct SampleGuard<'a, B: DecoderBackend + ?Sized> {
    backend: &'a mut B,
    sample: OutputSample,
}

impl<B: DecoderBackend + ?Sized> SampleGuard<'_, B> {
    fn frame(&self) -> &VideoFrame {
        &self.sample.frame
    }
}

impl<B: DecoderBackend + ?Sized> Drop for SampleGuard<'_, B> {
    fn drop(&mut self) {
        trace!("归还输出样本 {}", self.sample.id);
        self.backend.release_sample(self.sample.id);
    }
}

/// 解码会话
pub struct DecoderSession<S: FrameSink> {
    backend: Box<dyn DecoderBackend>,
    sink: S,
    config: SessionConfig,
    state: SessionState,
    cache: ParameterSetCache,
    stats: SessionStats,
    output_format: Option<FormatDescriptor>,
    /// 下一帧图像的时间戳
    next_pts: i64,
    /// 当前图像的时间戳, 同一图像的后续切片沿用
    picture_pts: i64,
    frame_duration: i64,
    released: bool,
}

impl<S: FrameSink> DecoderSession<S> {
    /// 创建未配置的会话
    pub fn new(backend: Box<dyn DecoderBackend>, config: SessionConfig, sink: S) -> Self {
        let frame_duration = config
            .frame_rate
            .frame_duration(TIMESTAMP_CLOCK_RATE)
            .unwrap_or(0);
        Self {
            backend,
            sink,
            config,
            state: SessionState::Unconfigured,
            cache: ParameterSetCache::new(),
            stats: SessionStats::default(),
            output_format: None,
            next_pts: 0,
            picture_pts: 0,
            frame_duration,
            released: false,
        }
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 统计信息
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// 参数集缓存
    pub fn parameter_sets(&self) -> &ParameterSetCache {
        &self.cache
    }

    /// 协商后的输出格式
    pub fn output_format(&self) -> Option<&FormatDescriptor> {
        self.output_format.as_ref()
    }

    /// 帧消费端
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 帧消费端 (可变)
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// 后端名称
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 协商输入/输出格式: `Unconfigured → Configured`
    ///
    /// 输出候选按索引递增枚举, 直到找到期望的像素格式或枚举结束.
    /// 失败时释放后端并进入 `Closed`.
    pub fn configure(&mut self) -> FeedResult<FormatDescriptor> {
        self.expect_state(SessionState::Unconfigured, "configure")?;
        let result = self.negotiate();
        match result {
            Ok(output) => {
                info!(
                    "解码后端 {} 已配置, 输出 {}",
                    self.backend.name(),
                    output
                );
                self.output_format = Some(output.clone());
                self.state = SessionState::Configured;
                Ok(output)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn negotiate(&mut self) -> FeedResult<FormatDescriptor> {
        let mut input = self.config.input_format();
        input.framing = self.backend.bitstream_format();
        self.backend
            .configure_input(&input)
            .map_err(|e| as_configuration(format!("后端拒绝输入格式 {input}"), e))?;
        debug!("输入格式已设置: {input} ({})", input.framing);

        let wanted = self.config.output_pixel_format;
        let mut index = 0usize;
        let output = loop {
            match self.backend.output_format(index) {
                Ok(Some(candidate)) if candidate.pixel_format == wanted => break candidate,
                Ok(Some(candidate)) => {
                    trace!("跳过输出候选 #{index}: {candidate}");
                    index += 1;
                }
                Ok(None) => {
                    return Err(FeedError::Configuration(format!(
                        "未找到 {wanted} 输出格式, 共 {index} 个候选"
                    )));
                }
                Err(e) => {
                    return Err(as_configuration(format!("枚举输出格式 #{index} 失败"), e));
                }
            }
        };

        self.backend
            .configure_output(&output)
            .map_err(|e| as_configuration(format!("后端拒绝输出格式 {output}"), e))?;
        Ok(output)
    }

    /// 发送启动信号: `Configured → Streaming`
    ///
    /// 按 Flush, BeginStreaming, StartOfStream 顺序发送, 任一失败即终止会话, 不重试.
    pub fn start(&mut self) -> FeedResult<()> {
        self.expect_state(SessionState::Configured, "start")?;
        for signal in START_SIGNALS {
            if let Err(e) = self.backend.send_control(signal) {
                self.abort();
                return Err(FeedError::SessionStart(format!("{signal}: {e}")));
            }
            debug!("控制信号 {signal} 已发送");
        }
        self.state = SessionState::Streaming;
        info!("解码会话开始送流, 就绪策略 {}", self.config.readiness);
        Ok(())
    }

    /// 配置并启动
    pub fn open(&mut self) -> FeedResult<FormatDescriptor> {
        let output = self.configure()?;
        self.start()?;
        Ok(output)
    }

    /// 处理一个 NAL 单元
    ///
    /// 只有会话状态错误才返回 `Err`; 单元级失败计入统计后继续.
    pub fn feed(&mut self, buf: &[u8], nal: &NalUnit) -> FeedResult<FeedOutcome> {
        self.expect_state(SessionState::Streaming, "feed")?;
        self.stats.nal_units += 1;

        if nal.is_empty() {
            self.stats.malformed += 1;
            debug!("跳过空载荷 NAL @{}", nal.span.offset);
            return Ok(FeedOutcome::Malformed);
        }

        if nal.nal_type.is_parameter_set() {
            self.cache.observe(nal);
            self.stats.parameter_sets += 1;
            debug!(
                "{} @{} ({} 字节), 参数集就绪={}",
                nal.nal_type,
                nal.span.offset,
                nal.span.payload_len(),
                self.cache.is_ready()
            );
            if !self.submits_parameter_sets() {
                return Ok(FeedOutcome::ParameterSet { submitted: false });
            }
            if !self.wait_input_ready() {
                self.stats.dropped_not_ready += 1;
                warn!("后端未就绪, 丢弃 {} @{}", nal.nal_type, nal.span.offset);
                return Ok(FeedOutcome::ParameterSet { submitted: false });
            }
            let submitted = self.submit(buf, nal, 0);
            if submitted {
                self.stats.parameter_sets_submitted += 1;
                self.poll_output_once();
            }
            return Ok(FeedOutcome::ParameterSet { submitted });
        }

        if !self.cache.is_ready() {
            self.stats.skipped_before_ready += 1;
            debug!("SPS/PPS 未就绪, 跳过 {} @{}", nal.nal_type, nal.span.offset);
            return Ok(FeedOutcome::SkippedBeforeReady);
        }

        if !self.wait_input_ready() {
            self.stats.dropped_not_ready += 1;
            debug!("后端未就绪, 丢弃 {} @{}", nal.nal_type, nal.span.offset);
            return Ok(FeedOutcome::DroppedNotReady);
        }

        // 新图像取下一时间戳; 同一图像的后续切片沿用当前图像的时间戳;
        // SEI/AUD 等非 VCL 单元归属即将开始的图像
        let starts_picture = nal.starts_picture(buf);
        let pts = match nal.nal_type {
            NalType::Slice if !starts_picture => self.picture_pts,
            _ => self.next_pts,
        };
        if !self.submit(buf, nal, pts) {
            return Ok(FeedOutcome::SubmitFailed);
        }
        self.stats.units_submitted += 1;
        if starts_picture {
            self.picture_pts = pts;
            self.next_pts += self.frame_duration;
        }

        let frame_delivered = self.poll_output_once();
        Ok(FeedOutcome::Submitted { frame_delivered })
    }

    /// 扫描整段 Annex B 码流并逐个处理
    pub fn feed_stream(&mut self, buf: &[u8]) -> FeedResult<SessionStats> {
        for nal in scan_nal_units(buf) {
            self.feed(buf, &nal)?;
        }
        Ok(self.stats)
    }

    /// 结束会话: `Streaming → Draining → Closed`
    ///
    /// 排空失败只记录日志, 后端资源总会被释放. 对已关闭的会话重复调用无副作用.
    pub fn close(&mut self) -> FeedResult<SessionStats> {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Draining;
            self.drain();
        }
        if self.state != SessionState::Closed {
            self.abort();
            info!("解码会话结束: {}", self.stats);
        }
        Ok(self.stats)
    }

    fn drain(&mut self) {
        if let Err(e) = self.backend.send_control(ControlSignal::Drain) {
            warn!("发送 drain 失败: {e}");
            return;
        }
        for _ in 0..MAX_DRAIN_FRAMES {
            match self.backend.output_ready() {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    warn!("排空时查询输出状态失败: {e}");
                    self.stats.output_errors += 1;
                    return;
                }
            }
            if self.retrieve_one() == RetrieveOutcome::RetrieveFailed {
                return;
            }
        }
        warn!("排空超过 {MAX_DRAIN_FRAMES} 帧, 放弃剩余输出");
    }

    /// 是否单独送入参数集
    fn submits_parameter_sets(&self) -> bool {
        self.config
            .submit_parameter_sets
            .unwrap_or_else(|| self.backend.requires_parameter_sets())
    }

    /// 按后端封装送入一个单元, 按配置重试; 失败计入统计
    fn submit(&mut self, buf: &[u8], nal: &NalUnit, pts: i64) -> bool {
        let framing = self.backend.bitstream_format();
        let data = match frame_for(framing, nal.bytes(buf)) {
            Ok(data) => data,
            Err(e) => {
                warn!("NAL @{} 封装失败: {e}", nal.span.offset);
                self.stats.malformed += 1;
                return false;
            }
        };
        let packet = Packet::new(data, pts, nal.nal_type, framing);

        let attempts = self.config.max_submit_attempts.max(1);
        for attempt in 1..=attempts {
            match self.backend.submit_input(&packet) {
                Ok(()) => {
                    trace!(
                        "已送入 {} @{}, {} 字节, pts={}",
                        nal.nal_type,
                        nal.span.offset,
                        packet.size(),
                        pts
                    );
                    return true;
                }
                Err(e) => {
                    let e = as_input_submit(e);
                    warn!("送入 {} 失败 ({attempt}/{attempts}): {e}", nal.nal_type);
                }
            }
        }
        self.stats.submit_errors += 1;
        false
    }

    /// 按就绪策略等待后端可输入
    ///
    /// 两次查询之间先取走已就绪的输出, 后端输入队列满时通常需要这样才能恢复.
    fn wait_input_ready(&mut self) -> bool {
        let mut budget = self.config.readiness.start();
        while budget.take() {
            match self.backend.input_ready() {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("查询输入状态失败: {e}"),
            }
            if !budget.has_more() {
                break;
            }
            self.poll_output_once();
            if !budget.interval().is_zero() {
                thread::sleep(budget.interval());
            }
        }
        false
    }

    /// 查询一次输出, 就绪则取出恰好一帧; 不阻塞
    fn poll_output_once(&mut self) -> bool {
        match self.backend.output_ready() {
            Ok(true) => self.retrieve_one() == RetrieveOutcome::Delivered,
            Ok(false) => false,
            Err(e) => {
                warn!("查询输出状态失败: {e}");
                self.stats.output_errors += 1;
                false
            }
        }
    }

    fn retrieve_one(&mut self) -> RetrieveOutcome {
        let sample = match self.backend.retrieve_output() {
            Ok(sample) => sample,
            Err(e) => {
                let e = as_output_retrieve(e);
                warn!("{e}");
                self.stats.output_errors += 1;
                return RetrieveOutcome::RetrieveFailed;
            }
        };

        let guard = SampleGuard {
            backend: self.backend.as_mut(),
            sample,
        };
        let frame = guard.frame();
        trace!(
            "取出帧 {}x{} {} pts={}",
            frame.width,
            frame.height,
            frame.pixel_format,
            frame.pts
        );
        let result = self.sink.consume(frame);
        drop(guard);

        match result {
            Ok(()) => {
                self.stats.frames_delivered += 1;
                RetrieveOutcome::Delivered
            }
            Err(e) => {
                warn!("消费端拒绝帧: {e}");
                self.stats.sink_errors += 1;
                RetrieveOutcome::SinkFailed
            }
        }
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> FeedResult<()> {
        if self.state != expected {
            return Err(FeedError::InvalidState(format!(
                "{op} 需要 {expected} 状态, 当前为 {}",
                self.state
            )));
        }
        Ok(())
    }

    /// 释放后端并进入 `Closed`
    fn abort(&mut self) {
        if !self.released {
            debug!("释放解码后端 {}", self.backend.name());
            self.backend.release();
            self.released = true;
        }
        self.state = SessionState::Closed;
    }
}

impl<S: FrameSink> Drop for DecoderSession<S> {
    fn drop(&mut self) {
        if !self.released {
            warn!("解码会话未关闭即被丢弃, 释放后端 {}", self.backend.name());
            self.backend.release();
            self.released = true;
        }
    }
}

fn as_configuration(context: String, e: FeedError) -> FeedError {
    match e {
        FeedError::Configuration(msg) => FeedError::Configuration(format!("{context}: {msg}")),
        other => FeedError::Configuration(format!("{context}: {other}")),
    }
}

fn as_input_submit(e: FeedError) -> FeedError {
    match e {
        FeedError::InputSubmit(_) => e,
        other => FeedError::InputSubmit(other.to_string()),
    }
}

fn as_output_retrieve(e: FeedError) -> FeedError {
    match e {
        FeedError::OutputRetrieve(_) => e,
        other => FeedError::OutputRetrieve(other.to_string()),
    }
}

/// 一次性跑完整条码流: 配置、启动、送流、排空、释放
///
/// 致命错误返回前后端已被释放.
pub fn run_stream<S: FrameSink>(
    backend: Box<dyn DecoderBackend>,
    config: SessionConfig,
    sink: S,
    buf: &[u8],
) -> FeedResult<SessionStats> {
    let mut session = DecoderSession::new(backend, config, sink);
    session.open()?;
    session.feed_stream(buf)?;
    session.close()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    use nalfeed_core::PixelFormat;

    use super::*;
    use crate::parsers::h264::{FramingMode, NalType};
    use crate::session::{CollectSink, DiscardSink, ReadinessPolicy};

    const SPS: [u8; 8] = [0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F];
    const PPS: [u8; 8] = [0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80];
    const IDR: [u8; 8] = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00];
    const NON_IDR: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x02];
    /// 同一 IDR 图像的第二个切片 (first_mb_in_slice = 1)
    const IDR_SECOND_SLICE: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x65, 0x4C, 0x10];
    const SEI: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x06, 0x05, 0x01];

    fn stream(units: &[&[u8]]) -> Vec<u8> {
        units.concat()
    }

    /// 桩后端的调用记录
    #[derive(Debug, Default)]
    struct Calls {
        controls: Vec<ControlSignal>,
        submitted: Vec<(NalType, Vec<u8>, i64)>,
        released_samples: Vec<u64>,
        release_count: u32,
    }

    /// 按脚本响应的桩后端
    struct StubBackend {
        calls: Rc<RefCell<Calls>>,
        framing: FramingMode,
        candidates: Vec<PixelFormat>,
        fail_control: Option<ControlSignal>,
        input_script: VecDeque<bool>,
        submit_failures: u32,
        frame_per_slice: bool,
        hold_until_drain: bool,
        draining: bool,
        pending: VecDeque<i64>,
        next_id: u64,
    }

    impl StubBackend {
        fn new() -> (Self, Rc<RefCell<Calls>>) {
            let calls = Rc::new(RefCell::new(Calls::default()));
            let backend = Self {
                calls: Rc::clone(&calls),
                framing: FramingMode::StartCode,
                candidates: vec![PixelFormat::Yuv420p, PixelFormat::Nv12],
                fail_control: None,
                input_script: VecDeque::new(),
                submit_failures: 0,
                frame_per_slice: true,
                hold_until_drain: false,
                draining: false,
                pending: VecDeque::new(),
                next_id: 0,
            };
            (backend, calls)
        }
    }

    impl DecoderBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        fn bitstream_format(&self) -> FramingMode {
            self.framing
        }

        fn configure_input(&mut self, _format: &FormatDescriptor) -> FeedResult<()> {
            Ok(())
        }

        fn output_format(&mut self, index: usize) -> FeedResult<Option<FormatDescriptor>> {
            Ok(self
                .candidates
                .get(index)
                .map(|&pf| FormatDescriptor::raw_video(16, 16, pf)))
        }

        fn configure_output(&mut self, _format: &FormatDescriptor) -> FeedResult<()> {
            Ok(())
        }

        fn send_control(&mut self, signal: ControlSignal) -> FeedResult<()> {
            self.calls.borrow_mut().controls.push(signal);
            if self.fail_control == Some(signal) {
                return Err(FeedError::SessionStart(format!("{signal} 被拒绝")));
            }
            if signal == ControlSignal::Drain {
                self.draining = true;
            }
            Ok(())
        }

        fn input_ready(&mut self) -> FeedResult<bool> {
            Ok(self.input_script.pop_front().unwrap_or(true))
        }

        fn submit_input(&mut self, packet: &Packet<'_>) -> FeedResult<()> {
            if self.submit_failures > 0 {
                self.submit_failures -= 1;
                return Err(FeedError::InputSubmit("队列已满".into()));
            }
            self.calls.borrow_mut().submitted.push((
                packet.nal_type,
                packet.data.to_vec(),
                packet.pts,
            ));
            if self.frame_per_slice && !packet.is_parameter_set() {
                self.pending.push_back(packet.pts);
            }
            Ok(())
        }

        fn output_ready(&mut self) -> FeedResult<bool> {
            if self.hold_until_drain && !self.draining {
                return Ok(false);
            }
            Ok(!self.pending.is_empty())
        }

        fn retrieve_output(&mut self) -> FeedResult<OutputSample> {
            let pts = self
                .pending
                .pop_front()
                .ok_or_else(|| FeedError::OutputRetrieve("没有待输出帧".into()))?;
            self.next_id += 1;
            let mut frame = VideoFrame::zeroed(16, 16, PixelFormat::Nv12);
            frame.pts = pts;
            Ok(OutputSample {
                id: self.next_id,
                frame,
            })
        }

        fn release_sample(&mut self, id: u64) {
            self.calls.borrow_mut().released_samples.push(id);
        }

        fn release(&mut self) {
            self.calls.borrow_mut().release_count += 1;
        }
    }

    fn streaming_session<S: FrameSink>(
        backend: StubBackend,
        config: SessionConfig,
        sink: S,
    ) -> DecoderSession<S> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut session = DecoderSession::new(Box::new(backend), config, sink);
        session.open().unwrap();
        session
    }

    #[test]
    fn test_端到端_sps_pps_idr() {
        let (backend, calls) = StubBackend::new();
        let mut session =
            streaming_session(backend, SessionConfig::default(), CollectSink::default());
        let buf = stream(&[&SPS, &PPS, &IDR]);

        let outcomes: Vec<FeedOutcome> = scan_nal_units(&buf)
            .map(|nal| session.feed(&buf, &nal).unwrap())
            .collect();
        assert_eq!(
            outcomes,
            vec![
                FeedOutcome::ParameterSet { submitted: true },
                FeedOutcome::ParameterSet { submitted: true },
                FeedOutcome::Submitted {
                    frame_delivered: true
                },
            ]
        );
        assert_eq!(session.sink().frames.len(), 1, "应恰好交付一帧");

        let stats = session.close().unwrap();
        assert_eq!(stats.nal_units, 3);
        assert_eq!(stats.parameter_sets_submitted, 2);
        assert_eq!(stats.units_submitted, 1);
        assert_eq!(stats.frames_delivered, 1);

        let calls = calls.borrow();
        let types: Vec<NalType> = calls.submitted.iter().map(|(t, _, _)| *t).collect();
        assert_eq!(types, vec![NalType::Sps, NalType::Pps, NalType::Slice]);
        assert_eq!(calls.submitted[2].1, IDR.to_vec(), "起始码后端应收到原始字节");
        assert_eq!(calls.released_samples, vec![1]);
        assert_eq!(calls.release_count, 1);
    }

    #[test]
    fn test_启动信号顺序() {
        let (backend, calls) = StubBackend::new();
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(
            calls.borrow().controls,
            vec![
                ControlSignal::Flush,
                ControlSignal::BeginStreaming,
                ControlSignal::StartOfStream,
            ]
        );
        session.close().unwrap();
        assert_eq!(calls.borrow().controls.last(), Some(&ControlSignal::Drain));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_参数集就绪前不送切片() {
        let (backend, calls) = StubBackend::new();
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        let buf = stream(&[&IDR, &SPS, &NON_IDR, &PPS, &NON_IDR]);

        let stats = session.feed_stream(&buf).unwrap();
        assert_eq!(stats.skipped_before_ready, 2);
        assert_eq!(stats.units_submitted, 1);

        let calls = calls.borrow();
        let first_slice = calls
            .submitted
            .iter()
            .position(|(t, _, _)| *t == NalType::Slice)
            .unwrap();
        let pps = calls
            .submitted
            .iter()
            .position(|(t, _, _)| *t == NalType::Pps)
            .unwrap();
        assert!(pps < first_slice, "切片不应早于 PPS 送入");
    }

    #[test]
    fn test_长度前缀后端收到转换后的数据() {
        let (mut backend, calls) = StubBackend::new();
        backend.framing = FramingMode::LengthPrefixed;
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        let buf = stream(&[&SPS, &PPS, &IDR]);
        session.feed_stream(&buf).unwrap();
        session.close().unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.submitted[0].1, vec![0, 0, 0, 4, 0x67, 0x42, 0x00, 0x1F]);
        assert_eq!(calls.submitted[2].1, vec![0, 0, 0, 4, 0x65, 0x88, 0x84, 0x00]);
        assert_eq!(calls.submitted[0].2, 0, "参数集时间戳固定为 0");
    }

    #[test]
    fn test_配置可关闭参数集送入() {
        let (backend, calls) = StubBackend::new();
        let config = SessionConfig {
            submit_parameter_sets: Some(false),
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.parameter_sets, 2);
        assert_eq!(stats.parameter_sets_submitted, 0);
        assert_eq!(calls.borrow().submitted.len(), 1);
        assert!(session.parameter_sets().is_ready());
    }

    #[test]
    fn test_时间戳按帧率递增() {
        let (backend, calls) = StubBackend::new();
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        session
            .feed_stream(&stream(&[&SPS, &PPS, &IDR, &NON_IDR, &NON_IDR]))
            .unwrap();
        let pts: Vec<i64> = calls
            .borrow()
            .submitted
            .iter()
            .filter(|(t, _, _)| *t == NalType::Slice)
            .map(|(_, _, pts)| *pts)
            .collect();
        assert_eq!(pts, vec![0, 333_333, 666_666]);
    }

    #[test]
    fn test_多切片图像共用时间戳() {
        let (backend, calls) = StubBackend::new();
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        let stats = session
            .feed_stream(&stream(&[&SPS, &PPS, &IDR, &IDR_SECOND_SLICE, &SEI, &NON_IDR]))
            .unwrap();
        assert_eq!(stats.units_submitted, 4);

        let pts: Vec<(NalType, i64)> = calls
            .borrow()
            .submitted
            .iter()
            .filter(|(t, _, _)| !t.is_parameter_set())
            .map(|(t, _, pts)| (*t, *pts))
            .collect();
        assert_eq!(
            pts,
            vec![
                (NalType::Slice, 0),
                (NalType::Slice, 0),
                (NalType::Other, 333_333),
                (NalType::Slice, 333_333),
            ],
            "只有新图像的第一个切片推进时间戳"
        );
    }

    #[test]
    fn test_参数集同样等待后端就绪() {
        // 单次查询: 第二个 SPS 到达时后端忙, 计入未就绪丢弃而不是送入失败
        let (mut backend, calls) = StubBackend::new();
        backend.input_script = VecDeque::from([true, true, true, false]);
        let config = SessionConfig {
            readiness: ReadinessPolicy::OneShot,
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let buf = stream(&[&SPS, &PPS, &IDR, &SPS]);
        let outcomes: Vec<FeedOutcome> = scan_nal_units(&buf)
            .map(|nal| session.feed(&buf, &nal).unwrap())
            .collect();
        assert_eq!(outcomes[3], FeedOutcome::ParameterSet { submitted: false });
        let stats = session.stats();
        assert_eq!(stats.dropped_not_ready, 1);
        assert_eq!(stats.submit_errors, 0);
        assert_eq!(stats.parameter_sets_submitted, 2);
        assert_eq!(calls.borrow().submitted.len(), 3, "未就绪时不应尝试送入");

        // 有限轮询: 同样的忙碌在重试中恢复
        let (mut backend, calls) = StubBackend::new();
        backend.input_script = VecDeque::from([true, true, true, false, true]);
        let config = SessionConfig {
            readiness: ReadinessPolicy::BoundedPoll {
                attempts: 3,
                interval: Duration::ZERO,
            },
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session.feed_stream(&buf).unwrap();
        assert_eq!(stats.dropped_not_ready, 0);
        assert_eq!(stats.parameter_sets_submitted, 3);
        assert_eq!(calls.borrow().submitted.last().map(|(t, _, _)| *t), Some(NalType::Sps));
    }

    #[test]
    fn test_零超时至少查询一次() {
        let (backend, _calls) = StubBackend::new();
        let config = SessionConfig {
            readiness: ReadinessPolicy::Deadline(Duration::ZERO),
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.parameter_sets_submitted, 2);
        assert_eq!(stats.units_submitted, 1);
        assert_eq!(stats.dropped_not_ready, 0);
    }

    #[test]
    fn test_没有匹配输出格式时释放后端() {
        let (mut backend, calls) = StubBackend::new();
        backend.candidates = vec![PixelFormat::Yuv420p];
        let mut session = DecoderSession::new(Box::new(backend), SessionConfig::default(), DiscardSink);

        let err = session.configure().unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(calls.borrow().release_count, 1);

        drop(session);
        assert_eq!(calls.borrow().release_count, 1, "release 只能调用一次");
    }

    #[test]
    fn test_启动失败为致命错误() {
        let (mut backend, calls) = StubBackend::new();
        backend.fail_control = Some(ControlSignal::BeginStreaming);
        let mut session = DecoderSession::new(Box::new(backend), SessionConfig::default(), DiscardSink);

        session.configure().unwrap();
        let err = session.start().unwrap_err();
        assert!(matches!(err, FeedError::SessionStart(_)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            calls.borrow().controls,
            vec![ControlSignal::Flush, ControlSignal::BeginStreaming],
            "失败后不再发送后续信号"
        );
        assert_eq!(calls.borrow().release_count, 1);
    }

    #[test]
    fn test_状态错误() {
        let (backend, _calls) = StubBackend::new();
        let mut session = DecoderSession::new(Box::new(backend), SessionConfig::default(), DiscardSink);
        let buf = stream(&[&SPS]);
        let nal = scan_nal_units(&buf).next().unwrap();
        assert!(matches!(
            session.feed(&buf, &nal),
            Err(FeedError::InvalidState(_))
        ));
        assert!(matches!(session.start(), Err(FeedError::InvalidState(_))));
    }

    #[test]
    fn test_消费端失败仍归还样本() {
        let (backend, calls) = StubBackend::new();
        let sink = |_: &VideoFrame| -> FeedResult<()> {
            Err(FeedError::InvalidArgument("磁盘已满".into()))
        };
        let mut session = streaming_session(backend, SessionConfig::default(), sink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.sink_errors, 1);
        assert_eq!(stats.frames_delivered, 0);
        assert_eq!(calls.borrow().released_samples, vec![1]);
        session.close().unwrap();
    }

    #[test]
    fn test_有限轮询从短暂未就绪中恢复() {
        let (mut backend, _calls) = StubBackend::new();
        // SPS, PPS 就绪; IDR 前两次查询未就绪
        backend.input_script = VecDeque::from([true, true, false, false, true]);
        let config = SessionConfig {
            readiness: ReadinessPolicy::BoundedPoll {
                attempts: 4,
                interval: Duration::ZERO,
            },
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.units_submitted, 1);
        assert_eq!(stats.dropped_not_ready, 0);
    }

    #[test]
    fn test_单次查询未就绪即丢弃() {
        let (mut backend, _calls) = StubBackend::new();
        backend.input_script = VecDeque::from([true, true, true, false]);
        let config = SessionConfig {
            readiness: ReadinessPolicy::OneShot,
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session
            .feed_stream(&stream(&[&SPS, &PPS, &IDR, &NON_IDR]))
            .unwrap();
        assert_eq!(stats.dropped_not_ready, 1);
        assert_eq!(stats.units_submitted, 1);
    }

    #[test]
    fn test_送入失败按配置重试() {
        let (mut backend, _calls) = StubBackend::new();
        backend.submit_failures = 1;
        let mut session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.submit_errors, 1, "默认不重试, SPS 被丢弃");
        assert_eq!(stats.parameter_sets_submitted, 1);
        assert!(session.parameter_sets().is_ready(), "缓存不受送入失败影响");

        let (mut backend, _calls) = StubBackend::new();
        backend.submit_failures = 1;
        let config = SessionConfig {
            max_submit_attempts: 2,
            ..SessionConfig::default()
        };
        let mut session = streaming_session(backend, config, DiscardSink);
        let stats = session.feed_stream(&stream(&[&SPS, &PPS, &IDR])).unwrap();
        assert_eq!(stats.submit_errors, 0);
        assert_eq!(stats.parameter_sets_submitted, 2);
    }

    #[test]
    fn test_排空交付剩余帧() {
        let (mut backend, calls) = StubBackend::new();
        backend.hold_until_drain = true;
        let mut session =
            streaming_session(backend, SessionConfig::default(), CollectSink::default());
        session
            .feed_stream(&stream(&[&SPS, &PPS, &IDR, &NON_IDR, &NON_IDR]))
            .unwrap();
        assert!(session.sink().frames.is_empty());

        let stats = session.close().unwrap();
        assert_eq!(stats.frames_delivered, 3);
        let pts: Vec<i64> = session.sink().frames.iter().map(|f| f.pts).collect();
        assert_eq!(pts, vec![0, 333_333, 666_666]);
        assert_eq!(calls.borrow().released_samples, vec![1, 2, 3]);

        session.close().unwrap();
        assert_eq!(calls.borrow().release_count, 1, "重复 close 无副作用");
    }

    #[test]
    fn test_未关闭的会话在drop时释放() {
        let (backend, calls) = StubBackend::new();
        let session = streaming_session(backend, SessionConfig::default(), DiscardSink);
        drop(session);
        let calls = calls.borrow();
        assert_eq!(calls.release_count, 1);
        assert!(!calls.controls.contains(&ControlSignal::Drain));
    }

    #[test]
    fn test_输出格式按期望像素格式选择() {
        let (backend, _calls) = StubBackend::new();
        let config = SessionConfig {
            output_pixel_format: PixelFormat::Yuv420p,
            ..SessionConfig::default()
        };
        let mut session = DecoderSession::new(Box::new(backend), config, DiscardSink);
        let output = session.configure().unwrap();
        assert_eq!(output.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(session.output_format(), Some(&output));
        assert_eq!(session.backend_name(), "stub");
    }
}
