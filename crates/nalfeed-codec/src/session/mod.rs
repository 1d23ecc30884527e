//! 解码会话.
//!
//! 把扫描出的 NAL 单元按后端协议送入解码器, 并把解码帧交给 `FrameSink`.

pub mod backend;
pub mod config;
pub mod driver;
pub mod sink;

pub use backend::{ControlSignal, DecoderBackend, FormatDescriptor, OutputSample};
pub use config::{ReadinessPolicy, SessionConfig};
pub use driver::{
    DecoderSession, FeedOutcome, SessionState, SessionStats, TIMESTAMP_CLOCK_RATE, run_stream,
};
pub use sink::{CollectSink, DiscardSink, FrameSink};
