//! 解码帧的消费端.

use nalfeed_core::FeedResult;

use crate::frame::VideoFrame;

/// 解码帧消费者
///
/// 帧按解码顺序逐个交付. `consume` 返回后帧对应的后端样本即被归还,
/// 需要保留数据的消费者应在返回前克隆.
pub trait FrameSink {
    /// 消费一帧
    fn consume(&mut self, frame: &VideoFrame) -> FeedResult<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&VideoFrame) -> FeedResult<()>,
{
    fn consume(&mut self, frame: &VideoFrame) -> FeedResult<()> {
        self(frame)
    }
}

/// 丢弃所有帧
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn consume(&mut self, _frame: &VideoFrame) -> FeedResult<()> {
        Ok(())
    }
}

/// 保留所有帧 (平面数据为 `Bytes`, 克隆开销小)
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    /// 已收到的帧
    pub frames: Vec<VideoFrame>,
}

impl FrameSink for CollectSink {
    fn consume(&mut self, frame: &VideoFrame) -> FeedResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}
