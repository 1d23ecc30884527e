//! # nalfeed-codec
//!
//! H.264 Annex B 码流解析与解码会话驱动.
//!
//! - `parsers::h264`: 起始码扫描, NAL 分类, 封装转换, 参数集缓存
//! - `session`: 解码后端协议与会话状态机
//! - `registry` / `backends`: 按名称创建解码后端
//!
//! ## 使用示例
//!
//! ```rust
//! use nalfeed_codec::session::{CollectSink, DecoderSession, SessionConfig};
//! use nalfeed_codec::BackendRegistry;
//!
//! let mut reg = BackendRegistry::new();
//! nalfeed_codec::register_all(&mut reg);
//!
//! let backend = reg.create("null").unwrap();
//! let mut session = DecoderSession::new(backend, SessionConfig::default(), CollectSink::default());
//! session.open().unwrap();
//! let stream = [0u8, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x68, 0xCE, 0, 0, 0, 1, 0x65, 0x88];
//! let stats = session.feed_stream(&stream).unwrap();
//! assert_eq!(stats.units_submitted, 1);
//! session.close().unwrap();
//! ```

pub mod backends;
pub mod codec_id;
pub mod frame;
pub mod packet;
pub mod parsers;
pub mod registry;
pub mod session;

// 重导出常用类型
pub use codec_id::CodecId;
pub use frame::VideoFrame;
pub use packet::Packet;
pub use registry::BackendRegistry;
pub use session::{DecoderBackend, DecoderSession, SessionConfig, SessionStats};

/// 注册所有内置解码后端
pub fn register_all(registry: &mut BackendRegistry) {
    backends::register_all_backends(registry);
}
