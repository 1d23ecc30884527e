//! # nalfeed-core
//!
//! nalfeed 核心库, 提供错误类型、像素格式与有理数等基础类型.
//!
//! 上层 `nalfeed-codec` 的扫描器、会话驱动与解码后端都依赖这里的定义.

pub mod error;
pub mod pixel_format;
pub mod rational;

// 重导出常用类型
pub use error::{FeedError, FeedResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
