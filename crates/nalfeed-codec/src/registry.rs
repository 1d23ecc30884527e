//! 解码后端注册表.
//!
//! 按名称查找并实例化解码后端, 同名后注册者覆盖先注册者.

use std::collections::BTreeMap;

use nalfeed_core::{FeedError, FeedResult};

use crate::session::DecoderBackend;

/// 后端工厂函数类型
pub type BackendFactory = fn() -> FeedResult<Box<dyn DecoderBackend>>;

/// 解码后端注册表
#[derive(Default)]
pub struct BackendRegistry {
    /// 名称 → 工厂函数
    backends: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个后端
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) {
        let name = name.into();
        if self.backends.insert(name.clone(), factory).is_some() {
            log::debug!("后端 {name} 被重新注册");
        }
    }

    /// 按名称创建后端实例
    pub fn create(&self, name: &str) -> FeedResult<Box<dyn DecoderBackend>> {
        let factory = self.backends.get(name).ok_or_else(|| {
            FeedError::BackendNotFound(format!(
                "未找到后端 {name}, 可用: {}",
                self.names().join(", ")
            ))
        })?;
        factory()
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// 已注册的后端名称 (按字母序)
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }
}
