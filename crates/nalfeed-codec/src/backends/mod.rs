//! 内置解码后端.

pub mod null;

use crate::registry::BackendRegistry;

/// 注册所有内置后端
pub fn register_all_backends(registry: &mut BackendRegistry) {
    registry.register(null::NULL_BACKEND, null::NullBackend::create);
    registry.register(null::NULL_AVCC_BACKEND, null::NullBackend::create_length_prefixed);
}
