//! 事件代理与处理器变体注册表
//!
mod registry;
mod variants;

pub(crate) use registry::BrokerInner;
pub use registry::{BrokerSnapshot, EventBroker};
pub use variants::{PolicyFactory, VariantRegistry};
