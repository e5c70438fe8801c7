//! 事件（Event）与载荷（Payload）
//!
//! 两者在处理器创建事件时一同构造，之后不可变；载荷由事件独占。

mod event_record;
mod payload;

pub use event_record::{Event, HandlerRefInfo};
pub(crate) use event_record::Origin;
pub use payload::Payload;
