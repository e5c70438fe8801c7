//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象：强类型的数值标识，以及分配这些标识的 `IdAllocator`。
//!

use mq_macros::identifier;
use std::sync::atomic::{AtomicU64, Ordering};

/// 值对象抽象
pub trait ValueObject {
    /// 校验失败时的错误类型
    type Error;

    /// 创建值对象时进行验证
    fn validate(&self) -> Result<(), Self::Error>;
}

/// 事件标识
#[identifier(prefix = "evt")]
pub struct EventId(u64);

/// 载荷标识
#[identifier(prefix = "pld")]
pub struct PayloadId(u64);

/// 事件处理器（Topic / Queue）标识
#[identifier(prefix = "hdl")]
pub struct HandlerId(u64);

/// 事件代理标识
#[identifier(prefix = "brk")]
pub struct BrokerId(u64);

/// 标识分配器
///
/// 四类标识各自独立、从 1 开始单调递增；同一分配器内唯一。
/// 分配器由 [`MqRuntime`](crate::runtime::MqRuntime) 持有并共享，不存在进程级全局计数器，
/// 测试中可以为每个用例创建独立的分配器以获得确定的编号。
///
/// # 示例
///
/// ```
/// use mq_core::value_object::IdAllocator;
///
/// let ids = IdAllocator::new();
/// assert_eq!(ids.next_event().value(), 1);
/// assert_eq!(ids.next_event().value(), 2);
/// assert_eq!(ids.next_handler().value(), 1);
/// ```
#[derive(Debug, Default)]
pub struct IdAllocator {
    events: AtomicU64,
    payloads: AtomicU64,
    handlers: AtomicU64,
    brokers: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_event(&self) -> EventId {
        EventId::new(Self::bump(&self.events))
    }

    pub fn next_payload(&self) -> PayloadId {
        PayloadId::new(Self::bump(&self.payloads))
    }

    pub fn next_handler(&self) -> HandlerId {
        HandlerId::new(Self::bump(&self.handlers))
    }

    pub fn next_broker(&self) -> BrokerId {
        BrokerId::new(Self::bump(&self.brokers))
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
