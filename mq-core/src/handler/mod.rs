//! 事件处理器（分发引擎与投递策略）
//!
//! - `EventHandler`：不变的投递生命周期（FIFO、失败回队首、计数、日志）；
//! - `DeliveryPolicy`：可覆写的钩子集合；
//! - `TopicPolicy`：广播，订阅者名称唯一；
//! - `QueuePolicy`：轮询点对点，订阅者名称可重复。
//!
mod engine;
mod policy;
mod queue;
mod subscriber;
mod topic;

pub use engine::{Delivery, EventHandler, HandlerCounters, HandlerRef, HandlerSnapshot};
pub use policy::DeliveryPolicy;
pub use queue::{QUEUE, QueuePolicy};
pub use subscriber::{Callback, Subscriber};
pub use topic::{TOPIC, TopicPolicy};
