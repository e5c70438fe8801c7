//! 进程内消息代理（mq-core）
//!
//! 提供两种事件分发语义与一个按名称路由的代理：
//! - `Topic`：广播，每个事件交给当前全部订阅者；
//! - `Queue`：轮询点对点，每个事件只交给一个订阅者；
//! - `EventBroker`：按名称管理处理器，订阅时可惰性创建。
//!
//! 投递为“至少一次”：回调失败时事件放回队首并在下一次触发时重试，
//! 失败会被计数并以 `tracing` 记录，不会作为错误返回给发布方。
//! 所有分发都经由显式的 `Scheduler` 延迟执行，测试中可手动步进，
//! 运行时中可通过 `Scheduler::spawn_driver` 在 tokio 上自动排空。
//!
//! 典型用法：
//! 1. 创建 `MqRuntime`，基于它创建 `EventBroker`；
//! 2. 通过 `subscribe_to_event_handler` 订阅（处理器不存在时自动创建）；
//! 3. 取得处理器后 `emit` / `publish` 事件；
//! 4. 驱动调度器（`run_until_idle` 或 `spawn_driver`）完成投递。
//!
pub mod broker;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod runtime;
pub mod scheduler;
pub mod value_object;

pub use broker::{BrokerSnapshot, EventBroker, VariantRegistry};
pub use config::{DriverConfig, HandlerOptions};
pub use error::{EntityKind, MqError, MqResult};
pub use event::{Event, Payload};
pub use handler::{
    Delivery, DeliveryPolicy, EventHandler, HandlerCounters, HandlerRef, HandlerSnapshot, QUEUE,
    TOPIC,
};
pub use runtime::MqRuntime;
pub use scheduler::Scheduler;
#[cfg(feature = "driver")]
pub use scheduler::DriverHandle;
pub use value_object::{BrokerId, EventId, HandlerId, PayloadId};
