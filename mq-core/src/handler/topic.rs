//! Topic：广播投递
//!
//! 每次发布安排一次延迟接收；取出的事件按登记顺序交给当前全部订阅者。
//! 任一订阅者失败即视为整次投递失败，事件整体重试，已成功的订阅者会再次收到。
//! 订阅者名称唯一。
//! Topic 不为将来的订阅者缓存事件：没有订阅者时取出的事件直接被消费，并计入出队数。
//!
use super::engine::{EventHandler, HandlerRef};
use super::policy::DeliveryPolicy;
use crate::config::HandlerOptions;
use crate::error::{EntityKind, MqError, MqResult};
use crate::event::Event;
use crate::runtime::MqRuntime;
use anyhow::Context;

/// 变体名称
pub const TOPIC: &str = "topic";

/// 广播策略
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicPolicy;

impl TopicPolicy {
    /// 按登记顺序投递给当前全部订阅者，遇到第一个失败即停止
    fn broadcast(handler: &EventHandler, event: &Event) -> anyhow::Result<()> {
        for subscriber in handler.all_subscribers() {
            subscriber
                .deliver(event)
                .with_context(|| format!("subscriber '{}' failed", subscriber.name()))?;
        }
        Ok(())
    }
}

impl DeliveryPolicy for TopicPolicy {
    fn kind(&self) -> &str {
        TOPIC
    }

    fn post_publish(&self, handler: &EventHandler, _event: &Event) {
        handler.defer(|h| {
            h.receive(|event| Self::broadcast(h, event));
        });
    }

    fn pre_subscribe(&self, handler: &EventHandler, name: &str) -> MqResult<bool> {
        if handler.is_subscribed(name) {
            return Err(MqError::duplication(EntityKind::Subscriber, name));
        }
        Ok(true)
    }
}

impl EventHandler {
    /// 创建独立的 Topic
    pub fn topic(runtime: &MqRuntime, name: &str, options: HandlerOptions) -> MqResult<HandlerRef> {
        Self::new(runtime, name, options, Box::new(TopicPolicy))
    }
}
