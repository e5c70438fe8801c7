//! 投递策略（DeliveryPolicy）
//!
//! 分发引擎的扩展点。引擎负责不变的生命周期（FIFO、失败回队首、计数与日志），
//! 策略只负责“何时分发、分发给谁”以及订阅者集合的约束。
//!
//! 所有钩子均有默认实现：前置钩子默认返回 `true`（放行），后置钩子默认为空操作。
//! 钩子执行期间引擎不持有任何内部锁，可以安全地回调处理器的公开方法。
//!
use super::engine::EventHandler;
use crate::error::MqResult;
use crate::event::Event;

/// 投递策略：处理器变体（Topic、Queue 或宿主自定义）的行为定义
pub trait DeliveryPolicy: Send + Sync {
    /// 变体名称，例如 `topic` / `queue`
    fn kind(&self) -> &str;

    /// 入队前检查；返回 `false` 则丢弃本次发布
    fn pre_publish(&self, _handler: &EventHandler, _event: &Event) -> bool {
        true
    }

    /// 入队后调用：通常在此安排延迟分发
    fn post_publish(&self, _handler: &EventHandler, _event: &Event) {}

    /// 出队前检查；返回 `false` 则本次接收不出队
    fn pre_dequeue(&self, _handler: &EventHandler) -> bool {
        true
    }

    /// 出队后检查（队列为空时 `event` 为 `None`）；返回 `false` 则事件放回队首
    fn post_dequeue(&self, _handler: &EventHandler, _event: Option<&Event>) -> bool {
        true
    }

    /// 调用回调前检查；返回 `false` 则事件放回队首
    fn pre_callback(&self, _handler: &EventHandler, _event: &Event) -> bool {
        true
    }

    /// 回调成功返回后调用
    fn callback_success(&self, _handler: &EventHandler, _event: &Event) {}

    /// 回调失败后、事件回队前调用；返回 `false` 则丢弃该事件（不回队、不计数）
    fn pre_callback_failed(
        &self,
        _handler: &EventHandler,
        _event: &Event,
        _error: &anyhow::Error,
    ) -> bool {
        true
    }

    /// 事件已回到队首、失败计数已增加后调用
    fn post_callback_failed(&self, _handler: &EventHandler, _event: &Event, _error: &anyhow::Error) {
    }

    /// 每次接收的最后一步，无论成功、失败、空队列或被否决
    fn post_receive(&self, _handler: &EventHandler, _failed: bool) {}

    /// 订阅前检查：返回 `Err` 拒绝并报错（如重名），`Ok(false)` 静默拒绝
    fn pre_subscribe(&self, _handler: &EventHandler, _name: &str) -> MqResult<bool> {
        Ok(true)
    }

    /// 订阅登记完成后调用
    fn post_subscribe(&self, _handler: &EventHandler, _name: &str) {}

    /// 取消订阅前检查；返回 `false` 则不移除
    fn pre_unsubscribe(&self, _handler: &EventHandler, _name: &str) -> bool {
        true
    }

    /// 取消订阅后调用，`removed` 为实际移除的登记数
    fn post_unsubscribe(&self, _handler: &EventHandler, _name: &str, _removed: usize) {}
}
