//! 分发引擎（EventHandler）
//!
//! 统一编排“发布 → 入队 → 延迟分发 → 出队 → 投递 →（成功 | 回队首重试）”：
//! - 队列 FIFO、无界；失败的事件回到队首，先于之后入队的事件重试（队头阻塞）；
//! - 回调失败不会传播给发布方，只体现为计数与一条 `warn` 日志；
//! - 没有最大重试次数与死信，持续失败的事件会无限重试；
//! - 具体何时分发、分发给谁由 [`DeliveryPolicy`] 决定。
//!
use super::policy::DeliveryPolicy;
use super::subscriber::{Callback, Subscriber};
use crate::broker::{BrokerInner, EventBroker};
use crate::config::HandlerOptions;
use crate::error::{MqError, MqResult, validate_name};
use crate::event::{Event, HandlerRefInfo, Origin};
use crate::runtime::MqRuntime;
use crate::value_object::{BrokerId, EventId, HandlerId};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

/// 处理器共享引用
pub type HandlerRef = Arc<EventHandler>;

/// 单次接收的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 回调成功，事件已出队
    Delivered(EventId),
    /// 回调失败，事件已回到队首
    Failed(EventId),
    /// 回调失败且被策略丢弃
    Discarded(EventId),
    /// 队列为空，空操作
    Empty,
    /// 被策略否决，队列保持不变
    Vetoed,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed(_) | Delivery::Discarded(_))
    }
}

/// 处理器计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandlerCounters {
    /// 累计入队数
    pub enqueued: u64,
    /// 累计成功投递数
    pub dequeued: u64,
    /// 累计投递失败次数（每次失败尝试计一次，只增不减）
    pub delivery_failed: u64,
}

/// 处理器的普通数据视图（用于日志、监控与调试）
#[derive(Debug, Clone, Serialize)]
pub struct HandlerSnapshot {
    pub id: HandlerId,
    pub name: String,
    pub kind: String,
    pub subscriber_count: usize,
    pub subscribers: Vec<String>,
    pub queue_len: usize,
    pub counters: HandlerCounters,
    pub options: HandlerOptions,
    pub broker: Option<BrokerId>,
}

#[derive(Default)]
struct HandlerState {
    queue: VecDeque<Event>,
    subscribers: Vec<Subscriber>,
    counters: HandlerCounters,
}

struct Owner {
    id: BrokerId,
    broker: Weak<BrokerInner>,
}

/// 事件处理器：持有待投递队列与订阅者列表的可寻址投递端点
pub struct EventHandler {
    id: HandlerId,
    name: String,
    options: HandlerOptions,
    runtime: MqRuntime,
    policy: Box<dyn DeliveryPolicy>,
    state: Mutex<HandlerState>,
    owner: Mutex<Option<Owner>>,
    this: Weak<EventHandler>,
}

impl EventHandler {
    /// 以指定策略创建独立（未被代理管理）的处理器
    pub fn new(
        runtime: &MqRuntime,
        name: &str,
        options: HandlerOptions,
        policy: Box<dyn DeliveryPolicy>,
    ) -> MqResult<HandlerRef> {
        let name = validate_name("name", name)?;
        let id = runtime.ids().next_handler();
        tracing::debug!(handler = %name, id = %id, kind = policy.kind(), "event handler created");

        Ok(Arc::new_cyclic(|this| Self {
            id,
            name,
            options,
            runtime: runtime.clone(),
            policy,
            state: Mutex::new(HandlerState::default()),
            owner: Mutex::new(None),
            this: this.clone(),
        }))
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        self.policy.kind()
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    pub fn runtime(&self) -> &MqRuntime {
        &self.runtime
    }

    /// 获取自身的共享引用；仅在处理器析构过程中返回 `None`
    pub fn handle(&self) -> Option<HandlerRef> {
        self.this.upgrade()
    }

    /// 在调度器的后续轮次中执行 `f`（延迟分发的统一入口）
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce(&EventHandler) + Send + 'static,
    {
        let this = self.this.clone();
        self.runtime.scheduler().schedule(move || {
            if let Some(handler) = this.upgrade() {
                f(&handler);
            }
        });
    }

    // ---- 事件 ----

    /// 创建属于本处理器的事件（事件与载荷一同构造）
    pub fn create_event(&self, name: &str, data_type: &str, data: Value) -> MqResult<Event> {
        let origin = HandlerRefInfo {
            id: self.id,
            name: self.name.clone(),
            origin: Origin::new(self.this.clone()),
        };
        Event::new(self.runtime.ids(), origin, name, data_type, data)
    }

    /// 发布事件：入队并交由策略安排延迟分发，从不同步投递
    ///
    /// 由其他处理器实例创建的事件返回 `MqError::Value`。
    pub fn publish(&self, event: Event) -> MqResult<()> {
        if !event.created_by(&self.this) {
            return Err(MqError::value(format!(
                "event {} belongs to event handler '{}', not '{}'",
                event.id(),
                event.handler_name(),
                self.name
            )));
        }

        if !self.policy.pre_publish(self, &event) {
            tracing::debug!(handler = %self.name, event = %event.id(), "publish vetoed");
            return Ok(());
        }

        let queue_len = {
            let mut state = self.state.lock();
            state.queue.push_back(event.clone());
            state.counters.enqueued += 1;
            state.queue.len()
        };
        tracing::debug!(
            handler = %self.name,
            event = %event.id(),
            name = event.name(),
            queue_len,
            "event published"
        );

        self.policy.post_publish(self, &event);
        Ok(())
    }

    /// 创建并发布事件，返回事件标识
    pub fn emit(&self, name: &str, data_type: &str, data: Value) -> MqResult<EventId> {
        let event = self.create_event(name, data_type, data)?;
        let id = event.id();
        self.publish(event)?;
        Ok(id)
    }

    /// 取出队首事件并同步交给 `callback`
    ///
    /// 队列为空时为空操作；回调失败时事件回到队首、失败计数加一并记录日志。
    /// 无论结果如何，最后都会执行策略的 `post_receive`。
    pub fn receive<F>(&self, callback: F) -> Delivery
    where
        F: FnOnce(&Event) -> anyhow::Result<()>,
    {
        let outcome = self.receive_once(callback);
        self.policy.post_receive(self, outcome.is_failed());
        outcome
    }

    fn receive_once<F>(&self, callback: F) -> Delivery
    where
        F: FnOnce(&Event) -> anyhow::Result<()>,
    {
        if !self.policy.pre_dequeue(self) {
            return Delivery::Vetoed;
        }

        let popped = self.state.lock().queue.pop_front();

        if !self.policy.post_dequeue(self, popped.as_ref()) {
            if let Some(event) = popped {
                self.state.lock().queue.push_front(event);
            }
            return Delivery::Vetoed;
        }

        let Some(event) = popped else {
            return Delivery::Empty;
        };

        if !self.policy.pre_callback(self, &event) {
            self.state.lock().queue.push_front(event);
            return Delivery::Vetoed;
        }

        match callback(&event) {
            Ok(()) => {
                self.policy.callback_success(self, &event);
                self.state.lock().counters.dequeued += 1;
                tracing::trace!(handler = %self.name, event = %event.id(), "event delivered");
                Delivery::Delivered(event.id())
            }
            Err(err) => self.delivery_failed(event, err),
        }
    }

    fn delivery_failed(&self, event: Event, err: anyhow::Error) -> Delivery {
        let id = event.id();

        if !self.policy.pre_callback_failed(self, &event, &err) {
            tracing::debug!(handler = %self.name, event = %id, "failed event discarded by policy");
            return Delivery::Discarded(id);
        }

        let failures = {
            let mut state = self.state.lock();
            state.queue.push_front(event.clone());
            state.counters.delivery_failed += 1;
            state.counters.delivery_failed
        };
        let error = format!("{err:#}");
        tracing::warn!(
            handler = %self.name,
            event = %id,
            failures,
            error = %error,
            "event delivery failed, requeued at head"
        );

        self.policy.post_callback_failed(self, &event, &err);
        Delivery::Failed(id)
    }

    // ---- 订阅 ----

    /// 登记订阅者
    pub fn subscribe<F>(&self, name: &str, callback: F) -> MqResult<()>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_with(name, Arc::new(callback))
    }

    /// 以已装箱的回调登记订阅者
    pub fn subscribe_with(&self, name: &str, callback: Callback) -> MqResult<()> {
        let name = validate_name("subscriberName", name)?;

        if !self.policy.pre_subscribe(self, &name)? {
            tracing::debug!(handler = %self.name, subscriber = %name, "subscribe vetoed");
            return Ok(());
        }

        let count = {
            let mut state = self.state.lock();
            state
                .subscribers
                .push(Subscriber::new(name.clone(), callback));
            state.subscribers.len()
        };
        tracing::debug!(handler = %self.name, subscriber = %name, count, "subscribed");

        self.policy.post_subscribe(self, &name);
        Ok(())
    }

    /// 移除所有同名订阅登记，返回移除的数量
    pub fn unsubscribe(&self, name: &str) -> MqResult<usize> {
        let name = validate_name("subscriberName", name)?;

        if !self.policy.pre_unsubscribe(self, &name) {
            return Ok(0);
        }

        let removed = {
            let mut state = self.state.lock();
            let before = state.subscribers.len();
            state.subscribers.retain(|s| s.name() != name);
            before - state.subscribers.len()
        };
        if removed > 0 {
            tracing::debug!(handler = %self.name, subscriber = %name, removed, "unsubscribed");
        }

        self.policy.post_unsubscribe(self, &name, removed);
        Ok(removed)
    }

    // ---- 查询（无副作用） ----

    pub fn has_subscribers(&self) -> bool {
        !self.state.lock().subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        let name = name.trim();
        self.state
            .lock()
            .subscribers
            .iter()
            .any(|s| s.name() == name)
    }

    /// 指定名称的全部订阅登记（按登记顺序）
    pub fn subscribers(&self, name: &str) -> Vec<Subscriber> {
        let name = name.trim();
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.name() == name)
            .cloned()
            .collect()
    }

    /// 全部订阅登记（按登记顺序）
    pub fn all_subscribers(&self) -> Vec<Subscriber> {
        self.state.lock().subscribers.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// 队首事件（下一个将被尝试投递的事件）
    pub fn peek_front(&self) -> Option<Event> {
        self.state.lock().queue.front().cloned()
    }

    pub fn counters(&self) -> HandlerCounters {
        self.state.lock().counters
    }

    pub fn enqueued_count(&self) -> u64 {
        self.counters().enqueued
    }

    pub fn dequeued_count(&self) -> u64 {
        self.counters().dequeued
    }

    pub fn delivery_failed_count(&self) -> u64 {
        self.counters().delivery_failed
    }

    pub fn snapshot(&self) -> HandlerSnapshot {
        let (subscribers, queue_len, counters) = {
            let state = self.state.lock();
            (
                state
                    .subscribers
                    .iter()
                    .map(|s| s.name().to_string())
                    .collect::<Vec<_>>(),
                state.queue.len(),
                state.counters,
            )
        };

        HandlerSnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind().to_string(),
            subscriber_count: subscribers.len(),
            subscribers,
            queue_len,
            counters,
            options: self.options.clone(),
            broker: self.owner_id(),
        }
    }

    // ---- 归属 ----

    /// 所属代理的标识
    pub fn owner_id(&self) -> Option<BrokerId> {
        self.owner.lock().as_ref().map(|o| o.id)
    }

    pub fn is_managed(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// 所属代理（代理已释放时返回 `None`）
    pub fn broker(&self) -> Option<EventBroker> {
        self.owner
            .lock()
            .as_ref()
            .and_then(|o| o.broker.upgrade())
            .map(EventBroker::from_inner)
    }

    /// 加入代理管理；已属于其他代理时返回 `MqError::IllegalOperation`
    pub fn manage(&self, broker: &EventBroker) -> MqResult<()> {
        let Some(this) = self.handle() else {
            return Err(MqError::illegal("event handler is being dropped"));
        };
        broker.add_event_handler(this)
    }

    /// 脱离代理管理；未被管理时为空操作，属于其他代理时返回 `MqError::IllegalOperation`
    pub fn unmanage(&self, broker: &EventBroker) -> MqResult<()> {
        match self.owner_id() {
            None => Ok(()),
            Some(id) if id != broker.id() => Err(MqError::illegal(format!(
                "event handler '{}' belongs to broker {}, not {}",
                self.name,
                id,
                broker.id()
            ))),
            Some(_) => {
                broker.remove_event_handler(&self.name);
                // 代理中同名条目已被替换时，仍需清除自身的归属
                self.detach_owner(broker.id());
                Ok(())
            }
        }
    }

    pub(crate) fn attach_owner(&self, id: BrokerId, broker: Weak<BrokerInner>) -> MqResult<()> {
        let mut owner = self.owner.lock();
        match owner.as_ref() {
            Some(current) if current.id != id => Err(MqError::illegal(format!(
                "event handler '{}' already belongs to broker {}",
                self.name, current.id
            ))),
            _ => {
                *owner = Some(Owner { id, broker });
                Ok(())
            }
        }
    }

    pub(crate) fn detach_owner(&self, id: BrokerId) {
        let mut owner = self.owner.lock();
        if owner.as_ref().is_some_and(|o| o.id == id) {
            *owner = None;
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("queue_len", &self.queue_len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
