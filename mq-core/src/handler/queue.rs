//! Queue：轮询点对点投递
//!
//! 每个事件只交给一个订阅者，订阅者按登记顺序轮流选取（名称可重复）。
//! 选中的下标只在回调成功后才提交；回调失败时下标不前进，
//! 下一次尝试仍选中同一个订阅者（轮转停在失败的订阅者上，与队头阻塞一致）。
//!
//! 分发触发点：
//! - 发布后：存在订阅者时安排一次分发；
//! - 订阅后：订阅者数量从 0 变为 1 时安排一次排空，处理无订阅者期间积压的事件；
//! - 取消订阅后：上次下标越界时重置；仍有订阅者且队列非空时安排一次排空。
//!
//! 排空持续分发直至队列为空或不再有订阅者。某次尝试失败时，排空让出本轮并
//! 重新入队自身，随后从队首继续重试；同一时刻每个 Queue 至多有一个排空在进行。
//! 订阅者持续失败时排空会一直重试（没有最大重试次数）。
//!
use super::engine::{Delivery, EventHandler, HandlerRef};
use super::policy::DeliveryPolicy;
use crate::config::HandlerOptions;
use crate::error::MqResult;
use crate::event::Event;
use crate::runtime::MqRuntime;
use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 变体名称
pub const QUEUE: &str = "queue";

/// 尚未选中过任何订阅者
const NONE_SELECTED: isize = -1;

#[derive(Debug)]
struct Rotation {
    last_index: Mutex<isize>,
    draining: AtomicBool,
}

/// 轮询策略
#[derive(Debug, Clone)]
pub struct QueuePolicy {
    rotation: Arc<Rotation>,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            rotation: Arc::new(Rotation {
                last_index: Mutex::new(NONE_SELECTED),
                draining: AtomicBool::new(false),
            }),
        }
    }
}

impl QueuePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一次成功投递的订阅者下标，`-1` 表示尚未选中
    pub fn last_subscriber_index(&self) -> isize {
        *self.rotation.last_index.lock()
    }

    /// 选取下一个订阅者下标；到达末尾时回绕到 0 并将上次下标重置为 -1
    fn next_subscriber_index(last_index: &mut isize, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let last_valid = count as isize - 1;
        if *last_index >= last_valid {
            *last_index = NONE_SELECTED;
            Some(0)
        } else {
            Some((*last_index + 1) as usize)
        }
    }

    /// 一次分发尝试：一个事件、一个订阅者
    fn dispatch(handler: &EventHandler, rotation: &Rotation) -> Delivery {
        handler.receive(|event| {
            let subscribers = handler.all_subscribers();
            let index =
                Self::next_subscriber_index(&mut rotation.last_index.lock(), subscribers.len())
                    .ok_or_else(|| anyhow!("no subscriber available"))?;

            let subscriber = &subscribers[index];
            subscriber
                .deliver(event)
                .with_context(|| format!("subscriber '{}' failed", subscriber.name()))?;

            *rotation.last_index.lock() = index as isize;
            Ok(())
        })
    }

    /// 安排一次排空；已有排空在进行时为空操作
    fn schedule_drain(handler: &EventHandler, rotation: &Arc<Rotation>) {
        if rotation.draining.swap(true, Ordering::AcqRel) {
            return;
        }
        let rotation = rotation.clone();
        handler.defer(move |h| Self::drain(h, rotation));
    }

    /// 持续分发直至队列为空或没有订阅者；失败时让出本轮后继续
    fn drain(handler: &EventHandler, rotation: Arc<Rotation>) {
        let mut delivered = 0usize;
        loop {
            match Self::dispatch(handler, &rotation) {
                Delivery::Delivered(_) => delivered += 1,
                Delivery::Discarded(_) => {}
                Delivery::Failed(_) => {
                    tracing::debug!(
                        handler = handler.name(),
                        delivered,
                        remaining = handler.queue_len(),
                        "backlog drain yielded after failure"
                    );
                    handler.defer(move |h| Self::drain(h, rotation));
                    return;
                }
                Delivery::Empty | Delivery::Vetoed => break,
            }
        }

        rotation.draining.store(false, Ordering::Release);
        tracing::debug!(
            handler = handler.name(),
            delivered,
            remaining = handler.queue_len(),
            "backlog drained"
        );

        // 结束前有事件在无排空期间到达
        if handler.has_subscribers() && !handler.is_queue_empty() {
            Self::schedule_drain(handler, &rotation);
        }
    }
}

impl DeliveryPolicy for QueuePolicy {
    fn kind(&self) -> &str {
        QUEUE
    }

    fn post_publish(&self, handler: &EventHandler, _event: &Event) {
        if !handler.has_subscribers() {
            return;
        }
        let rotation = self.rotation.clone();
        handler.defer(move |h| {
            Self::dispatch(h, &rotation);
        });
    }

    fn pre_dequeue(&self, handler: &EventHandler) -> bool {
        handler.has_subscribers()
    }

    fn post_subscribe(&self, handler: &EventHandler, _name: &str) {
        if handler.subscriber_count() == 1 {
            Self::schedule_drain(handler, &self.rotation);
        }
    }

    fn post_unsubscribe(&self, handler: &EventHandler, _name: &str, removed: usize) {
        let last_valid = handler.subscriber_count() as isize - 1;
        {
            let mut last_index = self.rotation.last_index.lock();
            if *last_index >= last_valid {
                *last_index = NONE_SELECTED;
            }
        }

        if removed > 0 && handler.has_subscribers() && !handler.is_queue_empty() {
            Self::schedule_drain(handler, &self.rotation);
        }
    }
}

impl EventHandler {
    /// 创建独立的 Queue
    pub fn queue(runtime: &MqRuntime, name: &str, options: HandlerOptions) -> MqResult<HandlerRef> {
        Self::new(runtime, name, options, Box::new(QueuePolicy::new()))
    }
}
