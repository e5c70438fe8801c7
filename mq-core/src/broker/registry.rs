//! 事件代理（EventBroker）
//!
//! 维护“处理器名称 → 处理器实例”的映射：
//! - 按类型名惰性创建处理器，订阅方无需预先创建；
//! - 一个处理器同一时刻至多属于一个代理，代理与处理器双向记录归属；
//! - 查找缺失时默认静默（返回 `None` / 空操作），`require_event_handler` 为严格版本。
//!
use super::variants::VariantRegistry;
use crate::config::HandlerOptions;
use crate::error::{EntityKind, MqError, MqResult, validate_name};
use crate::event::Event;
use crate::handler::{DeliveryPolicy, HandlerRef, HandlerSnapshot, QUEUE, TOPIC};
use crate::runtime::MqRuntime;
use crate::value_object::BrokerId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub(crate) struct BrokerInner {
    id: BrokerId,
    runtime: MqRuntime,
    handlers: DashMap<String, HandlerRef>,
    variants: VariantRegistry,
}

impl Drop for BrokerInner {
    fn drop(&mut self) {
        // 代理释放后处理器恢复为未管理状态
        for entry in self.handlers.iter() {
            entry.value().detach_owner(self.id);
        }
    }
}

/// 代理的普通数据视图
#[derive(Debug, Clone, Serialize)]
pub struct BrokerSnapshot {
    pub id: BrokerId,
    pub handler_count: usize,
    pub handlers: Vec<HandlerSnapshot>,
}

/// 事件代理句柄，可廉价克隆
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<BrokerInner>,
}

impl EventBroker {
    /// 创建包含内置变体（topic、queue）的代理
    pub fn new(runtime: &MqRuntime) -> Self {
        Self::with_variants(runtime, VariantRegistry::new())
    }

    pub fn with_variants(runtime: &MqRuntime, variants: VariantRegistry) -> Self {
        let id = runtime.ids().next_broker();
        tracing::debug!(broker = %id, "event broker created");
        Self {
            inner: Arc::new(BrokerInner {
                id,
                runtime: runtime.clone(),
                handlers: DashMap::new(),
                variants,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BrokerInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> BrokerId {
        self.inner.id
    }

    pub fn runtime(&self) -> &MqRuntime {
        &self.inner.runtime
    }

    pub fn variants(&self) -> &VariantRegistry {
        &self.inner.variants
    }

    /// 注册自定义处理器变体
    pub fn register_variant<F>(&self, kind: &str, factory: F) -> MqResult<()>
    where
        F: Fn(&HandlerOptions) -> MqResult<Box<dyn DeliveryPolicy>> + Send + Sync + 'static,
    {
        self.inner.variants.register(kind, factory)
    }

    // ---- 创建与注册 ----

    /// 按类型名创建并注册处理器
    ///
    /// 同名处理器已存在时：`fail_on_existence` 为 `true` 返回 `MqError::Duplication`，
    /// 否则原样返回已有实例（不校验其类型与配置）。
    pub fn create_event_handler(
        &self,
        kind: &str,
        name: &str,
        options: HandlerOptions,
        fail_on_existence: bool,
    ) -> MqResult<HandlerRef> {
        if !self.inner.variants.contains(kind) {
            return Err(MqError::value(format!(
                "'{}' is not a known event handler type",
                kind.trim()
            )));
        }
        let name = validate_name("name", name)?;

        if let Some(existing) = self.get_event_handler(&name) {
            if fail_on_existence {
                return Err(MqError::duplication(EntityKind::Handler, name));
            }
            return Ok(existing);
        }

        let handler = self
            .inner
            .variants
            .instantiate(&self.inner.runtime, kind, &name, options)?;

        match self.add_event_handler(handler.clone()) {
            Ok(()) => Ok(handler),
            // 并发创建同名处理器时，以先注册者为准
            Err(MqError::Duplication { .. }) if !fail_on_existence => {
                self.require_event_handler(&name)
            }
            Err(err) => Err(err),
        }
    }

    /// 创建 Topic；同名处理器已存在时报错
    pub fn create_topic(&self, name: &str, options: HandlerOptions) -> MqResult<HandlerRef> {
        self.create_event_handler(TOPIC, name, options, true)
    }

    /// 创建 Queue；同名处理器已存在时报错
    pub fn create_queue(&self, name: &str, options: HandlerOptions) -> MqResult<HandlerRef> {
        self.create_event_handler(QUEUE, name, options, true)
    }

    /// 注册一个已构造的处理器
    ///
    /// - 同一实例重复注册为空操作；
    /// - 同名的其他实例已注册时返回 `MqError::Duplication`；
    /// - 处理器已属于其他代理时返回 `MqError::IllegalOperation`。
    pub fn add_event_handler(&self, handler: HandlerRef) -> MqResult<()> {
        match self.inner.handlers.entry(handler.name().to_string()) {
            Entry::Occupied(e) => {
                if Arc::ptr_eq(e.get(), &handler) {
                    return Ok(());
                }
                Err(MqError::duplication(EntityKind::Handler, e.key().clone()))
            }
            Entry::Vacant(v) => {
                handler.attach_owner(self.inner.id, Arc::downgrade(&self.inner))?;
                tracing::debug!(
                    broker = %self.inner.id,
                    handler = %v.key(),
                    kind = handler.kind(),
                    "event handler registered"
                );
                v.insert(handler);
                Ok(())
            }
        }
    }

    /// 注销处理器并清除其归属；不存在时为空操作
    pub fn remove_event_handler(&self, name: &str) -> Option<HandlerRef> {
        let (_, handler) = self.inner.handlers.remove(name.trim())?;
        handler.detach_owner(self.inner.id);
        tracing::debug!(broker = %self.inner.id, handler = %handler.name(), "event handler removed");
        Some(handler)
    }

    // ---- 查询 ----

    pub fn has_event_handler(&self, name: &str) -> bool {
        self.inner.handlers.contains_key(name.trim())
    }

    pub fn get_event_handler(&self, name: &str) -> Option<HandlerRef> {
        self.inner
            .handlers
            .get(name.trim())
            .map(|e| e.value().clone())
    }

    /// 严格查找：不存在时返回 `MqError::NotFound`
    pub fn require_event_handler(&self, name: &str) -> MqResult<HandlerRef> {
        self.get_event_handler(name)
            .ok_or_else(|| MqError::not_found(EntityKind::Handler, name.trim()))
    }

    /// 全部处理器（按创建顺序）
    pub fn event_handlers(&self) -> Vec<HandlerRef> {
        let mut handlers: Vec<HandlerRef> = self
            .inner
            .handlers
            .iter()
            .map(|e| e.value().clone())
            .collect();
        handlers.sort_by_key(|h| h.id());
        handlers
    }

    pub fn len(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.handlers.is_empty()
    }

    // ---- 订阅路由 ----

    /// 获取或惰性创建处理器后订阅，返回该处理器
    pub fn subscribe_to_event_handler<F>(
        &self,
        kind: &str,
        name: &str,
        options: HandlerOptions,
        subscriber_name: &str,
        callback: F,
    ) -> MqResult<HandlerRef>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        // 订阅者名称非法时不应留下新建的处理器
        validate_name("subscriberName", subscriber_name)?;

        let handler = self.create_event_handler(kind, name, options, false)?;
        handler.subscribe(subscriber_name, callback)?;
        Ok(handler)
    }

    /// 取消订阅；处理器不存在时为空操作，返回移除的登记数
    pub fn unsubscribe_from_event_handler(
        &self,
        name: &str,
        subscriber_name: &str,
    ) -> MqResult<usize> {
        match self.get_event_handler(name) {
            Some(handler) => handler.unsubscribe(subscriber_name),
            None => Ok(0),
        }
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        let handlers: Vec<HandlerSnapshot> =
            self.event_handlers().iter().map(|h| h.snapshot()).collect();
        BrokerSnapshot {
            id: self.inner.id,
            handler_count: handlers.len(),
            handlers,
        }
    }
}

impl fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroker")
            .field("id", &self.inner.id)
            .field("handlers", &self.len())
            .finish()
    }
}
