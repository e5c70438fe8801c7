//! 处理器变体注册表（VariantRegistry）
//!
//! 以“类型名 → 策略工厂”的显式映射取代运行时反射，
//! 宿主代码可以注册自定义投递策略，随后通过代理按类型名创建处理器。
//!
use crate::config::HandlerOptions;
use crate::error::{EntityKind, MqError, MqResult};
use crate::handler::{DeliveryPolicy, EventHandler, HandlerRef, QUEUE, QueuePolicy, TOPIC, TopicPolicy};
use crate::runtime::MqRuntime;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;

/// 策略工厂：根据处理器配置构造一个新的投递策略实例
pub type PolicyFactory =
    Arc<dyn Fn(&HandlerOptions) -> MqResult<Box<dyn DeliveryPolicy>> + Send + Sync>;

/// 变体注册表，默认包含 `topic` 与 `queue`
pub struct VariantRegistry {
    factories: DashMap<String, PolicyFactory>,
}

impl Default for VariantRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry
            .factories
            .insert(TOPIC.to_string(), Arc::new(topic_policy));
        registry
            .factories
            .insert(QUEUE.to_string(), Arc::new(queue_policy));
        registry
    }
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不含任何内置变体的注册表
    pub fn empty() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// 注册变体；类型名已存在时返回 `MqError::Duplication`
    pub fn register<F>(&self, kind: &str, factory: F) -> MqResult<()>
    where
        F: Fn(&HandlerOptions) -> MqResult<Box<dyn DeliveryPolicy>> + Send + Sync + 'static,
    {
        let key = normalize(kind)?;
        match self.factories.entry(key) {
            Entry::Occupied(e) => Err(MqError::duplication(EntityKind::Variant, e.key().clone())),
            Entry::Vacant(v) => {
                tracing::debug!(variant = %v.key(), "handler variant registered");
                v.insert(Arc::new(factory));
                Ok(())
            }
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        normalize(kind).is_ok_and(|k| self.factories.contains_key(&k))
    }

    /// 已注册的类型名（有序）
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }

    /// 按类型名构造一个新的独立处理器；未识别的类型返回 `MqError::Value`
    pub fn instantiate(
        &self,
        runtime: &MqRuntime,
        kind: &str,
        name: &str,
        options: HandlerOptions,
    ) -> MqResult<HandlerRef> {
        let key = normalize(kind)?;
        let factory = self
            .factories
            .get(&key)
            .map(|f| f.value().clone())
            .ok_or_else(|| MqError::value(format!("'{key}' is not a known event handler type")))?;

        let policy = factory(&options)?;
        EventHandler::new(runtime, name, options, policy)
    }
}

impl fmt::Debug for VariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn topic_policy(_: &HandlerOptions) -> MqResult<Box<dyn DeliveryPolicy>> {
    Ok(Box::new(TopicPolicy))
}

// 每个 Queue 持有独立的轮询下标
fn queue_policy(_: &HandlerOptions) -> MqResult<Box<dyn DeliveryPolicy>> {
    Ok(Box::new(QueuePolicy::new()))
}

fn normalize(kind: &str) -> MqResult<String> {
    let key = kind.trim().to_ascii_lowercase();
    if key.is_empty() {
        return Err(MqError::value("type is invalid"));
    }
    Ok(key)
}
