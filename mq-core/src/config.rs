//! 配置
//!
//! - `HandlerOptions`：处理器构造时的开放式配置，只校验“是结构化对象”，
//!   不识别也不拒绝任何具体键；
//! - `DriverConfig`：异步驱动调度器的参数。
//!
use crate::error::{MqError, MqResult};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 处理器配置
///
/// ```
/// use mq_core::config::HandlerOptions;
/// use serde_json::json;
///
/// let opts = HandlerOptions::from_value(json!({"retention": "1h"})).unwrap();
/// assert_eq!(opts.get("retention"), Some(&json!("1h")));
/// assert!(HandlerOptions::from_value(json!([1, 2])).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerOptions(Map<String, Value>);

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从任意 JSON 值构造；`null` 视为空配置，非对象值返回 `MqError::Value`
    pub fn from_value(value: Value) -> MqResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(MqError::value("options must be a structured object")),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for HandlerOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// 异步驱动配置
#[derive(Builder, Clone, Copy, Debug)]
pub struct DriverConfig {
    /// 每轮最多执行的任务数，达到后让出 tokio 运行时
    #[builder(default = 64)]
    pub batch_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
