use super::payload::{Payload, check_data, check_data_type};
use crate::error::{MqResult, validate_name};
use crate::handler::EventHandler;
use crate::value_object::{EventId, HandlerId, IdAllocator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Weak;

/// 事件：`(id, 所属处理器, 名称, 载荷)`，构造后不可变
///
/// 所属处理器以 `(HandlerId, 名称)` 形式记录，为非拥有引用：
/// 事件不会延长处理器的生命周期。事件只能通过
/// [`EventHandler::create_event`](crate::handler::EventHandler::create_event) 创建。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: EventId,
    handler: HandlerRefInfo,
    name: String,
    payload: Payload,
    created_at: DateTime<Utc>,
}

/// 事件中记录的所属处理器信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerRefInfo {
    pub id: HandlerId,
    pub name: String,
    #[serde(skip)]
    pub(crate) origin: Origin,
}

/// 创建事件的处理器实例；`HandlerId` 只在同一运行时内唯一，跨运行时需按实例比较
#[derive(Clone, Default)]
pub(crate) struct Origin(Weak<EventHandler>);

impl Origin {
    pub(crate) fn new(handler: Weak<EventHandler>) -> Self {
        Self(handler)
    }
}

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Origin {}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Origin")
    }
}

impl Event {
    /// 先完成全部校验，再分配事件与载荷标识，避免校验失败时消耗编号
    pub(crate) fn new(
        ids: &IdAllocator,
        handler: HandlerRefInfo,
        name: &str,
        data_type: &str,
        data: Value,
    ) -> MqResult<Self> {
        let name = validate_name("eventName", name)?;
        check_data_type(data_type)?;
        check_data(&data)?;

        let id = ids.next_event();
        let payload = Payload::new(ids.next_payload(), data_type.to_string(), data)?;

        Ok(Self {
            id,
            handler,
            name,
            payload,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler.id
    }

    pub fn handler_name(&self) -> &str {
        &self.handler.name
    }

    /// 是否由指定的处理器实例创建
    pub(crate) fn created_by(&self, handler: &Weak<EventHandler>) -> bool {
        Weak::ptr_eq(&self.handler.origin.0, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    /// 转换为普通数据（用于日志与审计）
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
