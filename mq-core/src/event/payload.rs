use crate::error::{MqError, MqResult};
use crate::value_object::{PayloadId, ValueObject};
use serde::Serialize;
use serde_json::Value;

/// 事件载荷：`(id, 类型标签, 数据)`，随事件一同创建、不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    id: PayloadId,
    #[serde(rename = "type")]
    data_type: String,
    data: Value,
}

impl Payload {
    /// 仅由 `Event` 在构造时调用：载荷不能脱离事件单独存在
    pub(crate) fn new(id: PayloadId, data_type: String, data: Value) -> MqResult<Self> {
        let payload = Self {
            id,
            data_type,
            data,
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn id(&self) -> PayloadId {
        self.id
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl ValueObject for Payload {
    type Error = MqError;

    fn validate(&self) -> MqResult<()> {
        check_data_type(&self.data_type)?;
        check_data(&self.data)
    }
}

pub(crate) fn check_data_type(data_type: &str) -> MqResult<()> {
    if data_type.trim().is_empty() {
        return Err(MqError::value("dataType is invalid"));
    }
    Ok(())
}

/// 数据不可缺失：`null` 与纯空白字符串均视为缺失
pub(crate) fn check_data(data: &Value) -> MqResult<()> {
    match data {
        Value::Null => Err(MqError::value("data is invalid")),
        Value::String(s) if s.trim().is_empty() => Err(MqError::value("data is invalid")),
        _ => Ok(()),
    }
}
