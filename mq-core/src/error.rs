//! 统一错误定义
//!
//! 仅覆盖调用方可观测的编程错误（参数校验、重复注册、非法归属、缺失实体）。
//! 订阅者回调的失败不会以 `MqError` 形式返回给调用方，而是在分发引擎内部
//! 转换为“重试 + 计数 + 日志”。
//!
use std::fmt;
use thiserror::Error;

/// 错误所指向的实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Handler,
    Subscriber,
    Variant,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Handler => "event handler",
            EntityKind::Subscriber => "subscriber",
            EntityKind::Variant => "handler variant",
        };
        f.write_str(s)
    }
}

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MqError {
    /// 参数缺失或格式不合法（名称、事件、载荷、配置）
    #[error("invalid value: {reason}")]
    Value { reason: String },

    /// 名称已被占用（处理器，或唯一性策略下的订阅者）
    #[error("{kind} with name '{name}' already exists")]
    Duplication { kind: EntityKind, name: String },

    /// 非法的归属变更
    #[error("illegal operation: {reason}")]
    IllegalOperation { reason: String },

    /// 引用的实体不存在（仅严格接口会返回）
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },
}

impl MqError {
    pub fn value(reason: impl Into<String>) -> Self {
        MqError::Value {
            reason: reason.into(),
        }
    }

    pub fn duplication(kind: EntityKind, name: impl Into<String>) -> Self {
        MqError::Duplication {
            kind,
            name: name.into(),
        }
    }

    pub fn illegal(reason: impl Into<String>) -> Self {
        MqError::IllegalOperation {
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        MqError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type MqResult<T> = Result<T, MqError>;

/// 校验名称：去除首尾空白后不得为空，返回裁剪后的名称
pub(crate) fn validate_name(field: &str, value: &str) -> MqResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MqError::value(format!("{field} is invalid")));
    }
    Ok(trimmed.to_string())
}
