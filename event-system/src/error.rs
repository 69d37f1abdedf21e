//! 事件系统统一错误定义
//!
//! 覆盖发布者注册、订阅、事件分配、队列投递与 IRQ 预分配池等最小必要集合，
//! 所有操作均以 `EventResult` 返回，不存在 panic/abort 路径。
//! 原因字段使用 `Cow<'static, str>`，静态原因不分配，IRQ 路径的错误返回同样无堆分配。
//!
use crate::class::EventClass;
use std::borrow::Cow;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    // --- 发布者注册 ---
    #[error("publisher already registered: class={class}")]
    AlreadyRegistered { class: EventClass },
    #[error("publisher not registered")]
    NotRegistered,

    // --- 订阅 ---
    #[error("subscription not found")]
    NotFound,

    // --- 参数/资源 ---
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: Cow<'static, str> },
    #[error("allocation failed: {reason}")]
    AllocationFailed { reason: Cow<'static, str> },
    #[error("no more resource: {reason}")]
    NoMoreResource { reason: Cow<'static, str> },

    // --- 队列 ---
    #[error("event queue full")]
    Full,
    #[error("timed out waiting for event")]
    Timeout,

    // --- 配置 ---
    #[error("config error: {source}")]
    Config {
        #[from]
        source: serde_json::Error,
    },
}

impl EventError {
    pub fn invalid(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub fn allocation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::AllocationFailed {
            reason: reason.into(),
        }
    }

    pub fn no_resource(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::NoMoreResource {
            reason: reason.into(),
        }
    }

    /// 稳定的数值状态码，供 C 接口边界使用（0 保留给成功）
    pub fn status(&self) -> u32 {
        match self {
            Self::AlreadyRegistered { .. } => 0x0001,
            Self::NotRegistered => 0x0002,
            Self::NotFound => 0x0003,
            Self::InvalidParameter { .. } => 0x0004,
            Self::AllocationFailed { .. } => 0x0005,
            Self::NoMoreResource { .. } => 0x0006,
            Self::Full => 0x0007,
            Self::Timeout => 0x0008,
            Self::Config { .. } => 0x0009,
        }
    }
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_nonzero() {
        let errors = [
            EventError::AlreadyRegistered {
                class: EventClass::Zigbee,
            },
            EventError::NotRegistered,
            EventError::NotFound,
            EventError::invalid("x"),
            EventError::allocation("x"),
            EventError::no_resource("x"),
            EventError::Full,
            EventError::Timeout,
        ];
        let mut codes: Vec<u32> = errors.iter().map(EventError::status).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn display_carries_context() {
        let err = EventError::AlreadyRegistered {
            class: EventClass::Bluetooth,
        };
        assert_eq!(err.to_string(), "publisher already registered: class=bluetooth");
        assert_eq!(
            EventError::invalid("zero capacity").to_string(),
            "invalid parameter: zero capacity"
        );
    }
}
