//! 事件系统配置
//!
//! 支持 builder 构建或从 JSON 反序列化，未给出的字段取默认值。
//!
use crate::error::{EventError, EventResult};
use bon::Builder;
use serde::Deserialize;

/// 事件系统配置
#[derive(Builder, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventSystemConfig {
    /// 监督队列容量（仅 `supervisor` 特性下生效）
    #[builder(default = 32)]
    pub supervisor_queue_capacity: u32,
    /// IRQ 预分配事件池大小
    #[builder(default = 8)]
    pub irq_event_pool_size: usize,
    /// IRQ 事件入队优先级
    #[builder(default)]
    pub irq_priority: u8,
    /// 同时存活的堆事件上限，`None` 表示不限制
    pub max_heap_events: Option<usize>,
    /// 同时存活的事件队列上限，`None` 表示不限制
    pub max_queues: Option<usize>,
}

impl Default for EventSystemConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EventSystemConfig {
    pub fn from_json(raw: &str) -> EventResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EventResult<()> {
        if self.supervisor_queue_capacity == 0 {
            return Err(EventError::invalid("supervisor_queue_capacity must be > 0"));
        }
        if self.irq_event_pool_size > usize::from(u16::MAX) {
            return Err(EventError::invalid("irq_event_pool_size exceeds u16::MAX"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EventSystemConfig::default();
        assert_eq!(c.supervisor_queue_capacity, 32);
        assert_eq!(c.irq_event_pool_size, 8);
        assert_eq!(c.irq_priority, 0);
        assert!(c.max_heap_events.is_none());
        assert!(c.max_queues.is_none());
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let c = EventSystemConfig::from_json(r#"{"irq_event_pool_size": 2, "max_queues": 4}"#)
            .unwrap();
        assert_eq!(c.irq_event_pool_size, 2);
        assert_eq!(c.max_queues, Some(4));
        assert_eq!(c.supervisor_queue_capacity, 32);
    }

    #[test]
    fn from_json_rejects_zero_supervisor_capacity() {
        let err = EventSystemConfig::from_json(r#"{"supervisor_queue_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, EventError::InvalidParameter { .. }));
    }

    #[test]
    fn from_json_reports_malformed_input() {
        let err = EventSystemConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, EventError::Config { .. }));
    }
}
