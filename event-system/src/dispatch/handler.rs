//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类/全部事件类别的处理逻辑与元信息（名称、关注的类别）。
//!
use crate::class::EventClass;
use crate::event::Event;
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub enum HandledClasses {
    One(EventClass),
    Many(Vec<EventClass>),
    All,
}

/// 事件处理器：处理某些类别的事件
///
/// 处理器只借用事件；事件的 `process` 由引擎在所有处理器结束后统一调用。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与统计）
    fn handler_name(&self) -> &str;
    /// 返回该处理器关注的事件类别
    fn handled_classes(&self) -> HandledClasses;
    /// 处理事件
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}
