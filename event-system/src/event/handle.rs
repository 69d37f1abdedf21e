use super::data::EventData;
use super::slot::{EventCell, EventPool, EventSlot, HeapEvent};
use crate::class::EventClass;
use crate::error::{EventError, EventResult};
use std::fmt;
use std::sync::Arc;

/// 事件存储形态；收尾逻辑按形态分派，不依赖布尔标记
#[derive(Clone)]
pub(crate) enum Backing {
    /// `publish` 分配，最后一个 `Arc` 释放即归还
    Heap(Arc<HeapEvent>),
    /// `publish_static` 的调用方槽位
    Static(&'static EventSlot),
    /// IRQ 预分配池槽位
    Pool { pool: Arc<EventPool>, index: u16 },
}

impl Backing {
    pub(crate) fn cell(&self) -> &EventCell {
        match self {
            Backing::Heap(heap) => heap.cell(),
            Backing::Static(slot) => slot.cell(),
            Backing::Pool { pool, index } => pool.slot(*index).cell(),
        }
    }

    fn is_pre_allocated(&self) -> bool {
        !matches!(self, Backing::Heap(_))
    }

    fn release(self) -> EventResult<()> {
        if !self.cell().release()? {
            return Ok(());
        }
        match &self {
            Backing::Heap(_) => {}
            Backing::Static(slot) => slot.vacate(),
            Backing::Pool { pool, index } => pool.slot(*index).vacate(),
        }
        Ok(())
    }
}

/// 事件句柄
///
/// 每次投递产生一个句柄，持有恰好一份引用计数。
/// `process` 消费句柄并释放这份引用；未处理即丢弃的句柄同样会释放，
/// 因此同一句柄不可能被处理两次，也不会因遗漏处理而泄漏。
pub struct Event {
    class: EventClass,
    backing: Option<Backing>,
}

impl Event {
    pub(crate) fn new(class: EventClass, backing: Backing) -> Self {
        Self {
            class,
            backing: Some(backing),
        }
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    /// 载荷（共享数据仅克隆 `Arc`）
    pub fn data(&self) -> EventData {
        self.backing
            .as_ref()
            .map(|b| b.cell().data())
            .unwrap_or_default()
    }

    /// 当前尚未释放的引用数
    pub fn reference_count(&self) -> u32 {
        self.backing
            .as_ref()
            .map_or(0, |b| b.cell().reference_count())
    }

    /// 事件存储是否为预分配（调用方槽位或 IRQ 池）
    pub fn is_pre_allocated(&self) -> bool {
        self.backing.as_ref().is_some_and(Backing::is_pre_allocated)
    }

    /// 两个句柄是否指向同一次发布的事件
    pub fn ptr_eq(&self, other: &Event) -> bool {
        match (&self.backing, &other.backing) {
            (Some(a), Some(b)) => std::ptr::eq(a.cell(), b.cell()),
            _ => false,
        }
    }

    /// 声明本订阅者已处理完该事件
    ///
    /// 最后一位处理者执行释放回调并归还事件存储。
    pub fn process(mut self) -> EventResult<()> {
        match self.backing.take() {
            Some(backing) => backing.release(),
            None => Err(EventError::invalid("event already processed")),
        }
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        if let Some(backing) = self.backing.take() {
            tracing::debug!(class = %self.class, "event dropped without process, releasing reference");
            if let Err(err) = backing.release() {
                tracing::warn!(class = %self.class, error = %err, "failed to release dropped event");
            }
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("class", &self.class)
            .field("reference_count", &self.reference_count())
            .field("pre_allocated", &self.is_pre_allocated())
            .finish()
    }
}
