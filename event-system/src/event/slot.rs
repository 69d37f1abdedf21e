//! 事件存储
//!
//! - `EventCell`：引用计数 + 载荷 + 释放回调，所有存储形态共用；
//! - `HeapEvent`：`publish` 在堆上分配的事件，受 `HeapBudget` 约束；
//! - `EventSlot`：调用方预分配的事件（通常为 `static`），供 `publish_static` 使用；
//! - `EventPool`：系统持有的定长预分配池，供 IRQ 路径使用。
//!
use super::data::{EventData, FreeDataCallback};
use crate::critical::CriticalSection;
use crate::error::{EventError, EventResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

struct EventBody {
    free_cb: Option<FreeDataCallback>,
    data: EventData,
}

impl EventBody {
    const fn vacant() -> Self {
        Self {
            free_cb: None,
            data: EventData::Empty,
        }
    }
}

pub(crate) struct EventCell {
    refs: AtomicU32,
    body: CriticalSection<EventBody>,
}

impl EventCell {
    pub(crate) const fn vacant() -> Self {
        Self {
            refs: AtomicU32::new(0),
            body: CriticalSection::new(EventBody::vacant()),
        }
    }

    /// 装载载荷并设置初始引用计数；此后计数只减不增
    pub(crate) fn arm(&self, free_cb: Option<FreeDataCallback>, data: EventData, refs: u32) {
        {
            let mut body = self.body.enter();
            body.free_cb = free_cb;
            body.data = data;
        }
        self.refs.store(refs, Ordering::Release);
    }

    pub(crate) fn reference_count(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn data(&self) -> EventData {
        self.body.enter().data.clone()
    }

    /// 原子地释放一份引用；返回 `true` 表示本次释放了最后一份并已完成收尾
    pub(crate) fn release(&self) -> EventResult<bool> {
        let prev = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| EventError::invalid("event reference count underflow"))?;

        if prev == 1 {
            self.finalize();
            return Ok(true);
        }
        Ok(false)
    }

    // 回调在临界区外执行
    fn finalize(&self) {
        let (free_cb, data) = {
            let mut body = self.body.enter();
            (body.free_cb.take(), std::mem::take(&mut body.data))
        };
        if let Some(cb) = free_cb {
            cb(data);
        }
    }
}

/// 调用方预分配的事件存储
///
/// ```
/// use event_system::EventSlot;
///
/// static RADIO_READY: EventSlot = EventSlot::new();
/// assert!(!RADIO_READY.is_in_flight());
/// ```
pub struct EventSlot {
    busy: AtomicBool,
    cell: EventCell,
}

impl EventSlot {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            cell: EventCell::vacant(),
        }
    }

    /// 是否仍有订阅者未处理上一次发布的事件
    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn vacate(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub(crate) fn cell(&self) -> &EventCell {
        &self.cell
    }
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// 定长预分配事件池（IRQ 专用）
pub(crate) struct EventPool {
    slots: Box<[EventSlot]>,
}

impl EventPool {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| EventSlot::new()).collect(),
        }
    }

    /// 占用一个空闲槽位；耗时上界为池大小，不分配、不等待
    pub(crate) fn claim(&self) -> Option<u16> {
        self.slots
            .iter()
            .position(EventSlot::try_claim)
            .map(|i| i as u16)
    }

    pub(crate) fn slot(&self, index: u16) -> &EventSlot {
        &self.slots[usize::from(index)]
    }

    pub(crate) fn available(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_in_flight()).count()
    }
}

/// 堆事件配额：模拟有限的通用分配器
pub(crate) struct HeapBudget {
    live: AtomicUsize,
    limit: Option<usize>,
}

impl HeapBudget {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            live: AtomicUsize::new(0),
            limit,
        }
    }

    pub(crate) fn try_lease(self: &Arc<Self>) -> Option<HeapLease> {
        let limit = self.limit.unwrap_or(usize::MAX);
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()?;
        Some(HeapLease {
            budget: self.clone(),
        })
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

pub(crate) struct HeapLease {
    budget: Arc<HeapBudget>,
}

impl Drop for HeapLease {
    fn drop(&mut self) {
        self.budget.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// 堆上分配的事件；最后一个 `Arc` 释放时归还配额
pub(crate) struct HeapEvent {
    cell: EventCell,
    _lease: HeapLease,
}

impl HeapEvent {
    pub(crate) fn new(lease: HeapLease) -> Self {
        Self {
            cell: EventCell::vacant(),
            _lease: lease,
        }
    }

    pub(crate) fn cell(&self) -> &EventCell {
        &self.cell
    }
}
