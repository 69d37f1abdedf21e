//! 事件队列（EventQueue）
//!
//! 每个订阅者一条有界、支持优先级的队列，保存事件句柄：
//! - `try_put`：非阻塞入队，供发布路径（含 IRQ）使用，满则立即失败；
//! - `get`/`recv`：异步出队，可设超时；
//! - `count`：非阻塞的待处理深度快照，供消费者做背压决策；
//! - `into_stream`：以 `Stream` 形式消费。
//!
//! 出队顺序：优先级高者先出，同优先级 FIFO。
//! 队列只拥有槽位，事件的所有权由引用计数共享。
//!
use crate::critical::CriticalSection;
use crate::error::{EventError, EventResult};
use crate::event::Event;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Entry {
    priority: u8,
    event: Event,
}

struct QueueState {
    items: VecDeque<Entry>,
    deleted: bool,
}

struct QueueInner {
    owner: u64,
    id: u64,
    capacity: usize,
    state: CriticalSection<QueueState>,
    readable: Notify,
}

/// 事件队列句柄，克隆后指向同一队列
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

impl EventQueue {
    pub(crate) fn new(owner: u64, id: u64, capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                owner,
                id,
                capacity,
                // 槽位一次性分配，入队路径不再分配
                state: CriticalSection::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    deleted: false,
                }),
                readable: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// 创建该队列的事件系统 id
    pub(crate) fn owner(&self) -> u64 {
        self.inner.owner
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// 当前待处理事件数（非阻塞快照）
    pub fn count(&self) -> usize {
        self.inner.state.enter().items.len()
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.state.enter().deleted
    }

    /// 非阻塞入队；失败时交还事件，由调用方释放其引用
    pub(crate) fn try_put(&self, event: Event, priority: u8) -> Result<(), (EventError, Event)> {
        {
            let mut state = self.inner.state.enter();
            if state.deleted {
                return Err((EventError::invalid("event queue deleted"), event));
            }
            if state.items.len() >= self.inner.capacity {
                return Err((EventError::Full, event));
            }
            let at = state
                .items
                .iter()
                .position(|e| e.priority < priority)
                .unwrap_or(state.items.len());
            state.items.insert(at, Entry { priority, event });
        }
        self.inner.readable.notify_one();
        Ok(())
    }

    /// 非阻塞出队；队列为空返回 `Timeout`
    pub fn try_get(&self) -> EventResult<(Event, u8)> {
        let mut state = self.inner.state.enter();
        if state.deleted {
            return Err(EventError::invalid("event queue deleted"));
        }
        state
            .items
            .pop_front()
            .map(|e| (e.event, e.priority))
            .ok_or(EventError::Timeout)
    }

    /// 出队，最多等待 `timeout`；超时返回 `Timeout`
    pub async fn get(&self, timeout: Duration) -> EventResult<(Event, u8)> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| EventError::Timeout)?
    }

    /// 出队，无限等待；队列被删除时返回错误
    pub async fn recv(&self) -> EventResult<(Event, u8)> {
        loop {
            // 先登记再检查，避免错过检查与等待之间的通知
            let notified = self.inner.readable.notified();
            match self.try_get() {
                Err(EventError::Timeout) => notified.await,
                other => return other,
            }
        }
    }

    /// 以流的形式消费队列；队列删除后流结束
    pub fn into_stream(self) -> BoxStream<'static, (Event, u8)> {
        futures_util::stream::unfold(self, |queue| async move {
            let item = queue.recv().await.ok()?;
            Some((item, queue))
        })
        .boxed()
    }

    /// 标记删除；重复删除返回错误
    pub(crate) fn mark_deleted(&self) -> EventResult<()> {
        let mut state = self.inner.state.enter();
        if state.deleted {
            return Err(EventError::invalid("event queue already deleted"));
        }
        state.deleted = true;
        Ok(())
    }

    /// 取出残留事件并唤醒所有等待者
    pub(crate) fn drain(&self) -> Vec<Event> {
        let drained: Vec<Event> = {
            let mut state = self.inner.state.enter();
            state.items.drain(..).map(|e| e.event).collect()
        };
        self.inner.readable.notify_waiters();
        drained
    }
}

impl PartialEq for EventQueue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EventQueue {}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}
