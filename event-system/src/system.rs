//! 事件系统（EventSystem）
//!
//! 进程级门面，编排注册表、事件存储与队列：
//! - 发布者注册/注销（每个类别独占）；
//! - 订阅/退订（按类别 + 掩码 + 队列）；
//! - 发布：在临界区内复制匹配快照，退出临界区后逐个非阻塞入队；
//! - 队列创建/删除（删除时先退订全部类别）；
//! - 监督队列（`supervisor` 特性）。
//!
//! `EventSystem` 可廉价克隆，克隆体共享同一内部状态。
//!
use crate::class::EventClass;
use crate::config::EventSystemConfig;
use crate::critical::CriticalSection;
use crate::error::{EventError, EventResult};
use crate::event::{
    Backing, Event, EventData, EventPool, EventSlot, FreeDataCallback, HeapBudget, HeapEvent,
};
use crate::publisher::{Publisher, Registration};
use crate::queue::EventQueue;
use crate::registry::{ClassSlot, Registry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(feature = "supervisor")]
use std::time::Duration;
use tracing::{debug, warn};

/// 监督队列固定使用的队列 id
#[cfg(feature = "supervisor")]
const SUPERVISOR_QUEUE_ID: u64 = 0;

static NEXT_SYSTEM_ID: AtomicU64 = AtomicU64::new(1);

/// 事件存储来源
pub(crate) enum Storage {
    Heap,
    Static(&'static EventSlot),
    Pool,
}

/// 单次发布的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) delivered: usize,
    pub(crate) dropped: usize,
}

pub(crate) struct SystemInner {
    id: u64,
    config: EventSystemConfig,
    registry: CriticalSection<Registry>,
    heap: Arc<HeapBudget>,
    live_queues: AtomicUsize,
    next_queue_id: AtomicU64,
    irq_publisher: Publisher,
    irq_pool: Arc<EventPool>,
    #[cfg(feature = "supervisor")]
    supervisor: EventQueue,
}

impl SystemInner {
    /// 移出类别槽位；返回值须在所有临界区之外丢弃
    pub(crate) fn release_class(&self, class: EventClass, token: u64) -> EventResult<ClassSlot> {
        self.registry.enter().release(class, token)
    }
}

#[derive(Clone)]
pub struct EventSystem {
    inner: Arc<SystemInner>,
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::build(EventSystemConfig::default())
    }
}

impl EventSystem {
    /// 初始化事件系统（对应一次性的全局初始化）
    pub fn init(config: EventSystemConfig) -> EventResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EventSystemConfig) -> Self {
        let id = NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed);
        let inner = SystemInner {
            id,
            registry: CriticalSection::new(Registry::new()),
            heap: Arc::new(HeapBudget::new(config.max_heap_events)),
            live_queues: AtomicUsize::new(0),
            next_queue_id: AtomicU64::new(1),
            irq_publisher: Publisher::new(),
            irq_pool: Arc::new(EventPool::new(config.irq_event_pool_size)),
            #[cfg(feature = "supervisor")]
            supervisor: EventQueue::new(
                id,
                SUPERVISOR_QUEUE_ID,
                config.supervisor_queue_capacity as usize,
            ),
            config,
        };
        debug!(config = ?inner.config, "event system initialized");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EventSystemConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // 发布者注册
    // ------------------------------------------------------------------

    /// 注册发布者；同一类别同一时刻只允许一个发布者
    pub fn publisher_register(
        &self,
        publisher: &Publisher,
        class: EventClass,
        free_cb: Option<FreeDataCallback>,
    ) -> EventResult<()> {
        let mut current = publisher.registration_slot().enter();
        if let Some(existing) = current.as_ref() {
            return Err(EventError::AlreadyRegistered {
                class: existing.class,
            });
        }

        let registration = Registration::new(class, free_cb, Arc::downgrade(&self.inner));
        self.inner
            .registry
            .enter()
            .claim(class, registration.token, self.supervisor_subscription())?;
        *current = Some(registration);

        debug!(%class, "publisher registered");
        Ok(())
    }

    /// 注销发布者；已投递未处理的事件不受影响
    pub fn publisher_unregister(&self, publisher: &Publisher) -> EventResult<()> {
        let (class, detached) = {
            let mut current = publisher.registration_slot().enter();
            let Some(registration) = current.as_ref() else {
                return Err(EventError::NotRegistered);
            };
            let class = registration.class;
            let detached = self.inner.release_class(class, registration.token)?;
            *current = None;
            (class, detached)
        };
        // 订阅者队列可能在此释放最后的事件引用，必须在临界区外
        drop(detached);

        debug!(%class, "publisher unregistered");
        Ok(())
    }

    pub fn is_registered(&self, class: EventClass) -> bool {
        self.inner.registry.enter().is_registered(class)
    }

    /// 某类别上的订阅者数量（不含监督队列）
    pub fn subscriber_count(&self, class: EventClass) -> EventResult<usize> {
        self.inner.registry.enter().subscriber_count(class)
    }

    #[cfg(feature = "supervisor")]
    fn supervisor_subscription(&self) -> Option<EventQueue> {
        Some(self.inner.supervisor.clone())
    }

    #[cfg(not(feature = "supervisor"))]
    fn supervisor_subscription(&self) -> Option<EventQueue> {
        None
    }

    // ------------------------------------------------------------------
    // 订阅
    // ------------------------------------------------------------------

    pub fn subscribe(&self, class: EventClass, event_mask: u32, queue: &EventQueue) -> EventResult<()> {
        self.check_owner(queue)?;
        let mut registry = self.inner.registry.enter();
        // 在注册表临界区内检查，与 queue_delete 的标记删除互斥
        if queue.is_deleted() {
            return Err(EventError::invalid("event queue deleted"));
        }
        registry.subscribe(class, event_mask, queue)?;
        drop(registry);

        debug!(%class, event_mask, queue = queue.id(), "queue subscribed");
        Ok(())
    }

    pub fn unsubscribe(
        &self,
        class: EventClass,
        event_mask: u32,
        queue: &EventQueue,
    ) -> EventResult<()> {
        let removed = self
            .inner
            .registry
            .enter()
            .unsubscribe(class, event_mask, queue)?;
        drop(removed);

        debug!(%class, event_mask, queue = queue.id(), "queue unsubscribed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // 发布
    // ------------------------------------------------------------------

    /// 发布事件，事件结构在堆上分配（不可在中断上下文调用）
    pub fn publish(
        &self,
        publisher: &Publisher,
        event_mask: u32,
        priority: u8,
        data: EventData,
    ) -> EventResult<()> {
        let delivery = self.deliver(publisher, event_mask, priority, data, Storage::Heap)?;
        Self::log_drops(publisher, delivery);
        Ok(())
    }

    /// 使用调用方预分配的事件发布；不分配内存，可在中断上下文调用
    pub fn publish_static(
        &self,
        publisher: &Publisher,
        event_mask: u32,
        priority: u8,
        slot: &'static EventSlot,
        data: EventData,
    ) -> EventResult<()> {
        self.deliver(publisher, event_mask, priority, data, Storage::Static(slot))
            .map(|_| ())
    }

    fn log_drops(publisher: &Publisher, delivery: Delivery) {
        if delivery.dropped > 0 {
            debug!(
                class = ?publisher.event_class(),
                delivered = delivery.delivered,
                dropped = delivery.dropped,
                "event deliveries dropped"
            );
        }
    }

    /// 发布核心流程（不记录日志、不分配快照）
    ///
    /// 1. 临界区内复制匹配的队列句柄；
    /// 2. 获取事件存储，引用计数设为快照大小；
    /// 3. 退出临界区后逐个非阻塞入队，失败的投递立即释放一份引用。
    ///
    /// 快照为空时事件立即收尾，释放回调在返回前执行。
    pub(crate) fn deliver(
        &self,
        publisher: &Publisher,
        event_mask: u32,
        priority: u8,
        data: EventData,
        storage: Storage,
    ) -> EventResult<Delivery> {
        let registration = publisher.registration().ok_or(EventError::NotRegistered)?;
        let class = registration.class;

        let snapshot =
            self.inner
                .registry
                .enter()
                .snapshot(class, registration.token, event_mask)?;

        let backing = self.acquire(storage)?;
        let refs = snapshot.len().max(1) as u32;
        backing.cell().arm(registration.free_cb, data, refs);

        if snapshot.is_empty() {
            Event::new(class, backing).process()?;
            return Ok(Delivery::default());
        }

        let mut delivery = Delivery::default();
        let mut release = Ok(());
        for queue in &snapshot {
            match queue.try_put(Event::new(class, backing.clone()), priority) {
                Ok(()) => delivery.delivered += 1,
                Err((_, rejected)) => {
                    delivery.dropped += 1;
                    // 其余队列仍要入队，错误留到最后返回
                    if let Err(err) = rejected.process() {
                        release = Err(err);
                    }
                }
            }
        }
        release.map(|()| delivery)
    }

    fn acquire(&self, storage: Storage) -> EventResult<Backing> {
        match storage {
            Storage::Heap => {
                let lease = self
                    .inner
                    .heap
                    .try_lease()
                    .ok_or_else(|| EventError::allocation("heap event budget exhausted"))?;
                Ok(Backing::Heap(Arc::new(HeapEvent::new(lease))))
            }
            Storage::Static(slot) => {
                if !slot.try_claim() {
                    return Err(EventError::invalid("pre-allocated event still in flight"));
                }
                Ok(Backing::Static(slot))
            }
            Storage::Pool => {
                let index = self
                    .inner
                    .irq_pool
                    .claim()
                    .ok_or_else(|| EventError::no_resource("irq event pool exhausted"))?;
                Ok(Backing::Pool {
                    pool: self.inner.irq_pool.clone(),
                    index,
                })
            }
        }
    }

    /// 当前存活的堆事件数
    pub fn live_heap_events(&self) -> usize {
        self.inner.heap.live()
    }

    // ------------------------------------------------------------------
    // 队列
    // ------------------------------------------------------------------

    pub fn queue_create(&self, capacity: u32) -> EventResult<EventQueue> {
        if capacity == 0 {
            return Err(EventError::invalid("event queue capacity must be > 0"));
        }
        let limit = self.inner.config.max_queues.unwrap_or(usize::MAX);
        self.inner
            .live_queues
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then(|| n + 1)
            })
            .map_err(|_| EventError::allocation("event queue limit reached"))?;

        let id = self.inner.next_queue_id.fetch_add(1, Ordering::Relaxed);
        debug!(queue = id, capacity, "event queue created");
        Ok(EventQueue::new(self.inner.id, id, capacity as usize))
    }

    fn check_owner(&self, queue: &EventQueue) -> EventResult<()> {
        if queue.owner() != self.inner.id {
            return Err(EventError::invalid("event queue belongs to another event system"));
        }
        Ok(())
    }

    /// 删除队列：先退订所有类别，再释放队列中残留的事件
    pub fn queue_delete(&self, queue: &EventQueue) -> EventResult<()> {
        self.check_owner(queue)?;
        #[cfg(feature = "supervisor")]
        {
            if *queue == self.inner.supervisor {
                return Err(EventError::invalid("supervisor queue cannot be deleted"));
            }
        }

        let removed = {
            let mut registry = self.inner.registry.enter();
            queue.mark_deleted()?;
            registry.purge_queue(queue)
        };
        self.inner.live_queues.fetch_sub(1, Ordering::AcqRel);

        let unsubscribed = removed.len();
        drop(removed);

        let pending = queue.drain();
        let pending_count = pending.len();
        for event in pending {
            if let Err(err) = event.process() {
                warn!(queue = queue.id(), error = %err, "failed to release pending event");
            }
        }

        debug!(
            queue = queue.id(),
            unsubscribed,
            released = pending_count,
            "event queue deleted"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // 监督队列
    // ------------------------------------------------------------------

    /// 从监督队列取事件，最多等待 `timeout`
    #[cfg(feature = "supervisor")]
    pub async fn supervisor_queue_get(&self, timeout: Duration) -> EventResult<(Event, u8)> {
        self.inner.supervisor.get(timeout).await
    }

    // ------------------------------------------------------------------
    // IRQ 发布者内部访问
    // ------------------------------------------------------------------

    pub(crate) fn irq_publisher(&self) -> &Publisher {
        &self.inner.irq_publisher
    }

    pub(crate) fn irq_pool(&self) -> &EventPool {
        &self.inner.irq_pool
    }
}
