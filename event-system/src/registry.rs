//! 发布者注册表
//!
//! 以事件类别为下标的定长槽位表，每个槽位保存当前发布者的 token 与订阅者列表。
//! 订阅者列表为定长容器，订阅与发布快照均不分配内存。
//! 注册表整体由 `EventSystem` 的临界区保护。
//!
use crate::class::EventClass;
use crate::error::{EventError, EventResult};
use crate::queue::EventQueue;
use heapless::Vec as FixedVec;

/// 每个类别可挂载的订阅者上限（不含监督队列）
pub const MAX_SUBSCRIBERS_PER_CLASS: usize = 32;

/// 监督队列使用的全位掩码
pub const ALL_EVENTS: u32 = u32::MAX;

const SNAPSHOT_CAPACITY: usize = MAX_SUBSCRIBERS_PER_CLASS + 1;

// 快照必须容纳全部订阅者与监督队列
const _: () = assert!(SNAPSHOT_CAPACITY > MAX_SUBSCRIBERS_PER_CLASS);

/// 发布时的匹配快照：订阅者队列 + 可选的监督队列
pub(crate) type Snapshot = FixedVec<EventQueue, SNAPSHOT_CAPACITY>;

struct Subscriber {
    event_mask: u32,
    queue: EventQueue,
}

/// 类别槽位；从注册表移出后须在临界区外丢弃，
/// 其中的队列句柄可能是最后一份引用，丢弃时会执行释放回调
pub(crate) struct ClassSlot {
    token: u64,
    subscribers: FixedVec<Subscriber, MAX_SUBSCRIBERS_PER_CLASS>,
    supervisor: Option<EventQueue>,
}

#[derive(Default)]
pub(crate) struct Registry {
    slots: [Option<ClassSlot>; EventClass::COUNT],
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claim(
        &mut self,
        class: EventClass,
        token: u64,
        supervisor: Option<EventQueue>,
    ) -> EventResult<()> {
        let slot = &mut self.slots[class.index()];
        if slot.is_some() {
            return Err(EventError::AlreadyRegistered { class });
        }
        *slot = Some(ClassSlot {
            token,
            subscribers: FixedVec::new(),
            supervisor,
        });
        Ok(())
    }

    /// 移出类别槽位；token 不匹配说明发布者属于其他事件系统
    pub(crate) fn release(&mut self, class: EventClass, token: u64) -> EventResult<ClassSlot> {
        self.slots[class.index()]
            .take_if(|s| s.token == token)
            .ok_or(EventError::NotRegistered)
    }

    pub(crate) fn is_registered(&self, class: EventClass) -> bool {
        self.slots[class.index()].is_some()
    }

    pub(crate) fn subscriber_count(&self, class: EventClass) -> EventResult<usize> {
        Ok(self.slot(class)?.subscribers.len())
    }

    pub(crate) fn subscribe(
        &mut self,
        class: EventClass,
        event_mask: u32,
        queue: &EventQueue,
    ) -> EventResult<()> {
        let slot = self.slot_mut(class)?;
        slot.subscribers
            .push(Subscriber {
                event_mask,
                queue: queue.clone(),
            })
            .map_err(|_| {
                EventError::no_resource(format!("subscriber list of class {class} is full"))
            })
    }

    /// 移除队列与掩码完全一致的订阅，交还被移除的队列句柄
    pub(crate) fn unsubscribe(
        &mut self,
        class: EventClass,
        event_mask: u32,
        queue: &EventQueue,
    ) -> EventResult<EventQueue> {
        let slot = self.slot_mut(class)?;
        let at = slot
            .subscribers
            .iter()
            .position(|s| s.event_mask == event_mask && s.queue == *queue)
            .ok_or(EventError::NotFound)?;
        Ok(slot.subscribers.remove(at).queue)
    }

    /// 移除所有类别中引用该队列的订阅，交还被移除的队列句柄
    pub(crate) fn purge_queue(&mut self, queue: &EventQueue) -> Vec<EventQueue> {
        let mut removed = Vec::new();
        for slot in self.slots.iter_mut().flatten() {
            let mut at = 0;
            while at < slot.subscribers.len() {
                if slot.subscribers[at].queue == *queue {
                    removed.push(slot.subscribers.remove(at).queue);
                } else {
                    at += 1;
                }
            }
        }
        removed
    }

    /// 计算匹配集合：`subscriber.mask & mask != 0`，按列表顺序
    pub(crate) fn snapshot(
        &self,
        class: EventClass,
        token: u64,
        event_mask: u32,
    ) -> EventResult<Snapshot> {
        let slot = self.slot(class)?;
        if slot.token != token {
            return Err(EventError::NotRegistered);
        }

        let mut matched = Snapshot::new();
        let supervisor = slot
            .supervisor
            .iter()
            .filter(|_| ALL_EVENTS & event_mask != 0);
        let subscribers = slot
            .subscribers
            .iter()
            .filter(|s| s.event_mask & event_mask != 0)
            .map(|s| &s.queue);
        for queue in subscribers.chain(supervisor) {
            let pushed = matched.push(queue.clone());
            debug_assert!(pushed.is_ok(), "snapshot overflow");
        }
        Ok(matched)
    }

    fn slot(&self, class: EventClass) -> EventResult<&ClassSlot> {
        self.slots[class.index()]
            .as_ref()
            .ok_or(EventError::NotRegistered)
    }

    fn slot_mut(&mut self, class: EventClass) -> EventResult<&mut ClassSlot> {
        self.slots[class.index()]
            .as_mut()
            .ok_or(EventError::NotRegistered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(snapshot: &Snapshot) -> Vec<u64> {
        snapshot.iter().map(EventQueue::id).collect()
    }

    #[test]
    fn claim_is_exclusive_per_class() {
        let mut reg = Registry::new();
        reg.claim(EventClass::Zigbee, 1, None).unwrap();
        let err = reg.claim(EventClass::Zigbee, 2, None).unwrap_err();
        assert!(matches!(
            err,
            EventError::AlreadyRegistered {
                class: EventClass::Zigbee
            }
        ));
        reg.claim(EventClass::Bluetooth, 2, None).unwrap();

        assert!(matches!(
            reg.release(EventClass::Zigbee, 99),
            Err(EventError::NotRegistered)
        ));
        reg.release(EventClass::Zigbee, 1).unwrap();
        reg.claim(EventClass::Zigbee, 3, None).unwrap();
    }

    #[test]
    fn snapshot_matches_by_mask_in_list_order() {
        let mut reg = Registry::new();
        let a = EventQueue::new(0, 1, 4);
        let b = EventQueue::new(0, 2, 4);
        let c = EventQueue::new(0, 3, 4);
        reg.claim(EventClass::Zigbee, 7, None).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x1, &a).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x2, &b).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x4, &c).unwrap();

        assert_eq!(ids(&reg.snapshot(EventClass::Zigbee, 7, 0x3).unwrap()), vec![1, 2]);
        assert_eq!(ids(&reg.snapshot(EventClass::Zigbee, 7, 0x4).unwrap()), vec![3]);
        assert!(reg.snapshot(EventClass::Zigbee, 7, 0x8).unwrap().is_empty());
        assert!(matches!(
            reg.snapshot(EventClass::Zigbee, 8, 0x1),
            Err(EventError::NotRegistered)
        ));
    }

    #[test]
    fn supervisor_matches_any_nonzero_mask_last() {
        let mut reg = Registry::new();
        let sup = EventQueue::new(0, 0, 4);
        let a = EventQueue::new(0, 1, 4);
        reg.claim(EventClass::Bluetooth, 1, Some(sup)).unwrap();
        reg.subscribe(EventClass::Bluetooth, 0x1, &a).unwrap();

        assert_eq!(ids(&reg.snapshot(EventClass::Bluetooth, 1, 0x1).unwrap()), vec![1, 0]);
        assert_eq!(ids(&reg.snapshot(EventClass::Bluetooth, 1, 0x80).unwrap()), vec![0]);
        assert!(reg.snapshot(EventClass::Bluetooth, 1, 0).unwrap().is_empty());
        assert_eq!(reg.subscriber_count(EventClass::Bluetooth).unwrap(), 1);
    }

    #[test]
    fn unsubscribe_requires_exact_match() {
        let mut reg = Registry::new();
        let a = EventQueue::new(0, 1, 4);
        reg.claim(EventClass::Zigbee, 1, None).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x3, &a).unwrap();

        assert!(matches!(
            reg.unsubscribe(EventClass::Zigbee, 0x1, &a),
            Err(EventError::NotFound)
        ));
        reg.unsubscribe(EventClass::Zigbee, 0x3, &a).unwrap();
        assert_eq!(reg.subscriber_count(EventClass::Zigbee).unwrap(), 0);
        assert!(matches!(
            reg.unsubscribe(EventClass::Irq, 0x3, &a),
            Err(EventError::NotRegistered)
        ));
    }

    #[test]
    fn purge_removes_queue_from_every_class() {
        let mut reg = Registry::new();
        let a = EventQueue::new(0, 1, 4);
        let b = EventQueue::new(0, 2, 4);
        reg.claim(EventClass::Zigbee, 1, None).unwrap();
        reg.claim(EventClass::Bluetooth, 2, None).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x1, &a).unwrap();
        reg.subscribe(EventClass::Zigbee, 0x1, &b).unwrap();
        reg.subscribe(EventClass::Bluetooth, 0xF, &a).unwrap();

        assert_eq!(reg.purge_queue(&a).len(), 2);
        assert_eq!(ids(&reg.snapshot(EventClass::Zigbee, 1, 0x1).unwrap()), vec![2]);
        assert!(reg.snapshot(EventClass::Bluetooth, 2, 0xF).unwrap().is_empty());
    }

    #[test]
    fn subscriber_list_is_bounded() {
        let mut reg = Registry::new();
        let q = EventQueue::new(0, 1, 1);
        reg.claim(EventClass::Zigbee, 1, None).unwrap();
        for _ in 0..MAX_SUBSCRIBERS_PER_CLASS {
            reg.subscribe(EventClass::Zigbee, 0x1, &q).unwrap();
        }
        let err = reg.subscribe(EventClass::Zigbee, 0x1, &q).unwrap_err();
        assert!(matches!(err, EventError::NoMoreResource { .. }));
    }

    #[test]
    fn full_subscriber_list_plus_supervisor_fits_snapshot() {
        let mut reg = Registry::new();
        let sup = EventQueue::new(0, 0, 1);
        let q = EventQueue::new(0, 1, 1);
        reg.claim(EventClass::Zigbee, 1, Some(sup)).unwrap();
        for _ in 0..MAX_SUBSCRIBERS_PER_CLASS {
            reg.subscribe(EventClass::Zigbee, 0x1, &q).unwrap();
        }

        let snapshot = reg.snapshot(EventClass::Zigbee, 1, 0x1).unwrap();
        assert_eq!(snapshot.len(), MAX_SUBSCRIBERS_PER_CLASS + 1);
        assert_eq!(snapshot.last().map(EventQueue::id), Some(0));
    }
}
