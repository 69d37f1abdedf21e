//! IRQ 发布者
//!
//! 保留的 `EventClass::Irq` 发布者，供中断服务程序发布事件：
//! - 事件取自系统持有的定长预分配池，池耗尽立即返回 `NoMoreResource`；
//! - 载荷为直接编码的 IRQ 号（`EventData::Word`），订阅者用 `irq_decode` 取回；
//! - 掩码为 `1 << (irq % 32)`，订阅者可按中断线过滤。
//!
//! 该路径不分配、不等待、不记录日志，耗时上界为池大小加订阅者列表长度。
//!
use crate::class::EventClass;
use crate::error::EventResult;
use crate::event::{Event, EventData};
use crate::system::{EventSystem, Storage};

/// `irq_decode` 对非 IRQ 事件返回的哨兵值
pub const IRQ_INVALID: u32 = 0xFFFF_FFFF;

/// IRQ 号对应的事件掩码
pub const fn irq_mask(irq_number: u32) -> u32 {
    1 << (irq_number % 32)
}

/// 从 IRQ 事件中取回 IRQ 号；非 IRQ 事件返回 `IRQ_INVALID`
pub fn irq_decode(event: &Event) -> u32 {
    if event.class() != EventClass::Irq {
        return IRQ_INVALID;
    }
    event.data().as_word().unwrap_or(IRQ_INVALID)
}

impl EventSystem {
    pub fn irq_publisher_init(&self) -> EventResult<()> {
        self.publisher_register(self.irq_publisher(), EventClass::Irq, None)
    }

    pub fn irq_publisher_deinit(&self) -> EventResult<()> {
        self.publisher_unregister(self.irq_publisher())
    }

    /// 在中断上下文发布 IRQ 事件
    pub fn irq_publish(&self, irq_number: u32) -> EventResult<()> {
        self.deliver(
            self.irq_publisher(),
            irq_mask(irq_number),
            self.config().irq_priority,
            EventData::Word(irq_number),
            Storage::Pool,
        )
        .map(|_| ())
    }

    /// IRQ 预分配池中空闲事件数
    pub fn irq_events_available(&self) -> usize {
        self.irq_pool().available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventSystemConfig;
    use crate::error::EventError;
    use crate::publisher::Publisher;

    fn system(pool: usize) -> EventSystem {
        EventSystem::init(EventSystemConfig::builder().irq_event_pool_size(pool).build()).unwrap()
    }

    #[test]
    fn mask_wraps_at_32() {
        assert_eq!(irq_mask(0), 0x1);
        assert_eq!(irq_mask(5), 0x20);
        assert_eq!(irq_mask(37), 0x20);
    }

    #[test]
    fn publish_requires_init() {
        let system = system(2);
        assert!(matches!(system.irq_publish(3), Err(EventError::NotRegistered)));
        system.irq_publisher_init().unwrap();
        assert!(matches!(
            system.irq_publisher_init(),
            Err(EventError::AlreadyRegistered { .. })
        ));
        system.irq_publish(3).unwrap();
        system.irq_publisher_deinit().unwrap();
        assert!(matches!(system.irq_publish(3), Err(EventError::NotRegistered)));
        assert!(matches!(
            system.irq_publisher_deinit(),
            Err(EventError::NotRegistered)
        ));
    }

    #[test]
    fn decode_round_trips_and_rejects_other_classes() {
        let system = system(2);
        let q = system.queue_create(4).unwrap();
        system.irq_publisher_init().unwrap();
        system.subscribe(EventClass::Irq, u32::MAX, &q).unwrap();
        system.irq_publish(17).unwrap();

        let (ev, _) = q.try_get().unwrap();
        assert!(ev.is_pre_allocated());
        assert_eq!(irq_decode(&ev), 17);
        ev.process().unwrap();

        let zigbee = Publisher::new();
        system.publisher_register(&zigbee, EventClass::Zigbee, None).unwrap();
        system.subscribe(EventClass::Zigbee, 0x1, &q).unwrap();
        system.publish(&zigbee, 0x1, 0, EventData::Word(17)).unwrap();
        let (ev, _) = q.try_get().unwrap();
        assert_eq!(irq_decode(&ev), IRQ_INVALID);
        ev.process().unwrap();
    }

    #[test]
    fn exhausted_pool_fails_fast() {
        let system = system(1);
        let q = system.queue_create(4).unwrap();
        system.irq_publisher_init().unwrap();
        system.subscribe(EventClass::Irq, u32::MAX, &q).unwrap();

        system.irq_publish(1).unwrap();
        assert_eq!(system.irq_events_available(), 0);
        let err = system.irq_publish(2).unwrap_err();
        assert!(matches!(err, EventError::NoMoreResource { .. }));
        assert_eq!(q.count(), 1);
    }
}
