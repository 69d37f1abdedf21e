use event_system::{
    EventClass, EventError, EventSystem, EventSystemConfig, IRQ_INVALID, irq_decode, irq_mask,
};
use std::sync::Arc;
use std::time::Duration;

fn irq_system(pool: usize) -> EventSystem {
    let system = EventSystem::init(
        EventSystemConfig::builder()
            .irq_event_pool_size(pool)
            .irq_priority(7)
            .build(),
    )
    .unwrap();
    system.irq_publisher_init().unwrap();
    system
}

#[tokio::test]
async fn subscribers_filter_by_irq_line() {
    let system = irq_system(4);
    let uart = system.queue_create(4).unwrap();
    let timers = system.queue_create(4).unwrap();
    system
        .subscribe(EventClass::Irq, irq_mask(3), &uart)
        .unwrap();
    system
        .subscribe(EventClass::Irq, irq_mask(10) | irq_mask(11), &timers)
        .unwrap();

    system.irq_publish(3).unwrap();
    system.irq_publish(11).unwrap();
    system.irq_publish(20).unwrap();

    let (ev, prio) = uart.get(Duration::from_millis(100)).await.unwrap();
    assert_eq!(prio, 7);
    assert_eq!(irq_decode(&ev), 3);
    ev.process().unwrap();
    assert_eq!(uart.count(), 0);

    let (ev, _) = timers.get(Duration::from_millis(100)).await.unwrap();
    assert_eq!(irq_decode(&ev), 11);
    ev.process().unwrap();
}

#[tokio::test]
async fn pool_slots_return_after_processing() {
    let system = irq_system(2);
    let q = system.queue_create(8).unwrap();
    system.subscribe(EventClass::Irq, u32::MAX, &q).unwrap();

    for round in 0..5u32 {
        system.irq_publish(round).unwrap();
        system.irq_publish(round + 1).unwrap();
        assert!(matches!(
            system.irq_publish(round + 2),
            Err(EventError::NoMoreResource { .. })
        ));

        for _ in 0..2 {
            let (ev, _) = q.try_get().unwrap();
            assert!(ev.is_pre_allocated());
            ev.process().unwrap();
        }
        #[cfg(feature = "supervisor")]
        {
            while let Ok((ev, _)) = system.supervisor_queue_get(Duration::ZERO).await {
                ev.process().unwrap();
            }
        }
        assert_eq!(system.irq_events_available(), 2);
    }
    assert_eq!(system.live_heap_events(), 0);
}

#[tokio::test]
async fn irq_publish_without_subscribers_returns_slot_immediately() {
    let system = irq_system(1);
    // 掩码必然非零，监督队列存在时会持有一份引用
    system.irq_publish(0).unwrap();
    #[cfg(feature = "supervisor")]
    {
        let (ev, _) = system.supervisor_queue_get(Duration::ZERO).await.unwrap();
        ev.process().unwrap();
    }
    assert_eq!(system.irq_events_available(), 1);
    system.irq_publish(1).unwrap();
}

#[test]
fn decode_rejects_foreign_events() {
    let system = EventSystem::default();
    let p = event_system::Publisher::new();
    let q = system.queue_create(1).unwrap();
    system
        .publisher_register(&p, EventClass::Bluetooth, None)
        .unwrap();
    system.subscribe(EventClass::Bluetooth, 0x1, &q).unwrap();
    system
        .publish(&p, 0x1, 0, event_system::EventData::Word(5))
        .unwrap();
    let (ev, _) = q.try_get().unwrap();
    assert_eq!(irq_decode(&ev), IRQ_INVALID);
    ev.process().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupts_on_many_threads_never_exceed_pool() {
    const POOL: usize = 4;
    let system = irq_system(POOL);
    let q = system.queue_create(1024).unwrap();
    system.subscribe(EventClass::Irq, u32::MAX, &q).unwrap();

    let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let threads: Vec<_> = (0..4u32)
        .map(|line| {
            let system = system.clone();
            let accepted = accepted.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    match system.irq_publish(line) {
                        Ok(()) => {
                            accepted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                        Err(EventError::NoMoreResource { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    // 无人消费时，被接受的事件数不会超过池大小
    assert!(accepted.load(std::sync::atomic::Ordering::Relaxed) <= POOL);
    assert_eq!(q.count(), accepted.load(std::sync::atomic::Ordering::Relaxed));
}
