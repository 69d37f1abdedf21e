use event_system::{
    ALL_EVENTS, EventClass, EventData, EventError, EventQueue, EventSlot, EventSystem,
    EventSystemConfig, Publisher, free_callback, irq_decode, irq_mask,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// 蓝牙协议栈的发布者与预分配事件，生命周期贯穿整个程序
static BLUETOOTH: Publisher = Publisher::new();
static CONNECTION_EVENT: EventSlot = EventSlot::new();

const CONNECTION_OPENED: u32 = 1 << 0;
const ADVERTISEMENT: u32 = 1 << 1;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

fn load_config() -> anyhow::Result<EventSystemConfig> {
    match std::env::var("EVENT_SYSTEM_CONFIG") {
        Ok(raw) => Ok(EventSystemConfig::from_json(&raw)?),
        Err(_) => Ok(EventSystemConfig::builder()
            .irq_event_pool_size(4)
            .max_heap_events(16)
            .build()),
    }
}

/// 消费任务：取事件、打印、处理；队列删除后退出
async fn consume(name: &'static str, queue: EventQueue) -> usize {
    let mut handled = 0;
    loop {
        match queue.get(Duration::from_millis(300)).await {
            Ok((event, priority)) => {
                match event.class() {
                    EventClass::Irq => info!(consumer = name, irq = irq_decode(&event), priority, "irq"),
                    class => info!(
                        consumer = name,
                        %class,
                        payload = ?event.data().downcast_ref::<String>(),
                        refs = event.reference_count(),
                        priority,
                        "event"
                    ),
                }
                if let Err(err) = event.process() {
                    warn!(consumer = name, error = %err, "process failed");
                }
                handled += 1;
            }
            Err(EventError::Timeout) => continue,
            Err(err) => {
                info!(consumer = name, reason = %err, "consumer stopping");
                return handled;
            }
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let system = EventSystem::init(load_config()?)?;
    let freed = Arc::new(AtomicUsize::new(0));
    let counter = freed.clone();

    system.irq_publisher_init()?;
    system.publisher_register(
        &BLUETOOTH,
        EventClass::Bluetooth,
        Some(free_callback(move |data| {
            counter.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(shared = !data.is_empty(), "bluetooth payload freed");
        })),
    )?;

    // 连接管理只关心连接事件，日志任务订阅全部蓝牙事件与 IRQ 2
    let connections = system.queue_create(8)?;
    system.subscribe(EventClass::Bluetooth, CONNECTION_OPENED, &connections)?;
    let logger = system.queue_create(8)?;
    system.subscribe(EventClass::Bluetooth, ALL_EVENTS, &logger)?;
    system.subscribe(EventClass::Irq, irq_mask(2), &logger)?;

    let consumers = [
        tokio::spawn(consume("connections", connections.clone())),
        tokio::spawn(consume("logger", logger.clone())),
    ];

    system.publish(
        &BLUETOOTH,
        ADVERTISEMENT,
        0,
        EventData::shared(String::from("adv report")),
    )?;
    system.publish_static(
        &BLUETOOTH,
        CONNECTION_OPENED,
        3,
        &CONNECTION_EVENT,
        EventData::shared(String::from("conn handle 0x0040")),
    )?;

    let irq_system = system.clone();
    std::thread::spawn(move || {
        for line in [2, 9, 2] {
            if let Err(err) = irq_system.irq_publish(line) {
                warn!(irq = line, error = %err, "irq publish failed");
            }
        }
    })
    .join()
    .map_err(|_| anyhow::anyhow!("irq thread panicked"))?;

    tokio::time::sleep(Duration::from_millis(500)).await;

    // 监督队列观察到全部流量
    let mut observed = 0;
    while let Ok((event, _)) = system.supervisor_queue_get(Duration::ZERO).await {
        observed += 1;
        event.process()?;
    }

    system.queue_delete(&connections)?;
    system.queue_delete(&logger)?;
    let mut handled = 0;
    for consumer in consumers {
        handled += consumer.await?;
    }

    info!(
        handled,
        observed,
        freed = freed.load(Ordering::SeqCst),
        slot_in_flight = CONNECTION_EVENT.is_in_flight(),
        irq_pool_free = system.irq_events_available(),
        live_heap_events = system.live_heap_events(),
        "demo finished"
    );

    system.publisher_unregister(&BLUETOOTH)?;
    system.irq_publisher_deinit()?;
    Ok(())
}
