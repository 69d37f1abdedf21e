/// 中断事件分发示例
/// 展示 IRQ 发布 -> 订阅队列 -> EventEngine -> Handlers 的闭环，以及监督队列观察全部流量
use async_trait::async_trait;
use event_system::dispatch::{EventEngine, EventEngineConfig, EventHandler, HandledClasses};
use event_system::{
    Event, EventClass, EventData, EventSystem, EventSystemConfig, Publisher, free_callback,
    irq_decode, irq_mask,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// 示例处理器（EventHandler）
// ============================================================================

#[derive(Clone)]
struct PrintHandler {
    name: &'static str,
    classes: HandledClasses,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventHandler for PrintHandler {
    fn handler_name(&self) -> &str {
        self.name
    }

    fn handled_classes(&self) -> HandledClasses {
        self.classes.clone()
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let line = match event.class() {
            EventClass::Irq => format!("[{}] irq line {}", self.name, irq_decode(event)),
            class => format!(
                "[{}] {} payload={:?}",
                self.name,
                class,
                event.data().downcast_ref::<String>()
            ),
        };
        println!("{line}");
        self.log.lock().unwrap().push(line);
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let system = EventSystem::init(
        EventSystemConfig::builder()
            .supervisor_queue_capacity(64)
            .irq_event_pool_size(4)
            .irq_priority(5)
            .build(),
    )?;

    // 1) 注册 IRQ 发布者与 Zigbee 发布者
    system.irq_publisher_init()?;
    let freed = Arc::new(AtomicUsize::new(0));
    let counter = freed.clone();
    let zigbee = Publisher::new();
    system.publisher_register(
        &zigbee,
        EventClass::Zigbee,
        Some(free_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    )?;

    // 2) 消费者队列：只关心 IRQ 3 与 IRQ 7，以及全部 Zigbee 事件
    let queue = system.queue_create(16)?;
    system.subscribe(EventClass::Irq, irq_mask(3) | irq_mask(7), &queue)?;
    system.subscribe(EventClass::Zigbee, u32::MAX, &queue)?;

    let log = Arc::new(Mutex::new(Vec::new()));
    let handlers: Vec<Arc<dyn EventHandler>> = vec![
        Arc::new(PrintHandler {
            name: "irq",
            classes: HandledClasses::One(EventClass::Irq),
            log: log.clone(),
        }),
        Arc::new(PrintHandler {
            name: "radio",
            classes: HandledClasses::Many(vec![EventClass::Zigbee]),
            log: log.clone(),
        }),
    ];

    let engine = Arc::new(
        EventEngine::builder()
            .queue(queue.clone())
            .event_handlers(handlers)
            .config(EventEngineConfig {
                handler_concurrency: 2,
            })
            .build(),
    );
    let handle = engine.clone().start();

    // 3) 模拟中断：在普通线程中发布，IRQ 5 无人订阅，只进入监督队列
    let irq_system = system.clone();
    std::thread::spawn(move || {
        for line in [3, 5, 7] {
            if let Err(err) = irq_system.irq_publish(line) {
                eprintln!("irq {line} dropped: {err}");
            }
        }
    })
    .join()
    .map_err(|_| anyhow::anyhow!("irq thread panicked"))?;

    // 4) 协议栈发布带载荷的事件
    system.publish(&zigbee, 0x1, 1, EventData::shared(String::from("join request")))?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown();
    handle.join().await;

    // 5) 监督队列收到全部四个事件
    while let Ok((event, priority)) = system.supervisor_queue_get(Duration::ZERO).await {
        println!(
            "[supervisor] {} priority={priority} refs={}",
            event.class(),
            event.reference_count()
        );
        event.process()?;
    }

    println!(
        "processed={} handled={} zigbee payloads freed={} irq pool free={}",
        engine.processed(),
        log.lock().unwrap().len(),
        freed.load(Ordering::SeqCst),
        system.irq_events_available(),
    );

    system.queue_delete(&queue)?;
    system.publisher_unregister(&zigbee)?;
    system.irq_publisher_deinit()?;
    Ok(())
}
