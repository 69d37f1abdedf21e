//! 事件系统（event-system）
//!
//! 面向嵌入式固件的发布/订阅进程间通信设施，将事件生产者（射频协议栈、
//! 中断处理程序、协议层）与一个或多个消费任务解耦：
//! - 事件类别（`class`）与每类别唯一的发布者（`publisher`）；
//! - 按 32 位掩码过滤的订阅，一次发布扇出到多条消费者队列（`queue`）；
//! - 基于原子引用计数的事件生命周期（`event`），最后一位处理者释放载荷；
//! - 可在中断上下文调用的无分配发布路径（`publish_static`、`irq`）；
//! - 可选的监督队列，观察全部流量（`supervisor` 特性）；
//! - 消费侧的分发引擎（`dispatch`）。
//!
//! 典型用法：
//! 1. `EventSystem::init` 初始化，`publisher_register` 注册各类别发布者；
//! 2. 消费者 `queue_create` 创建队列并 `subscribe` 感兴趣的类别与掩码；
//! 3. 生产者 `publish`/`publish_static`/`irq_publish` 发布事件；
//! 4. 消费者从队列 `get` 事件，处理后调用 `Event::process`。
//!
pub mod class;
pub mod config;
mod critical;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod irq;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod system;

pub use class::EventClass;
pub use config::EventSystemConfig;
pub use error::{EventError, EventResult};
pub use event::{Event, EventData, EventSlot, FreeDataCallback, free_callback};
pub use irq::{IRQ_INVALID, irq_decode, irq_mask};
pub use publisher::Publisher;
pub use queue::EventQueue;
pub use registry::{ALL_EVENTS, MAX_SUBSCRIBERS_PER_CLASS};
pub use system::EventSystem;
