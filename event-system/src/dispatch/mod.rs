//! 分发子系统（dispatch）
//!
//! 在事件队列之上提供消费侧运行时：
//! - `EventHandler`：对某些类别的事件进行处理；
//! - `EventEngine`：从队列取事件、按类别并发分发、处理后释放引用。
//!
pub mod engine;
pub mod handler;

pub use engine::{EngineHandle, EventEngine, EventEngineConfig};
pub use handler::{EventHandler, HandledClasses};
