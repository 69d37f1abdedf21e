//! 事件（Event）
//!
//! 事件信封由三部分组成：
//! - `EventData`：不透明载荷与 `FreeDataCallback`；
//! - 存储：堆分配、调用方预分配槽位（`EventSlot`）或 IRQ 预分配池；
//! - `Event`：订阅者手中的句柄，每个句柄持有一份引用计数。
//!
//! 引用计数在发布时一次性设为投递数，之后只减不增；归零时恰好执行一次
//! 释放回调并归还存储。
//!
mod data;
mod handle;
mod slot;

pub use data::{EventData, FreeDataCallback, free_callback};
pub use handle::Event;
pub use slot::EventSlot;

pub(crate) use handle::Backing;
pub(crate) use slot::{EventPool, HeapBudget, HeapEvent};
