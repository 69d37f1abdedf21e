//! 临界区（CriticalSection）
//!
//! 宿主侧临界区原语的托管实现：以互斥锁包裹受保护数据。
//! 嵌入式移植时替换为关中断实现即可，调用方只依赖 `enter`。
//!
//! 约束：临界区内只做链表/槽位的短操作，不得入队、不得调用释放回调。
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub(crate) struct CriticalSection<T> {
    inner: Mutex<T>,
}

impl<T> CriticalSection<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// 进入临界区；guard 析构即退出
    ///
    /// 持锁方 panic 不会使数据处于半更新状态（所有修改均为单步完成），
    /// 因此中毒的锁直接恢复使用。
    pub(crate) fn enter(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
