//! 发布者（Publisher）
//!
//! 某一事件类别的唯一生产者上下文。可以是 `static`（常量构造），
//! 也可以通过 `Publisher::alloc` 在堆上创建。注册与注销由 `EventSystem` 完成。
//!
use crate::class::EventClass;
use crate::critical::CriticalSection;
use crate::event::FreeDataCallback;
use crate::system::SystemInner;
use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// 注册凭据：注册表槽位与发布者各持一份 token，二者一致才允许发布
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) class: EventClass,
    pub(crate) token: u64,
    pub(crate) free_cb: Option<FreeDataCallback>,
    owner: Weak<SystemInner>,
}

impl Registration {
    pub(crate) fn new(
        class: EventClass,
        free_cb: Option<FreeDataCallback>,
        owner: Weak<SystemInner>,
    ) -> Self {
        Self {
            class,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            free_cb,
            owner,
        }
    }
}

pub struct Publisher {
    registration: CriticalSection<Option<Registration>>,
}

impl Publisher {
    pub const fn new() -> Self {
        Self {
            registration: CriticalSection::new(None),
        }
    }

    /// 在堆上创建发布者，生命周期由调用方决定
    pub fn alloc() -> Box<Self> {
        Box::new(Self::new())
    }

    pub fn is_registered(&self) -> bool {
        self.registration.enter().is_some()
    }

    pub fn event_class(&self) -> Option<EventClass> {
        self.registration.enter().as_ref().map(|r| r.class)
    }

    pub fn free_data_callback(&self) -> Option<FreeDataCallback> {
        self.registration
            .enter()
            .as_ref()
            .and_then(|r| r.free_cb.clone())
    }

    pub(crate) fn registration(&self) -> Option<Registration> {
        self.registration.enter().clone()
    }

    pub(crate) fn registration_slot(&self) -> &CriticalSection<Option<Registration>> {
        &self.registration
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

/// 仍处于注册状态的发布者被丢弃时，归还其类别槽位
impl Drop for Publisher {
    fn drop(&mut self) {
        let Some(registration) = self.registration.enter().take() else {
            return;
        };
        let Some(system) = registration.owner.upgrade() else {
            return;
        };
        if let Ok(detached) = system.release_class(registration.class, registration.token) {
            drop(detached);
            debug!(class = %registration.class, "registered publisher dropped, class released");
        }
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("event_class", &self.event_class())
            .finish()
    }
}
