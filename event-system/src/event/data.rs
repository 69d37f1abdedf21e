use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 事件载荷
///
/// 对事件系统而言载荷是不透明的：
/// - `Empty`：无载荷；
/// - `Word`：直接编码的标量（IRQ 号等），不需要间接引用，也不分配；
/// - `Shared`：任意共享对象，多个订阅者只读共享同一份数据，不做拷贝。
#[derive(Clone, Default)]
pub enum EventData {
    #[default]
    Empty,
    Word(u32),
    Shared(Arc<dyn Any + Send + Sync>),
}

impl EventData {
    pub fn shared<T: Any + Send + Sync>(value: T) -> Self {
        Self::Shared(Arc::new(value))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_word(&self) -> Option<u32> {
        match self {
            Self::Word(w) => Some(*w),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Self::Shared(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Shared(value) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Word(w) => f.debug_tuple("Word").field(w).finish(),
            Self::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

/// 载荷释放回调：事件最后一份引用被释放时恰好调用一次
pub type FreeDataCallback = Arc<dyn Fn(EventData) + Send + Sync>;

/// 便捷构造 `FreeDataCallback`
pub fn free_callback<F>(f: F) -> FreeDataCallback
where
    F: Fn(EventData) + Send + Sync + 'static,
{
    Arc::new(f)
}
