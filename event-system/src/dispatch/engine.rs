//! 分发引擎（EventEngine）
//!
//! 长驻任务，持续从一条事件队列取事件并分发：
//! - 按事件类别匹配处理器，并发执行；
//! - 全部处理器结束后调用 `process` 释放本队列持有的引用；
//! - 处理失败只记录与计数，不重试；
//! - 提供关闭与等待的 `EngineHandle`。
//!
use super::handler::HandledClasses;
use super::EventHandler;
use crate::class::EventClass;
use crate::event::Event;
use crate::queue::EventQueue;
use bon::Builder;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_engine_builder::{IsUnset, SetRegistry, State as BuilderState};

/// EventEngine：
/// - 从 `queue` 取事件，分发到匹配的 Handler，并发处理
/// - 处理完成后释放事件引用
#[derive(Builder)]
pub struct EventEngine {
    queue: EventQueue,
    #[builder(setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: EventEngineConfig,
    #[builder(skip)]
    stats: EngineStats,
}

impl<S: BuilderState> EventEngineBuilder<S> {
    pub fn event_handlers(
        self,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> EventEngineBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(HandlerRegistry::new(handlers))
    }
}

impl EventEngine {
    /// 启动引擎，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(Self::drain_loop(self, token.clone()));

        EngineHandle {
            token,
            tasks: vec![task],
        }
    }

    /// 已处理（已释放引用）的事件数
    pub fn processed(&self) -> usize {
        self.stats.processed.load(Ordering::Relaxed)
    }

    /// 处理器失败次数
    pub fn handler_failures(&self) -> usize {
        self.stats.handler_failures.load(Ordering::Relaxed)
    }

    async fn drain_loop(self: Arc<Self>, token: CancellationToken) {
        let concurrency = self.config.handler_concurrency.max(1);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                received = self.queue.recv() => {
                    match received {
                        Ok((event, _priority)) => self.dispatch(event, concurrency).await,
                        Err(err) => {
                            debug!(queue = self.queue.id(), error = %err, "event queue closed, engine stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, event: Event, concurrency: usize) {
        let handlers = self.registry.matching(event.class());
        let event_ref = &event;
        let stats = &self.stats;

        stream::iter(handlers)
            .for_each_concurrent(Some(concurrency), move |h| async move {
                if let Err(err) = h.handle(event_ref).await {
                    stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        handler = h.handler_name(),
                        class = %event_ref.class(),
                        error = %err,
                        "event handler failed"
                    );
                }
            })
            .await;

        if let Err(err) = event.process() {
            warn!(error = %err, "failed to process event");
        }
        self.stats.processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct EngineStats {
    processed: AtomicUsize,
    handler_failures: AtomicUsize,
}

#[derive(Clone, Default)]
struct HandlerRegistry {
    by_class: [Vec<Arc<dyn EventHandler>>; EventClass::COUNT],
    all: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let mut registry = Self::default();

        for h in handlers {
            match h.handled_classes() {
                HandledClasses::All => registry.all.push(h),
                HandledClasses::One(class) => registry.by_class[class.index()].push(h),
                HandledClasses::Many(classes) => {
                    for class in classes {
                        registry.by_class[class.index()].push(h.clone());
                    }
                }
            }
        }

        registry
    }

    fn matching(&self, class: EventClass) -> Vec<Arc<dyn EventHandler>> {
        let mut merged: Vec<Arc<dyn EventHandler>> = self.by_class[class.index()].clone();
        merged.extend(self.all.iter().cloned());
        merged
    }
}

/// 引擎配置
#[derive(Clone, Copy, Debug)]
pub struct EventEngineConfig {
    /// 单事件的处理并发（同一事件分发给多个 handler）
    pub handler_concurrency: usize,
}

impl Default for EventEngineConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
