//! 协作式调度器（Scheduler）
//!
//! 所有“延迟分发”都以任务形式进入同一个 FIFO 队列，由单一执行者按入队顺序逐个执行：
//! - `publish` / `subscribe` 只负责入队任务，调用返回时回调尚未执行；
//! - 连续多次 `publish` 各自入队一个分发任务，不会合并；
//! - 测试中可用 `run_next` / `run_until_idle` 手动步进；
//! - 运行时中可用 `spawn_driver` 在 tokio 上自动排空。
//!
//! 任意时刻至多一个任务在执行（跨线程互斥、同线程可重入），
//! 从而保证同一处理器的队列与订阅者列表始终被串行修改。
//!
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "driver")]
use crate::config::DriverConfig;
#[cfg(feature = "driver")]
use tokio::{sync::Notify, task::JoinHandle};
#[cfg(feature = "driver")]
use tokio_util::sync::CancellationToken;

/// 调度任务
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 调度器句柄，可廉价克隆，所有克隆共享同一任务队列
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

#[derive(Default)]
struct SchedulerInner {
    tasks: Mutex<VecDeque<Task>>,
    turn: ReentrantMutex<()>,
    executed: AtomicU64,
    #[cfg(feature = "driver")]
    notify: Notify,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将任务追加到队尾，在之后的某一轮执行
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = {
            let mut tasks = self.inner.tasks.lock();
            tasks.push_back(Box::new(task));
            tasks.len()
        };
        tracing::trace!(pending, "task scheduled");

        #[cfg(feature = "driver")]
        self.inner.notify.notify_one();
    }

    /// 执行队首任务；队列为空时返回 `false`
    pub fn run_next(&self) -> bool {
        let _turn = self.inner.turn.lock();
        // 先出队再执行，任务内部可以继续 schedule
        let Some(task) = self.inner.tasks.lock().pop_front() else {
            return false;
        };
        task();
        self.inner.executed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// 持续执行直至队列为空（包括执行过程中新入队的任务），返回执行的任务数
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// 尚未执行的任务数
    pub fn pending(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// 累计已执行的任务数
    pub fn executed(&self) -> u64 {
        self.inner.executed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("executed", &self.executed())
            .finish()
    }
}

#[cfg(feature = "driver")]
impl Scheduler {
    /// 在 tokio 上启动驱动任务：收到通知即分批排空队列，返回可用于关闭/等待的句柄
    ///
    /// 驱动运行期间不应再手动步进同一调度器。
    pub fn spawn_driver(&self, config: DriverConfig) -> DriverHandle {
        let token = CancellationToken::new();
        let scheduler = self.clone();
        let batch_size = config.batch_size.max(1);

        let task = tokio::spawn({
            let token = token.clone();
            async move {
                tracing::debug!(batch_size, "scheduler driver started");
                loop {
                    scheduler.drain(&token, batch_size).await;
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = scheduler.inner.notify.notified() => {}
                    }
                }
                tracing::debug!("scheduler driver stopped");
            }
        });

        DriverHandle { token, task: Some(task) }
    }

    async fn drain(&self, token: &CancellationToken, batch_size: usize) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let mut ran = 0;
            while ran < batch_size && self.run_next() {
                ran += 1;
            }
            if ran < batch_size {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

/// 驱动运行句柄：用于关闭与等待驱动任务结束，丢弃时自动关闭
#[cfg(feature = "driver")]
pub struct DriverHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[cfg(feature = "driver")]
impl DriverHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(feature = "driver")]
impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
