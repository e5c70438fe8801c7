//! 运行时上下文（MqRuntime）
//!
//! 将调度器与标识分配器打包成显式上下文，处理器与代理都基于同一个运行时创建。
//!
use crate::scheduler::Scheduler;
use crate::value_object::IdAllocator;
use std::sync::Arc;

/// 运行时上下文：可廉价克隆，所有克隆共享调度队列与标识分配器
#[derive(Clone, Debug, Default)]
pub struct MqRuntime {
    scheduler: Scheduler,
    ids: Arc<IdAllocator>,
}

impl MqRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(scheduler: Scheduler, ids: Arc<IdAllocator>) -> Self {
        Self { scheduler, ids }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// 手动排空调度队列，返回执行的任务数
    pub fn run_until_idle(&self) -> usize {
        self.scheduler.run_until_idle()
    }
}
