//! 搜索使用的 tokio runtime：去抖计时在 async 任务上，生产在阻塞线程池上
//!
//! 必须是多线程 runtime：没有线程调用 `block_on`，current-thread runtime
//! 上 spawn 的任务永远不会被轮询。

use std::io;

pub struct SearchRuntime {
    runtime: tokio::runtime::Runtime,
}

impl SearchRuntime {
    pub fn new() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("zsearch-worker")
            .enable_all()
            .build()
            .inspect_err(|e| {
                tracing::error!(error = %e, "Failed to create multi-thread tokio runtime");
            })?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/runtime.rs"]
mod tests;
