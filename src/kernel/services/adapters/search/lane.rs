//! 串行执行通道
//!
//! 单个后台线程按提交顺序执行工作项。搜索生命周期（停止旧任务、构建、
//! 启动抓取）都在这里执行，因此协调器内部不需要额外同步。

use super::lock;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

pub type LaneJob = Box<dyn FnOnce() + Send + 'static>;

pub struct SerialLane {
    name: String,
    tx: Mutex<Option<Sender<LaneJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl SerialLane {
    pub fn new(name: &str) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<LaneJob>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_lane(rx))?;
        let thread_id = handle.thread().id();
        Ok(Self {
            name: name.to_string(),
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 通道关闭后返回 false，工作项被丢弃
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match lock(&self.tx).as_ref() {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => {
                tracing::debug!(lane = %self.name, "lane closed, job dropped");
                false
            }
        }
    }

    pub fn is_lane_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// 不再接受新工作项；已提交的仍会执行
    pub fn close(&self) {
        drop(lock(&self.tx).take());
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tx).is_none()
    }

    /// 关闭并等待已提交的工作项执行完毕
    pub fn shutdown(&self) {
        self.close();

        if self.is_lane_thread() {
            // 在通道线程内部关闭：线程会在当前工作项返回后自行退出
            return;
        }
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(lane = %self.name, "lane thread panicked");
            }
        }
    }
}

impl Drop for SerialLane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_lane(rx: Receiver<LaneJob>) {
    while let Ok(job) = rx.recv() {
        // 单个工作项 panic 不能拖垮整个通道
        if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
            tracing::error!(panic = %panic_message(&panic), "lane job panicked");
        }
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/lane.rs"]
mod tests;
