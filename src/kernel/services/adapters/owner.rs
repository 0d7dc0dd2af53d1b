//! owner 线程消息队列
//!
//! `OwnerQueue` 可在任意线程投递闭包，`OwnerLoop` 由 owner 线程持有并
//! 按投递顺序执行。第一次 pump 的线程即被登记为 owner 线程。

use crate::kernel::services::ports::{OwnerTask, OwnerThread};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::Duration;

#[derive(Clone)]
pub struct OwnerQueue {
    tx: Sender<OwnerTask>,
    owner: Arc<OnceLock<ThreadId>>,
}

pub struct OwnerLoop {
    rx: Receiver<OwnerTask>,
    owner: Arc<OnceLock<ThreadId>>,
}

pub fn owner_queue() -> (OwnerQueue, OwnerLoop) {
    let (tx, rx) = mpsc::channel();
    let owner = Arc::new(OnceLock::new());
    (
        OwnerQueue {
            tx,
            owner: Arc::clone(&owner),
        },
        OwnerLoop { rx, owner },
    )
}

impl OwnerQueue {
    pub fn is_owner_thread(&self) -> bool {
        self.owner.get() == Some(&std::thread::current().id())
    }
}

impl OwnerThread for OwnerQueue {
    fn run(&self, task: OwnerTask) {
        if self.tx.send(task).is_err() {
            tracing::debug!("owner loop gone, task dropped");
        }
    }

    fn run_and_wait(&self, task: OwnerTask) {
        if self.is_owner_thread() {
            task();
            return;
        }
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let wrapped: OwnerTask = Box::new(move || {
            task();
            let _ = done_tx.send(());
        });
        if self.tx.send(wrapped).is_err() {
            tracing::debug!("owner loop gone, task dropped");
            return;
        }
        // owner loop 被丢弃时 done_tx 随之释放，recv 返回错误
        let _ = done_rx.recv();
    }
}

impl OwnerLoop {
    fn register(&self) {
        let _ = self.owner.set(std::thread::current().id());
    }

    /// 执行所有已排队的闭包，返回执行数量
    pub fn pump(&mut self) -> usize {
        self.register();
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return count,
            }
        }
    }

    /// 最多等待 `timeout` 直到至少执行一个闭包，然后清空队列
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        self.register();
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// 一直执行，直到所有 `OwnerQueue` 都被丢弃
    pub fn run_blocking(&mut self) {
        self.register();
        while let Ok(task) = self.rx.recv() {
            task();
        }
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/owner.rs"]
mod tests;
