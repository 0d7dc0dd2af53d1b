//! 结果聚合器
//!
//! 生产线程追加结果，刷新时在同一把锁内排序、取走、清空。
//! 每条结果恰好被刷新一次。

use super::lock;
use crate::kernel::services::ports::ResultItem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct ResultAggregator {
    pending: Mutex<Vec<ResultItem>>,
    added: AtomicUsize,
    flushed: AtomicUsize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&self, item: ResultItem) {
        let mut pending = lock(&self.pending);
        pending.push(item);
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    /// 取出自上次刷新以来的全部结果（已排序）；缓冲为空时返回 `None`
    pub fn flush(&self) -> Option<Vec<ResultItem>> {
        let mut pending = lock(&self.pending);
        if pending.is_empty() {
            return None;
        }
        pending.sort();
        let batch = std::mem::take(&mut *pending);
        self.flushed.fetch_add(batch.len(), Ordering::Relaxed);
        Some(batch)
    }

    /// 丢弃未刷新的结果并重置计数，新查询开始前调用
    pub fn clear(&self) {
        let mut pending = lock(&self.pending);
        pending.clear();
        self.added.store(0, Ordering::Relaxed);
        self.flushed.store(0, Ordering::Relaxed);
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn added(&self) -> usize {
        self.added.load(Ordering::Relaxed)
    }

    pub fn flushed(&self) -> usize {
        self.flushed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/aggregator.rs"]
mod tests;
