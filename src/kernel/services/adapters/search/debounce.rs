//! 搜索事件流
//!
//! 两路事件合并成一路：文本编辑（连续相同的文本只算一次）和显式触发
//! （切换选项、切换标签页、项目重新加载）。每个事件重置计时器，静默期
//! 结束时只投递最后一个文本。

use super::lock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

pub struct SearchEvents {
    tx: UnboundedSender<String>,
    text: Mutex<String>,
    enabled: AtomicBool,
    worker: JoinHandle<()>,
}

impl SearchEvents {
    /// `on_query` 在去抖任务中调用，由调用方负责把工作转交到串行通道
    pub fn spawn<F>(runtime: &tokio::runtime::Handle, window: Duration, on_query: F) -> Self
    where
        F: Fn(String) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = runtime.spawn(debounce_loop(rx, window, on_query));
        Self {
            tx,
            text: Mutex::new(String::new()),
            enabled: AtomicBool::new(true),
            worker,
        }
    }

    /// 文本编辑事件；与上一次文本相同时丢弃
    pub fn text_changed(&self, text: &str) {
        {
            let mut current = lock(&self.text);
            if *current == text {
                return;
            }
            current.clear();
            current.push_str(text);
        }
        self.emit(text.to_string());
    }

    /// 以当前文本重新搜索
    pub fn emit_search(&self) {
        let text = lock(&self.text).clone();
        self.emit(text);
    }

    pub fn current_text(&self) -> String {
        lock(&self.text).clone()
    }

    /// 项目加载期间禁用输入，此时的事件直接丢弃
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 停止事件流；静默期内尚未投递的文本被丢弃
    pub fn close(&self) {
        self.worker.abort();
    }

    fn emit(&self, text: String) {
        if !self.is_enabled() {
            tracing::debug!("search input disabled, event dropped");
            return;
        }
        if self.tx.send(text).is_err() {
            tracing::debug!("search event stream closed");
        }
    }
}

impl Drop for SearchEvents {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn debounce_loop<F>(mut rx: UnboundedReceiver<String>, window: Duration, on_query: F)
where
    F: Fn(String),
{
    while let Some(mut latest) = rx.recv().await {
        loop {
            match tokio::time::timeout(window, rx.recv()).await {
                Ok(Some(next)) => latest = next,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        on_query(latest);
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/debounce.rs"]
mod tests;
