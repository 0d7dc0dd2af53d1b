//! 搜索结果的 owner 侧状态
//!
//! `SearchResultsModel` 实现 `SearchConsumer`，只在 owner 线程上被修改；
//! 其他线程通过 `snapshot` / `wait_for` 读取。

use crate::kernel::services::ports::{Query, ResultItem, SearchConsumer, TaskInfo, TaskProgress};
use crate::kernel::sync::lock;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// 结果高亮使用的上下文，每次搜索开始时更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightContext {
    pub text: String,
    pub case_sensitive: bool,
    pub regex: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResultsState {
    pub items: Vec<ResultItem>,
    pub progress: Option<TaskProgress>,
    pub searching: bool,
    pub error: Option<String>,
    /// 上一次完成时还有剩余结果
    pub load_more_enabled: bool,
    pub complete: Option<bool>,
    pub last_info: Option<TaskInfo>,
    pub highlight: HighlightContext,
    pub finished_count: usize,
    /// 每次追加的批次大小
    pub batches: Vec<usize>,
}

impl ResultsState {
    pub fn status_line(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        if self.searching {
            let percent = self.progress.map(|p| p.percent()).unwrap_or(0);
            return format!("Searching... {}%", percent);
        }
        match (&self.last_info, self.complete) {
            (Some(info), Some(complete)) => {
                let suffix = if complete { "" } else { "+" };
                format!(
                    "Found {}{} results in {}ms",
                    self.items.len(),
                    suffix,
                    info.elapsed.as_millis()
                )
            }
            _ => String::new(),
        }
    }
}

#[derive(Default)]
pub struct SearchResultsModel {
    state: Mutex<ResultsState>,
    changed: Condvar,
}

impl SearchResultsModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ResultsState {
        self.lock().clone()
    }

    /// 等待状态满足 `pred`，超时返回 `None`
    pub fn wait_for<F>(&self, timeout: Duration, mut pred: F) -> Option<ResultsState>
    where
        F: FnMut(&ResultsState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if pred(&state) {
                return Some(state.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResultsState> {
        lock(&self.state)
    }

    fn update(&self, f: impl FnOnce(&mut ResultsState)) {
        f(&mut self.lock());
        self.changed.notify_all();
    }
}

impl SearchConsumer for SearchResultsModel {
    fn reset(&self) {
        self.update(|state| {
            state.items.clear();
            state.batches.clear();
            state.progress = None;
            state.searching = false;
            state.error = None;
            state.load_more_enabled = false;
            state.complete = None;
            state.last_info = None;
        });
    }

    fn search_started(&self, query: &Query) {
        self.update(|state| {
            state.searching = true;
            state.error = None;
            state.load_more_enabled = false;
            state.complete = None;
            state.highlight = HighlightContext {
                text: query.text.clone(),
                case_sensitive: query.case_sensitive(),
                regex: query.use_regex,
            };
        });
    }

    fn append_results(&self, batch: Vec<ResultItem>) {
        self.update(|state| {
            state.batches.push(batch.len());
            state.items.extend(batch);
        });
    }

    fn progress(&self, progress: TaskProgress) {
        self.update(|state| state.progress = Some(progress));
    }

    fn finished(&self, info: &TaskInfo, complete: bool) {
        self.update(|state| {
            state.searching = false;
            state.progress = Some(info.progress);
            state.complete = Some(complete);
            state.load_more_enabled = !complete;
            state.last_info = Some(info.clone());
            state.finished_count += 1;
        });
    }

    fn error(&self, message: &str) {
        self.update(|state| {
            state.searching = false;
            state.error = Some(message.to_string());
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/results.rs"]
mod tests;
