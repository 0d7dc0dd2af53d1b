use serde::{Deserialize, Serialize};
use std::time::Duration;

/// provider 产出失败时任务的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailurePolicy {
    /// 视为该 job 已耗尽，继续下一个 job
    #[default]
    SkipJob,
    /// 终止整个任务，状态为 Failed
    AbortTask,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub results_page: usize,
    pub flush_every: usize,
    pub failure_policy: ProviderFailurePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            results_page: 50,
            flush_every: 50,
            failure_policy: ProviderFailurePolicy::SkipJob,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 至少为 1，避免每条结果都不触发刷新
    pub fn flush_every(&self) -> usize {
        self.flush_every.max(1)
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/config.rs"]
mod tests;
