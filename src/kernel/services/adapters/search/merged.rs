//! 合并多个快速 provider，按注册顺序轮询，每轮每个 job 取一条。

use super::lane::panic_message;
use crate::kernel::services::ports::{
    ProviderError, ProviderFailurePolicy, ProviderJob, ResultItem,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

struct Slot {
    job: Box<dyn ProviderJob>,
    done: bool,
}

pub struct MergedJob {
    slots: Vec<Slot>,
    cursor: usize,
    policy: ProviderFailurePolicy,
    failures: usize,
}

impl MergedJob {
    pub fn new(policy: ProviderFailurePolicy) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            policy,
            failures: 0,
        }
    }

    pub fn add(&mut self, job: Box<dyn ProviderJob>) {
        let done = job.is_done();
        self.slots.push(Slot { job, done });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
    }
}

impl ProviderJob for MergedJob {
    fn name(&self) -> &str {
        "merged"
    }

    fn estimate_size(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.done)
            .map(|slot| slot.job.estimate_size())
            .sum()
    }

    fn produce_next(&mut self) -> Result<Option<ResultItem>, ProviderError> {
        if self.slots.is_empty() {
            return Ok(None);
        }
        // 最多转一整圈；每个 slot 要么给出结果要么被标记为完成
        for _ in 0..self.slots.len() {
            let slot = &mut self.slots[self.cursor];
            if slot.done {
                self.advance();
                continue;
            }
            // panic 只终止当前 slot，不影响其余 job
            let job = &mut slot.job;
            let produced = catch_unwind(AssertUnwindSafe(|| job.produce_next()))
                .unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(&panic))));
            match produced {
                Ok(Some(item)) => {
                    self.advance();
                    return Ok(Some(item));
                }
                Ok(None) => {
                    slot.done = true;
                    self.advance();
                }
                Err(err) => {
                    slot.done = true;
                    let name = slot.job.name().to_string();
                    self.advance();
                    match self.policy {
                        ProviderFailurePolicy::AbortTask => return Err(err),
                        ProviderFailurePolicy::SkipJob => {
                            self.failures += 1;
                            tracing::warn!(job = %name, error = %err, "merged provider job failed, skipped");
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    fn is_done(&self) -> bool {
        self.slots.iter().all(|slot| slot.done)
    }

    fn skipped_failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/merged.rs"]
mod tests;
