use std::sync::{Mutex, MutexGuard};

/// 锁中毒时继续使用内部数据：持锁方 panic 不应让搜索彻底失效
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/sync.rs"]
mod tests;
