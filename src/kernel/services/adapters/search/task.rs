//! 可取消、可续取的搜索任务
//!
//! - `fetch_results` 在 runtime 的阻塞线程上按顺序驱动 provider job
//! - 取消是协作式的，只在两条结果之间检查
//! - 达到结果上限后暂停在 `LimitReached`，可在同一个任务上再次 `fetch_results`

use super::lock;
use super::lane::panic_message;
use crate::kernel::services::ports::{
    ProviderError, ProviderFailurePolicy, ProviderJob, ResultItem, TaskInfo, TaskProgress,
    TaskState,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

static TASK_ID: AtomicU64 = AtomicU64::new(0);

fn next_task_id() -> u64 {
    TASK_ID.fetch_add(1, Ordering::Relaxed)
}

pub type ResultSink = Arc<dyn Fn(ResultItem) + Send + Sync>;
pub type ProgressListener = Arc<dyn Fn(TaskProgress) + Send + Sync>;
pub type CompletionListener = Arc<dyn Fn(&TaskInfo, bool) + Send + Sync>;

struct Control {
    state: TaskState,
    /// 生产线程仍在运行（包括完成回调）
    active: bool,
    failed_jobs: usize,
    elapsed: Duration,
}

struct JobQueue {
    jobs: Vec<Box<dyn ProviderJob>>,
    current: usize,
}

impl JobQueue {
    fn remaining_estimate(&self) -> usize {
        self.jobs
            .iter()
            .skip(self.current)
            .filter(|job| !job.is_done())
            .map(|job| job.estimate_size())
            .sum()
    }

    fn skipped_failures(&self) -> usize {
        self.jobs.iter().map(|job| job.skipped_failures()).sum()
    }
}

struct Shared {
    id: u64,
    control: Mutex<Control>,
    stopped: Condvar,
    cancelled: AtomicBool,
    produced: AtomicUsize,
    total: AtomicUsize,
    total_dirty: AtomicBool,
    limit: AtomicUsize,
    jobs: Mutex<JobQueue>,
    on_result: ResultSink,
    on_finished: CompletionListener,
    progress: Mutex<Option<ProgressListener>>,
    policy: ProviderFailurePolicy,
    tick_every: usize,
}

pub struct SearchTask {
    shared: Arc<Shared>,
    runtime: tokio::runtime::Handle,
}

impl SearchTask {
    pub fn new(
        runtime: tokio::runtime::Handle,
        on_result: ResultSink,
        on_finished: CompletionListener,
    ) -> Self {
        Self::with_policy(
            runtime,
            on_result,
            on_finished,
            ProviderFailurePolicy::default(),
            100,
        )
    }

    /// `tick_every`：每产出多少条结果触发一次进度回调（job 切换时也会触发）
    pub fn with_policy(
        runtime: tokio::runtime::Handle,
        on_result: ResultSink,
        on_finished: CompletionListener,
        policy: ProviderFailurePolicy,
        tick_every: usize,
    ) -> Self {
        let shared = Shared {
            id: next_task_id(),
            control: Mutex::new(Control {
                state: TaskState::Created,
                active: false,
                failed_jobs: 0,
                elapsed: Duration::ZERO,
            }),
            stopped: Condvar::new(),
            cancelled: AtomicBool::new(false),
            produced: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            total_dirty: AtomicBool::new(true),
            limit: AtomicUsize::new(0),
            jobs: Mutex::new(JobQueue {
                jobs: Vec::new(),
                current: 0,
            }),
            on_result,
            on_finished,
            progress: Mutex::new(None),
            policy,
            tick_every: tick_every.max(1),
        };
        Self {
            shared: Arc::new(shared),
            runtime,
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        lock(&self.shared.control).state
    }

    /// 任务开始运行后追加的 job 不会被执行
    pub fn add_provider_job(&self, job: Box<dyn ProviderJob>) {
        if lock(&self.shared.control).state != TaskState::Created {
            tracing::warn!(task = self.shared.id, job = job.name(), "job added after start, ignored");
            return;
        }
        lock(&self.shared.jobs).jobs.push(job);
        self.shared.total_dirty.store(true, Ordering::Relaxed);
    }

    pub fn job_count(&self) -> usize {
        lock(&self.shared.jobs).jobs.len()
    }

    /// 0 表示不限制
    pub fn set_results_limit(&self, limit: usize) {
        self.shared.limit.store(limit, Ordering::Relaxed);
    }

    pub fn results_limit(&self) -> usize {
        self.shared.limit.load(Ordering::Relaxed)
    }

    pub fn set_progress_listener(&self, listener: ProgressListener) {
        *lock(&self.shared.progress) = Some(listener);
    }

    /// 启动（或继续）抓取，立即返回。
    /// 只有 `Created` 和 `LimitReached` 状态可以抓取。
    pub fn fetch_results(&self) -> bool {
        {
            let mut control = lock(&self.shared.control);
            if control.active {
                tracing::warn!(task = self.shared.id, "fetch while task still active, ignored");
                return false;
            }
            match control.state {
                TaskState::Created | TaskState::LimitReached => {}
                state => {
                    tracing::debug!(task = self.shared.id, ?state, "fetch on finished task, ignored");
                    return false;
                }
            }
            control.state = TaskState::Running;
            control.active = true;
            self.shared.cancelled.store(false, Ordering::Relaxed);
        }

        let shared = Arc::clone(&self.shared);
        self.runtime.spawn_blocking(move || run_jobs(&shared));
        true
    }

    /// 设置取消标记，不阻塞。未运行的任务直接进入 `Cancelled`
    pub fn cancel(&self) {
        let mut control = lock(&self.shared.control);
        self.shared.cancelled.store(true, Ordering::Relaxed);
        if !control.active && !control.state.is_final() {
            control.state = TaskState::Cancelled;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Relaxed)
    }

    /// 阻塞直到生产线程真正停止
    pub fn wait_task(&self) {
        let mut control = lock(&self.shared.control);
        while control.active {
            control = match self.shared.stopped.wait(control) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// 超时返回 false
    pub fn wait_task_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = lock(&self.shared.control);
        while control.active {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            control = match self.shared.stopped.wait_timeout(control, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    pub fn get_task_progress(&self) -> TaskProgress {
        if self.shared.total_dirty.load(Ordering::Relaxed) {
            // 运行中 job 队列被生产线程持有，此时沿用上次的估计值
            if let Ok(jobs) = self.shared.jobs.try_lock() {
                self.shared.recompute_total(&jobs);
            }
        }
        self.shared.progress_snapshot()
    }

    pub fn info(&self) -> TaskInfo {
        let control = lock(&self.shared.control);
        TaskInfo {
            task_id: self.shared.id,
            state: control.state,
            progress: self.shared.progress_snapshot(),
            failed_jobs: control.failed_jobs,
            elapsed: control.elapsed,
        }
    }
}

impl Shared {
    fn recompute_total(&self, jobs: &JobQueue) {
        let produced = self.produced.load(Ordering::Relaxed);
        self.total
            .store(produced + jobs.remaining_estimate(), Ordering::Relaxed);
        self.total_dirty.store(false, Ordering::Relaxed);
    }

    fn progress_snapshot(&self) -> TaskProgress {
        let produced = self.produced.load(Ordering::Relaxed);
        TaskProgress {
            produced,
            total: self.total.load(Ordering::Relaxed).max(produced),
        }
    }

    fn tick(&self) {
        let listener = lock(&self.progress).clone();
        if let Some(listener) = listener {
            listener(self.progress_snapshot());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn limit_reached(&self) -> bool {
        let limit = self.limit.load(Ordering::Relaxed);
        limit != 0 && self.produced.load(Ordering::Relaxed) >= limit
    }
}

/// 生产线程退出时（包括 panic）清除 active 并唤醒等待方
struct ActiveGuard<'a>(&'a Shared);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut control = lock(&self.0.control);
        if control.state == TaskState::Running {
            control.state = TaskState::Failed;
        }
        control.active = false;
        self.0.stopped.notify_all();
    }
}

fn run_jobs(shared: &Shared) {
    let _active = ActiveGuard(shared);
    let started = Instant::now();
    let mut failed_jobs = 0usize;
    let mut since_tick = 0usize;

    let (outcome, skipped) = {
        let mut queue = lock(&shared.jobs);
        shared.recompute_total(&queue);
        let skipped_before = queue.skipped_failures();

        let outcome = loop {
            // 先跳过已耗尽的 job，全部耗尽则视为完成，而不是停在上限
            while queue
                .jobs
                .get(queue.current)
                .is_some_and(|job| job.is_done())
            {
                queue.current += 1;
                shared.recompute_total(&queue);
                since_tick = 0;
                shared.tick();
            }
            if queue.current >= queue.jobs.len() {
                break TaskState::Exhausted;
            }
            if shared.is_cancelled() {
                break TaskState::Cancelled;
            }
            if shared.limit_reached() {
                break TaskState::LimitReached;
            }

            let current = queue.current;
            let job = &mut queue.jobs[current];
            let produced = catch_unwind(AssertUnwindSafe(|| job.produce_next()))
                .unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(&panic))));

            match produced {
                Ok(Some(item)) => {
                    (shared.on_result)(item);
                    shared.produced.fetch_add(1, Ordering::Relaxed);
                    since_tick += 1;
                    if since_tick >= shared.tick_every {
                        since_tick = 0;
                        shared.tick();
                    }
                }
                Ok(None) => {
                    queue.current += 1;
                    shared.recompute_total(&queue);
                    since_tick = 0;
                    shared.tick();
                }
                Err(err) => {
                    failed_jobs += 1;
                    tracing::warn!(
                        task = shared.id,
                        job = queue.jobs[current].name(),
                        error = %err,
                        "provider job failed"
                    );
                    if shared.policy == ProviderFailurePolicy::AbortTask {
                        break TaskState::Failed;
                    }
                    queue.current += 1;
                    shared.recompute_total(&queue);
                    since_tick = 0;
                    shared.tick();
                }
            }
        };
        (outcome, queue.skipped_failures() - skipped_before)
    };

    let info = {
        let mut control = lock(&shared.control);
        control.state = outcome;
        control.failed_jobs += failed_jobs + skipped;
        control.elapsed += started.elapsed();
        TaskInfo {
            task_id: shared.id,
            state: outcome,
            progress: shared.progress_snapshot(),
            failed_jobs: control.failed_jobs,
            elapsed: control.elapsed,
        }
    };

    tracing::debug!(
        task = shared.id,
        state = ?info.state,
        produced = info.progress.produced,
        elapsed_ms = info.elapsed.as_millis() as u64,
        "search task stopped"
    );
    (shared.on_finished)(&info, info.is_complete());
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/task.rs"]
mod tests;
