//! 搜索协调器
//!
//! 编辑/触发 -> 去抖 -> 串行通道（停止旧任务、构建新任务、启动抓取）
//! -> 任务逐条产出 -> 聚合器 -> 定期刷新到消费方。
//!
//! 所有任务生命周期操作都在串行通道上执行；消费方状态只通过 owner
//! 线程修改，通道自身从不直接触碰。

use super::aggregator::ResultAggregator;
use super::debounce::SearchEvents;
use super::lane::SerialLane;
use super::lock;
use super::resolver::{DecompileBatchCache, ScopeResolver};
use super::task::SearchTask;
use crate::kernel::services::ports::{
    BuildError, DocumentRef, OwnerThread, ProjectSource, ProviderFactory, Query, ResultItem,
    ScopeFlag, ScopeFlags, SearchConfig, SearchConsumer, SearchHistory, SearchPreset, TaskInfo,
    TaskProgress, TaskState,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// 协调器依赖的外部协作方
#[derive(Clone)]
pub struct SearchDeps {
    pub project: Arc<dyn ProjectSource>,
    pub factory: Arc<dyn ProviderFactory>,
    pub consumer: Arc<dyn SearchConsumer>,
    pub owner: Arc<dyn OwnerThread>,
    pub history: Arc<dyn SearchHistory>,
}

struct ActiveSearch {
    query: Query,
    task: Arc<SearchTask>,
}

struct Inner {
    lane: SerialLane,
    runtime: tokio::runtime::Handle,
    deps: SearchDeps,
    config: SearchConfig,
    preset: SearchPreset,
    options: Mutex<ScopeFlags>,
    active_document: Mutex<Option<DocumentRef>>,
    /// 只在串行通道上修改
    current: Mutex<Option<ActiveSearch>>,
    aggregator: Arc<ResultAggregator>,
    batches: DecompileBatchCache,
    builds: AtomicUsize,
}

pub struct SearchCoordinator {
    inner: Arc<Inner>,
    events: SearchEvents,
}

impl SearchCoordinator {
    pub fn new(
        runtime: tokio::runtime::Handle,
        deps: SearchDeps,
        config: SearchConfig,
        preset: SearchPreset,
    ) -> io::Result<Self> {
        let options = preset.build_options(deps.history.last_options(preset));
        let inner = Arc::new(Inner {
            lane: SerialLane::new("zsearch-lane")?,
            runtime: runtime.clone(),
            deps,
            preset,
            options: Mutex::new(options),
            active_document: Mutex::new(None),
            current: Mutex::new(None),
            aggregator: Arc::new(ResultAggregator::new()),
            batches: DecompileBatchCache::new(),
            builds: AtomicUsize::new(0),
            config,
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let events = SearchEvents::spawn(&runtime, inner.config.debounce(), move |text| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let lane_inner = Arc::clone(&inner);
            inner.lane.submit(move || lane_inner.search(text));
        });

        Ok(Self { inner, events })
    }

    /// 打开时恢复初始文本；包含注释搜索时立即列出全部注释
    pub fn open(&self, initial_text: Option<String>) -> Option<String> {
        let text = initial_text.or_else(|| self.inner.deps.history.last_search());
        if let Some(text) = &text {
            self.events.text_changed(text);
        }
        if self.options().contains(ScopeFlag::Comment) {
            self.events.emit_search();
        }
        text
    }

    pub fn text_changed(&self, text: &str) {
        self.events.text_changed(text);
    }

    pub fn emit_search(&self) {
        self.events.emit_search();
    }

    pub fn set_option(&self, flag: ScopeFlag, enabled: bool) {
        let changed = lock(&self.inner.options).set(flag, enabled);
        if changed {
            self.events.emit_search();
        }
    }

    pub fn options(&self) -> ScopeFlags {
        lock(&self.inner.options).clone()
    }

    pub fn preset(&self) -> SearchPreset {
        self.inner.preset
    }

    /// 只有限定在当前标签页时才重新搜索
    pub fn set_active_document(&self, doc: Option<DocumentRef>) {
        *lock(&self.inner.active_document) = doc;
        if self.options().contains(ScopeFlag::ActiveTabOnly) {
            tracing::debug!("active tab change event received");
            self.events.emit_search();
        }
    }

    pub fn project_loading(&self) {
        self.events.set_enabled(false);
    }

    pub fn project_loaded(&self) {
        self.inner.batches.invalidate();
        self.events.set_enabled(true);
        self.events.emit_search();
    }

    /// `all` 为真时取回全部剩余结果，否则再取一页
    pub fn load_more(&self, all: bool) {
        let inner = Arc::clone(&self.inner);
        self.inner.lane.submit(move || inner.load_more(all));
    }

    /// 在串行通道上停止当前任务并释放项目临时数据，随后关闭通道。
    /// 不等待通道线程退出：通道可能正等待 owner 线程执行回调
    pub fn dispose(&self) {
        self.events.close();
        let consumer = Arc::clone(&self.inner.deps.consumer);
        self.inner.deps.owner.run(Box::new(move || consumer.reset()));

        let inner = Arc::clone(&self.inner);
        self.inner.lane.submit(move || {
            inner.stop_search_task();
            inner.deps.project.unload_temp_data();
        });
        self.inner.lane.close();
    }

    pub fn current_state(&self) -> Option<TaskState> {
        lock(&self.inner.current)
            .as_ref()
            .map(|search| search.task.state())
    }

    pub fn current_query(&self) -> Option<Query> {
        lock(&self.inner.current)
            .as_ref()
            .map(|search| search.query.clone())
    }

    /// 成功构建的搜索次数
    pub fn builds(&self) -> usize {
        self.inner.builds.load(Ordering::Relaxed)
    }

    pub fn batch_cache(&self) -> &DecompileBatchCache {
        &self.inner.batches
    }
}

impl Inner {
    fn search(self: &Arc<Self>, text: String) {
        debug_assert!(self.lane.is_lane_thread());
        self.stop_search_task();
        self.aggregator.clear();
        let consumer = Arc::clone(&self.deps.consumer);
        self.deps.owner.run(Box::new(move || consumer.reset()));

        let query = self.snapshot_query(text);
        let task = match self.prepare_search(&query) {
            Ok(task) => task,
            Err(err) => {
                self.report_build_error(&query, err);
                return;
            }
        };
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.deps.history.set_last_search(&query.text);
        self.deps.history.set_last_options(self.preset, &query.scope);

        let consumer = Arc::clone(&self.deps.consumer);
        let started = query.clone();
        self.deps
            .owner
            .run_and_wait(Box::new(move || consumer.search_started(&started)));

        task.set_results_limit(self.config.results_page);
        let task = Arc::new(task);
        *lock(&self.current) = Some(ActiveSearch {
            query,
            task: Arc::clone(&task),
        });
        task.fetch_results();
        tracing::debug!(
            task = task.id(),
            total = task.get_task_progress().total,
            "total search items count estimation"
        );
    }

    fn snapshot_query(&self, text: String) -> Query {
        let scope = lock(&self.options).clone();
        let doc = if scope.contains(ScopeFlag::ActiveTabOnly) {
            lock(&self.active_document).clone()
        } else {
            None
        };
        Query::new(text, scope).with_active_document(doc)
    }

    fn prepare_search(&self, query: &Query) -> Result<SearchTask, BuildError> {
        tracing::debug!(text = %query.text, options = %query.scope, "building search");
        let resolver = ScopeResolver::new(
            self.deps.project.as_ref(),
            self.deps.factory.as_ref(),
            &self.batches,
            self.config.failure_policy,
        );
        let jobs = resolver.resolve(query)?;

        let aggregator = Arc::clone(&self.aggregator);
        let on_result = Arc::new(move |item: ResultItem| aggregator.add_result(item));

        let aggregator = Arc::clone(&self.aggregator);
        let consumer = Arc::clone(&self.deps.consumer);
        let owner = Arc::clone(&self.deps.owner);
        let on_finished = Arc::new(move |info: &TaskInfo, complete: bool| {
            tracing::debug!(task = info.task_id, state = ?info.state, complete, "search complete");
            let batch = aggregator.flush();
            let consumer = Arc::clone(&consumer);
            let info = info.clone();
            owner.run(Box::new(move || {
                if let Some(batch) = batch {
                    consumer.append_results(batch);
                }
                consumer.finished(&info, complete);
            }));
        });

        let task = SearchTask::with_policy(
            self.runtime.clone(),
            on_result,
            on_finished,
            self.config.failure_policy,
            self.config.flush_every(),
        );
        for job in jobs {
            task.add_provider_job(job);
        }

        let aggregator = Arc::clone(&self.aggregator);
        let consumer = Arc::clone(&self.deps.consumer);
        let owner = Arc::clone(&self.deps.owner);
        task.set_progress_listener(Arc::new(move |progress: TaskProgress| {
            // 在生产线程上取批次，批次边界只取决于产出顺序
            let batch = aggregator.flush();
            let consumer = Arc::clone(&consumer);
            owner.run(Box::new(move || {
                consumer.progress(progress);
                if let Some(batch) = batch {
                    consumer.append_results(batch);
                }
            }));
        }));
        Ok(task)
    }

    fn report_build_error(&self, query: &Query, err: BuildError) {
        match err {
            BuildError::EmptyQuery | BuildError::NoScope => {
                tracing::debug!(text = %query.text, options = %query.scope, reason = %err, "search skipped");
            }
            err => {
                tracing::debug!(text = %query.text, error = %err, "search build failed");
                let consumer = Arc::clone(&self.deps.consumer);
                let message = err.to_string();
                self.deps
                    .owner
                    .run(Box::new(move || consumer.error(&message)));
            }
        }
    }

    fn stop_search_task(&self) {
        let previous = lock(&self.current).take();
        if let Some(search) = previous {
            search.task.cancel();
            search.task.wait_task();
        }
    }

    fn load_more(&self, all: bool) {
        let (task, query) = match lock(&self.current).as_ref() {
            Some(search) => (Arc::clone(&search.task), search.query.clone()),
            None => return,
        };
        if task.state() != TaskState::LimitReached {
            tracing::debug!(task = task.id(), state = ?task.state(), "load more ignored");
            return;
        }
        // 状态已是 LimitReached，但完成回调可能仍在执行
        task.wait_task();

        let consumer = Arc::clone(&self.deps.consumer);
        self.deps
            .owner
            .run_and_wait(Box::new(move || consumer.search_started(&query)));
        if all {
            task.set_results_limit(0);
        } else {
            let limit = task.results_limit();
            task.set_results_limit(limit + self.config.results_page);
        }
        task.fetch_results();
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/coordinator.rs"]
mod tests;
