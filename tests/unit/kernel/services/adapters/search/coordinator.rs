use super::*;
use crate::kernel::services::adapters::owner::{owner_queue, OwnerLoop};
use crate::kernel::services::adapters::search::{MemoryClass, MemoryProject, ProjectData};
use crate::kernel::services::adapters::MemoryHistory;
use crate::kernel::services::ports::{
    ClassRef, ProviderError, ProviderJob, QueryMatcher, ResultKind,
};
use crate::kernel::{ResultsState, SearchResultsModel};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

fn config() -> SearchConfig {
    SearchConfig {
        debounce_ms: 10,
        results_page: 50,
        flush_every: 20,
        ..SearchConfig::default()
    }
}

fn sample_project() -> ProjectData {
    let mut main = MemoryClass::new("com.app.MainActivity");
    main.methods = vec!["onCreate".into()];
    main.code = vec!["new MainActivity();".into()];
    main.comments = vec!["// main screen".into()];

    let mut inner = MemoryClass::new("com.app.MainActivity$Holder");
    inner.comments = vec!["// view holder".into()];

    let mut lower = MemoryClass::new("com.app.mainactivity");
    lower.comments = vec!["// lower case twin".into()];

    let mut gens = (0..200)
        .map(|i| MemoryClass::new(format!("gen.Gen{i:03}")))
        .collect::<Vec<_>>();
    let mut classes = vec![main, inner, lower];
    classes.append(&mut gens);

    let mut documents = BTreeMap::new();
    documents.insert("MainActivity.java".to_string(), "com.app.MainActivity".to_string());
    documents.insert("Gen000.java".to_string(), "gen.Gen000".to_string());
    ProjectData {
        classes,
        resources: Vec::new(),
        documents,
        batch_size: 16,
    }
}

// 字段按声明顺序释放：owner 先于协调器，runtime 最后
struct Fixture {
    owner: OwnerLoop,
    coordinator: SearchCoordinator,
    model: Arc<SearchResultsModel>,
    project: Arc<MemoryProject>,
    history: Arc<MemoryHistory>,
    _rt: tokio::runtime::Runtime,
}

impl Fixture {
    fn new(preset: SearchPreset) -> Self {
        Self::with(preset, config(), MemoryHistory::new(), None)
    }

    fn with(
        preset: SearchPreset,
        config: SearchConfig,
        history: MemoryHistory,
        factory: Option<Arc<dyn ProviderFactory>>,
    ) -> Self {
        let rt = create_runtime();
        let project = Arc::new(MemoryProject::new(sample_project()));
        let history = Arc::new(history);
        let model = Arc::new(SearchResultsModel::new());
        let (queue, mut owner) = owner_queue();
        owner.pump();
        let deps = SearchDeps {
            project: project.clone(),
            factory: factory.unwrap_or_else(|| project.clone() as Arc<dyn ProviderFactory>),
            consumer: model.clone(),
            owner: Arc::new(queue),
            history: history.clone(),
        };
        let coordinator = SearchCoordinator::new(rt.handle().clone(), deps, config, preset).unwrap();
        Self {
            owner,
            coordinator,
            model,
            project,
            history,
            _rt: rt,
        }
    }

    fn pump_until<F>(&mut self, mut pred: F) -> ResultsState
    where
        F: FnMut(&ResultsState) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            self.owner.pump_timeout(Duration::from_millis(10));
            let state = self.model.snapshot();
            if pred(&state) {
                return state;
            }
            assert!(Instant::now() < deadline, "timed out, state: {state:?}");
        }
    }

    /// 等待针对 `text` 的搜索停止
    fn search(&mut self, text: &str) -> ResultsState {
        self.coordinator.text_changed(text);
        self.wait_done(text)
    }

    fn wait_done(&mut self, text: &str) -> ResultsState {
        let text = text.to_string();
        self.pump_until(|s| s.highlight.text == text && s.complete.is_some() && !s.searching)
    }

    /// 等待一段时间，期间持续执行 owner 回调
    fn settle(&mut self, wait: Duration) -> ResultsState {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            self.owner.pump_timeout(Duration::from_millis(5));
        }
        self.model.snapshot()
    }
}

fn names(state: &ResultsState) -> Vec<String> {
    state.items.iter().map(ToString::to_string).collect()
}

#[test]
fn test_class_search_is_case_sensitive_and_sorted() {
    let mut f = Fixture::new(SearchPreset::Class);
    assert_eq!(
        f.coordinator.options(),
        [ScopeFlag::Class].into_iter().collect::<ScopeFlags>()
    );

    let state = f.search("MainActivity");
    assert_eq!(
        names(&state),
        vec!["com.app.MainActivity", "com.app.MainActivity$Holder"]
    );
    assert_eq!(state.complete, Some(true));
    assert!(!state.load_more_enabled);
    assert_eq!(f.coordinator.current_state(), Some(TaskState::Exhausted));
    assert!(state.highlight.case_sensitive);
}

#[test]
fn test_ignore_case_option_widens_match() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.set_option(ScopeFlag::IgnoreCase, true);
    let state = f.search("MainActivity");
    assert_eq!(state.items.len(), 3);
    assert!(!state.highlight.case_sensitive);
}

#[test]
fn test_open_comment_preset_lists_all_comments() {
    let mut f = Fixture::new(SearchPreset::Comment);
    assert_eq!(f.coordinator.open(None), None);
    let state = f.wait_done("");
    assert_eq!(
        names(&state),
        vec![
            "com.app.MainActivity:1  // main screen",
            "com.app.MainActivity$Holder:1  // view holder",
            "com.app.mainactivity:1  // lower case twin",
        ]
    );
}

#[test]
fn test_empty_options_build_nothing() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.set_option(ScopeFlag::Class, false);
    f.coordinator.text_changed("Main");
    let state = f.settle(Duration::from_millis(150));

    assert_eq!(f.coordinator.builds(), 0);
    assert!(state.items.is_empty());
    assert_eq!(state.error, None);
    assert_eq!(state.finished_count, 0);
    assert_eq!(f.coordinator.current_state(), None);
}

#[test]
fn test_empty_text_is_silent() {
    let mut f = Fixture::with(
        SearchPreset::Class,
        SearchConfig {
            debounce_ms: 60,
            ..config()
        },
        MemoryHistory::new(),
        None,
    );
    f.coordinator.text_changed("x");
    f.coordinator.text_changed("");
    let state = f.settle(Duration::from_millis(150));
    assert_eq!(f.coordinator.builds(), 0);
    assert_eq!(state.error, None);
}

#[test]
fn test_invalid_regex_reports_error() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.set_option(ScopeFlag::UseRegex, true);
    f.coordinator.text_changed("Main(");
    let state = f.pump_until(|s| s.error.is_some());
    assert!(state.error.unwrap().starts_with("Invalid regex"));
    assert_eq!(f.coordinator.builds(), 0);
}

#[test]
fn test_limit_then_load_more_then_load_all() {
    let mut f = Fixture::new(SearchPreset::Class);
    let first = f.search("Gen");
    assert_eq!(first.items.len(), 50);
    assert!(first.load_more_enabled);
    assert_eq!(f.coordinator.current_state(), Some(TaskState::LimitReached));
    assert_eq!(names(&first)[0], "gen.Gen000");

    f.coordinator.load_more(false);
    let second = f.pump_until(|s| s.finished_count == 2);
    assert_eq!(second.items.len(), 100);
    assert_eq!(&second.items[..50], &first.items[..]);
    assert!(second.load_more_enabled);

    f.coordinator.load_more(true);
    let all = f.pump_until(|s| s.finished_count == 3);
    assert_eq!(all.items.len(), 200);
    assert_eq!(&all.items[..100], &second.items[..]);
    assert_eq!(all.complete, Some(true));
    assert!(!all.load_more_enabled);

    let mut deduped = all.items.clone();
    deduped.dedup();
    assert_eq!(deduped.len(), 200);
    assert_eq!(f.coordinator.builds(), 1);
}

#[test]
fn test_load_more_without_paused_task_is_ignored() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.load_more(true);
    let state = f.search("MainActivity");
    f.coordinator.load_more(false);
    let after = f.settle(Duration::from_millis(100));
    assert_eq!(after.finished_count, state.finished_count);
    assert_eq!(after.items, state.items);
}

#[test]
fn test_rapid_edits_search_only_last_text() {
    let mut f = Fixture::with(
        SearchPreset::Class,
        SearchConfig {
            debounce_ms: 60,
            ..config()
        },
        MemoryHistory::new(),
        None,
    );
    for text in ["G", "Ge", "Gen", "Gen1", "Gen19"] {
        f.coordinator.text_changed(text);
    }
    let state = f.wait_done("Gen19");
    assert_eq!(f.coordinator.builds(), 1);
    assert_eq!(
        f.coordinator.current_query().map(|q| q.text),
        Some("Gen19".to_string())
    );
    assert_eq!(state.items.len(), 10);
}

#[test]
fn test_batches_are_deterministic() {
    let run = || {
        let mut f = Fixture::new(SearchPreset::Class);
        f.coordinator.set_option(ScopeFlag::Method, true);
        let state = f.search("Gen1");
        (names(&state), state.batches)
    };
    let (items_a, batches_a) = run();
    let (items_b, batches_b) = run();
    assert_eq!(items_a, items_b);
    assert_eq!(batches_a, batches_b);
    assert_eq!(batches_a.iter().sum::<usize>(), items_a.len());
}

#[test]
fn test_history_records_successful_builds() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.search("MainActivity");
    assert_eq!(f.history.last_search().as_deref(), Some("MainActivity"));
    assert_eq!(
        f.history.last_options(SearchPreset::Class),
        Some([ScopeFlag::Class].into_iter().collect::<ScopeFlags>())
    );
}

#[test]
fn test_open_restores_last_search() {
    let history = MemoryHistory::new();
    history.set_last_search("MainActivity");
    history.set_last_options(
        SearchPreset::Text,
        &[ScopeFlag::Class, ScopeFlag::IgnoreCase].into_iter().collect(),
    );
    let mut f = Fixture::with(SearchPreset::Text, config(), history, None);

    assert_eq!(f.coordinator.open(None).as_deref(), Some("MainActivity"));
    let state = f.wait_done("MainActivity");
    assert_eq!(state.items.len(), 3);

    assert_eq!(f.coordinator.open(Some("Gen199".into())).as_deref(), Some("Gen199"));
    let state = f.wait_done("Gen199");
    assert_eq!(names(&state), vec!["gen.Gen199"]);
}

#[test]
fn test_active_document_only_retriggers_with_active_tab_only() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.search("Gen");
    let builds = f.coordinator.builds();

    f.coordinator
        .set_active_document(Some(DocumentRef("Gen000.java".into())));
    f.settle(Duration::from_millis(100));
    assert_eq!(f.coordinator.builds(), builds);

    f.coordinator.set_option(ScopeFlag::ActiveTabOnly, true);
    let state = f.pump_until(|s| s.complete == Some(true));
    assert_eq!(names(&state), vec!["gen.Gen000"]);

    f.coordinator
        .set_active_document(Some(DocumentRef("MainActivity.java".into())));
    let state = f.pump_until(|s| s.complete == Some(true) && s.items.is_empty());
    assert_eq!(state.error, None);
    assert_eq!(f.coordinator.builds(), builds + 2);
}

#[test]
fn test_active_tab_without_document_reports_error() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.set_option(ScopeFlag::ActiveTabOnly, true);
    f.coordinator.text_changed("Main");
    let state = f.pump_until(|s| s.error.is_some());
    assert_eq!(state.error.as_deref(), Some("Can't search in current tab"));
}

#[test]
fn test_project_reload_cycle() {
    let mut f = Fixture::new(SearchPreset::Text);
    f.coordinator.set_option(ScopeFlag::IgnoreCase, false);
    f.search("Gen007");
    assert!(f.coordinator.batch_cache().is_cached());
    let builds = f.coordinator.builds();

    f.coordinator.project_loading();
    f.coordinator.emit_search();
    f.settle(Duration::from_millis(100));
    assert_eq!(f.coordinator.builds(), builds);

    let mut reloaded = MemoryClass::new("gen.Gen007");
    reloaded.code = vec!["Gen007 again".into()];
    f.project.reload(ProjectData {
        classes: vec![reloaded, MemoryClass::new("gen.Other")],
        ..ProjectData::default()
    });
    f.coordinator.project_loaded();
    let state = f.pump_until(|s| s.complete == Some(true) && s.items.len() == 1);
    assert_eq!(names(&state), vec!["gen.Gen007:1  Gen007 again"]);
    assert_eq!(f.project.batch_builds(), 2);
}

#[test]
fn test_dispose_stops_task_and_unloads() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.search("Gen");
    f.coordinator.dispose();
    let deadline = Instant::now() + Duration::from_secs(5);
    while f.project.unloads() == 0 {
        assert!(Instant::now() < deadline);
        f.owner.pump_timeout(Duration::from_millis(10));
    }
    let state = f.settle(Duration::from_millis(50));
    assert!(state.items.is_empty());

    f.coordinator.text_changed("after dispose");
    f.settle(Duration::from_millis(100));
    assert_eq!(f.coordinator.builds(), 1);
}

/// 统计同一时刻有多少个 job 在产出
#[derive(Default)]
struct Gauge {
    running: AtomicUsize,
    max: AtomicUsize,
}

struct GaugedJob {
    inner: Box<dyn ProviderJob>,
    gauge: Arc<Gauge>,
}

impl ProviderJob for GaugedJob {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn estimate_size(&self) -> usize {
        self.inner.estimate_size()
    }

    fn produce_next(&mut self) -> Result<Option<ResultItem>, ProviderError> {
        let now = self.gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.max.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(1));
        let result = self.inner.produce_next();
        self.gauge.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }
}

struct GaugedFactory {
    project: Arc<MemoryProject>,
    gauge: Arc<Gauge>,
}

impl GaugedFactory {
    fn wrap(&self, inner: Box<dyn ProviderJob>) -> Box<dyn ProviderJob> {
        Box::new(GaugedJob {
            inner,
            gauge: Arc::clone(&self.gauge),
        })
    }
}

impl ProviderFactory for GaugedFactory {
    fn class_job(&self, m: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob> {
        self.wrap(self.project.class_job(m, classes))
    }

    fn method_job(&self, m: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob> {
        self.wrap(self.project.method_job(m, classes))
    }

    fn field_job(&self, m: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob> {
        self.wrap(self.project.field_job(m, classes))
    }

    fn code_job(&self, m: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob> {
        self.wrap(self.project.code_job(m, classes))
    }

    fn resource_job(&self, m: &Arc<QueryMatcher>) -> Box<dyn ProviderJob> {
        self.wrap(self.project.resource_job(m))
    }

    fn comment_job(&self, m: &Arc<QueryMatcher>) -> Box<dyn ProviderJob> {
        self.wrap(self.project.comment_job(m))
    }
}

#[test]
fn test_at_most_one_task_runs_at_a_time() {
    let gauge = Arc::new(Gauge::default());
    let factory = Arc::new(GaugedFactory {
        project: Arc::new(MemoryProject::new(sample_project())),
        gauge: Arc::clone(&gauge),
    });
    let mut f = Fixture::with(
        SearchPreset::Class,
        SearchConfig {
            results_page: 0,
            ..config()
        },
        MemoryHistory::new(),
        Some(factory),
    );

    for text in ["Gen", "Gen0", "Gen1", "Gen"] {
        f.coordinator.text_changed(text);
        f.settle(Duration::from_millis(30));
    }
    let state = f.pump_until(|s| s.highlight.text == "Gen" && s.complete == Some(true));
    assert_eq!(state.items.len(), 200);
    assert!(f.coordinator.builds() >= 2);
    assert_eq!(gauge.max.load(Ordering::SeqCst), 1);
}

#[test]
fn test_result_kinds_follow_job_order() {
    let mut f = Fixture::new(SearchPreset::Class);
    f.coordinator.set_option(ScopeFlag::Method, true);
    f.coordinator.set_option(ScopeFlag::Code, true);
    f.coordinator.set_option(ScopeFlag::Comment, true);
    f.coordinator.set_option(ScopeFlag::IgnoreCase, true);
    let state = f.search("Main");
    let kinds: Vec<ResultKind> = state.items.iter().map(|item| item.kind).collect();
    let first_code = kinds.iter().position(|k| *k == ResultKind::Code).unwrap();
    let first_comment = kinds.iter().position(|k| *k == ResultKind::Comment).unwrap();
    assert!(kinds[..first_code]
        .iter()
        .all(|k| matches!(k, ResultKind::Class | ResultKind::Method)));
    assert!(first_code < first_comment);
}
