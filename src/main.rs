//! zsearch 命令行：加载 JSON 项目，执行一次搜索并打印结果
//!
//! 用法：zsearch <project.json> <query> [flag,flag,...] [--all] [--verbose]

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use zsearch::kernel::services::adapters::{
    get_history_path, load_settings, owner_queue, JsonHistory, MemoryHistory, MemoryProject,
    OwnerLoop, SearchCoordinator, SearchDeps, SearchRuntime,
};
use zsearch::kernel::services::ports::{
    ScopeFlag, ScopeFlags, SearchHistory, SearchPreset, TaskState,
};
use zsearch::kernel::{ResultsState, SearchResultsModel};

mod logging;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

struct Args {
    project: PathBuf,
    query: String,
    flags: Option<ScopeFlags>,
    all: bool,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut all = false;
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--all" => all = true,
            "--verbose" | "-v" => verbose = true,
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let project = positional
        .next()
        .map(PathBuf::from)
        .ok_or("usage: zsearch <project.json> <query> [flag,flag,...] [--all] [--verbose]")?;
    let query = positional.next().unwrap_or_default();
    let flags = match positional.next() {
        Some(list) => Some(parse_flags(&list)?),
        None => None,
    };
    Ok(Args {
        project,
        query,
        flags,
        all,
        verbose,
    })
}

fn parse_flags(list: &str) -> Result<ScopeFlags, String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| ScopeFlag::from_name(name).ok_or_else(|| format!("unknown flag: {name}")))
        .collect()
}

fn open_history() -> Arc<dyn SearchHistory> {
    let Some(path) = get_history_path() else {
        return Arc::new(MemoryHistory::new());
    };
    match JsonHistory::open(&path) {
        Ok(history) => Arc::new(history),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "search history unavailable");
            Arc::new(MemoryHistory::new())
        }
    }
}

/// 在当前（owner）线程上执行回调，直到 `done` 成立或超时
fn pump_until<F>(owner: &mut OwnerLoop, model: &SearchResultsModel, mut done: F) -> ResultsState
where
    F: FnMut(&ResultsState) -> bool,
{
    let deadline = Instant::now() + SEARCH_TIMEOUT;
    loop {
        owner.pump_timeout(Duration::from_millis(50));
        let state = model.snapshot();
        if done(&state) || Instant::now() >= deadline {
            return state;
        }
    }
}

fn paused(state: &ResultsState) -> bool {
    state
        .last_info
        .as_ref()
        .is_some_and(|info| info.state == TaskState::LimitReached)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let _logging = logging::init(args.verbose);

    let settings = load_settings().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "settings unavailable, using defaults");
        Default::default()
    });

    let project = Arc::new(MemoryProject::from_json_file(&args.project)?);
    let runtime = SearchRuntime::new()?;
    let (queue, mut owner) = owner_queue();
    let model = Arc::new(SearchResultsModel::new());

    let deps = SearchDeps {
        project: project.clone(),
        factory: project,
        consumer: model.clone(),
        owner: Arc::new(queue),
        history: open_history(),
    };
    let coordinator =
        SearchCoordinator::new(runtime.handle(), deps, settings.search, SearchPreset::Text)?;

    if let Some(flags) = &args.flags {
        for flag in ScopeFlag::ALL {
            coordinator.set_option(flag, flags.contains(flag));
        }
    }
    coordinator.text_changed(&args.query);

    let mut state = pump_until(&mut owner, &model, |s| {
        s.finished_count > 0 || s.error.is_some()
    });
    while args.all && paused(&state) {
        let finished = state.finished_count;
        coordinator.load_more(true);
        state = pump_until(&mut owner, &model, |s| {
            s.finished_count > finished || s.error.is_some()
        });
        if state.finished_count == finished {
            break;
        }
    }

    for item in &state.items {
        println!("{item}");
    }
    eprintln!("{}", state.status_line());
    if state.load_more_enabled {
        eprintln!("more results available, rerun with --all");
    }

    coordinator.dispose();
    owner.pump();
    // 通道线程可能仍在等待 owner 回调，先释放 owner 再释放协调器
    drop(owner);
    drop(coordinator);
    Ok(())
}
