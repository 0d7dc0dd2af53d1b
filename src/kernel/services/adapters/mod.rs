//! Service adapters: OS/runtime specific implementations (IO/async).

pub mod history;
pub mod owner;
pub mod paths;
pub mod runtime;
pub mod search;
pub mod settings;

pub use history::{HistoryData, JsonHistory, MemoryHistory};
pub use owner::{owner_queue, OwnerLoop, OwnerQueue};
pub use paths::{ensure_log_dir, get_log_dir};
pub use runtime::SearchRuntime;
pub use search::{
    DecompileBatchCache, MemoryClass, MemoryProject, MemoryResource, ProjectData,
    ResultAggregator, ScopeResolver, SearchCoordinator, SearchDeps, SearchEvents, SearchTask,
    SerialLane,
};
pub use settings::{
    ensure_settings_file, get_history_path, get_settings_path, load_settings, load_settings_from,
};
