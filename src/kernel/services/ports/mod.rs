//! Service ports: traits + data contracts.

pub mod config;
pub mod consumer;
pub mod history;
pub mod matcher;
pub mod provider;
pub mod search;
pub mod settings;

pub use config::{ProviderFailurePolicy, SearchConfig};
pub use consumer::{OwnerTask, OwnerThread, SearchConsumer};
pub use history::{SearchHistory, SearchPreset};
pub use matcher::QueryMatcher;
pub use provider::{ClassRef, ProjectSource, ProviderFactory, ProviderJob};
pub use search::{
    BuildError, DocumentRef, ProviderError, Query, ResultItem, ResultKind, ScopeFlag, ScopeFlags,
    TaskInfo, TaskProgress, TaskState,
};
pub use settings::{Settings, SettingsError};
