use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, BuildError>;

/// 构建搜索时的错误：任务尚未创建，不会启动任何后台工作
#[derive(Debug)]
pub enum BuildError {
    EmptyQuery,
    NoScope,
    InvalidRegex(regex::Error),
    NoActiveDocument,
    ActiveDocumentWithoutClass(DocumentRef),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyQuery => write!(f, "Search text is empty"),
            BuildError::NoScope => write!(f, "No search scope selected"),
            BuildError::InvalidRegex(e) => write!(f, "Invalid regex: {}", e),
            BuildError::NoActiveDocument => write!(f, "Can't search in current tab"),
            BuildError::ActiveDocumentWithoutClass(doc) => {
                write!(f, "No class found for active document: {}", doc.0)
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::InvalidRegex(e) => Some(e),
            _ => None,
        }
    }
}

impl From<regex::Error> for BuildError {
    fn from(e: regex::Error) -> Self {
        BuildError::InvalidRegex(e)
    }
}

/// 单个 provider 在产出结果时的失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    Failed(String),
    Panicked(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Failed(msg) => write!(f, "provider failed: {}", msg),
            ProviderError::Panicked(msg) => write!(f, "provider panicked: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFlag {
    Class,
    Method,
    Field,
    Code,
    Resource,
    Comment,
    ActiveTabOnly,
    IgnoreCase,
    UseRegex,
}

impl ScopeFlag {
    pub const ALL: [ScopeFlag; 9] = [
        ScopeFlag::Class,
        ScopeFlag::Method,
        ScopeFlag::Field,
        ScopeFlag::Code,
        ScopeFlag::Resource,
        ScopeFlag::Comment,
        ScopeFlag::ActiveTabOnly,
        ScopeFlag::IgnoreCase,
        ScopeFlag::UseRegex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScopeFlag::Class => "class",
            ScopeFlag::Method => "method",
            ScopeFlag::Field => "field",
            ScopeFlag::Code => "code",
            ScopeFlag::Resource => "resource",
            ScopeFlag::Comment => "comment",
            ScopeFlag::ActiveTabOnly => "active_tab_only",
            ScopeFlag::IgnoreCase => "ignore_case",
            ScopeFlag::UseRegex => "use_regex",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

/// 搜索选项集合。有序存储，日志与持久化输出稳定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeFlags(BTreeSet<ScopeFlag>);

impl ScopeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: ScopeFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn insert(&mut self, flag: ScopeFlag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: ScopeFlag) -> bool {
        self.0.remove(&flag)
    }

    pub fn set(&mut self, flag: ScopeFlag, enabled: bool) -> bool {
        if enabled {
            self.insert(flag)
        } else {
            self.remove(flag)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ScopeFlag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ScopeFlag> for ScopeFlags {
    fn from_iter<I: IntoIterator<Item = ScopeFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ScopeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(ScopeFlag::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// 当前打开的文档（标签页）标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

/// 一次搜索的不可变快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub ignore_case: bool,
    pub use_regex: bool,
    pub scope: ScopeFlags,
    pub active_document: Option<DocumentRef>,
}

impl Query {
    pub fn new(text: impl Into<String>, scope: ScopeFlags) -> Self {
        Self {
            text: text.into(),
            ignore_case: scope.contains(ScopeFlag::IgnoreCase),
            use_regex: scope.contains(ScopeFlag::UseRegex),
            scope,
            active_document: None,
        }
    }

    pub fn with_active_document(mut self, doc: Option<DocumentRef>) -> Self {
        self.active_document = doc;
        self
    }

    pub fn case_sensitive(&self) -> bool {
        !self.ignore_case
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Class,
    Method,
    Field,
    Code,
    Resource,
    Comment,
}

/// 一条搜索结果。
///
/// 字段顺序即排序键：先按限定名，再按成员名，其余字段只用于打破平局，
/// 因此派生出的 `Ord` 是全序且与运行次序无关。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultItem {
    pub qualified_name: String,
    pub member: String,
    pub kind: ResultKind,
    pub line: Option<usize>,
    pub preview: String,
}

impl ResultItem {
    pub fn new(kind: ResultKind, qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            member: String::new(),
            kind,
            line: None,
            preview: String::new(),
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = preview.into();
        self
    }
}

impl fmt::Display for ResultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name)?;
        if !self.member.is_empty() {
            write!(f, ".{}", self.member)?;
        }
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if !self.preview.is_empty() {
            write!(f, "  {}", self.preview)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskProgress {
    pub produced: usize,
    pub total: usize,
}

impl TaskProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = self.produced.saturating_mul(100) / self.total;
        pct.min(100) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    LimitReached,
    Exhausted,
    Cancelled,
    Failed,
}

impl TaskState {
    /// 终态：不会再被继续执行
    pub fn is_final(self) -> bool {
        matches!(
            self,
            TaskState::Exhausted | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// 完成回调收到的任务信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: u64,
    pub state: TaskState,
    pub progress: TaskProgress,
    pub failed_jobs: usize,
    pub elapsed: Duration,
}

impl TaskInfo {
    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Exhausted
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/search.rs"]
mod tests;
