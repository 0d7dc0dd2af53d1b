use super::matcher::QueryMatcher;
use super::search::{DocumentRef, ProviderError, ResultItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 类引用：限定名 + 是否为内部类
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: String,
    #[serde(default)]
    pub inner: bool,
}

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: false,
        }
    }

    pub fn inner(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: true,
        }
    }

    /// 内部类返回外层类名，`a.B$C` -> `a.B`
    pub fn top_level_name(&self) -> &str {
        match self.name.find('$') {
            Some(idx) => &self.name[..idx],
            None => &self.name,
        }
    }
}

/// 针对单个数据源逐条枚举候选结果
pub trait ProviderJob: Send {
    fn name(&self) -> &str;

    /// 剩余工作量的估计值，可能偏大或偏小
    fn estimate_size(&self) -> usize;

    /// `Ok(None)` 表示该 job 已耗尽
    fn produce_next(&mut self) -> Result<Option<ResultItem>, ProviderError>;

    fn is_done(&self) -> bool;

    /// 组合型 job 在内部跳过的失败数，计入任务的 `failed_jobs`
    fn skipped_failures(&self) -> usize {
        0
    }
}

/// 项目侧提供的类集合与反编译分批
pub trait ProjectSource: Send + Sync {
    /// 每次项目（重新）加载都会变化，用作分批缓存的键
    fn load_id(&self) -> u64;

    fn classes_with_inners(&self) -> Vec<ClassRef>;

    fn document_class(&self, doc: &DocumentRef) -> Option<ClassRef>;

    fn build_decompile_batches(&self, top_classes: &[ClassRef]) -> Vec<Vec<ClassRef>>;

    /// 搜索窗口关闭后释放临时数据
    fn unload_temp_data(&self) {}
}

pub trait ProviderFactory: Send + Sync {
    fn class_job(&self, matcher: &Arc<QueryMatcher>, classes: &[ClassRef])
        -> Box<dyn ProviderJob>;

    fn method_job(
        &self,
        matcher: &Arc<QueryMatcher>,
        classes: &[ClassRef],
    ) -> Box<dyn ProviderJob>;

    fn field_job(&self, matcher: &Arc<QueryMatcher>, classes: &[ClassRef])
        -> Box<dyn ProviderJob>;

    fn code_job(&self, matcher: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob>;

    fn resource_job(&self, matcher: &Arc<QueryMatcher>) -> Box<dyn ProviderJob>;

    fn comment_job(&self, matcher: &Arc<QueryMatcher>) -> Box<dyn ProviderJob>;
}
