//! 内存中的项目：类、成员、代码行、注释、资源
//!
//! 提供类集合、反编译分批与各类 provider job，可从 JSON 加载。

use crate::kernel::services::ports::{
    ClassRef, DocumentRef, ProjectSource, ProviderError, ProviderFactory, ProviderJob,
    QueryMatcher, ResultItem, ResultKind, SettingsError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

const DEFAULT_BATCH_SIZE: usize = 16;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryClass {
    pub name: String,
    #[serde(default)]
    pub inner: bool,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub code: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl MemoryClass {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inner: name.contains('$'),
            name,
            ..Self::default()
        }
    }

    pub fn class_ref(&self) -> ClassRef {
        ClassRef {
            name: self.name.clone(),
            inner: self.inner,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryResource {
    pub name: String,
    #[serde(default)]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub classes: Vec<MemoryClass>,
    #[serde(default)]
    pub resources: Vec<MemoryResource>,
    /// 文档 -> 类名
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ProjectData {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            resources: Vec::new(),
            documents: BTreeMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

pub struct MemoryProject {
    data: RwLock<Arc<ProjectData>>,
    load_id: AtomicU64,
    batch_builds: AtomicUsize,
    unloads: AtomicUsize,
}

impl MemoryProject {
    pub fn new(data: ProjectData) -> Self {
        Self {
            data: RwLock::new(Arc::new(data)),
            load_id: AtomicU64::new(1),
            batch_builds: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let data: ProjectData = serde_json::from_str(&content)?;
        Ok(Self::new(data))
    }

    /// 替换项目数据，加载标识随之变化
    pub fn reload(&self, data: ProjectData) {
        match self.data.write() {
            Ok(mut guard) => *guard = Arc::new(data),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(data),
        }
        self.load_id.fetch_add(1, Ordering::Relaxed);
    }

    pub fn data(&self) -> Arc<ProjectData> {
        match self.data.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn batch_builds(&self) -> usize {
        self.batch_builds.load(Ordering::Relaxed)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::Relaxed)
    }

    /// 给定类及其内部类
    fn expand_inner<'d>(data: &'d ProjectData, classes: &[ClassRef]) -> Vec<&'d MemoryClass> {
        data.classes
            .iter()
            .filter(|cls| {
                let top = cls.class_ref();
                classes
                    .iter()
                    .any(|c| c.name == cls.name || (!c.inner && top.top_level_name() == c.name))
            })
            .collect()
    }

    fn selected<'d>(data: &'d ProjectData, classes: &[ClassRef]) -> Vec<&'d MemoryClass> {
        data.classes
            .iter()
            .filter(|cls| classes.iter().any(|c| c.name == cls.name))
            .collect()
    }
}

impl ProjectSource for MemoryProject {
    fn load_id(&self) -> u64 {
        self.load_id.load(Ordering::Relaxed)
    }

    fn classes_with_inners(&self) -> Vec<ClassRef> {
        self.data()
            .classes
            .iter()
            .map(MemoryClass::class_ref)
            .collect()
    }

    fn document_class(&self, doc: &DocumentRef) -> Option<ClassRef> {
        let data = self.data();
        let name = data.documents.get(&doc.0)?;
        let cls = data.classes.iter().find(|c| &c.name == name)?;
        let root = cls.class_ref().top_level_name().to_string();
        Some(ClassRef::new(root))
    }

    fn build_decompile_batches(&self, top_classes: &[ClassRef]) -> Vec<Vec<ClassRef>> {
        self.batch_builds.fetch_add(1, Ordering::Relaxed);
        let batch_size = self.data().batch_size.max(1);
        let mut sorted = top_classes.to_vec();
        sorted.sort();
        sorted.chunks(batch_size).map(<[ClassRef]>::to_vec).collect()
    }

    fn unload_temp_data(&self) {
        self.unloads.fetch_add(1, Ordering::Relaxed);
    }
}

impl ProviderFactory for MemoryProject {
    fn class_job(
        &self,
        matcher: &Arc<QueryMatcher>,
        classes: &[ClassRef],
    ) -> Box<dyn ProviderJob> {
        let data = self.data();
        let candidates = Self::selected(&data, classes)
            .into_iter()
            .map(|cls| (cls.name.clone(), ResultItem::new(ResultKind::Class, &cls.name)))
            .collect();
        Box::new(CandidateJob::new("class", matcher, candidates))
    }

    fn method_job(
        &self,
        matcher: &Arc<QueryMatcher>,
        classes: &[ClassRef],
    ) -> Box<dyn ProviderJob> {
        let data = self.data();
        let candidates = Self::selected(&data, classes)
            .into_iter()
            .flat_map(|cls| {
                cls.methods.iter().map(move |m| {
                    (
                        m.clone(),
                        ResultItem::new(ResultKind::Method, &cls.name).with_member(m),
                    )
                })
            })
            .collect();
        Box::new(CandidateJob::new("method", matcher, candidates))
    }

    fn field_job(
        &self,
        matcher: &Arc<QueryMatcher>,
        classes: &[ClassRef],
    ) -> Box<dyn ProviderJob> {
        let data = self.data();
        let candidates = Self::selected(&data, classes)
            .into_iter()
            .flat_map(|cls| {
                cls.fields.iter().map(move |f| {
                    (
                        f.clone(),
                        ResultItem::new(ResultKind::Field, &cls.name).with_member(f),
                    )
                })
            })
            .collect();
        Box::new(CandidateJob::new("field", matcher, candidates))
    }

    fn code_job(&self, matcher: &Arc<QueryMatcher>, classes: &[ClassRef]) -> Box<dyn ProviderJob> {
        let data = self.data();
        let candidates = Self::expand_inner(&data, classes)
            .into_iter()
            .flat_map(|cls| {
                cls.code.iter().enumerate().map(move |(idx, line)| {
                    (
                        line.clone(),
                        ResultItem::new(ResultKind::Code, &cls.name)
                            .with_line(idx + 1)
                            .with_preview(line.trim()),
                    )
                })
            })
            .collect();
        Box::new(CandidateJob::new("code", matcher, candidates))
    }

    fn resource_job(&self, matcher: &Arc<QueryMatcher>) -> Box<dyn ProviderJob> {
        let data = self.data();
        let candidates = data
            .resources
            .iter()
            .flat_map(|res| {
                res.lines.iter().enumerate().map(move |(idx, line)| {
                    (
                        line.clone(),
                        ResultItem::new(ResultKind::Resource, &res.name)
                            .with_line(idx + 1)
                            .with_preview(line.trim()),
                    )
                })
            })
            .collect();
        Box::new(CandidateJob::new("resource", matcher, candidates))
    }

    fn comment_job(&self, matcher: &Arc<QueryMatcher>) -> Box<dyn ProviderJob> {
        let data = self.data();
        let scope: Vec<ClassRef> = match matcher.active_class() {
            Some(active) => vec![active.clone()],
            None => data.classes.iter().map(MemoryClass::class_ref).collect(),
        };
        let candidates = Self::expand_inner(&data, &scope)
            .into_iter()
            .flat_map(|cls| {
                cls.comments.iter().enumerate().map(move |(idx, comment)| {
                    (
                        comment.clone(),
                        ResultItem::new(ResultKind::Comment, &cls.name)
                            .with_line(idx + 1)
                            .with_preview(comment.trim()),
                    )
                })
            })
            .collect();
        Box::new(CandidateJob::new("comment", matcher, candidates))
    }
}

/// 预先收集的候选列表，逐条匹配
struct CandidateJob {
    name: &'static str,
    matcher: Arc<QueryMatcher>,
    candidates: Vec<(String, ResultItem)>,
    pos: usize,
}

impl CandidateJob {
    fn new(
        name: &'static str,
        matcher: &Arc<QueryMatcher>,
        candidates: Vec<(String, ResultItem)>,
    ) -> Self {
        Self {
            name,
            matcher: Arc::clone(matcher),
            candidates,
            pos: 0,
        }
    }
}

impl ProviderJob for CandidateJob {
    fn name(&self) -> &str {
        self.name
    }

    fn estimate_size(&self) -> usize {
        self.candidates.len() - self.pos
    }

    fn produce_next(&mut self) -> Result<Option<ResultItem>, ProviderError> {
        while let Some((haystack, item)) = self.candidates.get(self.pos) {
            self.pos += 1;
            if self.matcher.is_match(haystack) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    fn is_done(&self) -> bool {
        self.pos >= self.candidates.len()
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/memory.rs"]
mod tests;
