//! 选项 -> provider job 列表
//!
//! - class/method/field 放进同一个 MergedJob，最先执行
//! - code：单个类时一个 job，否则按反编译分批每批一个 job
//! - resource/comment 各自独立追加

use super::lock;
use super::merged::MergedJob;
use crate::kernel::services::ports::{
    BuildError, ClassRef, ProjectSource, ProviderFactory, ProviderFailurePolicy, ProviderJob,
    Query, QueryMatcher, ScopeFlag,
};
use std::sync::{Arc, Mutex};

const SOURCE_FLAGS: [ScopeFlag; 6] = [
    ScopeFlag::Class,
    ScopeFlag::Method,
    ScopeFlag::Field,
    ScopeFlag::Code,
    ScopeFlag::Resource,
    ScopeFlag::Comment,
];

/// 反编译分批缓存，按项目加载标识失效
#[derive(Default)]
pub struct DecompileBatchCache {
    inner: Mutex<Option<(u64, Arc<Vec<Vec<ClassRef>>>)>>,
}

impl DecompileBatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        project: &dyn ProjectSource,
        classes: &[ClassRef],
    ) -> Arc<Vec<Vec<ClassRef>>> {
        let load_id = project.load_id();
        let mut inner = lock(&self.inner);
        if let Some((cached_id, batches)) = inner.as_ref() {
            if *cached_id == load_id {
                return Arc::clone(batches);
            }
        }
        let top_classes: Vec<ClassRef> = classes.iter().filter(|c| !c.inner).cloned().collect();
        let batches = Arc::new(project.build_decompile_batches(&top_classes));
        tracing::debug!(
            load_id,
            classes = top_classes.len(),
            batches = batches.len(),
            "decompile batches built"
        );
        *inner = Some((load_id, Arc::clone(&batches)));
        batches
    }

    pub fn invalidate(&self) {
        lock(&self.inner).take();
    }

    pub fn is_cached(&self) -> bool {
        lock(&self.inner).is_some()
    }
}

pub struct ScopeResolver<'a> {
    project: &'a dyn ProjectSource,
    factory: &'a dyn ProviderFactory,
    batches: &'a DecompileBatchCache,
    policy: ProviderFailurePolicy,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(
        project: &'a dyn ProjectSource,
        factory: &'a dyn ProviderFactory,
        batches: &'a DecompileBatchCache,
        policy: ProviderFailurePolicy,
    ) -> Self {
        Self {
            project,
            factory,
            batches,
            policy,
        }
    }

    /// 校验查询并构建 job 列表。失败时不会创建任何 job
    pub fn resolve(&self, query: &Query) -> Result<Vec<Box<dyn ProviderJob>>, BuildError> {
        let scope = &query.scope;
        if !SOURCE_FLAGS.iter().any(|flag| scope.contains(*flag)) {
            return Err(BuildError::NoScope);
        }
        let list_comments = query.text.is_empty() && scope.contains(ScopeFlag::Comment);
        if query.text.is_empty() && !list_comments {
            return Err(BuildError::EmptyQuery);
        }

        let matcher = QueryMatcher::prepare(query)?;

        let (classes, active_class) = if scope.contains(ScopeFlag::ActiveTabOnly) {
            let doc = query
                .active_document
                .as_ref()
                .ok_or(BuildError::NoActiveDocument)?;
            let class = self
                .project
                .document_class(doc)
                .ok_or_else(|| BuildError::ActiveDocumentWithoutClass(doc.clone()))?;
            (vec![class.clone()], Some(class))
        } else {
            (self.project.classes_with_inners(), None)
        };
        let matcher = Arc::new(matcher.with_active_class(active_class));

        let mut jobs: Vec<Box<dyn ProviderJob>> = Vec::new();
        if list_comments {
            jobs.push(self.factory.comment_job(&matcher));
            return Ok(jobs);
        }

        let mut merged = MergedJob::new(self.policy);
        if scope.contains(ScopeFlag::Class) {
            merged.add(self.factory.class_job(&matcher, &classes));
        }
        if scope.contains(ScopeFlag::Method) {
            merged.add(self.factory.method_job(&matcher, &classes));
        }
        if scope.contains(ScopeFlag::Field) {
            merged.add(self.factory.field_job(&matcher, &classes));
        }
        if !merged.is_empty() {
            jobs.push(Box::new(merged));
        }

        if scope.contains(ScopeFlag::Code) {
            if classes.len() == 1 {
                jobs.push(self.factory.code_job(&matcher, &classes));
            } else {
                let batches = self.batches.get_or_build(self.project, &classes);
                for batch in batches.iter() {
                    jobs.push(self.factory.code_job(&matcher, batch));
                }
            }
        }
        if scope.contains(ScopeFlag::Resource) {
            jobs.push(self.factory.resource_job(&matcher));
        }
        if scope.contains(ScopeFlag::Comment) {
            jobs.push(self.factory.comment_job(&matcher));
        }
        Ok(jobs)
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/resolver.rs"]
mod tests;
