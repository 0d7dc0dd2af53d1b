//! 查询匹配器
//!
//! 构建搜索时编译一次，之后交给各 provider 共享使用
//! - Literal 模式：memchr 子串查找，忽略大小写时双方都转小写
//! - Regex 模式：regex crate，忽略大小写通过 RegexBuilder 设置

use super::provider::ClassRef;
use super::search::{BuildError, Query};
use memchr::memmem::Finder;

#[derive(Debug, Clone)]
enum Pattern {
    Literal {
        finder: Finder<'static>,
        case_sensitive: bool,
    },
    Regex {
        regex: regex::Regex,
    },
}

#[derive(Debug, Clone)]
pub struct QueryMatcher {
    text: String,
    pattern: Pattern,
    active_class: Option<ClassRef>,
}

impl QueryMatcher {
    pub fn literal(text: &str, case_sensitive: bool) -> Self {
        let needle = if case_sensitive {
            text.as_bytes().to_vec()
        } else {
            text.to_lowercase().into_bytes()
        };
        Self {
            text: text.to_string(),
            pattern: Pattern::Literal {
                finder: Finder::new(&needle).into_owned(),
                case_sensitive,
            },
            active_class: None,
        }
    }

    pub fn regex(text: &str, case_sensitive: bool) -> Result<Self, BuildError> {
        let regex = regex::RegexBuilder::new(text)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self {
            text: text.to_string(),
            pattern: Pattern::Regex { regex },
            active_class: None,
        })
    }

    /// 正则非法时返回 `BuildError::InvalidRegex`
    pub fn prepare(query: &Query) -> Result<Self, BuildError> {
        if query.use_regex {
            Self::regex(&query.text, query.case_sensitive())
        } else {
            Ok(Self::literal(&query.text, query.case_sensitive()))
        }
    }

    pub fn with_active_class(mut self, class: Option<ClassRef>) -> Self {
        self.active_class = class;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.pattern, Pattern::Regex { .. })
    }

    pub fn active_class(&self) -> Option<&ClassRef> {
        self.active_class.as_ref()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match &self.pattern {
            Pattern::Literal {
                finder,
                case_sensitive: true,
            } => finder.find(haystack.as_bytes()).is_some(),
            Pattern::Literal { finder, .. } => {
                finder.find(haystack.to_lowercase().as_bytes()).is_some()
            }
            Pattern::Regex { regex } => regex.is_match(haystack),
        }
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/matcher.rs"]
mod tests;
