use super::search::{ScopeFlag, ScopeFlags};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPreset {
    Text,
    Class,
    Comment,
}

impl SearchPreset {
    /// 由上次保存的选项推导本次打开时的选项
    pub fn build_options(self, stored: Option<ScopeFlags>) -> ScopeFlags {
        let mut options = stored.unwrap_or_default();
        match self {
            SearchPreset::Text => {
                if options.is_empty() {
                    options.insert(ScopeFlag::Code);
                    options.insert(ScopeFlag::IgnoreCase);
                }
            }
            SearchPreset::Class => {
                options.insert(ScopeFlag::Class);
            }
            SearchPreset::Comment => {
                options.insert(ScopeFlag::Comment);
                options.remove(ScopeFlag::ActiveTabOnly);
            }
        }
        options
    }
}

/// 上次搜索的文本和各 preset 的选项
pub trait SearchHistory: Send + Sync {
    fn last_search(&self) -> Option<String>;

    fn set_last_search(&self, text: &str);

    fn last_options(&self, preset: SearchPreset) -> Option<ScopeFlags>;

    fn set_last_options(&self, preset: SearchPreset, options: &ScopeFlags);
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/history.rs"]
mod tests;
