//! 搜索历史：上次的搜索文本与各 preset 的选项
//!
//! - MemoryHistory: 只在进程内保存
//! - JsonHistory: 每次修改后写回 JSON 文件，写入失败只记录日志

use crate::kernel::services::ports::settings::Result;
use crate::kernel::services::ports::{ScopeFlags, SearchHistory, SearchPreset};
use crate::kernel::sync::lock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryData {
    #[serde(default)]
    pub last_search: Option<String>,
    #[serde(default)]
    pub last_options: BTreeMap<SearchPreset, ScopeFlags>,
}

#[derive(Default)]
pub struct MemoryHistory {
    data: Mutex<HistoryData>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HistoryData {
        lock(&self.data).clone()
    }
}

impl SearchHistory for MemoryHistory {
    fn last_search(&self) -> Option<String> {
        lock(&self.data).last_search.clone()
    }

    fn set_last_search(&self, text: &str) {
        lock(&self.data).last_search = Some(text.to_string());
    }

    fn last_options(&self, preset: SearchPreset) -> Option<ScopeFlags> {
        lock(&self.data).last_options.get(&preset).cloned()
    }

    fn set_last_options(&self, preset: SearchPreset, options: &ScopeFlags) {
        lock(&self.data)
            .last_options
            .insert(preset, options.clone());
    }
}

pub struct JsonHistory {
    path: PathBuf,
    data: Mutex<HistoryData>,
}

impl JsonHistory {
    /// 文件不存在时从空历史开始；内容损坏时返回错误
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HistoryData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> HistoryData {
        lock(&self.data).clone()
    }

    fn update(&self, f: impl FnOnce(&mut HistoryData)) {
        let data = {
            let mut data = lock(&self.data);
            f(&mut data);
            data.clone()
        };
        if let Err(e) = self.write(&data) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write search history");
        }
    }

    fn write(&self, data: &HistoryData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SearchHistory for JsonHistory {
    fn last_search(&self) -> Option<String> {
        lock(&self.data).last_search.clone()
    }

    fn set_last_search(&self, text: &str) {
        self.update(|data| data.last_search = Some(text.to_string()));
    }

    fn last_options(&self, preset: SearchPreset) -> Option<ScopeFlags> {
        lock(&self.data).last_options.get(&preset).cloned()
    }

    fn set_last_options(&self, preset: SearchPreset, options: &ScopeFlags) {
        self.update(|data| {
            data.last_options.insert(preset, options.clone());
        });
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/history.rs"]
mod tests;
