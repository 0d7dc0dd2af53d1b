//! zsearch - 可取消、可增量续取的项目搜索库
//!
//! 模块结构：
//! - kernel::services::ports: 契约与数据类型（Query, ResultItem, ProviderJob, SearchConsumer）
//! - kernel::services::adapters: 实现（SearchCoordinator, SearchTask, SerialLane, 设置与历史）
//! - kernel::results: owner 侧的结果状态（SearchResultsModel）

pub mod kernel;
