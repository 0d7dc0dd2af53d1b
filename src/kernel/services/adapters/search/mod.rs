//! 搜索协调模块
//!
//! - SearchEvents: 文本编辑 + 重新搜索触发，去抖后投递到串行通道
//! - SerialLane: 单线程执行搜索生命周期（停止、构建、启动）
//! - SearchTask: 可取消、可续取的搜索任务
//! - MergedJob: 交错执行多个快速 provider
//! - ResultAggregator: 排序后批量刷新结果
//! - ScopeResolver: 选项 -> provider job 列表
//! - SearchCoordinator: 把以上组件串起来

mod aggregator;
mod coordinator;
mod debounce;
mod lane;
mod memory;
mod merged;
mod resolver;
mod task;

use crate::kernel::sync::lock;

pub use aggregator::ResultAggregator;
pub use coordinator::{SearchCoordinator, SearchDeps};
pub use debounce::SearchEvents;
pub use lane::{LaneJob, SerialLane};
pub use memory::{MemoryClass, MemoryProject, MemoryResource, ProjectData};
pub use merged::MergedJob;
pub use resolver::{DecompileBatchCache, ScopeResolver};
pub use task::{CompletionListener, ProgressListener, ResultSink, SearchTask};
