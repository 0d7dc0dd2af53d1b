use super::search::{Query, ResultItem, TaskInfo, TaskProgress};

pub type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// 结果消费方（通常是 UI）。所有方法只会在 owner 线程上被调用
pub trait SearchConsumer: Send + Sync {
    /// 新查询开始前清空上一轮的结果与状态
    fn reset(&self);

    /// 任务已构建，即将开始抓取
    fn search_started(&self, query: &Query);

    /// 一批已排序的结果，按到达顺序追加
    fn append_results(&self, batch: Vec<ResultItem>);

    fn progress(&self, progress: TaskProgress);

    fn finished(&self, info: &TaskInfo, complete: bool);

    fn error(&self, message: &str);
}

/// 把闭包投递到消费方所属线程执行
pub trait OwnerThread: Send + Sync {
    fn run(&self, task: OwnerTask);

    /// 投递并阻塞等待执行完毕
    fn run_and_wait(&self, task: OwnerTask);
}
