//! 可取消的周期任务
//!
//! 每个轮询循环都由一个 [`ScheduledTask`] 持有。tick 严格串行：上一次 tick 的
//! future 完成后才开始等待下一个周期，因此每个循环同一时刻最多只有一个请求在途。
//! 调用 [`ScheduledTask::cancel`] 或 drop 句柄都会终止任务。

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// 先等待一个周期再执行第一次 tick（心跳）
    pub fn every<F, Fut>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(name, period, false, tick)
    }

    /// 立即执行第一次 tick，之后每次 tick 完成后等待一个周期
    pub fn immediate<F, Fut>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(name, period, true, tick)
    }

    fn spawn<F, Fut>(name: &'static str, period: Duration, run_first: bool, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!("[Scheduler] ⏱️ 启动周期任务 {}，周期 {:?}", name, period);
        let handle = tokio::spawn(async move {
            if run_first {
                tick().await;
            }
            loop {
                tokio::time::sleep(period).await;
                tick().await;
            }
        });
        Self { name, handle }
    }

    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!("[Scheduler] 🛑 取消周期任务 {}", self.name);
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
