//! 单次解析（resolve-once）完成量
//!
//! 把"发出请求 + 注册回调"转换为"阻塞等待一个结果"的基础原语：
//!
//! - [`Resolver`] 交给通道回调，在 IO 线程上调用 [`Resolver::resolve`]
//! - [`Completion`] 留在调用线程，通过 [`Completion::wait_timeout`] 阻塞等待
//!
//! 每个请求拥有独立的一对，互不共享锁。"已解析"由一个原子标志守护：
//! 第一次 `resolve` 之后的任何调用（重复解析、超时后的迟到应答）都是无操作，返回 `false`。
//!
//! `Resolver` 在未解析的情况下被丢弃（例如通道关闭时丢弃了所有待投递回调），
//! 等待方会立即得到 [`CompletionError::Dropped`]，而不是一直等到超时。
//!
//! # 示例
//!
//! ```rust
//! use blue_driver::completion::{self, CompletionError};
//! use std::time::Duration;
//!
//! let (resolver, completion) = completion::pair::<u32>();
//! std::thread::spawn(move || {
//!     resolver.resolve(7);
//! });
//! assert_eq!(completion.wait_timeout(Duration::from_secs(1)), Ok(7));
//!
//! let (resolver, completion) = completion::pair::<u32>();
//! drop(resolver);
//! assert_eq!(completion.wait_timeout(Duration::from_secs(1)), Err(CompletionError::Dropped));
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 等待失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionError {
    /// 超时，此后的解析全部被忽略
    Timeout,
    /// 解析端在解析之前被丢弃
    Dropped,
}

enum Slot<T> {
    Pending,
    Resolved(T),
    Dropped,
    /// 等待方已放弃（超时或未等待即丢弃）
    Abandoned,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
    resolved: AtomicBool,
}

/// 解析端
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

/// 等待端
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

/// 创建一对解析端/等待端
pub fn pair<T>() -> (Resolver<T>, Completion<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        cond: Condvar::new(),
        resolved: AtomicBool::new(false),
    });
    (
        Resolver {
            shared: shared.clone(),
        },
        Completion { shared },
    )
}

impl<T> Resolver<T> {
    /// 解析结果
    ///
    /// 返回 `true` 表示结果已交给等待方；重复解析或等待方已超时放弃时返回 `false`。
    pub fn resolve(&self, value: T) -> bool {
        if self.shared.resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Abandoned) {
            return false;
        }
        *slot = Slot::Resolved(value);
        self.shared.cond.notify_all();
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.resolved.load(Ordering::Acquire)
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.shared.resolved.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Dropped;
            self.shared.cond.notify_all();
        }
    }
}

impl<T> Completion<T> {
    /// 阻塞等待结果，最多 `timeout`
    ///
    /// 使用条件变量阻塞，不轮询。超时后本完成量被标记为放弃，迟到的解析不会产生任何效果。
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, CompletionError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Pending) {
                Slot::Resolved(value) => return Ok(value),
                Slot::Dropped => return Err(CompletionError::Dropped),
                Slot::Pending | Slot::Abandoned => {},
            }

            if self.shared.cond.wait_until(&mut slot, deadline).timed_out() {
                return match std::mem::replace(&mut *slot, Slot::Abandoned) {
                    Slot::Resolved(value) => Ok(value),
                    Slot::Dropped => Err(CompletionError::Dropped),
                    Slot::Pending | Slot::Abandoned => {
                        self.shared.resolved.store(true, Ordering::Release);
                        Err(CompletionError::Timeout)
                    },
                };
            }
        }
    }

    /// 是否已经被解析（或解析端已丢弃）
    pub fn is_resolved(&self) -> bool {
        self.shared.resolved.load(Ordering::Acquire)
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        // 没人再等待：之后到达的结果直接丢弃
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Abandoned;
        }
    }
}
