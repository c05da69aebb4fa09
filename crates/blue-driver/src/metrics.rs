//! RPC 桥指标
//!
//! 原子计数器，任何线程都可以读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// RPC 桥实时指标
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// 发起的调用总数
    pub calls: AtomicU64,
    /// 成功应答数
    pub successes: AtomicU64,
    /// 远端拒绝数（`success: false`）
    pub rejections: AtomicU64,
    /// 超时数
    pub timeouts: AtomicU64,
    /// 通道关闭导致的失败数
    pub channel_closed: AtomicU64,
    /// 迟到或重复的应答数（调用方已超时返回后才到达）
    pub late_deliveries: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            channel_closed: self.channel_closed.load(Ordering::Relaxed),
            late_deliveries: self.late_deliveries.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.channel_closed.store(0, Ordering::Relaxed);
        self.late_deliveries.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub successes: u64,
    pub rejections: u64,
    pub timeouts: u64,
    pub channel_closed: u64,
    pub late_deliveries: u64,
}

impl MetricsSnapshot {
    /// 仍在等待应答的调用数
    pub fn in_flight(&self) -> u64 {
        self.calls
            .saturating_sub(self.successes + self.rejections + self.timeouts + self.channel_closed)
    }

    /// 成功率（百分比），没有调用时返回 100.0
    pub fn success_rate(&self) -> f64 {
        let finished = self.calls.saturating_sub(self.in_flight());
        if finished == 0 {
            return 100.0;
        }
        (self.successes as f64 / finished as f64) * 100.0
    }
}
