//! # Blue Driver
//!
//! 会话层的底层构件，全部构建在 `blue-channel` 的 Trait 之上：
//! - [`TelemetryMirror`]: 遥测镜像（ArcSwap 无锁读取，部分合并）
//! - [`RpcBridge`]: 异步请求 → 阻塞、带超时、单结果调用
//! - [`ActionTracker`]: 单执行器的动作目标跟踪（提交、等待终态、取消）
//! - [`completion`]: 上述两者共用的单次解析原语
//! - [`BridgeMetrics`]: RPC 计数器
//!
//! 大多数用户应该使用 `blue-client` 提供的 `ArmSession`。

pub mod action;
pub mod completion;
mod error;
pub mod metrics;
pub mod mirror;
pub mod rpc;
pub mod state;

pub use action::{ActionTracker, GoalHandle, GoalStatus};
pub use completion::{Completion, CompletionError, Resolver};
pub use error::{DriverError, RpcError};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use mirror::TelemetryMirror;
pub use rpc::RpcBridge;
pub use state::*;
