//! # Blue Client
//!
//! Blue 机械臂的会话层接口，这是大多数用户应该使用的 crate。
//!
//! - [`ArmSession`]: 单臂会话，启动时加载控制器并等待首条遥测，关闭时逆序清理
//! - [`ModeArbiter`]: 关节控制模式互斥切换（SAFE / POSITION / SOFT_POSITION / TORQUE）
//! - [`Observer`]: 只读遥测视图，可克隆到监控线程
//! - [`SessionConfig`]: 超时与频率配置，可从 TOML 加载
//!
//! 所有命令都是同步的：调用返回时，远端已确认（或超时/拒绝）。
//! 遥测读取永不阻塞，也不会被正在进行的命令阻塞。

pub mod arbiter;
pub mod builder;
pub mod config;
mod error;
pub mod mode;
pub mod observer;
pub mod session;

pub use arbiter::ModeArbiter;
pub use builder::ArmSessionBuilder;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use mode::{ControlMode, SwitchPlan, Transition};
pub use observer::Observer;
pub use session::ArmSession;
