//! Blue SDK - Blue 机械臂 Rust SDK
//!
//! 通过 rosbridge 风格的控制平面（发布/订阅、服务、动作）操作 Blue 七轴机械臂。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 消息结构、话题/服务命名
//! - **通道层** (`channel`): 控制平面 Trait，真实传输由使用方提供
//! - **驱动层** (`driver`): 遥测镜像、阻塞 RPC、动作跟踪
//! - **客户端层** (`client`): 会话、模式仲裁、命令与查询
//!
//! # 快速开始
//!
//! ```rust
//! use blue_sdk::prelude::*;
//! // 或
//! use blue_sdk::{ArmSession, Observer, SessionConfig};
//! ```

pub use blue_channel as channel;
pub use blue_client as client;
pub use blue_driver as driver;
pub use blue_protocol as protocol;

pub mod logging;
pub mod prelude;

// --- 用户以此为界 ---

// 通道层
pub use blue_channel::{Channel, ChannelError};

// 协议层
pub use blue_protocol::{ProtocolError, Side};

// 驱动层（高级用户使用）
pub use blue_driver::{DriverError, RpcError};

// 客户端层（推荐使用）
pub use blue_client::{
    ArmSession, ArmSessionBuilder, ControlMode, Observer, SessionConfig, SessionError,
};

pub use logging::{LoggingError, init_logging, init_logging_with};
