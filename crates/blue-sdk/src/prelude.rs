//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use blue_sdk::prelude::*;
//! ```

// 客户端层
pub use crate::client::{
    ArmSession, ArmSessionBuilder, ControlMode, Observer, SessionConfig, SessionError,
};

// 遥测类型
pub use crate::driver::{CartesianPose, GripperState, TelemetrySnapshot};
pub use crate::protocol::{GripperCommandStatus, JOINT_COUNT, Side};

// 通道层（常用 Trait）
pub use crate::channel::Channel;

// 错误类型
pub use crate::channel::ChannelError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
