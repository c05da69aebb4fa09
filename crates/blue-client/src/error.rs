//! 会话层错误类型
//!
//! 区分可重试错误（超时）与需要人工介入的错误（远端拒绝、通道关闭、配置错误）。
//!
//! # 示例
//!
//! ```rust
//! use blue_client::SessionError;
//!
//! fn handle_error(err: SessionError) {
//!     if err.is_retryable() {
//!         eprintln!("可重试错误: {}", err);
//!     } else {
//!         eprintln!("错误: {}", err);
//!     }
//! }
//! ```

use blue_channel::ChannelError;
use blue_driver::{DriverError, RpcError};
use thiserror::Error;

/// 会话错误类型
#[derive(Debug, Error)]
pub enum SessionError {
    /// 尚未收到首条遥测（关节状态与末端位姿）
    #[error("Session not ready: no telemetry received yet")]
    NotReady,

    /// 控制平面调用超时
    #[error("{operation} timed out after {timeout_ms}ms")]
    RpcTimeout {
        /// 触发调用的操作
        operation: String,
        /// 超时时间（毫秒）
        timeout_ms: u64,
    },

    /// 远端明确拒绝（如控制器加载失败、模式切换被拒）
    #[error("{operation} rejected by remote: {reason}")]
    RpcRejected {
        /// 触发调用的操作
        operation: String,
        /// 远端给出的原因
        reason: String,
    },

    /// 通道已关闭（会话已关闭或连接中断）
    #[error("Channel closed")]
    ChannelClosed,

    /// 进行中的运动被停止控制或关闭打断，目标没有发出
    #[error("{operation} interrupted")]
    Interrupted {
        /// 被打断的操作
        operation: String,
    },

    /// 启动过程中一个或多个步骤失败
    #[error("Session startup failed: {}", .failures.join("; "))]
    Startup {
        /// 每个失败步骤的描述
        failures: Vec<String>,
    },

    /// 关闭过程中一个或多个步骤失败（其余步骤仍已执行）
    #[error("Session shutdown incomplete: {}", .failures.join("; "))]
    Shutdown {
        /// 每个失败步骤的描述
        failures: Vec<String>,
    },

    /// 参数无效
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// 参数名
        param: String,
        /// 原因
        reason: String,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 其他驱动层错误
    #[error("Driver error: {0}")]
    Driver(DriverError),
}

impl SessionError {
    /// 是否可重试
    ///
    /// 超时表示远端可能只是响应慢，重新执行操作可能会成功。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RpcTimeout { .. } | Self::NotReady | Self::Driver(DriverError::Timeout)
        )
    }

    /// 是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidParameter { .. })
    }

    /// 把 RPC 错误附上操作名
    pub fn rpc(operation: impl Into<String>, err: RpcError) -> Self {
        match err {
            RpcError::Timeout { timeout_ms } => Self::RpcTimeout {
                operation: operation.into(),
                timeout_ms,
            },
            RpcError::Rejected(reason) => Self::RpcRejected {
                operation: operation.into(),
                reason,
            },
            RpcError::ChannelClosed => Self::ChannelClosed,
        }
    }

    /// 把驱动层错误附上操作名（RPC 错误展开为对应的会话错误）
    pub fn driver(operation: impl Into<String>, err: DriverError) -> Self {
        match err {
            DriverError::Rpc(rpc) => Self::rpc(operation, rpc),
            DriverError::Channel(ChannelError::Closed) => Self::ChannelClosed,
            other => Self::Driver(other),
        }
    }

    /// 创建参数无效错误
    pub fn invalid_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

impl From<DriverError> for SessionError {
    fn from(err: DriverError) -> Self {
        Self::driver("request", err)
    }
}

impl From<ChannelError> for SessionError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => Self::ChannelClosed,
            other => Self::Driver(DriverError::Channel(other)),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, SessionError>;
