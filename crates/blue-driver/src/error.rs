//! 驱动层错误类型定义

use blue_channel::ChannelError;
use blue_protocol::ProtocolError;
use thiserror::Error;

/// 阻塞式 RPC 的三种失败结果
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// 在超时时间内没有收到应答
    #[error("RPC timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// 远端明确报告失败
    #[error("RPC rejected by remote: {0}")]
    Rejected(String),

    /// 通道在应答前关闭
    #[error("Channel closed before the RPC completed")]
    ChannelClosed,
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 通道错误
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// RPC 错误
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// 消息编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 等待超时（非 RPC，例如等待动作终态）
    #[error("Operation timeout")]
    Timeout,
}

impl From<ChannelError> for RpcError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => RpcError::ChannelClosed,
            other => RpcError::Rejected(other.to_string()),
        }
    }
}
