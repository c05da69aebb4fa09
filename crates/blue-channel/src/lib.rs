//! # Blue Channel Layer
//!
//! 控制平面通道抽象：发布、订阅、服务请求与动作（Action）目标收发。
//!
//! 真实的传输实现（如 rosbridge websocket 客户端）不在本 crate 中，上层只依赖这里的 Trait。
//!
//! # 投递模型
//!
//! - 所有回调（订阅消息、服务应答、动作反馈/结果）都在通道自己的 **IO 线程** 上按到达顺序调用
//! - 回调不得长时间阻塞，否则会拖慢后续所有投递
//! - `close()` 之后不会再有任何回调被调用；尚未投递的回调会被直接丢弃（Drop）
//!
//! 上层可以依赖"回调被丢弃"这一事实来感知通道关闭，见 `blue-driver` 的 `Completion`。

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{GoalEvent, MockChannel, ServiceReply};

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 通道上传输的消息（rosbridge 的 JSON 负载）
pub type Message = serde_json::Value;

/// 订阅回调：每条消息调用一次，直到通道关闭
pub type MessageCallback = Box<dyn FnMut(Message) + Send + 'static>;

/// 服务回调：恰好调用一次，参数为 `(success, values)`
pub type ServiceCallback = Box<dyn FnOnce(bool, Message) + Send + 'static>;

/// 动作反馈回调：可调用零次或多次
pub type FeedbackCallback = Box<dyn FnMut(Message) + Send + 'static>;

/// 动作结果回调：最多调用一次
pub type ResultCallback = Box<dyn FnOnce(Message) + Send + 'static>;

/// 通道层统一错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 通道已关闭
    #[error("Channel closed")]
    Closed,

    /// 远端不认识的话题/服务/动作
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// 消息编码失败
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// 底层传输错误
    #[error("Transport error: {0}")]
    Transport(String),
}

/// 动作目标标识（由通道分配，上层视为不透明）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoalId(String);

impl GoalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 发布端（无应答，发后即忘）
pub trait Publisher: Send + Sync {
    fn publish(&self, message: Message) -> Result<(), ChannelError>;
}

/// 服务客户端
pub trait ServiceClient: Send + Sync {
    /// 发起一次请求
    ///
    /// `callback` 在 IO 线程上恰好调用一次；若通道在应答前关闭，`callback` 会被直接丢弃。
    fn request(&self, message: Message, callback: ServiceCallback) -> Result<(), ChannelError>;
}

/// 动作客户端
pub trait ActionClient: Send + Sync {
    /// 发送一个目标，返回通道分配的目标标识
    fn send_goal(
        &self,
        goal: Message,
        on_feedback: FeedbackCallback,
        on_result: ResultCallback,
    ) -> Result<GoalId, ChannelError>;

    /// 取消目标（发后即忘，不保证远端确认）
    fn cancel_goal(&self, goal_id: &GoalId) -> Result<(), ChannelError>;
}

/// 控制平面通道
///
/// 一个实例对应一条到远端主机的持久连接。
pub trait Channel: Send + Sync {
    /// 订阅话题
    fn subscribe(
        &self,
        topic: &str,
        schema: &str,
        callback: MessageCallback,
    ) -> Result<(), ChannelError>;

    /// 创建发布端
    fn publisher(&self, topic: &str, schema: &str) -> Result<Arc<dyn Publisher>, ChannelError>;

    /// 创建服务客户端
    fn service(&self, name: &str, schema: &str) -> Result<Arc<dyn ServiceClient>, ChannelError>;

    /// 创建动作客户端
    fn action_client(&self, name: &str, schema: &str)
    -> Result<Arc<dyn ActionClient>, ChannelError>;

    /// 关闭连接，之后不再有回调
    fn close(&self);

    /// 连接是否已关闭
    fn is_closed(&self) -> bool;
}
