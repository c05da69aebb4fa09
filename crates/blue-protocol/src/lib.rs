//! # Blue Protocol
//!
//! Blue 机械臂的协议层：rosbridge 消息结构（serde）、话题/服务/动作名称与关节命名约定。
//!
//! 本 crate 不包含任何 IO 或线程，只负责"消息长什么样"和"发往哪里"：
//! - [`messages`]: 各类 ROS 消息的强类型定义
//! - [`names`]: 按手臂侧别（left/right）派生的话题、服务、坐标系与关节名
//!
//! 所有消息都实现 [`RosMessage`]，可通过 [`encode`] / [`decode`] 与通道层使用的
//! `serde_json::Value` 互相转换。

pub mod messages;
pub mod names;

pub use messages::*;
pub use names::{
    ArmNames, ControllerManagerOp, JOINT_COUNT, JOINT_STATES_TOPIC, REPUBLISH_TFS_SERVICE, Side,
    controllers, schema,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 未知的手臂侧别（只接受 "left" / "right"）
    #[error("Unknown arm side: {0:?} (expected \"left\" or \"right\")")]
    UnknownSide(String),

    /// 消息编码失败
    #[error("Failed to encode {schema}: {source}")]
    Encode {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// 消息解码失败
    #[error("Failed to decode {schema}: {source}")]
    Decode {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// 带 schema 标识的 ROS 消息
///
/// `SCHEMA` 对应 rosbridge 的类型字符串（如 `"sensor_msgs/JointState"`），
/// 在订阅/发布/服务调用时与话题名一起传给通道层。
pub trait RosMessage: Serialize + DeserializeOwned {
    /// rosbridge 类型字符串
    const SCHEMA: &'static str;
}

/// 将强类型消息编码为通道层使用的 JSON 值
pub fn encode<M: RosMessage>(message: &M) -> Result<serde_json::Value, ProtocolError> {
    serde_json::to_value(message).map_err(|source| ProtocolError::Encode {
        schema: M::SCHEMA,
        source,
    })
}

/// 将通道层传来的 JSON 值解码为强类型消息
pub fn decode<M: RosMessage>(value: serde_json::Value) -> Result<M, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::Decode {
        schema: M::SCHEMA,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_error_names_schema() {
        let err = decode::<TfArray>(json!({"transforms": 3})).unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("tf2_web_republisher/TFArray"), "{}", msg);
    }

    #[test]
    fn test_unknown_side_display() {
        let err = ProtocolError::UnknownSide("up".to_string());
        assert!(format!("{}", err).contains("\"up\""));
    }
}
