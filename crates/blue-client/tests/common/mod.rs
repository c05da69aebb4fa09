//! 会话集成测试基础设施
//!
//! 一个"远端"由 MockChannel 模拟：关节状态与末端变换以锁存消息提供，
//! TF 重发布服务返回固定话题，其余服务默认成功。

#![allow(dead_code)]

use blue_channel::MockChannel;
use blue_client::{ArmSession, SessionConfig};
use blue_protocol::{ArmNames, ControllerManagerOp, JOINT_STATES_TOPIC, Side, controllers};
use serde_json::{Value, json};
use std::sync::Arc;

pub const TF_TOPIC: &str = "/tf_repub/left";

pub fn names() -> ArmNames {
    ArmNames::new(Side::Left)
}

pub fn switch_service() -> String {
    names().controller_manager_service(ControllerManagerOp::Switch)
}

pub fn load_service() -> String {
    names().controller_manager_service(ControllerManagerOp::Load)
}

pub fn unload_service() -> String {
    names().controller_manager_service(ControllerManagerOp::Unload)
}

pub fn position_topic() -> String {
    names().command_topic(controllers::JOINT_POSITION)
}

pub fn soft_position_topic() -> String {
    names().command_topic(controllers::JOINT_SOFT_POSITION)
}

pub fn torque_topic() -> String {
    names().command_topic(controllers::JOINT_TORQUE)
}

/// 7 个关节 + 夹爪关节
pub fn joint_state(positions: [f64; 7], gripper: (f64, f64)) -> Value {
    let names = names();
    let mut name: Vec<String> = names.joint_names().to_vec();
    name.push(names.gripper_joint());
    let mut position = positions.to_vec();
    position.push(gripper.0);
    let mut effort = vec![0.0; 7];
    effort.push(gripper.1);
    json!({
        "name": name,
        "position": position,
        "velocity": vec![0.0; 8],
        "effort": effort,
    })
}

pub fn transform(position: [f64; 3], orientation: [f64; 4]) -> Value {
    json!({
        "transforms": [{
            "child_frame_id": names().end_effector_frame(),
            "transform": {
                "translation": {"x": position[0], "y": position[1], "z": position[2]},
                "rotation": {
                    "x": orientation[0],
                    "y": orientation[1],
                    "z": orientation[2],
                    "w": orientation[3]
                }
            }
        }]
    })
}

/// 只提供 TF 重发布服务，不提供遥测
pub fn silent_remote() -> MockChannel {
    let mock = MockChannel::new();
    mock.on_service("/republish_tfs", |_| {
        blue_channel::ServiceReply::ok(json!({"topic_name": TF_TOPIC}))
    });
    mock
}

/// 关节全 0、末端位于原点的远端
pub fn remote() -> MockChannel {
    remote_at([0.0; 7])
}

pub fn remote_at(positions: [f64; 7]) -> MockChannel {
    let mock = silent_remote();
    mock.latch(JOINT_STATES_TOPIC, joint_state(positions, (2.0, 0.5)));
    mock.latch(TF_TOPIC, transform([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
    mock
}

/// 测试用配置：无稳定等待、短轮询
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        side: Side::Left,
        rpc_timeout_ms: 500,
        controller_load_timeout_ms: 500,
        calibration_timeout_ms: 500,
        switch_settle_ms: 0,
        readiness_timeout_ms: 2_000,
        readiness_poll_ms: 5,
        tick_rate_hz: 50.0,
        gripper_goal_timeout_ms: 500,
    }
}

pub fn connect(mock: &MockChannel) -> ArmSession {
    connect_with(mock, fast_config())
}

pub fn connect_with(mock: &MockChannel, config: SessionConfig) -> ArmSession {
    match ArmSession::connect(Arc::new(mock.clone()), config) {
        Ok(session) => session,
        Err(e) => panic!("session failed to start: {}", e),
    }
}

/// 已发布命令的 data 字段
pub fn published_data(mock: &MockChannel, topic: &str) -> Vec<Vec<f64>> {
    mock.published(topic)
        .into_iter()
        .map(|msg| serde_json::from_value(msg["data"].clone()).unwrap())
        .collect()
}
