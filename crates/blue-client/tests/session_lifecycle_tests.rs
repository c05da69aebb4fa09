//! 会话生命周期测试
//!
//! 启动失败汇总、就绪超时、幂等关闭、Drop 触发关闭、关闭后的命令。

mod common;

use blue_channel::{
    ActionClient, Channel, ChannelError, MessageCallback, MockChannel, Publisher, ServiceClient,
    ServiceReply,
};
use blue_client::{ArmSession, ControlMode, SessionError};
use blue_protocol::{JOINT_STATES_TOPIC, Side, controllers};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_startup_loads_every_controller_then_stops_all() {
    let mock = remote();
    let _session = connect(&mock);

    let loaded: Vec<_> = mock
        .requests(&load_service())
        .into_iter()
        .map(|req| req["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        loaded,
        vec![
            controllers::JOINT_POSITION,
            controllers::JOINT_SOFT_POSITION,
            controllers::JOINT_TORQUE,
            controllers::GRIPPER,
        ]
    );

    let switches = mock.requests(&switch_service());
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0]["start_controllers"], json!([]));
    assert_eq!(switches[0]["stop_controllers"].as_array().unwrap().len(), 4);

    // 变换流请求的是 "世界坐标系 -> 末端"
    let tf = mock.requests("/republish_tfs").pop().unwrap();
    assert_eq!(tf["source_frames"], json!(["left_end_roll_link"]));
    assert_eq!(tf["target_frame"], json!("left_base_link"));
    assert!(mock.subscriptions().contains(&TF_TOPIC.to_string()));
}

/// 一个控制器加载失败：其余仍被尝试，失败汇总后返回，并执行关闭流程
#[test]
fn test_startup_failure_is_aggregated() {
    let mock = remote();
    mock.on_service(&load_service(), |req| {
        if req["name"] == json!(controllers::JOINT_TORQUE) {
            ServiceReply::fail(json!("controller type not found"))
        } else {
            ServiceReply::ok(json!({"ok": true}))
        }
    });

    let err = ArmSession::connect(Arc::new(mock.clone()), fast_config())
        .err()
        .unwrap();
    match err {
        SessionError::Startup { failures } => {
            assert_eq!(failures.len(), 1, "{:?}", failures);
            assert!(failures[0].contains(controllers::JOINT_TORQUE));
        },
        other => panic!("expected Startup, got {:?}", other),
    }

    assert_eq!(mock.request_count(&load_service()), 4);
    // 失败的会话在返回前已被清理
    assert_eq!(mock.request_count(&unload_service()), 4);
    assert!(mock.is_closed());
}

#[test]
fn test_ok_false_load_counts_as_failure() {
    let mock = remote();
    mock.on_service(&load_service(), |_| ServiceReply::ok(json!({"ok": false})));

    let err = ArmSession::connect(Arc::new(mock.clone()), fast_config())
        .err()
        .unwrap();
    let SessionError::Startup { failures } = err else {
        panic!("expected Startup");
    };
    assert_eq!(failures.len(), 4);
}

#[test]
fn test_missing_transform_topic_fails_startup() {
    let mock = MockChannel::new();
    mock.latch(JOINT_STATES_TOPIC, joint_state([0.0; 7], (0.0, 0.0)));
    mock.on_service("/republish_tfs", |_| ServiceReply::ok(json!({})));

    let err = ArmSession::connect(Arc::new(mock.clone()), fast_config())
        .err()
        .unwrap();
    let SessionError::Startup { failures } = err else {
        panic!("expected Startup");
    };
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("transform stream"));
}

/// 远端没有遥测：就绪超时
#[test]
fn test_not_ready_without_telemetry() {
    let mock = silent_remote();
    let mut config = fast_config();
    config.readiness_timeout_ms = 50;

    let err = ArmSession::connect(Arc::new(mock.clone()), config).err().unwrap();
    assert!(matches!(err, SessionError::NotReady));
    assert!(err.is_retryable());
    assert!(mock.is_closed());
}

/// 只有关节状态、没有位姿同样不算就绪
#[test]
fn test_not_ready_without_pose() {
    let mock = silent_remote();
    mock.latch(JOINT_STATES_TOPIC, joint_state([0.0; 7], (0.0, 0.0)));
    let mut config = fast_config();
    config.readiness_timeout_ms = 50;

    let err = ArmSession::connect(Arc::new(mock.clone()), config).err().unwrap();
    assert!(matches!(err, SessionError::NotReady));
}

#[test]
fn test_shutdown_is_idempotent() {
    let mock = remote();
    let session = connect(&mock);
    session.set_joint_positions(&[0.0; 7]).unwrap();

    session.shutdown().unwrap();
    assert!(session.is_shut_down());
    assert!(mock.is_closed());
    assert_eq!(mock.request_count(&unload_service()), 4);
    assert_eq!(session.control_mode(), ControlMode::Safe);
    let switches = mock.request_count(&switch_service());

    session.shutdown().unwrap();
    assert_eq!(mock.request_count(&unload_service()), 4);
    assert_eq!(mock.request_count(&switch_service()), switches);
}

#[test]
fn test_drop_runs_shutdown() {
    let mock = remote();
    {
        let session = connect(&mock);
        session.enable_gripper().unwrap();
    }
    assert!(mock.is_closed());
    assert_eq!(mock.request_count(&unload_service()), 4);

    // 最后一次切换是停止全部控制器
    let last = mock.requests(&switch_service()).pop().unwrap();
    assert_eq!(last["stop_controllers"].as_array().unwrap().len(), 4);
}

/// 关闭时某一步失败不影响其余步骤
#[test]
fn test_shutdown_continues_past_failures() {
    let mock = remote();
    let session = connect(&mock);
    mock.on_service(&unload_service(), |req| {
        if req["name"] == json!(controllers::GRIPPER) {
            ServiceReply::fail(json!("still running"))
        } else {
            ServiceReply::ok(json!({"ok": true}))
        }
    });

    let err = session.shutdown().unwrap_err();
    let SessionError::Shutdown { failures } = err else {
        panic!("expected Shutdown");
    };
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains(controllers::GRIPPER));
    assert_eq!(mock.request_count(&unload_service()), 4);
    assert!(mock.is_closed());

    // 第二次关闭什么都不做
    session.shutdown().unwrap();
}

#[test]
fn test_commands_after_shutdown_fail_closed() {
    let mock = remote();
    let session = connect(&mock);
    session.shutdown().unwrap();

    assert!(matches!(
        session.set_joint_positions(&[0.0; 7]),
        Err(SessionError::ChannelClosed)
    ));
    assert!(matches!(
        session.set_joint_torques(&[0.0; 7]),
        Err(SessionError::ChannelClosed)
    ));
    assert!(matches!(
        session.command_gripper(1.0, 10.0, false),
        Err(SessionError::ChannelClosed)
    ));
    assert!(matches!(session.calibrate_gripper(), Err(SessionError::ChannelClosed)));
    assert!(matches!(session.disable_gripper(), Err(SessionError::ChannelClosed)));
    assert!(session
        .inverse_kinematics([0.3, 0.0, 0.4], [0.0, 0.0, 0.0, 1.0], &[])
        .is_empty());

    // 已是 SAFE：清理路径重复调用仍然成功
    session.disable_control().unwrap();
    // 遥测读取仍然返回最后的值
    assert_eq!(session.joint_positions(), [0.0; 7]);
}

/// 通道被外部关闭：命令快速失败，Drop 不会挂起
#[test]
fn test_channel_closed_externally() {
    let mock = remote();
    let session = connect(&mock);
    mock.close();

    assert!(matches!(
        session.set_joint_positions(&[0.0; 7]),
        Err(SessionError::ChannelClosed)
    ));
    let err = session.shutdown().unwrap_err();
    assert!(matches!(err, SessionError::Shutdown { .. }));
}

/// 远端不提供命令话题的通道
struct NoCommandTopics(MockChannel);

impl Channel for NoCommandTopics {
    fn subscribe(&self, topic: &str, schema: &str, callback: MessageCallback) -> Result<(), ChannelError> {
        self.0.subscribe(topic, schema, callback)
    }

    fn publisher(&self, topic: &str, _schema: &str) -> Result<Arc<dyn Publisher>, ChannelError> {
        Err(ChannelError::UnknownEndpoint(topic.to_string()))
    }

    fn service(&self, name: &str, schema: &str) -> Result<Arc<dyn ServiceClient>, ChannelError> {
        self.0.service(name, schema)
    }

    fn action_client(&self, name: &str, schema: &str) -> Result<Arc<dyn ActionClient>, ChannelError> {
        self.0.action_client(name, schema)
    }

    fn close(&self) {
        self.0.close()
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// 端点创建失败：不发出任何请求，通道被关闭
#[test]
fn test_endpoint_failure_closes_channel() {
    let mock = remote();
    let result = ArmSession::connect(Arc::new(NoCommandTopics(mock.clone())), fast_config());

    let err = result.err().unwrap();
    assert!(matches!(err, SessionError::Driver(_)), "{:?}", err);
    assert!(format!("{}", err).contains(&position_topic()), "{}", err);
    assert!(mock.is_closed());
    assert_eq!(mock.request_count(&load_service()), 0);
}

/// 配置非法：通道保持打开，调用方可以换配置重试
#[test]
fn test_invalid_config_leaves_channel_open() {
    let mock = remote();
    let mut config = fast_config();
    config.tick_rate_hz = 1e-30;

    let err = ArmSession::connect(Arc::new(mock.clone()), config).err().unwrap();
    assert!(err.is_config_error());
    assert!(!mock.is_closed());

    let session = connect(&mock);
    assert!(session.is_ready());
}

/// 回复在通道关闭前未到达：阻塞中的调用得到 ChannelClosed 而不是等到超时
#[test]
fn test_close_during_pending_call() {
    let mock = remote();
    let mut config = fast_config();
    config.rpc_timeout_ms = 5_000;
    let session = connect_with(&mock, config);
    mock.on_service(&switch_service(), |_| ServiceReply::Hold);

    let closer = {
        let mock = mock.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            mock.close();
        })
    };
    let started = std::time::Instant::now();
    let err = session.set_joint_positions(&[0.0; 7]).unwrap_err();
    closer.join().unwrap();

    assert!(matches!(err, SessionError::ChannelClosed), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.control_mode(), ControlMode::Safe);
}

#[test]
fn test_builder_connects_right_arm() {
    let mock = MockChannel::new();
    let names = blue_protocol::ArmNames::new(Side::Right);
    let mut name: Vec<String> = names.joint_names().to_vec();
    name.push(names.gripper_joint());
    mock.latch(
        JOINT_STATES_TOPIC,
        json!({"name": name, "position": vec![0.2; 8]}),
    );
    mock.on_service("/republish_tfs", |_| ServiceReply::ok(json!({"topic_name": "/tf_right"})));
    mock.latch(
        "/tf_right",
        json!({"transforms": [{"child_frame_id": "right_end_roll_link", "transform": {}}]}),
    );

    let session = ArmSession::builder()
        .side(Side::Right)
        .switch_settle(Duration::ZERO)
        .readiness_poll(Duration::from_millis(5))
        .build(Arc::new(mock.clone()))
        .unwrap();

    assert_eq!(session.side(), Side::Right);
    assert_eq!(session.joint_positions(), [0.2; 7]);
    assert_eq!(session.cartesian_pose().orientation, [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(
        mock.request_count("/right_arm/controller_manager/load_controller"),
        4
    );
}

