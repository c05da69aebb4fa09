//! 顶层导出测试
//!
//! 确认常用类型可以从 crate 根和 prelude 直接访问。

use blue_sdk::prelude::*;

#[test]
fn test_prelude_exports() {
    let config = SessionConfig::for_side(Side::Right);
    assert_eq!(config.side, Side::Right);
    assert_eq!(ControlMode::default(), ControlMode::Safe);
    assert_eq!(JOINT_COUNT, 7);

    let pose = CartesianPose::default();
    assert_eq!(pose.orientation, [0.0, 0.0, 0.0, 1.0]);
    assert!(!TelemetrySnapshot::default().is_ready());
}

#[test]
fn test_root_exports() {
    let _builder: blue_sdk::ArmSessionBuilder = blue_sdk::ArmSession::builder();
    let err = blue_sdk::SessionError::ChannelClosed;
    assert!(!err.is_retryable());
    let err: blue_sdk::SessionError = blue_sdk::ChannelError::Closed.into();
    assert!(matches!(err, blue_sdk::SessionError::ChannelClosed));
}

#[test]
fn test_builder_rejects_bad_config_without_connecting() {
    let mock = blue_sdk::channel::MockChannel::new();
    let result = ArmSession::builder()
        .readiness_poll(std::time::Duration::ZERO)
        .build(std::sync::Arc::new(mock.clone()));
    assert!(matches!(result, Err(SessionError::InvalidParameter { .. })));
    assert!(!mock.is_closed());
}
