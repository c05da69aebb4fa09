//! 模式仲裁器
//!
//! 保证任意时刻只有一个关节控制器在驱动机械臂：
//! - 同模式请求直接返回成功，不产生网络流量（清理路径可以从多处重复调用）
//! - 切换通过一次批量 start/stop 请求完成
//! - 只有远端确认成功才提交新模式，之后等待一个短暂的稳定期再返回
//! - 所有切换由内部互斥锁串行化，锁在整个 RPC + 稳定期期间持有
//!
//! 夹爪启停与关节模式正交，使用同样的切换服务，但不改变当前模式。

use crate::error::{Result, SessionError};
use crate::mode::{self, ControlMode, Transition};
use blue_driver::RpcBridge;
use blue_protocol::{ControllerResponse, SwitchControllerRequest, decode, encode};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 模式仲裁器
pub struct ModeArbiter {
    switch: RpcBridge,
    timeout: Duration,
    settle: Duration,
    /// 串行化所有切换请求
    serial: Mutex<()>,
    /// 当前模式（读取不等待正在进行的切换）
    mode: RwLock<ControlMode>,
    gripper_enabled: AtomicBool,
}

impl ModeArbiter {
    /// 创建仲裁器，初始为 SAFE、夹爪关闭
    ///
    /// 调用方负责在此之前让远端停止全部控制器（见 [`ModeArbiter::stop_all`]）。
    pub fn new(switch: RpcBridge, timeout: Duration, settle: Duration) -> Self {
        Self {
            switch,
            timeout,
            settle,
            serial: Mutex::new(()),
            mode: RwLock::new(ControlMode::Safe),
            gripper_enabled: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> ControlMode {
        *self.mode.read()
    }

    pub fn gripper_enabled(&self) -> bool {
        self.gripper_enabled.load(Ordering::Acquire)
    }

    /// 请求切换到 `target`
    ///
    /// # 错误
    /// - `SessionError::RpcRejected`: 远端拒绝，当前模式不变
    /// - `SessionError::RpcTimeout`: 超时，当前模式不变
    /// - `SessionError::ChannelClosed`: 通道已关闭
    pub fn request(&self, target: ControlMode) -> Result<()> {
        let _serial = self.serial.lock();

        let current = self.current();
        let plan = match current.transition_to(target) {
            Transition::Stay(_) => {
                debug!("already in {} mode", target);
                return Ok(());
            },
            Transition::Switch(plan) => plan,
        };

        let outcome = self.switch_controllers("switch control mode", &plan.request());
        match plan.commit(outcome) {
            Ok(mode) => {
                *self.mode.write() = mode;
                info!("control mode {} -> {}", current, mode);
                self.settle();
                Ok(())
            },
            Err(e) => {
                warn!("control mode {} -> {} failed: {}", current, target, e);
                Err(e)
            },
        }
    }

    /// 启用/禁用夹爪控制器
    ///
    /// 已处于目标状态时直接返回。
    pub fn set_gripper(&self, enable: bool) -> Result<()> {
        let _serial = self.serial.lock();

        if self.gripper_enabled() == enable {
            return Ok(());
        }
        let operation = if enable { "enable gripper" } else { "disable gripper" };
        self.switch_controllers(operation, &mode::gripper_request(enable))?;
        self.gripper_enabled.store(enable, Ordering::Release);
        info!("gripper {}", if enable { "enabled" } else { "disabled" });
        self.settle();
        Ok(())
    }

    /// 停止全部控制器（总是发送，不短路）
    ///
    /// 成功后模式为 SAFE、夹爪关闭。用于启动与关闭流程。
    pub fn stop_all(&self) -> Result<()> {
        let _serial = self.serial.lock();

        self.switch_controllers("stop all controllers", &mode::stop_all_request())?;
        *self.mode.write() = ControlMode::Safe;
        self.gripper_enabled.store(false, Ordering::Release);
        debug!("all controllers stopped");
        Ok(())
    }

    fn switch_controllers(&self, operation: &str, request: &SwitchControllerRequest) -> Result<()> {
        let payload = encode(request).map_err(|e| SessionError::driver(operation, e.into()))?;
        let values = self
            .switch
            .call(payload, self.timeout)
            .map_err(|e| SessionError::rpc(operation, e))?;
        let response: ControllerResponse =
            decode(values).map_err(|e| SessionError::driver(operation, e.into()))?;
        if !response.ok {
            return Err(mode::rejected(operation, "controller manager returned ok=false"));
        }
        Ok(())
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_channel::{MockChannel, ServiceReply};
    use blue_driver::BridgeMetrics;
    use blue_protocol::controllers;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    const SWITCH: &str = "/left_arm/controller_manager/switch_controller";

    fn arbiter(mock: &MockChannel) -> ModeArbiter {
        let bridge = RpcBridge::connect(
            mock,
            SWITCH,
            "controller_manager_msgs/SwitchController",
            Arc::new(BridgeMetrics::new()),
        )
        .unwrap();
        ModeArbiter::new(bridge, Duration::from_millis(500), Duration::ZERO)
    }

    #[test]
    fn test_same_mode_twice_issues_at_most_one_request() {
        let mock = MockChannel::new();
        let arbiter = arbiter(&mock);

        arbiter.request(ControlMode::Position).unwrap();
        arbiter.request(ControlMode::Position).unwrap();
        assert_eq!(mock.request_count(SWITCH), 1);
        assert_eq!(arbiter.current(), ControlMode::Position);

        // SAFE -> SAFE 从不触网
        let mock = MockChannel::new();
        let arbiter = super::tests::arbiter(&mock);
        arbiter.request(ControlMode::Safe).unwrap();
        arbiter.request(ControlMode::Safe).unwrap();
        assert_eq!(mock.request_count(SWITCH), 0);
    }

    #[test]
    fn test_rejected_switch_keeps_mode() {
        let mock = MockChannel::new();
        mock.on_service(SWITCH, |_| ServiceReply::fail(json!("controller not loaded")));
        let arbiter = arbiter(&mock);

        let err = arbiter.request(ControlMode::Torque).unwrap_err();
        assert!(matches!(err, SessionError::RpcRejected { .. }));
        assert_eq!(arbiter.current(), ControlMode::Safe);
    }

    #[test]
    fn test_ok_false_is_rejection() {
        let mock = MockChannel::new();
        mock.on_service(SWITCH, |_| ServiceReply::ok(json!({"ok": false})));
        let arbiter = arbiter(&mock);

        let err = arbiter.request(ControlMode::Position).unwrap_err();
        assert!(matches!(err, SessionError::RpcRejected { .. }));
        assert_eq!(arbiter.current(), ControlMode::Safe);
    }

    #[test]
    fn test_timeout_keeps_mode() {
        let mock = MockChannel::new();
        mock.on_service(SWITCH, |_| ServiceReply::Hold);
        let bridge = RpcBridge::connect(
            &mock,
            SWITCH,
            "controller_manager_msgs/SwitchController",
            Arc::new(BridgeMetrics::new()),
        )
        .unwrap();
        let arbiter = ModeArbiter::new(bridge, Duration::from_millis(20), Duration::ZERO);

        let err = arbiter.request(ControlMode::Position).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(arbiter.current(), ControlMode::Safe);
    }

    #[test]
    fn test_switch_request_batches_start_and_stop() {
        let mock = MockChannel::new();
        let arbiter = arbiter(&mock);

        arbiter.request(ControlMode::Position).unwrap();
        arbiter.request(ControlMode::SoftPosition).unwrap();

        let requests = mock.requests(SWITCH);
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            json!({
                "start_controllers": [controllers::JOINT_SOFT_POSITION],
                "stop_controllers": [controllers::JOINT_POSITION],
                "strictness": 1
            })
        );
    }

    #[test]
    fn test_gripper_toggle_is_orthogonal() {
        let mock = MockChannel::new();
        let arbiter = arbiter(&mock);
        arbiter.request(ControlMode::Torque).unwrap();

        arbiter.set_gripper(true).unwrap();
        arbiter.set_gripper(true).unwrap();
        assert!(arbiter.gripper_enabled());
        assert_eq!(arbiter.current(), ControlMode::Torque);
        assert_eq!(mock.request_count(SWITCH), 2);

        arbiter.set_gripper(false).unwrap();
        assert!(!arbiter.gripper_enabled());
        assert_eq!(arbiter.current(), ControlMode::Torque);
    }

    #[test]
    fn test_stop_all_resets_state_and_always_sends() {
        let mock = MockChannel::new();
        let arbiter = arbiter(&mock);
        arbiter.stop_all().unwrap();
        arbiter.stop_all().unwrap();
        assert_eq!(mock.request_count(SWITCH), 2);

        arbiter.request(ControlMode::Position).unwrap();
        arbiter.set_gripper(true).unwrap();
        arbiter.stop_all().unwrap();
        assert_eq!(arbiter.current(), ControlMode::Safe);
        assert!(!arbiter.gripper_enabled());
    }

    #[test]
    fn test_concurrent_requests_are_serialized() {
        let mock = MockChannel::new();
        mock.on_service(SWITCH, |req| ServiceReply::Delayed {
            success: true,
            values: json!({"ok": true, "echo": req.clone()}),
            delay: Duration::from_millis(20),
        });
        let arbiter = Arc::new(arbiter(&mock));

        let handles: Vec<_> = [ControlMode::Position, ControlMode::Torque]
            .into_iter()
            .map(|mode| {
                let arbiter = arbiter.clone();
                thread::spawn(move || arbiter.request(mode))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // 第二个请求一定看到第一个已提交的模式：stop 列表就是第一个模式的控制器
        let requests = mock.requests(SWITCH);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["stop_controllers"], json!([]));
        let first_started = requests[0]["start_controllers"].clone();
        assert_eq!(requests[1]["stop_controllers"], first_started);
        assert_ne!(arbiter.current(), ControlMode::Safe);
    }
}
