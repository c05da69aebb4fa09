//! Observer - 状态观察器（View 模式）
//!
//! 直接持有遥测镜像引用，无锁读取最新状态；返回值全部是副本。
//! 可以 `Clone` 后交给监控线程，不需要持有整个会话。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! # use blue_client::Observer;
//! # fn example(observer: Observer) {
//! let positions = observer.joint_positions();
//! println!("base roll: {:.3} rad", positions[0]);
//!
//! let observer2 = observer.clone();
//! std::thread::spawn(move || {
//!     let pose = observer2.cartesian_pose();
//!     println!("end effector at {:?}", pose.position);
//! });
//! # }
//! ```

use blue_driver::{CartesianPose, GripperState, TelemetryMirror, TelemetrySnapshot};
use blue_protocol::JOINT_COUNT;
use std::sync::Arc;

/// 状态观察器（只读接口）
#[derive(Clone)]
pub struct Observer {
    mirror: Arc<TelemetryMirror>,
}

impl Observer {
    pub fn new(mirror: Arc<TelemetryMirror>) -> Self {
        Observer { mirror }
    }

    /// 完整快照（一次读取，字段来自同一个不可变版本）
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.mirror.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.mirror.is_ready()
    }

    /// 关节位置（弧度）
    pub fn joint_positions(&self) -> [f64; JOINT_COUNT] {
        self.snapshot().joints.position
    }

    /// 关节速度（rad/s）
    pub fn joint_velocities(&self) -> [f64; JOINT_COUNT] {
        self.snapshot().joints.velocity
    }

    /// 关节力矩（N·m）
    pub fn joint_torques(&self) -> [f64; JOINT_COUNT] {
        self.snapshot().joints.torque
    }

    /// 末端位姿（世界坐标系）
    pub fn cartesian_pose(&self) -> CartesianPose {
        self.snapshot().pose
    }

    pub fn gripper_state(&self) -> GripperState {
        self.snapshot().gripper
    }

    /// 夹爪间距（cm）
    pub fn gripper_position(&self) -> f64 {
        self.snapshot().gripper.position
    }

    /// 夹爪出力（N）
    pub fn gripper_effort(&self) -> f64 {
        self.snapshot().gripper.effort
    }
}
