//! 遥测镜像
//!
//! 维护机械臂最新已知状态（关节、夹爪、末端位姿）。
//!
//! - 写入：只在通道 IO 线程上调用 `apply_*`，对不可变快照做"复制-修改-原子替换"
//! - 读取：任意线程调用 [`TelemetryMirror::snapshot`]，无锁，拿到的是副本
//!
//! 合并规则是逐字段的"后到覆盖、缺失保留"：消息中没有出现的关节（或缺少的数组）
//! 保持旧值，永远不会被清零。部分消息是常态，不视为错误，只记录 `trace!` 日志。

use crate::error::DriverError;
use crate::state::TelemetrySnapshot;
use arc_swap::ArcSwap;
use blue_channel::Message;
use blue_protocol::{ArmNames, JOINT_COUNT, JointStateMsg, TfArray, decode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// 遥测镜像
pub struct TelemetryMirror {
    joint_names: [String; JOINT_COUNT],
    gripper_joint: String,
    end_effector_frame: String,
    state: ArcSwap<TelemetrySnapshot>,
}

impl TelemetryMirror {
    pub fn new(names: &ArmNames) -> Self {
        Self {
            joint_names: names.joint_names(),
            gripper_joint: names.gripper_joint(),
            end_effector_frame: names.end_effector_frame(),
            state: ArcSwap::from_pointee(TelemetrySnapshot::default()),
        }
    }

    /// 当前状态的不可变副本
    ///
    /// # 性能
    /// - 无锁读取（ArcSwap::load）
    /// - 不阻塞 IO 线程的写入
    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.state.load().as_ref()
    }

    /// 是否已就绪（至少收到一次关节状态和一次位姿）
    pub fn is_ready(&self) -> bool {
        self.state.load().is_ready()
    }

    /// 合并一条关节状态消息
    ///
    /// 返回是否有任何字段被更新。
    pub fn apply_joint_state(&self, msg: &JointStateMsg) -> bool {
        let mut next = self.snapshot();
        let mut arm_touched = false;

        for (slot, joint_name) in self.joint_names.iter().enumerate() {
            let Some(idx) = msg.index_of(joint_name) else {
                continue;
            };
            if let Some(&p) = msg.position.get(idx) {
                next.joints.position[slot] = p;
                next.joints.seen_mask |= 1 << slot;
                arm_touched = true;
            }
            if let Some(&v) = msg.velocity.get(idx) {
                next.joints.velocity[slot] = v;
                arm_touched = true;
            }
            if let Some(&e) = msg.effort.get(idx) {
                next.joints.torque[slot] = e;
                arm_touched = true;
            }
        }

        let mut gripper_touched = false;
        if let Some(idx) = msg.index_of(&self.gripper_joint) {
            if let Some(&p) = msg.position.get(idx) {
                next.gripper.position = p;
                gripper_touched = true;
            }
            if let Some(&e) = msg.effort.get(idx) {
                next.gripper.effort = e;
                gripper_touched = true;
            }
        } else {
            trace!("joint state without {}", self.gripper_joint);
        }

        if arm_touched {
            next.joint_updates += 1;
        } else {
            trace!("joint state carried none of the arm joints");
        }

        if !arm_touched && !gripper_touched {
            return false;
        }

        // 单写者（IO 线程），无需 rcu
        self.state.store(Arc::new(next));
        true
    }

    /// 合并一条 TF 数组消息
    ///
    /// 优先取 `child_frame_id` 为末端坐标系的变换；远端未填写坐标系名时取第一个。
    pub fn apply_transforms(&self, msg: &TfArray) -> bool {
        let chosen = msg
            .transforms
            .iter()
            .find(|t| t.child_frame_id == self.end_effector_frame)
            .or_else(|| msg.transforms.first());

        let Some(stamped) = chosen else {
            trace!("empty transform array");
            return false;
        };

        let mut next = self.snapshot();
        next.pose.position = stamped.transform.translation.into();
        next.pose.orientation = stamped.transform.rotation.into();
        next.pose_updates += 1;
        self.state.store(Arc::new(next));
        true
    }

    /// 通道回调入口：解码并合并关节状态
    ///
    /// 解码失败只记录日志，不影响已有状态。
    pub fn on_joint_state(&self, message: Message) -> bool {
        match decode::<JointStateMsg>(message) {
            Ok(msg) => self.apply_joint_state(&msg),
            Err(e) => {
                trace!("dropping malformed joint state: {}", e);
                false
            },
        }
    }

    /// 通道回调入口：解码并合并 TF 数组
    pub fn on_transforms(&self, message: Message) -> bool {
        match decode::<TfArray>(message) {
            Ok(msg) => self.apply_transforms(&msg),
            Err(e) => {
                trace!("dropping malformed transform array: {}", e);
                false
            },
        }
    }

    /// 轮询等待就绪
    ///
    /// 镜像没有"首条遥测"推送事件，这里用有界轮询 + 短暂休眠。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍未就绪
    pub fn wait_until_ready(&self, timeout: Duration, poll: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            if self.is_ready() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(poll);
        }
    }
}
