//! 遥测状态结构定义
//!
//! 所有结构都是小而可 `Clone` 的值类型：读取方拿到的是副本，遥测更新不会改动正在被读取的数据。

use blue_protocol::JOINT_COUNT;

/// 关节帧
///
/// 下标顺序即会话构造时确定的关节名顺序（从近端到远端）。
/// 同步机制：部分合并（消息中出现的关节覆盖对应槽位，未出现的保留旧值）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointFrame {
    /// 关节位置（弧度）
    pub position: [f64; JOINT_COUNT],
    /// 关节速度（rad/s）
    pub velocity: [f64; JOINT_COUNT],
    /// 关节力矩（N·m）
    pub torque: [f64; JOINT_COUNT],

    /// 已收到过位置的关节掩码（Bit 0-6 对应关节 0-6）
    pub seen_mask: u8,
}

impl JointFrame {
    /// 全部关节都至少收到过一次位置
    pub fn is_complete(&self) -> bool {
        self.seen_mask == (1u8 << JOINT_COUNT) - 1
    }

    /// 从未收到过位置的关节下标（用于调试）
    pub fn missing_joints(&self) -> Vec<usize> {
        (0..JOINT_COUNT).filter(|&i| self.seen_mask & (1 << i) == 0).collect()
    }
}

/// 夹爪状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GripperState {
    /// 手指间距（cm）
    pub position: f64,
    /// 出力（N）
    pub effort: f64,
}

/// 末端位姿（世界坐标系）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianPose {
    /// 位置（米）
    pub position: [f64; 3],
    /// 姿态四元数 [x, y, z, w]
    pub orientation: [f64; 4],
}

impl Default for CartesianPose {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// 遥测快照（不可变）
///
/// 字段级语义："最后一次收到的值"。不保证跨字段的同一时刻一致性。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub joints: JointFrame,
    pub gripper: GripperState,
    pub pose: CartesianPose,

    /// 已合并的关节状态消息数量
    pub joint_updates: u64,
    /// 已合并的位姿消息数量
    pub pose_updates: u64,
}

impl TelemetrySnapshot {
    /// 至少收到过一次关节状态和一次位姿
    pub fn is_ready(&self) -> bool {
        self.joint_updates > 0 && self.pose_updates > 0
    }
}
