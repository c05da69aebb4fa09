//! 消息结构定义
//!
//! 字段名与 rosbridge 上的 JSON 完全一致。反馈类消息的字段一律带 `#[serde(default)]`：
//! 远端经常只发送部分字段，缺失字段不能导致整条消息解码失败。

use crate::RosMessage;
use crate::names::{ArmNames, JOINT_COUNT, schema};
use serde::{Deserialize, Serialize};

// ==================== 遥测 ====================

/// 关节状态（`sensor_msgs/JointState`）
///
/// 四个数组按下标一一对应；消息可能只包含部分关节，也可能缺少 `velocity`/`effort`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStateMsg {
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

impl RosMessage for JointStateMsg {
    const SCHEMA: &'static str = schema::JOINT_STATE;
}

impl JointStateMsg {
    /// 查找某个关节在消息中的下标
    pub fn index_of(&self, joint_name: &str) -> Option<usize> {
        self.name.iter().position(|n| n == joint_name)
    }
}

/// 三维向量 / 点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// 四元数（x, y, z, w）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "unit_w")]
    pub w: f64,
}

fn unit_w() -> f64 {
    1.0
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl From<[f64; 4]> for Quaternion {
    fn from(q: [f64; 4]) -> Self {
        Self {
            x: q[0],
            y: q[1],
            z: q[2],
            w: q[3],
        }
    }
}

impl From<Quaternion> for [f64; 4] {
    fn from(q: Quaternion) -> Self {
        [q.x, q.y, q.z, q.w]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vector3,
    #[serde(default)]
    pub rotation: Quaternion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    #[serde(default)]
    pub child_frame_id: String,
    pub transform: Transform,
}

/// TF 数组（`tf2_web_republisher/TFArray`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfArray {
    #[serde(default)]
    pub transforms: Vec<TransformStamped>,
}

impl RosMessage for TfArray {
    const SCHEMA: &'static str = schema::TF_ARRAY;
}

// ==================== 命令 ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiArrayDimension {
    pub label: String,
    pub size: u32,
    pub stride: u32,
}

/// 多维数组布局
///
/// 控制器只读取 `data`，布局保持为空对象 `{}`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiArrayLayout {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dim: Vec<MultiArrayDimension>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub data_offset: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// 关节命令（`std_msgs/Float64MultiArray`），位置/软位置/力矩控制器共用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Float64MultiArray {
    #[serde(default)]
    pub layout: MultiArrayLayout,
    #[serde(default)]
    pub data: Vec<f64>,
}

impl RosMessage for Float64MultiArray {
    const SCHEMA: &'static str = schema::FLOAT64_MULTI_ARRAY;
}

impl From<[f64; JOINT_COUNT]> for Float64MultiArray {
    fn from(values: [f64; JOINT_COUNT]) -> Self {
        Self {
            layout: MultiArrayLayout::default(),
            data: values.to_vec(),
        }
    }
}

// ==================== TF 重发布服务 ====================

/// ROS 时长
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RosDuration {
    pub secs: f64,
    pub nsecs: f64,
}

/// TF 重发布请求（`tf2_web_republisher/RepublishTFs`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepublishTfsRequest {
    pub source_frames: Vec<String>,
    pub target_frame: String,
    pub angular_thres: f64,
    pub trans_thres: f64,
    pub rate: f64,
    pub timeout: RosDuration,
}

impl RosMessage for RepublishTfsRequest {
    const SCHEMA: &'static str = schema::REPUBLISH_TFS;
}

impl RepublishTfsRequest {
    /// 请求 "世界坐标系 -> 末端" 的变换流
    ///
    /// 阈值为 0 表示每个周期都发送，不做变化量过滤。
    pub fn end_effector(names: &ArmNames) -> Self {
        Self {
            source_frames: vec![names.end_effector_frame()],
            target_frame: names.world_frame(),
            angular_thres: 0.0,
            trans_thres: 0.0,
            rate: 2.0,
            timeout: RosDuration {
                secs: 2.0,
                nsecs: 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepublishTfsResponse {
    #[serde(default)]
    pub topic_name: String,
}

impl RosMessage for RepublishTfsResponse {
    const SCHEMA: &'static str = schema::REPUBLISH_TFS;
}

// ==================== 控制器管理器 ====================

/// 加载/卸载控制器请求（两者结构相同）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerRequest {
    pub name: String,
}

impl RosMessage for ControllerRequest {
    const SCHEMA: &'static str = schema::LOAD_CONTROLLER;
}

/// 控制器管理器的通用应答
///
/// 远端省略 `ok` 字段时视为成功（只以服务调用本身的成败为准）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerResponse {
    #[serde(default = "default_ok")]
    pub ok: bool,
}

fn default_ok() -> bool {
    true
}

impl Default for ControllerResponse {
    fn default() -> Self {
        Self { ok: true }
    }
}

impl RosMessage for ControllerResponse {
    const SCHEMA: &'static str = schema::SWITCH_CONTROLLER;
}

/// 切换控制器请求（`controller_manager_msgs/SwitchController`）
///
/// 启动与停止列表在同一条消息中提交，远端按批处理，两者不会互相竞争。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchControllerRequest {
    pub start_controllers: Vec<String>,
    pub stop_controllers: Vec<String>,
    pub strictness: i32,
}

impl SwitchControllerRequest {
    /// 尽力而为：部分控制器切换失败时，其余照常切换
    pub const BEST_EFFORT: i32 = 1;
    /// 严格：任一控制器失败则整体失败
    pub const STRICT: i32 = 2;

    pub fn best_effort(start: Vec<String>, stop: Vec<String>) -> Self {
        Self {
            start_controllers: start,
            stop_controllers: stop,
            strictness: Self::BEST_EFFORT,
        }
    }
}

impl RosMessage for SwitchControllerRequest {
    const SCHEMA: &'static str = schema::SWITCH_CONTROLLER;
}

// ==================== 夹爪 ====================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperCommand {
    /// 手指间距（cm）
    pub position: f64,
    /// 最大出力（N），超过即判定为堵转
    pub max_effort: f64,
}

/// 夹爪动作目标（`control_msgs/GripperCommandAction`）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperCommandGoal {
    pub command: GripperCommand,
}

impl RosMessage for GripperCommandGoal {
    const SCHEMA: &'static str = schema::GRIPPER_COMMAND_ACTION;
}

impl GripperCommandGoal {
    pub fn new(position: f64, max_effort: f64) -> Self {
        Self {
            command: GripperCommand {
                position,
                max_effort,
            },
        }
    }
}

/// 夹爪动作的反馈/结果（两者结构相同）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GripperCommandStatus {
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub effort: f64,
    #[serde(default)]
    pub stalled: bool,
    #[serde(default)]
    pub reached_goal: bool,
}

impl RosMessage for GripperCommandStatus {
    const SCHEMA: &'static str = schema::GRIPPER_COMMAND_ACTION;
}

impl GripperCommandStatus {
    /// 堵转或到达目标即为终态
    pub fn is_terminal(&self) -> bool {
        self.stalled || self.reached_goal
    }
}

/// 触发类服务应答（`std_srvs/Trigger`），用于夹爪标定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default = "default_ok")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl RosMessage for TriggerResponse {
    const SCHEMA: &'static str = schema::TRIGGER;
}

// ==================== 逆运动学 ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// 逆运动学请求（`blue_msgs/InverseKinematics`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseKinematicsRequest {
    pub end_effector_pose: PoseStamped,
    pub solver: String,
    pub seed_joint_positions: Vec<f64>,
}

impl InverseKinematicsRequest {
    pub const DEFAULT_SOLVER: &'static str = "trac-ik";

    pub fn new(
        world_frame: String,
        position: [f64; 3],
        orientation: [f64; 4],
        seed_joint_positions: Vec<f64>,
    ) -> Self {
        Self {
            end_effector_pose: PoseStamped {
                header: Header {
                    frame_id: world_frame,
                },
                pose: Pose {
                    position: position.into(),
                    orientation: orientation.into(),
                },
            },
            solver: Self::DEFAULT_SOLVER.to_string(),
            seed_joint_positions,
        }
    }
}

impl RosMessage for InverseKinematicsRequest {
    const SCHEMA: &'static str = schema::INVERSE_KINEMATICS;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InverseKinematicsResponse {
    #[serde(default)]
    pub ik_joint_positions: Vec<f64>,
}

impl RosMessage for InverseKinematicsResponse {
    const SCHEMA: &'static str = schema::INVERSE_KINEMATICS;
}
