//! 命名约定
//!
//! 手臂侧别决定了几乎所有名字：话题前缀 `/<side>_arm/`、关节名 `<side>_xxx_joint`、
//! 世界坐标系 `<side>_base_link` 以及末端坐标系 `<side>_end_roll_link`。

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 手臂关节数量
pub const JOINT_COUNT: usize = 7;

/// 关节名后缀（从近端到远端）
const JOINT_SUFFIXES: [&str; JOINT_COUNT] = [
    "base_roll_joint",
    "shoulder_lift_joint",
    "shoulder_roll_joint",
    "elbow_lift_joint",
    "elbow_roll_joint",
    "wrist_lift_joint",
    "wrist_roll_joint",
];

/// 关节状态话题（全局，不带侧别前缀）
pub const JOINT_STATES_TOPIC: &str = "/joint_states";

/// TF 重发布服务（全局）
pub const REPUBLISH_TFS_SERVICE: &str = "/republish_tfs";

/// rosbridge 类型字符串
pub mod schema {
    pub const JOINT_STATE: &str = "sensor_msgs/JointState";
    pub const FLOAT64_MULTI_ARRAY: &str = "std_msgs/Float64MultiArray";
    pub const TF_ARRAY: &str = "tf2_web_republisher/TFArray";
    pub const REPUBLISH_TFS: &str = "tf2_web_republisher/RepublishTFs";
    pub const LOAD_CONTROLLER: &str = "controller_manager_msgs/LoadController";
    pub const UNLOAD_CONTROLLER: &str = "controller_manager_msgs/UnloadController";
    pub const SWITCH_CONTROLLER: &str = "controller_manager_msgs/SwitchController";
    pub const GRIPPER_COMMAND_ACTION: &str = "control_msgs/GripperCommandAction";
    pub const TRIGGER: &str = "std_srvs/Trigger";
    pub const INVERSE_KINEMATICS: &str = "blue_msgs/InverseKinematics";
}

/// 控制器名称（相对于 `/<side>_arm/` 前缀）
pub mod controllers {
    pub const JOINT_POSITION: &str = "blue_controllers/joint_position_controller";
    pub const JOINT_SOFT_POSITION: &str = "blue_controllers/joint_soft_position_controller";
    pub const JOINT_TORQUE: &str = "blue_controllers/joint_torque_controller";
    pub const GRIPPER: &str = "blue_controllers/gripper_controller";
}

/// 手臂侧别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(ProtocolError::UnknownSide(other.to_string())),
        }
    }
}

/// 控制器管理器操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerManagerOp {
    Load,
    Unload,
    Switch,
}

impl ControllerManagerOp {
    fn service_suffix(self) -> &'static str {
        match self {
            ControllerManagerOp::Load => "load_controller",
            ControllerManagerOp::Unload => "unload_controller",
            ControllerManagerOp::Switch => "switch_controller",
        }
    }

    /// 对应的 rosbridge 服务类型
    pub fn schema(self) -> &'static str {
        match self {
            ControllerManagerOp::Load => schema::LOAD_CONTROLLER,
            ControllerManagerOp::Unload => schema::UNLOAD_CONTROLLER,
            ControllerManagerOp::Switch => schema::SWITCH_CONTROLLER,
        }
    }
}

/// 某一侧手臂的全部名字
///
/// # 示例
///
/// ```
/// use blue_protocol::{ArmNames, Side};
///
/// let names = ArmNames::new(Side::Right);
/// assert_eq!(names.joint_names()[0], "right_base_roll_joint");
/// assert_eq!(names.world_frame(), "right_base_link");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmNames {
    side: Side,
    prefix: String,
}

impl ArmNames {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            prefix: format!("/{}_arm/", side),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// 7 个关节名（从近端到远端），其下标即关节槽位下标
    pub fn joint_names(&self) -> [String; JOINT_COUNT] {
        JOINT_SUFFIXES.map(|suffix| format!("{}_{}", self.side, suffix))
    }

    pub fn gripper_joint(&self) -> String {
        format!("{}_gripper_joint", self.side)
    }

    pub fn world_frame(&self) -> String {
        format!("{}_base_link", self.side)
    }

    pub fn end_effector_frame(&self) -> String {
        format!("{}_end_roll_link", self.side)
    }

    /// 控制器管理器服务名，如 `/left_arm/controller_manager/switch_controller`
    pub fn controller_manager_service(&self, op: ControllerManagerOp) -> String {
        format!("{}controller_manager/{}", self.prefix, op.service_suffix())
    }

    /// 控制器命令话题，如 `/left_arm/blue_controllers/joint_position_controller/command`
    pub fn command_topic(&self, controller: &str) -> String {
        format!("{}{}/command", self.prefix, controller)
    }

    pub fn gripper_action(&self) -> String {
        format!("{}{}/gripper_cmd", self.prefix, controllers::GRIPPER)
    }

    pub fn gripper_calibration_service(&self) -> String {
        format!("{}{}/calibrate", self.prefix, controllers::GRIPPER)
    }

    pub fn inverse_kinematics_service(&self) -> String {
        format!("{}inverse_kinematics", self.prefix)
    }
}
