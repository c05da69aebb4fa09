//! 关节控制模式状态机
//!
//! 四个模式互斥，任意时刻恰好一个处于激活状态。模式本身是一个封闭枚举，
//! "两个关节控制器同时激活"这种状态在类型上无法表示。
//!
//! 状态转换分两步：
//! 1. [`ControlMode::transition_to`] 给出计划：原地不动，或一次批量 start/stop 切换
//! 2. [`SwitchPlan::commit`] 根据远端结果决定新模式：只有确认成功才提交，失败保持原模式

use crate::error::{Result, SessionError};
use blue_protocol::{SwitchControllerRequest, controllers};
use std::fmt;

/// 关节控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlMode {
    /// 重力补偿，不驱动关节（没有对应控制器）
    #[default]
    Safe,
    /// 关节位置控制
    Position,
    /// 柔顺位置控制
    SoftPosition,
    /// 关节力矩控制
    Torque,
}

impl ControlMode {
    pub const ALL: [ControlMode; 4] = [
        ControlMode::Safe,
        ControlMode::Position,
        ControlMode::SoftPosition,
        ControlMode::Torque,
    ];

    /// 对应的远端控制器名
    pub fn controller(self) -> Option<&'static str> {
        match self {
            ControlMode::Safe => None,
            ControlMode::Position => Some(controllers::JOINT_POSITION),
            ControlMode::SoftPosition => Some(controllers::JOINT_SOFT_POSITION),
            ControlMode::Torque => Some(controllers::JOINT_TORQUE),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlMode::Safe => "safe",
            ControlMode::Position => "position",
            ControlMode::SoftPosition => "soft_position",
            ControlMode::Torque => "torque",
        }
    }

    /// 规划到 `target` 的转换
    pub fn transition_to(self, target: ControlMode) -> Transition {
        if self == target {
            return Transition::Stay(self);
        }
        Transition::Switch(SwitchPlan {
            from: self,
            to: target,
        })
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 会话管理的全部控制器（关节控制器 + 夹爪）
pub fn all_controllers() -> Vec<String> {
    vec![
        controllers::JOINT_POSITION.to_string(),
        controllers::JOINT_SOFT_POSITION.to_string(),
        controllers::JOINT_TORQUE.to_string(),
        controllers::GRIPPER.to_string(),
    ]
}

/// 转换计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 已处于目标模式，不产生任何网络请求
    Stay(ControlMode),
    /// 需要一次批量切换
    Switch(SwitchPlan),
}

/// 一次模式切换：启动目标模式的控制器、停止当前模式的控制器，放在同一条请求里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchPlan {
    pub from: ControlMode,
    pub to: ControlMode,
}

impl SwitchPlan {
    /// 对应的切换请求
    pub fn request(&self) -> SwitchControllerRequest {
        let start = self.to.controller().map(str::to_string).into_iter().collect();
        let stop = self.from.controller().map(str::to_string).into_iter().collect();
        SwitchControllerRequest::best_effort(start, stop)
    }

    /// 根据远端结果得出新模式
    ///
    /// 成功返回目标模式；失败原样返回错误，调用方保持 `from` 不变。
    pub fn commit(self, outcome: Result<()>) -> Result<ControlMode> {
        outcome.map(|()| self.to)
    }
}

/// 夹爪启停请求（与关节模式正交，不影响当前模式）
pub fn gripper_request(enable: bool) -> SwitchControllerRequest {
    let gripper = vec![controllers::GRIPPER.to_string()];
    if enable {
        SwitchControllerRequest::best_effort(gripper, Vec::new())
    } else {
        SwitchControllerRequest::best_effort(Vec::new(), gripper)
    }
}

/// 停止全部控制器的请求
pub fn stop_all_request() -> SwitchControllerRequest {
    SwitchControllerRequest::best_effort(Vec::new(), all_controllers())
}

/// 把 "ok: false" 之类的远端否定应答转换成错误
pub(crate) fn rejected(operation: &str, reason: impl Into<String>) -> SessionError {
    SessionError::RpcRejected {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}
