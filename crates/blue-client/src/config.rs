//! 会话配置
//!
//! 可从 TOML 加载，所有时长以毫秒存储。缺省字段取默认值。
//!
//! ```toml
//! side = "right"
//! rpc_timeout_ms = 2000
//! switch_settle_ms = 50
//! tick_rate_hz = 60.0
//! ```

use crate::error::{Result, SessionError};
use blue_protocol::Side;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 插值发布频率的允许范围（Hz）
pub const TICK_RATE_RANGE_HZ: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// 手臂侧别
    pub side: Side,
    /// 普通控制平面调用超时
    pub rpc_timeout_ms: u64,
    /// 加载单个控制器的超时（加载通常比切换慢）
    pub controller_load_timeout_ms: u64,
    /// 夹爪标定超时（标定过程中夹爪会实际运动）
    pub calibration_timeout_ms: u64,
    /// 模式切换成功后的稳定等待（远端需要时间接好新的命令话题）
    pub switch_settle_ms: u64,
    /// 构造时等待首条遥测的超时
    pub readiness_timeout_ms: u64,
    /// 就绪轮询间隔
    pub readiness_poll_ms: u64,
    /// 插值运动的发布频率（Hz），取值见 [`TICK_RATE_RANGE_HZ`]
    pub tick_rate_hz: f64,
    /// 夹爪阻塞等待终态的超时
    pub gripper_goal_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            side: Side::Left,
            rpc_timeout_ms: 2_000,
            controller_load_timeout_ms: 5_000,
            calibration_timeout_ms: 30_000,
            switch_settle_ms: 50,
            readiness_timeout_ms: 10_000,
            readiness_poll_ms: 100,
            tick_rate_hz: 60.0,
            gripper_goal_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    /// 默认配置，指定侧别
    pub fn for_side(side: Side) -> Self {
        Self {
            side,
            ..Self::default()
        }
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<()> {
        if !TICK_RATE_RANGE_HZ.contains(&self.tick_rate_hz) {
            return Err(SessionError::invalid_parameter(
                "tick_rate_hz",
                format!(
                    "must be between {} and {} Hz, got {}",
                    TICK_RATE_RANGE_HZ.start(),
                    TICK_RATE_RANGE_HZ.end(),
                    self.tick_rate_hz
                ),
            ));
        }
        let timeouts = [
            ("rpc_timeout_ms", self.rpc_timeout_ms),
            ("controller_load_timeout_ms", self.controller_load_timeout_ms),
            ("calibration_timeout_ms", self.calibration_timeout_ms),
            ("readiness_timeout_ms", self.readiness_timeout_ms),
            ("readiness_poll_ms", self.readiness_poll_ms),
            ("gripper_goal_timeout_ms", self.gripper_goal_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(SessionError::invalid_parameter(name, "must be greater than zero"));
            }
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn controller_load_timeout(&self) -> Duration {
        Duration::from_millis(self.controller_load_timeout_ms)
    }

    pub fn calibration_timeout(&self) -> Duration {
        Duration::from_millis(self.calibration_timeout_ms)
    }

    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn gripper_goal_timeout(&self) -> Duration {
        Duration::from_millis(self.gripper_goal_timeout_ms)
    }

    /// 插值运动的节拍周期
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}
