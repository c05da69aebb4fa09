//! Builder 模式实现
//!
//! 提供链式构造 `ArmSession` 实例的便捷方式。

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::ArmSession;
use blue_channel::Channel;
use blue_protocol::Side;
use std::sync::Arc;
use std::time::Duration;

/// ArmSession Builder（链式构造）
///
/// 未设置的项取 [`SessionConfig::default`]。
///
/// # Example
///
/// ```no_run
/// use blue_client::ArmSession;
/// use blue_protocol::Side;
/// use std::time::Duration;
/// # use std::sync::Arc;
/// # fn example(channel: Arc<dyn blue_channel::Channel>) {
/// let session = ArmSession::builder()
///     .side(Side::Right)
///     .rpc_timeout(Duration::from_secs(1))
///     .tick_rate(100.0)
///     .build(channel)
///     .unwrap();
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArmSessionBuilder {
    config: SessionConfig,
}

impl ArmSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换配置（如从 TOML 加载的配置），之后的链式设置仍然生效
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// 手臂侧别（默认 left）
    pub fn side(mut self, side: Side) -> Self {
        self.config.side = side;
        self
    }

    /// 普通控制平面调用超时
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.config.rpc_timeout_ms = millis(timeout);
        self
    }

    pub fn controller_load_timeout(mut self, timeout: Duration) -> Self {
        self.config.controller_load_timeout_ms = millis(timeout);
        self
    }

    pub fn calibration_timeout(mut self, timeout: Duration) -> Self {
        self.config.calibration_timeout_ms = millis(timeout);
        self
    }

    /// 模式切换后的稳定等待，`Duration::ZERO` 表示不等待
    pub fn switch_settle(mut self, settle: Duration) -> Self {
        self.config.switch_settle_ms = millis(settle);
        self
    }

    /// 构造时等待首条遥测的超时
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.config.readiness_timeout_ms = millis(timeout);
        self
    }

    pub fn readiness_poll(mut self, poll: Duration) -> Self {
        self.config.readiness_poll_ms = millis(poll);
        self
    }

    /// 插值运动的发布频率（Hz）
    pub fn tick_rate(mut self, hz: f64) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    pub fn gripper_goal_timeout(mut self, timeout: Duration) -> Self {
        self.config.gripper_goal_timeout_ms = millis(timeout);
        self
    }

    /// 建立会话（阻塞到就绪）
    ///
    /// 配置非法时返回 `SessionError::InvalidParameter`，不会触网。
    pub fn build(self, channel: Arc<dyn Channel>) -> Result<ArmSession> {
        ArmSession::connect(channel, self.config)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let builder = ArmSessionBuilder::new()
            .side(Side::Right)
            .rpc_timeout(Duration::from_millis(250))
            .switch_settle(Duration::ZERO)
            .tick_rate(120.0);

        assert_eq!(builder.config.side, Side::Right);
        assert_eq!(builder.config.rpc_timeout_ms, 250);
        assert_eq!(builder.config.switch_settle_ms, 0);
        assert_eq!(builder.config.tick_rate_hz, 120.0);
        assert_eq!(
            builder.config.readiness_timeout_ms,
            SessionConfig::default().readiness_timeout_ms
        );
    }

    #[test]
    fn test_config_then_chain() {
        let base = SessionConfig::for_side(Side::Right);
        let builder = ArmSessionBuilder::new()
            .config(base)
            .gripper_goal_timeout(Duration::from_secs(3));
        assert_eq!(builder.config.side, Side::Right);
        assert_eq!(builder.config.gripper_goal_timeout_ms, 3_000);
    }

    #[test]
    fn test_invalid_config_fails_before_touching_channel() {
        let mock = blue_channel::MockChannel::new();
        let err = ArmSessionBuilder::new()
            .tick_rate(0.0)
            .build(Arc::new(mock.clone()))
            .err()
            .unwrap();
        assert!(err.is_config_error());
        assert!(mock.subscriptions().is_empty());
    }
}
