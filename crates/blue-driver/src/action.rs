//! 动作目标跟踪
//!
//! 每个执行器最多跟踪一个目标。提交新目标会静默替换旧目标的标识，但**不会**在远端取消旧目标；
//! 取消必须显式调用。
//!
//! 终态判定：
//! - 反馈回调：状态满足 [`GoalStatus::is_terminal`] 时解析
//! - 结果回调：总是解析（结果是远端的最终答复，即使既未到达也未堵转）
//!
//! 两者共享同一个解析端，先到者生效，等待方只会被释放一次。

use crate::completion::{self, Completion, CompletionError};
use crate::error::DriverError;
use blue_channel::{ActionClient, Channel, ChannelError, GoalId};
use blue_protocol::{GripperCommandStatus, RosMessage, decode, encode};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 带终态谓词的动作状态消息
pub trait GoalStatus: RosMessage + Send + 'static {
    fn is_terminal(&self) -> bool;
}

impl GoalStatus for GripperCommandStatus {
    fn is_terminal(&self) -> bool {
        GripperCommandStatus::is_terminal(self)
    }
}

/// 已提交目标的句柄
pub struct GoalHandle<S> {
    goal_id: GoalId,
    completion: Completion<S>,
}

impl<S> GoalHandle<S> {
    pub fn goal_id(&self) -> &GoalId {
        &self.goal_id
    }

    /// 是否已经收到终态（不阻塞）
    pub fn is_settled(&self) -> bool {
        self.completion.is_resolved()
    }
}

/// 单执行器的动作跟踪器
pub struct ActionTracker<S> {
    action: String,
    client: Arc<dyn ActionClient>,
    current: Mutex<Option<GoalId>>,
    _status: PhantomData<fn() -> S>,
}

impl<S: GoalStatus> ActionTracker<S> {
    pub fn new(action: impl Into<String>, client: Arc<dyn ActionClient>) -> Self {
        Self {
            action: action.into(),
            client,
            current: Mutex::new(None),
            _status: PhantomData,
        }
    }

    /// 在通道上创建动作客户端并包装成跟踪器
    pub fn connect(channel: &dyn Channel, action: &str, schema: &str) -> Result<Self, ChannelError> {
        let client = channel.action_client(action, schema)?;
        Ok(Self::new(action, client))
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// 当前跟踪的目标
    pub fn current_goal(&self) -> Option<GoalId> {
        self.current.lock().clone()
    }

    /// 发送目标（不阻塞）
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 目标编码失败
    /// - `DriverError::Channel`: 通道拒绝发送（如已关闭）
    pub fn submit<G: RosMessage>(&self, goal: &G) -> Result<GoalHandle<S>, DriverError> {
        let payload = encode(goal)?;

        let (resolver, completion) = completion::pair::<S>();
        let resolver = Arc::new(resolver);
        let feedback_resolver = resolver.clone();
        let action = self.action.clone();

        let on_feedback = Box::new(move |message| match decode::<S>(message) {
            Ok(status) if status.is_terminal() => {
                feedback_resolver.resolve(status);
            },
            Ok(_) => {},
            Err(e) => trace!("unreadable feedback on {}: {}", action, e),
        });

        let action = self.action.clone();
        let on_result = Box::new(move |message| match decode::<S>(message) {
            Ok(status) => {
                resolver.resolve(status);
            },
            Err(e) => warn!("unreadable result on {}: {}", action, e),
        });

        let goal_id = self.client.send_goal(payload, on_feedback, on_result)?;

        let previous = self.current.lock().replace(goal_id.clone());
        match previous {
            Some(prev) => debug!("goal {} supersedes {} on {}", goal_id, prev, self.action),
            None => debug!("goal {} submitted on {}", goal_id, self.action),
        }

        Ok(GoalHandle {
            goal_id,
            completion,
        })
    }

    /// 阻塞等待目标进入终态
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时
    /// - `DriverError::Channel(ChannelError::Closed)`: 通道关闭，目标回调被丢弃
    pub fn await_terminal(&self, handle: GoalHandle<S>, timeout: Duration) -> Result<S, DriverError> {
        let GoalHandle {
            goal_id,
            completion,
        } = handle;

        match completion.wait_timeout(timeout) {
            Ok(status) => {
                let mut current = self.current.lock();
                if current.as_ref() == Some(&goal_id) {
                    *current = None;
                }
                trace!("goal {} settled", goal_id);
                Ok(status)
            },
            Err(CompletionError::Timeout) => {
                warn!("goal {} on {} not settled within {:?}", goal_id, self.action, timeout);
                Err(DriverError::Timeout)
            },
            Err(CompletionError::Dropped) => Err(DriverError::Channel(ChannelError::Closed)),
        }
    }

    /// 取消指定目标（发后即忘，不等待远端确认）
    pub fn cancel(&self, goal_id: &GoalId) -> Result<(), DriverError> {
        info!("cancelling goal {} on {}", goal_id, self.action);
        self.client.cancel_goal(goal_id)?;
        let mut current = self.current.lock();
        if current.as_ref() == Some(goal_id) {
            *current = None;
        }
        Ok(())
    }

    /// 取消当前跟踪的目标
    ///
    /// 返回是否有目标被取消。
    pub fn cancel_current(&self) -> Result<bool, DriverError> {
        let Some(goal_id) = self.current_goal() else {
            return Ok(false);
        };
        self.cancel(&goal_id)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_channel::{GoalEvent, MockChannel};
    use blue_protocol::GripperCommandGoal;
    use serde_json::json;

    const ACTION: &str = "/left_arm/blue_controllers/gripper_controller/gripper_cmd";

    fn tracker(mock: &MockChannel) -> ActionTracker<GripperCommandStatus> {
        ActionTracker::connect(mock, ACTION, "control_msgs/GripperCommandAction").unwrap()
    }

    #[test]
    fn test_terminal_feedback_releases_wait() {
        let mock = MockChannel::new();
        mock.on_goal(ACTION, |_| {
            vec![
                GoalEvent::Feedback(json!({"position": 1.0, "stalled": false, "reached_goal": false})),
                GoalEvent::Feedback(json!({"position": 0.2, "stalled": true, "reached_goal": false})),
            ]
        });
        let tracker = tracker(&mock);

        let handle = tracker.submit(&GripperCommandGoal::new(0.0, 10.0)).unwrap();
        let status = tracker.await_terminal(handle, Duration::from_secs(1)).unwrap();
        assert!(status.stalled);
        assert_eq!(status.position, 0.2);
        assert_eq!(tracker.current_goal(), None);
    }

    #[test]
    fn test_both_terminal_signals_release_once() {
        let mock = MockChannel::new();
        mock.on_goal(ACTION, |_| {
            vec![
                GoalEvent::Feedback(json!({"stalled": true, "reached_goal": false})),
                GoalEvent::Result(json!({"stalled": false, "reached_goal": true})),
            ]
        });
        let tracker = tracker(&mock);

        let handle = tracker.submit(&GripperCommandGoal::new(0.0, 10.0)).unwrap();
        let status = tracker.await_terminal(handle, Duration::from_secs(1)).unwrap();
        // 先到者生效
        assert!(status.stalled);
        assert!(!status.reached_goal);
    }

    #[test]
    fn test_non_terminal_feedback_times_out() {
        let mock = MockChannel::new();
        mock.on_goal(ACTION, |_| vec![GoalEvent::Feedback(json!({"position": 1.0}))]);
        let tracker = tracker(&mock);

        let handle = tracker.submit(&GripperCommandGoal::new(0.0, 10.0)).unwrap();
        let err = tracker.await_terminal(handle, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, DriverError::Timeout));
        // 超时不清除跟踪，仍可取消
        assert!(tracker.current_goal().is_some());
    }

    #[test]
    fn test_new_goal_supersedes_without_cancel() {
        let mock = MockChannel::new();
        let tracker = tracker(&mock);

        let first = tracker.submit(&GripperCommandGoal::new(1.0, 10.0)).unwrap();
        let second = tracker.submit(&GripperCommandGoal::new(2.0, 10.0)).unwrap();
        assert_ne!(first.goal_id(), second.goal_id());
        assert_eq!(tracker.current_goal().as_ref(), Some(second.goal_id()));
        assert!(mock.cancelled_goals().is_empty());

        // 旧目标的结果仍能送达它自己的句柄
        assert!(mock.goal_result(first.goal_id(), json!({"reached_goal": true})));
        let status = tracker.await_terminal(first, Duration::from_secs(1)).unwrap();
        assert!(status.reached_goal);
        assert_eq!(tracker.current_goal().as_ref(), Some(second.goal_id()));
    }

    #[test]
    fn test_cancel_current() {
        let mock = MockChannel::new();
        let tracker = tracker(&mock);
        assert!(!tracker.cancel_current().unwrap());

        let handle = tracker.submit(&GripperCommandGoal::new(1.0, 10.0)).unwrap();
        assert!(tracker.cancel_current().unwrap());
        assert_eq!(mock.cancelled_goals(), vec![handle.goal_id().clone()]);
        assert_eq!(tracker.current_goal(), None);
        assert!(!handle.is_settled());
    }

    #[test]
    fn test_submit_after_close_fails() {
        let mock = MockChannel::new();
        let tracker = tracker(&mock);
        mock.close();
        let err = tracker.submit(&GripperCommandGoal::new(1.0, 10.0)).err().unwrap();
        assert!(matches!(err, DriverError::Channel(ChannelError::Closed)));
    }
}
