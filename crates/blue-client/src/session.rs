//! ArmSession - 会话编排
//!
//! 组合遥测镜像、RPC 桥、模式仲裁器与动作跟踪器，对外提供同步、有序的命令与查询接口。
//!
//! # 生命周期
//!
//! 启动（[`ArmSession::connect`]）：
//! 1. 订阅关节状态，注册遥测镜像
//! 2. 请求一次"世界坐标系 -> 末端"的变换流，并订阅返回的话题
//! 3. 逐个加载全部控制器（各自超时，互不影响，失败最后汇总）
//! 4. 停止全部控制器：模式 SAFE，夹爪关闭
//! 5. 阻塞等待就绪（至少一次关节状态 + 一次位姿）
//!
//! 关闭（[`ArmSession::shutdown`]，幂等）：停止全部控制器、逐个卸载、关闭通道。
//! 会话被 Drop 时（包括启动失败的提前返回）自动执行关闭流程。
//!
//! # 示例
//!
//! ```rust,no_run
//! use blue_client::{ArmSession, SessionConfig};
//! use blue_protocol::Side;
//! # use std::sync::Arc;
//! # fn example(channel: Arc<dyn blue_channel::Channel>) -> blue_client::Result<()> {
//! let session = ArmSession::connect(channel, SessionConfig::for_side(Side::Right))?;
//!
//! session.set_joint_positions(&[0.0; 7])?;
//! session.command_gripper(1.5, 20.0, true)?;
//! println!("pose: {:?}", session.cartesian_pose());
//!
//! session.shutdown()?;
//! # Ok(())
//! # }
//! ```

use crate::arbiter::ModeArbiter;
use crate::builder::ArmSessionBuilder;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::mode::{self, ControlMode};
use crate::observer::Observer;
use blue_channel::{Channel, Publisher};
use blue_driver::{
    ActionTracker, BridgeMetrics, CartesianPose, DriverError, GripperState, MetricsSnapshot,
    RpcBridge, TelemetryMirror, TelemetrySnapshot,
};
use blue_protocol::{
    ArmNames, ControllerManagerOp, ControllerRequest, ControllerResponse, Float64MultiArray,
    GripperCommandGoal, GripperCommandStatus, InverseKinematicsRequest, InverseKinematicsResponse,
    JOINT_COUNT, JOINT_STATES_TOPIC, REPUBLISH_TFS_SERVICE, RepublishTfsRequest,
    RepublishTfsResponse, Side, TriggerResponse, controllers, decode, encode, schema,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 三个关节控制器的命令话题
struct CommandTopics {
    position: Arc<dyn Publisher>,
    soft_position: Arc<dyn Publisher>,
    torque: Arc<dyn Publisher>,
}

/// 单臂会话
pub struct ArmSession {
    names: ArmNames,
    config: SessionConfig,
    channel: Arc<dyn Channel>,
    mirror: Arc<TelemetryMirror>,
    observer: Observer,
    arbiter: ModeArbiter,
    load: RpcBridge,
    unload: RpcBridge,
    calibration: RpcBridge,
    ik: RpcBridge,
    gripper: ActionTracker<GripperCommandStatus>,
    commands: CommandTopics,
    metrics: Arc<BridgeMetrics>,
    /// 关节驱动串行化：模式切换与整段发布在同一把锁内
    drive: Mutex<()>,
    /// 每次停止控制或关闭时递增，进行中的插值运动据此退出
    move_epoch: AtomicU64,
    /// 夹爪操作串行化（启用/禁用、下发目标、标定）
    gripper_lock: Mutex<()>,
    shut_down: AtomicBool,
}

impl ArmSession {
    pub fn builder() -> ArmSessionBuilder {
        ArmSessionBuilder::new()
    }

    /// 在给定通道上建立会话，阻塞到就绪
    ///
    /// # 错误
    /// - `SessionError::Startup`: 变换流请求、控制器加载或停止失败（全部尝试后汇总）
    /// - `SessionError::NotReady`: 超时仍未收到首条遥测
    /// - `SessionError::ChannelClosed`: 通道已关闭
    /// - 配置错误：`SessionError::InvalidParameter`
    ///
    /// 配置非法时直接返回，不触碰通道；其余任何失败都会关闭通道
    /// （会话已构造时还会停止并卸载控制器）。
    pub fn connect(channel: Arc<dyn Channel>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        info!("starting {} arm session", config.side);

        let session = match Self::wire(channel.clone(), config) {
            Ok(session) => session,
            Err(e) => {
                warn!("failed to wire session endpoints: {}", e);
                channel.close();
                return Err(e);
            },
        };
        session.start()?;
        Ok(session)
    }

    /// 订阅遥测并创建全部端点，不发出任何请求
    fn wire(channel: Arc<dyn Channel>, config: SessionConfig) -> Result<Self> {
        let names = ArmNames::new(config.side);
        let metrics = Arc::new(BridgeMetrics::new());
        let mirror = Arc::new(TelemetryMirror::new(&names));

        let sink = mirror.clone();
        channel.subscribe(
            JOINT_STATES_TOPIC,
            schema::JOINT_STATE,
            Box::new(move |message| {
                sink.on_joint_state(message);
            }),
        )?;

        let controller_manager = |op: ControllerManagerOp| {
            RpcBridge::connect(
                channel.as_ref(),
                &names.controller_manager_service(op),
                op.schema(),
                metrics.clone(),
            )
        };
        let switch = controller_manager(ControllerManagerOp::Switch)?;
        let load = controller_manager(ControllerManagerOp::Load)?;
        let unload = controller_manager(ControllerManagerOp::Unload)?;
        let calibration = RpcBridge::connect(
            channel.as_ref(),
            &names.gripper_calibration_service(),
            schema::TRIGGER,
            metrics.clone(),
        )?;
        let ik = RpcBridge::connect(
            channel.as_ref(),
            &names.inverse_kinematics_service(),
            schema::INVERSE_KINEMATICS,
            metrics.clone(),
        )?;
        let gripper = ActionTracker::connect(
            channel.as_ref(),
            &names.gripper_action(),
            schema::GRIPPER_COMMAND_ACTION,
        )?;

        let command_topic = |controller: &str| {
            channel.publisher(&names.command_topic(controller), schema::FLOAT64_MULTI_ARRAY)
        };
        let commands = CommandTopics {
            position: command_topic(controllers::JOINT_POSITION)?,
            soft_position: command_topic(controllers::JOINT_SOFT_POSITION)?,
            torque: command_topic(controllers::JOINT_TORQUE)?,
        };

        let arbiter = ModeArbiter::new(switch, config.rpc_timeout(), config.switch_settle());
        let observer = Observer::new(mirror.clone());

        Ok(Self {
            names,
            config,
            channel,
            mirror,
            observer,
            arbiter,
            load,
            unload,
            calibration,
            ik,
            gripper,
            commands,
            metrics,
            drive: Mutex::new(()),
            move_epoch: AtomicU64::new(0),
            gripper_lock: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        })
    }

    fn start(&self) -> Result<()> {
        let mut failures = Vec::new();

        if let Err(e) = self.request_transform_stream() {
            warn!("transform stream request failed: {}", e);
            failures.push(format!("transform stream: {}", e));
        }

        for controller in mode::all_controllers() {
            let timeout = self.config.controller_load_timeout();
            match self.controller_request(&self.load, "load controller", &controller, timeout) {
                Ok(()) => debug!("loaded {}", controller),
                Err(e) => {
                    warn!("failed to load {}: {}", controller, e);
                    failures.push(format!("load {}: {}", controller, e));
                },
            }
        }

        if let Err(e) = self.arbiter.stop_all() {
            warn!("failed to stop controllers: {}", e);
            failures.push(format!("stop controllers: {}", e));
        }

        if !failures.is_empty() {
            return Err(SessionError::Startup { failures });
        }

        self.wait_until_ready(self.config.readiness_timeout())?;
        info!("{} arm session ready", self.names.side());
        Ok(())
    }

    /// 请求末端变换流并订阅返回的话题
    fn request_transform_stream(&self) -> Result<()> {
        const OPERATION: &str = "republish transforms";

        let bridge = RpcBridge::connect(
            self.channel.as_ref(),
            REPUBLISH_TFS_SERVICE,
            schema::REPUBLISH_TFS,
            self.metrics.clone(),
        )?;
        let response: RepublishTfsResponse = bridge
            .call_typed(&RepublishTfsRequest::end_effector(&self.names), self.config.rpc_timeout())
            .map_err(|e| SessionError::driver(OPERATION, e))?;
        if response.topic_name.is_empty() {
            return Err(mode::rejected(OPERATION, "no topic name returned"));
        }

        let sink = self.mirror.clone();
        self.channel.subscribe(
            &response.topic_name,
            schema::TF_ARRAY,
            Box::new(move |message| {
                sink.on_transforms(message);
            }),
        )?;
        debug!("end effector transforms on {}", response.topic_name);
        Ok(())
    }

    fn controller_request(
        &self,
        bridge: &RpcBridge,
        operation: &str,
        controller: &str,
        timeout: Duration,
    ) -> Result<()> {
        let request = ControllerRequest {
            name: controller.to_string(),
        };
        let response: ControllerResponse = bridge
            .call_typed(&request, timeout)
            .map_err(|e| SessionError::driver(operation, e))?;
        if !response.ok {
            return Err(mode::rejected(operation, format!("{} not accepted", controller)));
        }
        Ok(())
    }

    // ==================== 就绪 ====================

    /// 会话已关闭或通道已断开时返回 `ChannelClosed`
    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) || self.channel.is_closed() {
            return Err(SessionError::ChannelClosed);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.mirror.is_ready() {
            return Err(SessionError::NotReady);
        }
        Ok(())
    }

    /// 是否已就绪（至少收到一次关节状态和一次位姿）
    pub fn is_ready(&self) -> bool {
        self.mirror.is_ready()
    }

    /// 有界轮询等待就绪
    pub fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        self.mirror
            .wait_until_ready(timeout, self.config.readiness_poll())
            .map_err(|_| SessionError::NotReady)
    }

    // ==================== 关节命令 ====================

    /// 位置控制：立即发布一次目标
    ///
    /// # 参数
    /// - `positions`: 7 个关节角（弧度），从近端到远端
    pub fn set_joint_positions(&self, positions: &[f64]) -> Result<()> {
        self.move_joint_positions(positions, Duration::ZERO, false)
    }

    /// 位置控制，可选插值
    ///
    /// - `duration > 0`：从当前镜像位置出发，按配置的节拍频率发布线性插值路点，
    ///   最后再精确发布一次目标。每个路点发后即忘，没有应答。调用线程在节拍之间休眠。
    /// - `soft = true`：使用柔顺位置控制器
    ///
    /// 关节命令之间互斥，并发调用依次执行。运动过程中若调用了 [`disable_control`]、
    /// 会话被关闭或模式被切走，立即停止发布并返回 `SessionError::Interrupted`。
    ///
    /// [`disable_control`]: ArmSession::disable_control
    pub fn move_joint_positions(&self, positions: &[f64], duration: Duration, soft: bool) -> Result<()> {
        self.ensure_ready()?;
        let target = joint_vector("positions", positions)?;

        let (mode, publisher) = if soft {
            (ControlMode::SoftPosition, &self.commands.soft_position)
        } else {
            (ControlMode::Position, &self.commands.position)
        };
        let _drive = self.drive.lock();
        let epoch = self.move_epoch.load(Ordering::Acquire);
        self.arbiter.request(mode)?;

        if !duration.is_zero() {
            let start = self.mirror.snapshot().joints.position;
            let tick = self.config.tick_period();
            let began = Instant::now();
            let mut waypoints = 0u64;
            loop {
                let elapsed = began.elapsed();
                if elapsed >= duration {
                    break;
                }
                self.ensure_still_driving(epoch, mode)?;
                let alpha = elapsed.as_secs_f64() / duration.as_secs_f64();
                publish_joints(publisher.as_ref(), interpolate(&start, &target, alpha))?;
                waypoints += 1;
                spin_sleep::sleep(tick);
            }
            trace!("interpolated move published {} waypoints", waypoints);
        }

        self.ensure_still_driving(epoch, mode)?;
        publish_joints(publisher.as_ref(), target)
    }

    /// 运动开始后没有被停止、关闭或切走模式
    fn ensure_still_driving(&self, epoch: u64, mode: ControlMode) -> Result<()> {
        let preempted = self.move_epoch.load(Ordering::Acquire) != epoch
            || self.shut_down.load(Ordering::Acquire)
            || self.arbiter.current() != mode;
        if preempted {
            debug!("{:?} move interrupted", mode);
            return Err(SessionError::Interrupted {
                operation: "joint move".to_string(),
            });
        }
        Ok(())
    }

    /// 力矩控制
    ///
    /// # 参数
    /// - `torques`: 7 个关节力矩（N·m）
    pub fn set_joint_torques(&self, torques: &[f64]) -> Result<()> {
        self.ensure_ready()?;
        let torques = joint_vector("torques", torques)?;
        let _drive = self.drive.lock();
        self.arbiter.request(ControlMode::Torque)?;
        publish_joints(self.commands.torque.as_ref(), torques)
    }

    /// 停止关节驱动（进入 SAFE / 重力补偿）
    ///
    /// 已是 SAFE 时直接返回，不产生网络请求，可以从多个清理路径重复调用。
    /// 进行中的插值运动会在下一个节拍退出，返回时不会再有关节命令发出。
    pub fn disable_control(&self) -> Result<()> {
        self.move_epoch.fetch_add(1, Ordering::AcqRel);
        let _drive = self.drive.lock();
        self.arbiter.request(ControlMode::Safe)
    }

    // ==================== 夹爪 ====================

    pub fn enable_gripper(&self) -> Result<()> {
        self.ensure_ready()?;
        let _gripper = self.gripper_lock.lock();
        self.arbiter.set_gripper(true)
    }

    /// 禁用夹爪控制器（夹爪变为柔顺）
    pub fn disable_gripper(&self) -> Result<()> {
        self.ensure_open()?;
        let _gripper = self.gripper_lock.lock();
        self.arbiter.set_gripper(false)
    }

    /// 向夹爪发送目标
    ///
    /// 夹爪未启用时先启用。`wait = true` 时阻塞到堵转或到达目标（或配置的超时），
    /// 返回终态；否则立即返回 `None`。标定进行中时等标定结束后再下发。
    ///
    /// # 参数
    /// - `position`: 手指间距（cm）
    /// - `effort`: 最大出力（N），超过即判定堵转
    pub fn command_gripper(
        &self,
        position: f64,
        effort: f64,
        wait: bool,
    ) -> Result<Option<GripperCommandStatus>> {
        const OPERATION: &str = "gripper command";

        self.ensure_ready()?;
        if !position.is_finite() {
            return Err(SessionError::invalid_parameter("position", "must be finite"));
        }
        if !(effort.is_finite() && effort >= 0.0) {
            return Err(SessionError::invalid_parameter("effort", "must be a non-negative number"));
        }

        let handle = {
            let _gripper = self.gripper_lock.lock();
            self.arbiter.set_gripper(true)?;
            self.gripper
                .submit(&GripperCommandGoal::new(position, effort))
                .map_err(|e| SessionError::driver(OPERATION, e))?
        };
        if !wait {
            return Ok(None);
        }

        let timeout = self.config.gripper_goal_timeout();
        match self.gripper.await_terminal(handle, timeout) {
            Ok(status) => Ok(Some(status)),
            Err(DriverError::Timeout) => Err(SessionError::RpcTimeout {
                operation: OPERATION.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(e) => Err(SessionError::driver(OPERATION, e)),
        }
    }

    /// 取消当前夹爪目标（发后即忘）
    ///
    /// 返回是否有目标被取消。夹爪是否真的停下需要通过遥测确认。
    pub fn cancel_gripper_command(&self) -> Result<bool> {
        self.ensure_open()?;
        self.gripper
            .cancel_current()
            .map_err(|e| SessionError::driver("cancel gripper command", e))
    }

    /// 标定夹爪
    ///
    /// 标定期间夹爪控制器必须停止：若原本启用，先禁用，结束后重新启用。
    /// 整个过程持有夹爪锁，其他夹爪操作等待标定结束。
    pub fn calibrate_gripper(&self) -> Result<()> {
        const OPERATION: &str = "calibrate gripper";

        self.ensure_ready()?;
        let _gripper = self.gripper_lock.lock();
        let was_enabled = self.arbiter.gripper_enabled();
        if was_enabled {
            self.arbiter.set_gripper(false)?;
        }

        info!("calibrating gripper");
        let outcome = self
            .calibration
            .call(serde_json::json!({}), self.config.calibration_timeout())
            .map_err(|e| SessionError::rpc(OPERATION, e))
            .and_then(|values| {
                decode::<TriggerResponse>(values).map_err(|e| SessionError::driver(OPERATION, e.into()))
            })
            .and_then(|response| {
                if response.success {
                    Ok(())
                } else {
                    Err(mode::rejected(OPERATION, response.message))
                }
            });

        if was_enabled && let Err(e) = self.arbiter.set_gripper(true) {
            warn!("failed to re-enable gripper after calibration: {}", e);
            outcome?;
            return Err(e);
        }
        outcome
    }

    // ==================== 逆运动学 ====================

    /// 求解逆运动学
    ///
    /// # 参数
    /// - `position`: 末端位置（米，世界坐标系）
    /// - `orientation`: 末端姿态四元数 [x, y, z, w]
    /// - `seed`: 初始关节角；为空时使用当前镜像位置
    ///
    /// # 返回
    /// 7 个关节角；任何失败（未就绪、超时、无解）都返回空 `Vec`，调用方需检查是否为空。
    pub fn inverse_kinematics(&self, position: [f64; 3], orientation: [f64; 4], seed: &[f64]) -> Vec<f64> {
        match self.solve_inverse_kinematics(position, orientation, seed) {
            Ok(solution) => solution,
            Err(e) => {
                warn!("inverse kinematics failed: {}", e);
                Vec::new()
            },
        }
    }

    fn solve_inverse_kinematics(
        &self,
        position: [f64; 3],
        orientation: [f64; 4],
        seed: &[f64],
    ) -> Result<Vec<f64>> {
        self.ensure_ready()?;
        let seed = if seed.is_empty() {
            self.mirror.snapshot().joints.position.to_vec()
        } else {
            joint_vector("seed", seed)?.to_vec()
        };
        let request = InverseKinematicsRequest::new(self.names.world_frame(), position, orientation, seed);
        let response: InverseKinematicsResponse = self
            .ik
            .call_typed(&request, self.config.rpc_timeout())
            .map_err(|e| SessionError::driver("inverse kinematics", e))?;
        Ok(response.ik_joint_positions)
    }

    // ==================== 查询 ====================

    pub fn side(&self) -> Side {
        self.names.side()
    }

    pub fn names(&self) -> &ArmNames {
        &self.names
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 只读观察器（可跨线程克隆）
    pub fn observer(&self) -> Observer {
        self.observer.clone()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.observer.snapshot()
    }

    /// 关节位置（弧度）
    pub fn joint_positions(&self) -> [f64; JOINT_COUNT] {
        self.observer.joint_positions()
    }

    /// 关节速度（rad/s）
    pub fn joint_velocities(&self) -> [f64; JOINT_COUNT] {
        self.observer.joint_velocities()
    }

    /// 关节力矩（N·m）
    pub fn joint_torques(&self) -> [f64; JOINT_COUNT] {
        self.observer.joint_torques()
    }

    pub fn cartesian_pose(&self) -> CartesianPose {
        self.observer.cartesian_pose()
    }

    pub fn gripper_state(&self) -> GripperState {
        self.observer.gripper_state()
    }

    /// 夹爪间距（cm）
    pub fn gripper_position(&self) -> f64 {
        self.observer.gripper_position()
    }

    /// 夹爪出力（N）
    pub fn gripper_effort(&self) -> f64 {
        self.observer.gripper_effort()
    }

    pub fn gripper_enabled(&self) -> bool {
        self.arbiter.gripper_enabled()
    }

    pub fn control_mode(&self) -> ControlMode {
        self.arbiter.current()
    }

    /// 控制平面调用计数
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    // ==================== 关闭 ====================

    /// 关闭会话（幂等）
    ///
    /// 每一步独立尝试，一步失败不影响其余步骤；任何失败都会汇总在 `SessionError::Shutdown` 中。
    /// 之后的所有命令返回 `ChannelClosed`。
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("shutting down {} arm session", self.names.side());

        self.move_epoch.fetch_add(1, Ordering::AcqRel);
        let _drive = self.drive.lock();
        let mut failures = Vec::new();
        if let Err(e) = self.arbiter.stop_all() {
            error!("failed to stop controllers: {}", e);
            failures.push(format!("stop controllers: {}", e));
        }

        for controller in mode::all_controllers() {
            let timeout = self.config.rpc_timeout();
            if let Err(e) = self.controller_request(&self.unload, "unload controller", &controller, timeout) {
                error!("failed to unload {}: {}", controller, e);
                failures.push(format!("unload {}: {}", controller, e));
            }
        }

        self.channel.close();

        if failures.is_empty() {
            debug!("arm session closed");
            Ok(())
        } else {
            Err(SessionError::Shutdown { failures })
        }
    }
}

impl Drop for ArmSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("arm session shutdown on drop incomplete: {}", e);
        }
    }
}

/// 校验并转换 7 维关节向量
fn joint_vector(param: &str, values: &[f64]) -> Result<[f64; JOINT_COUNT]> {
    let array: [f64; JOINT_COUNT] = values.try_into().map_err(|_| {
        SessionError::invalid_parameter(
            param,
            format!("expected {} values, got {}", JOINT_COUNT, values.len()),
        )
    })?;
    if let Some(i) = array.iter().position(|v| !v.is_finite()) {
        return Err(SessionError::invalid_parameter(
            param,
            format!("value at index {} is not finite", i),
        ));
    }
    Ok(array)
}

fn interpolate(
    start: &[f64; JOINT_COUNT],
    target: &[f64; JOINT_COUNT],
    alpha: f64,
) -> [f64; JOINT_COUNT] {
    std::array::from_fn(|i| start[i] + (target[i] - start[i]) * alpha)
}

fn publish_joints(publisher: &dyn Publisher, values: [f64; JOINT_COUNT]) -> Result<()> {
    let payload = encode(&Float64MultiArray::from(values))
        .map_err(|e| SessionError::driver("publish joint command", e.into()))?;
    publisher.publish(payload)?;
    Ok(())
}
