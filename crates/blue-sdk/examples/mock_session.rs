//! 模拟远端上的完整会话演示
//!
//! 用 MockChannel 扮演远端主机：锁存一条关节状态和一条末端变换，夹爪目标立即到达。
//! 演示构造、模式切换、插值运动、夹爪命令、逆运动学与关闭。
//!
//! ```bash
//! cargo run -p blue-sdk --example mock_session --features mock -- --side right
//! ```

use blue_sdk::channel::{GoalEvent, MockChannel, ServiceReply};
use blue_sdk::prelude::*;
use blue_sdk::protocol::{ArmNames, JOINT_STATES_TOPIC};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "mock_session")]
#[command(about = "在模拟远端上运行一次完整的 Blue 会话")]
struct Args {
    /// 手臂侧别（left / right）
    #[arg(long, default_value = "left")]
    side: String,

    /// 插值发布频率（Hz）
    #[arg(long, default_value = "60")]
    tick_rate: f64,

    /// 插值运动时长（毫秒）
    #[arg(long, default_value = "500")]
    move_ms: u64,
}

fn simulated_remote(names: &ArmNames) -> MockChannel {
    let mock = MockChannel::new();
    let mut joints: Vec<String> = names.joint_names().to_vec();
    joints.push(names.gripper_joint());
    mock.latch(
        JOINT_STATES_TOPIC,
        json!({"name": joints, "position": vec![0.0; 8], "effort": vec![0.0; 8]}),
    );
    mock.on_service("/republish_tfs", |_| ServiceReply::ok(json!({"topic_name": "/tf_repub"})));
    mock.latch(
        "/tf_repub",
        json!({"transforms": [{
            "child_frame_id": names.end_effector_frame(),
            "transform": {"translation": {"x": 0.3, "y": 0.0, "z": 0.4}}
        }]}),
    );
    mock.on_goal(&names.gripper_action(), |goal| {
        let position = goal["command"]["position"].clone();
        vec![GoalEvent::Result(json!({"position": position, "reached_goal": true}))]
    });
    mock.on_service(&names.inverse_kinematics_service(), |req| {
        ServiceReply::ok(json!({"ik_joint_positions": req["seed_joint_positions"].clone()}))
    });
    mock
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    blue_sdk::init_logging()?;

    let side: Side = args.side.parse()?;
    let names = ArmNames::new(side);
    let mock = simulated_remote(&names);

    println!("Blue SDK - 模拟会话演示 ({} arm)", side);

    let session = ArmSession::builder()
        .side(side)
        .tick_rate(args.tick_rate)
        .build(Arc::new(mock.clone()))?;
    println!("ready, joints = {:?}", session.joint_positions());
    println!("pose = {:?}", session.cartesian_pose());

    session.move_joint_positions(&[0.2; JOINT_COUNT], Duration::from_millis(args.move_ms), false)?;
    println!(
        "mode = {}, {} position commands published",
        session.control_mode(),
        mock.publish_count(&names.command_topic(blue_sdk::protocol::controllers::JOINT_POSITION))
    );

    if let Some(status) = session.command_gripper(1.5, 20.0, true)? {
        println!("gripper settled: {:?}", status);
    }

    let solution = session.inverse_kinematics([0.3, 0.0, 0.4], [0.0, 0.0, 0.0, 1.0], &[]);
    println!("ik solution = {:?}", solution);

    session.disable_control()?;
    session.shutdown()?;
    println!("metrics = {:?}", session.metrics());
    Ok(())
}
