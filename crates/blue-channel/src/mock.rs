//! Mock 通道（内存实现）
//!
//! 用于无远端主机的测试。行为上尽量贴近真实连接：
//! - 拥有独立的 IO 投递线程，所有回调都在该线程上按顺序执行
//! - 服务应答可以立即返回、延迟返回、挂起（由测试手动释放）或直接丢弃
//! - 动作目标可以按脚本推送反馈/结果，也可以由测试手动推送
//! - 记录所有发布、请求、目标与取消，供断言使用
//!
//! # 示例
//!
//! ```rust
//! use blue_channel::{Channel, MockChannel, ServiceReply};
//! use serde_json::json;
//!
//! let mock = MockChannel::new();
//! mock.on_service("/add", |req| {
//!     let sum = req["a"].as_i64().unwrap_or(0) + req["b"].as_i64().unwrap_or(0);
//!     ServiceReply::ok(json!({ "sum": sum }))
//! });
//!
//! let client = mock.service("/add", "demo/Add").unwrap();
//! let (tx, rx) = std::sync::mpsc::channel();
//! client
//!     .request(json!({"a": 1, "b": 2}), Box::new(move |ok, values| {
//!         let _ = tx.send((ok, values));
//!     }))
//!     .unwrap();
//! let (ok, values) = rx.recv().unwrap();
//! assert!(ok);
//! assert_eq!(values["sum"], json!(3));
//! ```

use crate::{
    ActionClient, Channel, ChannelError, FeedbackCallback, GoalId, Message, MessageCallback,
    Publisher, ResultCallback, ServiceCallback, ServiceClient,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;
type SharedCallback = Arc<Mutex<MessageCallback>>;
type ServiceResponder = Arc<dyn Fn(&Message) -> ServiceReply + Send + Sync>;
type GoalResponder = Arc<dyn Fn(&Message) -> Vec<GoalEvent> + Send + Sync>;

/// 服务应答脚本
#[derive(Debug, Clone)]
pub enum ServiceReply {
    /// 立即应答
    Respond { success: bool, values: Message },
    /// 延迟应答（由独立计时线程投递，不阻塞 IO 线程）
    Delayed {
        success: bool,
        values: Message,
        delay: Duration,
    },
    /// 挂起，直到测试调用 [`MockChannel::release_held`]
    Hold,
    /// 丢弃回调，永不应答
    Drop,
}

impl ServiceReply {
    pub fn ok(values: Message) -> Self {
        ServiceReply::Respond {
            success: true,
            values,
        }
    }

    pub fn fail(values: Message) -> Self {
        ServiceReply::Respond {
            success: false,
            values,
        }
    }
}

/// 动作目标脚本事件
#[derive(Debug, Clone)]
pub enum GoalEvent {
    Feedback(Message),
    Result(Message),
    Delay(Duration),
}

struct HeldRequest {
    service: String,
    callback: ServiceCallback,
}

struct LiveGoal {
    feedback: Arc<Mutex<FeedbackCallback>>,
    result: Option<ResultCallback>,
}

#[derive(Default)]
struct Records {
    published: HashMap<String, Vec<Message>>,
    requests: HashMap<String, Vec<Message>>,
    goals: HashMap<String, Vec<(GoalId, Message)>>,
    cancelled: Vec<GoalId>,
    subscriptions: Vec<String>,
}

struct MockInner {
    closed: Arc<AtomicBool>,
    jobs: Mutex<Option<Sender<Job>>>,
    io_thread: Mutex<Option<JoinHandle<()>>>,
    subscribers: Mutex<HashMap<String, Vec<SharedCallback>>>,
    latched: Mutex<HashMap<String, Message>>,
    responders: Mutex<HashMap<String, ServiceResponder>>,
    held: Mutex<Vec<HeldRequest>>,
    goal_responders: Mutex<HashMap<String, GoalResponder>>,
    live_goals: Mutex<HashMap<GoalId, LiveGoal>>,
    next_goal: AtomicU64,
    records: Mutex<Records>,
}

/// IO 投递线程：按顺序执行回调；关闭后只丢弃，不执行
fn delivery_loop(rx: Receiver<Job>, closed: Arc<AtomicBool>) {
    while let Ok(job) = rx.recv() {
        if closed.load(Ordering::Acquire) {
            drop(job);
            continue;
        }
        job();
    }
    trace!("mock channel delivery loop exited");
}

impl MockInner {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_io = closed.clone();
        let io_thread = thread::spawn(move || delivery_loop(rx, closed_io));

        Self {
            closed,
            jobs: Mutex::new(Some(tx)),
            io_thread: Mutex::new(Some(io_thread)),
            subscribers: Mutex::new(HashMap::new()),
            latched: Mutex::new(HashMap::new()),
            responders: Mutex::new(HashMap::new()),
            held: Mutex::new(Vec::new()),
            goal_responders: Mutex::new(HashMap::new()),
            live_goals: Mutex::new(HashMap::new()),
            next_goal: AtomicU64::new(0),
            records: Mutex::new(Records::default()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }

    /// 投递到 IO 线程；通道已关闭时任务被直接丢弃
    fn enqueue(&self, job: Job) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.jobs.lock().as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    fn deliver(&self, topic: &str, message: Message) -> usize {
        let subscribers = self.subscribers.lock().get(topic).cloned().unwrap_or_default();
        for callback in &subscribers {
            let callback = callback.clone();
            let message = message.clone();
            self.enqueue(Box::new(move || (callback.lock())(message)));
        }
        subscribers.len()
    }

    fn push_feedback(&self, goal_id: &GoalId, message: Message) -> bool {
        let feedback = self.live_goals.lock().get(goal_id).map(|g| g.feedback.clone());
        match feedback {
            Some(callback) => self.enqueue(Box::new(move || (callback.lock())(message))),
            None => false,
        }
    }

    fn push_result(&self, goal_id: &GoalId, message: Message) -> bool {
        let goal = self.live_goals.lock().remove(goal_id);
        match goal.and_then(|g| g.result) {
            Some(callback) => self.enqueue(Box::new(move || callback(message))),
            None => false,
        }
    }

    fn run_goal_script(&self, goal_id: &GoalId, events: Vec<GoalEvent>) {
        for event in events {
            match event {
                GoalEvent::Feedback(message) => {
                    self.push_feedback(goal_id, message);
                },
                GoalEvent::Result(message) => {
                    self.push_result(goal_id, message);
                },
                GoalEvent::Delay(delay) => thread::sleep(delay),
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("mock channel closing");

        // 先断开发送端，IO 线程处理完（丢弃）剩余任务后退出
        drop(self.jobs.lock().take());

        // 释放所有未投递的回调（在锁外 drop，回调的 Drop 可能有副作用）
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        let held = std::mem::take(&mut *self.held.lock());
        let goals = std::mem::take(&mut *self.live_goals.lock());
        drop(subscribers);
        drop(held);
        drop(goals);

        if let Some(handle) = self.io_thread.lock().take() {
            // 在 IO 线程内部关闭时不能 join 自己
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for MockInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// 内存中的控制平面通道
///
/// `Clone` 共享同一个连接：测试持有一个克隆用于注入消息和断言，另一个交给被测对象。
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<MockInner>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner::new()),
        }
    }

    // ==================== 脚本 ====================

    /// 为服务注册应答脚本（未注册的服务默认立即成功应答 `{}`）
    pub fn on_service<F>(&self, name: &str, responder: F)
    where
        F: Fn(&Message) -> ServiceReply + Send + Sync + 'static,
    {
        self.inner.responders.lock().insert(name.to_string(), Arc::new(responder));
    }

    /// 为动作注册目标脚本（未注册的动作默认不产生任何事件）
    pub fn on_goal<F>(&self, name: &str, responder: F)
    where
        F: Fn(&Message) -> Vec<GoalEvent> + Send + Sync + 'static,
    {
        self.inner.goal_responders.lock().insert(name.to_string(), Arc::new(responder));
    }

    // ==================== 注入 ====================

    /// 向话题的所有订阅者投递一条消息，返回订阅者数量
    pub fn deliver(&self, topic: &str, message: Message) -> usize {
        self.inner.deliver(topic, message)
    }

    /// 锁存消息：投递给现有订阅者，并在之后每次新订阅时立即投递
    pub fn latch(&self, topic: &str, message: Message) {
        self.inner.latched.lock().insert(topic.to_string(), message.clone());
        self.inner.deliver(topic, message);
    }

    /// 释放挂起的服务请求，返回释放数量
    pub fn release_held(&self, service: &str, success: bool, values: Message) -> usize {
        let released: Vec<HeldRequest> = {
            let mut held = self.inner.held.lock();
            let (matching, rest): (Vec<_>, Vec<_>) =
                held.drain(..).partition(|h| h.service == service);
            *held = rest;
            matching
        };
        let count = released.len();
        for request in released {
            let values = values.clone();
            let callback = request.callback;
            self.inner.enqueue(Box::new(move || callback(success, values)));
        }
        count
    }

    /// 推送目标反馈
    pub fn goal_feedback(&self, goal_id: &GoalId, message: Message) -> bool {
        self.inner.push_feedback(goal_id, message)
    }

    /// 推送目标结果（之后该目标不再接收任何事件）
    pub fn goal_result(&self, goal_id: &GoalId, message: Message) -> bool {
        self.inner.push_result(goal_id, message)
    }

    /// 等待此前投递到 IO 线程的所有任务执行完毕
    pub fn flush(&self) {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        if self.inner.enqueue(Box::new(move || {
            let _ = tx.send(());
        })) {
            let _ = rx.recv_timeout(Duration::from_secs(5));
        }
    }

    // ==================== 记录 ====================

    pub fn published(&self, topic: &str) -> Vec<Message> {
        self.inner.records.lock().published.get(topic).cloned().unwrap_or_default()
    }

    pub fn publish_count(&self, topic: &str) -> usize {
        self.inner.records.lock().published.get(topic).map_or(0, Vec::len)
    }

    pub fn requests(&self, service: &str) -> Vec<Message> {
        self.inner.records.lock().requests.get(service).cloned().unwrap_or_default()
    }

    pub fn request_count(&self, service: &str) -> usize {
        self.inner.records.lock().requests.get(service).map_or(0, Vec::len)
    }

    pub fn goals(&self, action: &str) -> Vec<(GoalId, Message)> {
        self.inner.records.lock().goals.get(action).cloned().unwrap_or_default()
    }

    pub fn cancelled_goals(&self) -> Vec<GoalId> {
        self.inner.records.lock().cancelled.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.records.lock().subscriptions.clone()
    }

    pub fn held_count(&self) -> usize {
        self.inner.held.lock().len()
    }
}

struct MockPublisher {
    topic: String,
    inner: Arc<MockInner>,
}

impl Publisher for MockPublisher {
    fn publish(&self, message: Message) -> Result<(), ChannelError> {
        self.inner.ensure_open()?;
        self.inner
            .records
            .lock()
            .published
            .entry(self.topic.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}

struct MockService {
    name: String,
    inner: Arc<MockInner>,
}

impl ServiceClient for MockService {
    fn request(&self, message: Message, callback: ServiceCallback) -> Result<(), ChannelError> {
        self.inner.ensure_open()?;
        self.inner
            .records
            .lock()
            .requests
            .entry(self.name.clone())
            .or_default()
            .push(message.clone());

        let responder = self.inner.responders.lock().get(&self.name).cloned();
        let reply = match responder {
            Some(responder) => responder(&message),
            None => ServiceReply::ok(serde_json::json!({})),
        };

        match reply {
            ServiceReply::Respond { success, values } => {
                self.inner.enqueue(Box::new(move || callback(success, values)));
            },
            ServiceReply::Delayed {
                success,
                values,
                delay,
            } => {
                let inner = self.inner.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    inner.enqueue(Box::new(move || callback(success, values)));
                });
            },
            ServiceReply::Hold => self.inner.held.lock().push(HeldRequest {
                service: self.name.clone(),
                callback,
            }),
            ServiceReply::Drop => drop(callback),
        }
        Ok(())
    }
}

struct MockActionClient {
    name: String,
    inner: Arc<MockInner>,
}

impl ActionClient for MockActionClient {
    fn send_goal(
        &self,
        goal: Message,
        on_feedback: FeedbackCallback,
        on_result: ResultCallback,
    ) -> Result<GoalId, ChannelError> {
        self.inner.ensure_open()?;

        let n = self.inner.next_goal.fetch_add(1, Ordering::Relaxed) + 1;
        let goal_id = GoalId::new(format!("goal_{}", n));

        self.inner
            .records
            .lock()
            .goals
            .entry(self.name.clone())
            .or_default()
            .push((goal_id.clone(), goal.clone()));

        self.inner.live_goals.lock().insert(
            goal_id.clone(),
            LiveGoal {
                feedback: Arc::new(Mutex::new(on_feedback)),
                result: Some(on_result),
            },
        );

        let responder = self.inner.goal_responders.lock().get(&self.name).cloned();
        let events = responder.map(|r| r(&goal)).unwrap_or_default();
        if events.iter().any(|e| matches!(e, GoalEvent::Delay(_))) {
            let inner = self.inner.clone();
            let id = goal_id.clone();
            thread::spawn(move || inner.run_goal_script(&id, events));
        } else {
            self.inner.run_goal_script(&goal_id, events);
        }

        Ok(goal_id)
    }

    fn cancel_goal(&self, goal_id: &GoalId) -> Result<(), ChannelError> {
        self.inner.ensure_open()?;
        self.inner.records.lock().cancelled.push(goal_id.clone());
        Ok(())
    }
}

impl Channel for MockChannel {
    fn subscribe(
        &self,
        topic: &str,
        _schema: &str,
        callback: MessageCallback,
    ) -> Result<(), ChannelError> {
        self.inner.ensure_open()?;
        self.inner.records.lock().subscriptions.push(topic.to_string());

        let callback: SharedCallback = Arc::new(Mutex::new(callback));
        self.inner
            .subscribers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(callback.clone());

        let latched = self.inner.latched.lock().get(topic).cloned();
        if let Some(message) = latched {
            self.inner.enqueue(Box::new(move || (callback.lock())(message)));
        }
        Ok(())
    }

    fn publisher(&self, topic: &str, _schema: &str) -> Result<Arc<dyn Publisher>, ChannelError> {
        self.inner.ensure_open()?;
        Ok(Arc::new(MockPublisher {
            topic: topic.to_string(),
            inner: self.inner.clone(),
        }))
    }

    fn service(&self, name: &str, _schema: &str) -> Result<Arc<dyn ServiceClient>, ChannelError> {
        self.inner.ensure_open()?;
        Ok(Arc::new(MockService {
            name: name.to_string(),
            inner: self.inner.clone(),
        }))
    }

    fn action_client(
        &self,
        name: &str,
        _schema: &str,
    ) -> Result<Arc<dyn ActionClient>, ChannelError> {
        self.inner.ensure_open()?;
        Ok(Arc::new(MockActionClient {
            name: name.to_string(),
            inner: self.inner.clone(),
        }))
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
