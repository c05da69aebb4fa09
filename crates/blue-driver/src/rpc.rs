//! RPC 桥
//!
//! 把通道上"请求 + 一次性回调"的异步模式转换为阻塞、带超时、只有一个结果的调用。
//! 控制平面上的所有配置动作（控制器加载/卸载/切换、夹爪标定、逆运动学）都经过这里。
//!
//! # 并发
//!
//! 每次调用拥有独立的 [`Completion`](crate::completion::Completion)，
//! 不同调用之间没有共享锁；多个线程可以同时在同一个桥上发起调用。
//! 回调在通道 IO 线程上执行，只做一次原子解析，不会阻塞 IO 线程。

use crate::completion::{self, CompletionError};
use crate::error::{DriverError, RpcError};
use crate::metrics::BridgeMetrics;
use blue_channel::{Channel, ChannelError, Message, ServiceClient};
use blue_protocol::{RosMessage, decode, encode};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 单个服务端点上的阻塞调用桥
#[derive(Clone)]
pub struct RpcBridge {
    service: String,
    client: Arc<dyn ServiceClient>,
    metrics: Arc<BridgeMetrics>,
}

impl RpcBridge {
    pub fn new(
        service: impl Into<String>,
        client: Arc<dyn ServiceClient>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            service: service.into(),
            client,
            metrics,
        }
    }

    /// 在通道上创建服务客户端并包装成桥
    pub fn connect(
        channel: &dyn Channel,
        service: &str,
        schema: &str,
        metrics: Arc<BridgeMetrics>,
    ) -> Result<Self, ChannelError> {
        let client = channel.service(service, schema)?;
        Ok(Self::new(service, client, metrics))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// 发起一次调用并阻塞等待结果
    ///
    /// # 参数
    /// - `payload`: 请求消息
    /// - `timeout`: 最长等待时间
    ///
    /// # 错误
    /// - `RpcError::Timeout`: 超时；之后到达的应答被忽略（计入 `late_deliveries`）
    /// - `RpcError::Rejected`: 远端报告 `success: false`
    /// - `RpcError::ChannelClosed`: 通道已关闭，或在应答前关闭
    pub fn call(&self, payload: Message, timeout: Duration) -> Result<Message, RpcError> {
        self.metrics.calls.fetch_add(1, Ordering::Relaxed);
        trace!("rpc {} -> {}", self.service, payload);

        let (resolver, completion) = completion::pair::<(bool, Message)>();
        let metrics = self.metrics.clone();
        let service = self.service.clone();

        let sent = self.client.request(
            payload,
            Box::new(move |success, values| {
                if !resolver.resolve((success, values)) {
                    metrics.late_deliveries.fetch_add(1, Ordering::Relaxed);
                    debug!("late reply from {} ignored", service);
                }
            }),
        );

        if let Err(e) = sent {
            let err = RpcError::from(e);
            self.record_failure(&err);
            warn!("rpc {} could not be sent: {}", self.service, err);
            return Err(err);
        }

        let result = match completion.wait_timeout(timeout) {
            Ok((true, values)) => Ok(values),
            Ok((false, values)) => Err(RpcError::Rejected(rejection_reason(&values))),
            Err(CompletionError::Timeout) => Err(RpcError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(CompletionError::Dropped) => Err(RpcError::ChannelClosed),
        };

        match &result {
            Ok(_) => {
                self.metrics.successes.fetch_add(1, Ordering::Relaxed);
            },
            Err(err) => {
                self.record_failure(err);
                warn!("rpc {} failed: {}", self.service, err);
            },
        }
        result
    }

    /// 强类型调用：编码请求、调用、解码应答
    pub fn call_typed<Req, Resp>(&self, request: &Req, timeout: Duration) -> Result<Resp, DriverError>
    where
        Req: RosMessage,
        Resp: RosMessage,
    {
        let payload = encode(request)?;
        let values = self.call(payload, timeout)?;
        Ok(decode(values)?)
    }

    fn record_failure(&self, err: &RpcError) {
        let counter = match err {
            RpcError::Timeout { .. } => &self.metrics.timeouts,
            RpcError::Rejected(_) => &self.metrics.rejections,
            RpcError::ChannelClosed => &self.metrics.channel_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 从失败应答中提取可读原因
///
/// rosbridge 在服务失败时通常把错误文本直接放在 `values` 中；
/// 也可能是带 `message` 字段的对象。
fn rejection_reason(values: &Message) -> String {
    if let Some(text) = values.as_str() {
        return text.to_string();
    }
    if let Some(text) = values.get("message").and_then(Message::as_str)
        && !text.is_empty()
    {
        return text.to_string();
    }
    if values.is_null() {
        return "remote reported failure".to_string();
    }
    values.to_string()
}
