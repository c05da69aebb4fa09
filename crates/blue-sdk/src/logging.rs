//! 日志初始化
//!
//! SDK 内部统一使用 `tracing` 打点；依赖 `log` 的第三方库通过 `tracing-log` 桥接进来。
//! 过滤规则优先取 `RUST_LOG`，再叠加调用方给出的指令。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// 日志初始化错误
#[derive(Error, Debug)]
#[error("Failed to initialize logging: {0}")]
pub struct LoggingError(String);

/// 以 info 为默认级别初始化日志
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with("blue_client=info,blue_driver=info")
}

/// 以给定指令初始化日志，如 `"blue_client=debug,blue_driver=trace"`
///
/// 进程内只能初始化一次，重复调用返回错误。
pub fn init_logging_with(directives: &str) -> Result<(), LoggingError> {
    let mut filter = EnvFilter::from_default_env();
    for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let directive = directive
            .parse()
            .map_err(|e| LoggingError(format!("invalid directive {:?}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    tracing_log::LogTracer::init().map_err(|e| LoggingError(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))?;

    tracing::debug!(directives, "logging initialized");
    log::debug!("log bridge installed");
    Ok(())
}
