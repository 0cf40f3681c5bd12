//! 定义了连接生命周期的可配置参数。
//! Defines configurable parameters for the connection lifecycle.

use crate::query::{QueryContext, QueryMode};
use std::time::Duration;

/// A structure containing all configurable parameters for a connection.
///
/// 包含所有连接可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Timeouts and concurrency limits.
    /// 超时与并发限制。
    pub connection: ConnectionConfig,

    /// SQL debug output switches.
    /// SQL调试输出开关。
    pub debug: DebugConfig,
}

/// Timeouts and concurrency limits of a single connection.
///
/// 单个连接的超时与并发限制。
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Advisory watchdog for queries and for pooled connections that stay busy.
    /// Expiry only logs a warning, the running statement is never cancelled.
    ///
    /// 查询以及长时间忙碌的池化连接的建议性看门狗。
    /// 超时只记录警告，从不取消正在运行的语句。
    pub timeout: Duration,
    /// Hard limit for establishing the session. Expiry fails the connect call
    /// with a connectivity error.
    ///
    /// 建立会话的硬性时限。超时会以连接性错误使连接调用失败。
    pub connect_timeout: Duration,
    /// Arm the query watchdog for write-mode statements too.
    /// 对写模式语句同样启用查询看门狗。
    pub timeout_on_write: bool,
    /// Maximum number of statements in flight on the session at once.
    /// 会话上同时进行中的语句的最大数量。
    pub max_in_flight: u32,
    /// The capacity of the command mailbox of the connection actor.
    /// 连接actor命令邮箱的容量。
    pub command_channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(300),
            timeout_on_write: false,
            max_in_flight: 1,
            command_channel_capacity: 64,
        }
    }
}

impl ConnectionConfig {
    /// Returns the watchdog duration to arm for a statement of `mode`, if any.
    ///
    /// 返回针对 `mode` 语句应启用的看门狗时长（如有）。
    pub fn watchdog_for(&self, mode: QueryMode) -> Option<Duration> {
        if mode.is_write() && !self.timeout_on_write {
            None
        } else {
            Some(self.timeout)
        }
    }

    pub(crate) fn in_flight_limit(&self) -> u32 {
        self.max_in_flight.max(1)
    }
}

/// SQL debug output switches.
///
/// SQL调试输出开关。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugConfig {
    /// Print every settled query.
    /// 打印每个已完成的查询。
    pub log_sql: bool,
    /// Print every query before it is handed to the driver.
    /// 在交给驱动之前打印每个查询。
    pub log_pre_query: bool,
    /// Print failed queries.
    /// 打印失败的查询。
    pub log_errors: bool,
    /// Print queries whose execution took longer than this.
    /// 打印执行时间超过此阈值的查询。
    pub slow_query: Option<Duration>,
}

impl DebugConfig {
    /// Threshold used by `--related-slow` when no value is given.
    pub const DEFAULT_SLOW_QUERY: Duration = Duration::from_millis(200);

    /// Builds the debug switches from command line style flags:
    /// `--related-sql`, `--related-pre-query-sql`, `--related-errors` and
    /// `--related-slow[=<ms>]`. Unknown flags are ignored.
    ///
    /// 从命令行风格的标志构建调试开关。未知标志会被忽略。
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for flag in flags {
            let flag = flag.as_ref().trim_start_matches('-');
            let (name, value) = match flag.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (flag, None),
            };
            match name {
                "related-sql" => config.log_sql = true,
                "related-pre-query-sql" => config.log_pre_query = true,
                "related-errors" => config.log_errors = true,
                "related-slow" => {
                    let threshold = value
                        .and_then(|v| v.parse::<u64>().ok())
                        .map_or(Self::DEFAULT_SLOW_QUERY, Duration::from_millis);
                    config.slow_query = Some(threshold);
                }
                _ => {}
            }
        }
        config
    }

    /// Whether a settled query should be printed.
    ///
    /// 已完成的查询是否应被打印。
    pub fn should_print(&self, context: &QueryContext, failed: bool) -> bool {
        context.debug
            || self.log_sql
            || (failed && self.log_errors)
            || self
                .slow_query
                .is_some_and(|threshold| context.execution_time() > threshold)
    }
}
