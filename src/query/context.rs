//! 单个查询的规范与生命周期跟踪器。
//! One query's specification and lifecycle tracker.
//!
//! 上下文记录查询的有效性、执行状态和计时信息。连接在执行前后更新其状态，
//! 调试输出从中读取执行时间和等待时间。
//!
//! The context records the query's validity, execution status and timing.
//! The connection updates its status around execution, and the debug output
//! reads execution and wait times from it.

use super::value::{Value, count_placeholders};
use crate::error::Error;
use std::time::Duration;
use tokio::time::Instant;

/// The kind of statement a query represents.
///
/// 查询所代表的语句类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    Query,
    Insert,
    Update,
    Delete,
    /// Transaction control statements issued by the connection itself.
    /// 连接自身发出的事务控制语句。
    Transaction,
}

impl QueryMode {
    /// Whether the statement may change data.
    /// 语句是否可能修改数据。
    pub fn is_write(self) -> bool {
        !matches!(self, QueryMode::Query)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Query => "query",
            QueryMode::Insert => "insert",
            QueryMode::Update => "update",
            QueryMode::Delete => "delete",
            QueryMode::Transaction => "transaction",
        }
    }
}

/// Execution status of a query.
///
/// 查询的执行状态。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Uninitialized,
    /// Handed to the driver.
    /// 已交给驱动执行。
    BeforeExecute,
    /// Settled, with the failure if there was one.
    /// 已完成，若失败则附带错误。
    AfterExecute(Option<Error>),
}

/// A query specification plus its lifecycle tracking.
///
/// 查询规范及其生命周期跟踪。
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub sql: String,
    pub values: Vec<Value>,
    pub mode: QueryMode,
    /// Forces debug output for this query regardless of the debug configuration.
    /// 无论调试配置如何，都强制输出此查询的调试信息。
    pub debug: bool,
    status: QueryStatus,
    created_at: Instant,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl QueryContext {
    /// Creates a new context in `Query` mode without bound values.
    /// 创建一个新的 `Query` 模式上下文，不带绑定值。
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
            mode: QueryMode::Query,
            debug: false,
            status: QueryStatus::Uninitialized,
            created_at: Instant::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Wraps plain SQL and its positional values.
    /// 包装原始SQL及其位置参数。
    pub fn raw(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(sql).with_values(values)
    }

    pub(crate) fn transaction_control(sql: &str) -> Self {
        Self::new(sql).with_mode(QueryMode::Transaction)
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_because_of().is_none()
    }

    /// Explains why the context is invalid, `None` if it is valid.
    ///
    /// 解释上下文无效的原因，有效时返回 `None`。
    pub fn invalid_because_of(&self) -> Option<String> {
        if self.sql.trim().is_empty() {
            return Some("the SQL query is empty".to_string());
        }

        let placeholders = count_placeholders(&self.sql);
        if placeholders > self.values.len() {
            return Some(format!(
                "there are not enough parameters to fill in the placeholders ({} placeholders, {} values)",
                placeholders,
                self.values.len()
            ));
        }

        None
    }

    pub fn status(&self) -> &QueryStatus {
        &self.status
    }

    /// Records a status change and the matching timestamp.
    ///
    /// 记录状态变化及对应的时间戳。
    pub fn set_status(&mut self, status: QueryStatus) {
        match status {
            QueryStatus::BeforeExecute => self.started_at = Some(Instant::now()),
            QueryStatus::AfterExecute(_) => self.finished_at = Some(Instant::now()),
            QueryStatus::Uninitialized => {}
        }
        self.status = status;
    }

    /// The failure recorded at settlement, if any.
    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            QueryStatus::AfterExecute(err) => err.as_ref(),
            _ => None,
        }
    }

    /// Time spent waiting between creation and execution start.
    ///
    /// 从创建到开始执行之间的等待时间。
    pub fn wait_time(&self) -> Duration {
        self.started_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.created_at)
    }

    /// Time spent executing, up to now if the query is still running.
    ///
    /// 执行耗时，若查询仍在运行则计算到当前时刻。
    pub fn execution_time(&self) -> Duration {
        match self.started_at {
            Some(started) => self
                .finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(started),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(QueryContext::new("select 1").is_valid());
        assert!(!QueryContext::new("   ").is_valid());

        let missing = QueryContext::raw("select * from t where id = ?", vec![]);
        let reason = missing.invalid_because_of().unwrap();
        assert!(reason.contains("not enough parameters"));

        let bound = QueryContext::raw("select * from t where id = ?", vec![Value::from(1)]);
        assert!(bound.is_valid());
    }

    #[test]
    fn test_write_modes() {
        assert!(!QueryMode::Query.is_write());
        assert!(QueryMode::Insert.is_write());
        assert!(QueryMode::Transaction.is_write());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_timing() {
        let mut ctx = QueryContext::new("select 1");
        assert_eq!(ctx.status(), &QueryStatus::Uninitialized);
        assert_eq!(ctx.execution_time(), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.set_status(QueryStatus::BeforeExecute);
        assert_eq!(ctx.wait_time(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.set_status(QueryStatus::AfterExecute(Some(Error::operation("boom"))));
        assert_eq!(ctx.execution_time(), Duration::from_millis(50));
        assert_eq!(ctx.error(), Some(&Error::operation("boom")));
    }
}
