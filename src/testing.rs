//! 测试辅助工具模块
//! Test utilities module
//!
//! 提供一个可编排的内存驱动，用于在没有真实数据库的情况下驱动连接状态机。
//! Provides a scriptable in-memory driver that exercises the connection state
//! machine without a real database.

use crate::{
    driver::Driver,
    error::{Error, Result},
    query::{QueryContext, QueryResult},
};
use async_trait::async_trait;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::Semaphore;

/// Connection parameters of the [`MockDriver`].
#[derive(Debug, Clone, Default)]
pub struct MockParams {
    pub host: String,
}

/// Holds matching driver calls until released.
///
/// 阻塞匹配的驱动调用，直到被释放。
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    semaphore: Arc<Semaphore>,
}

impl ExecutionGate {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets every held and every future call through.
    ///
    /// 放行所有被阻塞的以及之后的调用。
    pub fn release(&self) {
        self.semaphore.close();
    }

    async fn pass(&self) {
        // 关闭的信号量会立即返回错误，即门已打开
        // A closed semaphore fails right away, i.e. the gate is open
        let _ = self.semaphore.acquire().await;
    }
}

#[derive(Debug, Default)]
struct MockState {
    connect_delay: Duration,
    connect_error: Option<Error>,
    connect_gate: Option<ExecutionGate>,
    execute_delay: Duration,
    failures: Vec<(String, Error)>,
    responses: Vec<(String, QueryResult)>,
    gates: Vec<(String, ExecutionGate)>,
    connect_calls: usize,
    end_connection_calls: usize,
    executed: Vec<String>,
}

/// A scriptable driver. Clones share their script and counters.
///
/// Statements are matched by substring: the first failure whose pattern is
/// contained in the SQL wins, then the first scripted response, otherwise an
/// empty result is returned.
///
/// 可编排的驱动。克隆体共享脚本和计数器。
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    inner: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The handshake takes `delay`.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.lock().connect_delay = delay;
        self
    }

    /// The handshake fails with `error`.
    pub fn with_connect_error(self, error: Error) -> Self {
        self.lock().connect_error = Some(error);
        self
    }

    /// Every statement takes `delay`.
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        self.lock().execute_delay = delay;
        self
    }

    /// Statements containing `pattern` fail with `error`.
    ///
    /// 包含 `pattern` 的语句以 `error` 失败。
    pub fn fail_on(&self, pattern: impl Into<String>, error: Error) {
        self.lock().failures.push((pattern.into(), error));
    }

    /// Statements containing `pattern` return `result`.
    pub fn respond_to(&self, pattern: impl Into<String>, result: QueryResult) {
        self.lock().responses.push((pattern.into(), result));
    }

    /// Holds statements containing `pattern` until the gate is released.
    ///
    /// 阻塞包含 `pattern` 的语句，直到门被释放。
    pub fn hold(&self, pattern: impl Into<String>) -> ExecutionGate {
        let gate = ExecutionGate::new();
        self.lock().gates.push((pattern.into(), gate.clone()));
        gate
    }

    /// Holds the handshake until the gate is released.
    pub fn hold_connect(&self) -> ExecutionGate {
        let gate = ExecutionGate::new();
        self.lock().connect_gate = Some(gate.clone());
        gate
    }

    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub fn end_connection_calls(&self) -> usize {
        self.lock().end_connection_calls
    }

    pub fn execute_calls(&self) -> usize {
        self.lock().executed.len()
    }

    /// Every statement handed to the driver, in order.
    ///
    /// 按顺序返回交给驱动的每条语句。
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }
}

fn find_matching<'a, T>(entries: &'a [(String, T)], sql: &str) -> Option<&'a T> {
    entries
        .iter()
        .find(|(pattern, _)| sql.contains(pattern.as_str()))
        .map(|(_, value)| value)
}

#[async_trait]
impl Driver for MockDriver {
    type Params = MockParams;

    async fn connect(&self, _params: &Self::Params) -> Result<()> {
        let (delay, error, gate) = {
            let mut state = self.lock();
            state.connect_calls += 1;
            (
                state.connect_delay,
                state.connect_error.clone(),
                state.connect_gate.clone(),
            )
        };

        if let Some(gate) = gate {
            gate.pass().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn execute(&self, context: &QueryContext) -> Result<QueryResult> {
        let (delay, gate, outcome) = {
            let mut state = self.lock();
            state.executed.push(context.sql.clone());

            let gate = find_matching(&state.gates, &context.sql).cloned();
            let outcome = match find_matching(&state.failures, &context.sql) {
                Some(err) => Err(err.clone()),
                None => Ok(find_matching(&state.responses, &context.sql)
                    .cloned()
                    .unwrap_or_default()),
            };
            (state.execute_delay, gate, outcome)
        };

        if let Some(gate) = gate {
            gate.pass().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        outcome
    }

    async fn end_connection(&self) -> Result<()> {
        self.lock().end_connection_calls += 1;
        Ok(())
    }

    fn brand(&self) -> &str {
        "TEST"
    }

    fn roles(&self) -> Vec<String> {
        vec!["read".to_string(), "write".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Value;

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let driver = MockDriver::new();
        driver.fail_on("broken", Error::operation("syntax error"));
        driver.respond_to("select", QueryResult::with_rows(vec![vec![Value::Int(1)]]));

        let ok = driver.execute(&QueryContext::new("select 1")).await.unwrap();
        assert_eq!(ok.len(), 1);

        let err = driver.execute(&QueryContext::new("select broken")).await.unwrap_err();
        assert_eq!(err, Error::operation("syntax error"));

        let empty = driver.execute(&QueryContext::new("delete from t")).await.unwrap();
        assert!(empty.is_empty());

        assert_eq!(driver.executed(), vec!["select 1", "select broken", "delete from t"]);
    }

    #[tokio::test]
    async fn test_gate_holds_until_released() {
        let driver = MockDriver::new();
        let gate = driver.hold("slow");

        let held = tokio::spawn({
            let driver = driver.clone();
            async move { driver.execute(&QueryContext::new("slow query")).await }
        });
        tokio::task::yield_now().await;
        assert!(!held.is_finished());

        gate.release();
        assert!(held.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_counters_are_shared_between_clones() {
        let driver = MockDriver::new();
        let clone = driver.clone();

        clone.connect(&MockParams::default()).await.unwrap();
        clone.end_connection().await.unwrap();

        assert_eq!(driver.connect_calls(), 1);
        assert_eq!(driver.end_connection_calls(), 1);
    }
}
