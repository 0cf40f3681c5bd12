//! Driver abstraction for one physical database session.
//!
//! Each back-end implements this trait to provide the handshake, statement
//! execution and teardown primitives. The connection state machine decides
//! *when* these are called; the driver decides *how*.
//!
//! 单个物理数据库会话的驱动抽象。
//!
//! 每个后端实现此trait以提供握手、语句执行和拆除原语。连接状态机决定
//! *何时* 调用它们，驱动决定 *如何* 执行。

use crate::{
    error::Result,
    query::{QueryContext, QueryResult, Value, render_placeholders},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Back-end specific implementation of a single database session.
///
/// Drivers classify their own failures: anything that means the transport is
/// unusable must be reported as [`Error::Connectivity`](crate::error::Error::Connectivity),
/// statement level failures as [`Error::Operation`](crate::error::Error::Operation).
///
/// 单个数据库会话的后端特定实现。
///
/// 驱动需要自行分类错误：任何意味着传输不可用的错误必须报告为连接性错误，
/// 语句级别的失败报告为操作错误。
#[async_trait]
pub trait Driver: Send + Sync + Debug + 'static {
    /// Connection parameters, opaque to the state machine.
    /// 连接参数，对状态机不透明。
    type Params: Debug + Send + Sync + 'static;

    /// Performs the handshake.
    /// 执行握手。
    async fn connect(&self, params: &Self::Params) -> Result<()>;

    /// Runs one statement.
    /// 执行一条语句。
    async fn execute(&self, context: &QueryContext) -> Result<QueryResult>;

    /// Tears down the transport.
    /// 拆除传输。
    async fn end_connection(&self) -> Result<()>;

    /// Renders a statement with its values inlined. Debug output only.
    ///
    /// 渲染内联了参数值的语句。仅用于调试输出。
    fn render_sql(&self, sql: &str, values: &[Value]) -> String {
        render_placeholders(sql, values)
    }

    /// The name of the back-end, e.g. `postgres`.
    fn brand(&self) -> &str;

    /// Pool roles a session of this back-end serves by default.
    fn roles(&self) -> Vec<String> {
        Vec::new()
    }
}
