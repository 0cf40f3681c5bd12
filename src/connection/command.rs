//! Commands sent from the `Connection` handle to its actor.

use crate::{
    error::Result,
    event::Subscription,
    lifecycle::{ConnectionStatus, TransactionEnd},
    query::{QueryContext, QueryResult},
};
use tokio::sync::oneshot;

/// Commands sent to the `ConnectionActor`.
///
/// Every command carries the sender its answer is delivered on. Commands that
/// are not legal in the current state are answered with an error right away,
/// they are never queued.
///
/// 发送到 `ConnectionActor` 的命令。
///
/// 每个命令都携带用于返回结果的发送端。当前状态下不合法的命令会立即以错误
/// 应答，从不排队。
#[derive(Debug)]
pub(crate) enum ConnectionCommand {
    /// 建立会话
    /// Establish the session
    Connect {
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// 执行一条语句
    /// Execute one statement
    Query {
        context: QueryContext,
        response_tx: oneshot::Sender<Result<QueryResult>>,
    },
    /// 开始事务
    /// Start a transaction
    CreateTransaction {
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// 提交或回滚事务，之后连接结束
    /// Commit or roll back the transaction; the connection ends afterwards
    FinishTransaction {
        action: TransactionEnd,
        response_tx: oneshot::Sender<Result<()>>,
    },
    RemoveFromPool {
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// Answered once the kill took effect or was deferred.
    /// 终止生效或被推迟后应答。
    Kill { response_tx: oneshot::Sender<()> },
    /// Answered once the driver session was torn down.
    /// 驱动会话拆除后应答。
    End { response_tx: oneshot::Sender<()> },
    Subscribe {
        response_tx: oneshot::Sender<Subscription>,
    },
    Status {
        response_tx: oneshot::Sender<ConnectionStatus>,
    },
}
