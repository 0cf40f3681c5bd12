//! The user-facing connection handle.

use super::{actor::ConnectionActor, command::ConnectionCommand, id::ConnectionId};
use crate::{
    config::Config,
    debug::DebugPrinter,
    driver::Driver,
    error::{Error, Result},
    event::Subscription,
    lifecycle::{ConnectionStatus, TransactionEnd},
    query::{QueryContext, QueryResult, Value},
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Identity options of a connection.
///
/// 连接的身份选项。
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Human readable label for logs, e.g. the host name.
    /// 用于日志的可读标签，例如主机名。
    pub label: Option<String>,
    /// Pool roles served by this connection. Defaults to the driver's roles.
    /// 此连接服务的池角色。默认使用驱动的角色。
    pub roles: Option<Vec<String>>,
}

/// A handle to a connection actor.
///
/// Handles are cheap to clone; the actor ends the connection once the last
/// handle is dropped and all outstanding work settled.
///
/// 连接actor的句柄。
///
/// 句柄的克隆开销很小；最后一个句柄被丢弃且所有未完成工作结束后，actor会
/// 结束连接。
pub struct Connection<D: Driver> {
    command_tx: mpsc::Sender<ConnectionCommand>,
    id: ConnectionId,
    roles: Arc<[String]>,
    params: Arc<D::Params>,
}

impl<D: Driver> Clone for Connection<D> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            id: self.id.clone(),
            roles: self.roles.clone(),
            params: self.params.clone(),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> Connection<D> {
    /// Creates a connection and spawns its actor. The session is not
    /// established until [`connect`](Self::connect) is called.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// 创建连接并启动其actor。调用 `connect` 之前不会建立会话。
    /// 必须在tokio运行时中调用。
    pub fn new(driver: D, params: D::Params, config: Config) -> Self {
        Self::with_options(driver, params, config, ConnectionOptions::default())
    }

    /// Creates a connection with an explicit label and role set.
    ///
    /// 使用显式的标签和角色集创建连接。
    pub fn with_options(
        driver: D,
        params: D::Params,
        config: Config,
        options: ConnectionOptions,
    ) -> Self {
        let id = match options.label {
            Some(label) => ConnectionId::with_label(label),
            None => ConnectionId::new(),
        };
        let roles: Arc<[String]> = options.roles.unwrap_or_else(|| driver.roles()).into();
        let printer = DebugPrinter::new(id.clone(), driver.brand(), roles.clone());

        let config = Arc::new(config);
        let params = Arc::new(params);
        let (command_tx, command_rx) =
            mpsc::channel(config.connection.command_channel_capacity.max(1));

        let mut actor = ConnectionActor::new(
            id.clone(),
            Arc::new(driver),
            params.clone(),
            config,
            printer,
            command_rx,
        );

        debug!(conn = %id, "Spawning connection actor");
        tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            command_tx,
            id,
            roles,
            params,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// The parameters the session is established with.
    /// 建立会话所用的参数。
    pub fn params(&self) -> &D::Params {
        &self.params
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ConnectionCommand,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(make(response_tx))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Establishes the session, bounded by the connect timeout.
    ///
    /// 建立会话，受连接超时限制。
    pub async fn connect(&self) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::Connect { response_tx })
            .await?
    }

    /// Executes one statement.
    ///
    /// 执行一条语句。
    pub async fn query(&self, context: QueryContext) -> Result<QueryResult> {
        self.request(|response_tx| ConnectionCommand::Query {
            context,
            response_tx,
        })
        .await?
    }

    /// Executes plain SQL with positional values in `Query` mode.
    ///
    /// 以 `Query` 模式执行带位置参数的原始SQL。
    pub async fn query_raw(&self, sql: impl Into<String>, values: Vec<Value>) -> Result<QueryResult> {
        self.query(QueryContext::raw(sql, values)).await
    }

    /// Starts a transaction. The connection leaves the pool for good and ends
    /// once the transaction is committed or rolled back.
    ///
    /// 开始事务。连接永久离开连接池，并在事务提交或回滚后结束。
    pub async fn create_transaction(&self) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::CreateTransaction { response_tx })
            .await?
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish_transaction(TransactionEnd::Commit).await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish_transaction(TransactionEnd::Rollback).await
    }

    async fn finish_transaction(&self, action: TransactionEnd) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::FinishTransaction {
            action,
            response_tx,
        })
        .await?
    }

    /// Removes the connection from the pool; it stays usable for its holder.
    ///
    /// 将连接从连接池移除；持有者仍可使用它。
    pub async fn remove_from_pool(&self) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::RemoveFromPool { response_tx })
            .await?
    }

    /// Kills the connection: immediately when nothing runs, after the running
    /// query otherwise. A transaction is only marked and ends itself.
    ///
    /// 终止连接：没有运行中的工作时立即终止，否则在当前查询完成后终止。
    /// 事务只会被标记，并自行结束。
    pub async fn kill(&self) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::Kill { response_tx })
            .await
    }

    /// Ends the connection and waits for the driver session to be torn down.
    /// Idempotent.
    ///
    /// 结束连接并等待驱动会话拆除。幂等。
    pub async fn end(&self) -> Result<()> {
        self.request(|response_tx| ConnectionCommand::End { response_tx })
            .await
    }

    /// Subscribes to the connection's signals.
    ///
    /// 订阅连接的信号。
    pub async fn subscribe(&self) -> Result<Subscription> {
        self.request(|response_tx| ConnectionCommand::Subscribe { response_tx })
            .await
    }

    pub async fn status(&self) -> Result<ConnectionStatus> {
        self.request(|response_tx| ConnectionCommand::Status { response_tx })
            .await
    }

    /// Whether the connection can take a new query right now.
    ///
    /// 连接当前是否可以接受新的查询。
    pub async fn is_idle(&self) -> bool {
        self.status().await.is_ok_and(|status| status.idle)
    }
}
