//! The implementation of the `ConnectionActor`.
//!
//! `ConnectionActor` 的实现。

use super::{command::ConnectionCommand, id::ConnectionId};
use crate::{
    config::Config,
    debug::DebugPrinter,
    driver::Driver,
    error::{Error, Result},
    lifecycle::{EndOutcome, KillOutcome, LifecycleManager, Settlement, TransactionEnd},
    query::{QueryContext, QueryResult, QueryStatus},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinError, JoinSet},
    time::{Instant, sleep_until},
};
use tracing::{debug, error, info, warn};

const START_TRANSACTION: &str = "start transaction;";

/// How a connect attempt finished.
/// 连接尝试的结束方式。
#[derive(Debug)]
enum ConnectAttempt {
    Completed(Result<()>),
    /// The attempt was abandoned; a detached task tears it down if it still succeeds.
    /// 尝试已被放弃；如果之后仍然成功，分离的任务会将其拆除。
    TimedOut,
}

/// Where the outcome of a statement is delivered.
/// 语句结果的投递目标。
#[derive(Debug)]
enum StatementReply {
    Query(oneshot::Sender<Result<QueryResult>>),
    StartTransaction(oneshot::Sender<Result<()>>),
    FinishTransaction(TransactionEnd, oneshot::Sender<Result<()>>),
}

impl StatementReply {
    fn reject(self, err: Error) {
        match self {
            StatementReply::Query(tx) => {
                let _ = tx.send(Err(err));
            }
            StatementReply::StartTransaction(tx) | StatementReply::FinishTransaction(_, tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

#[derive(Debug)]
struct SettledStatement {
    context: QueryContext,
    result: Result<QueryResult>,
    reply: StatementReply,
}

/// Completions of the tasks owned by the actor.
/// actor所拥有任务的完成结果。
#[derive(Debug)]
enum Operation {
    Connect(ConnectAttempt),
    Statement(Box<SettledStatement>),
    Teardown(Result<()>),
}

/// The actor that owns one connection's state.
///
/// It processes commands from the public `Connection` handle one at a time.
/// Driver calls run as tasks in `operations`, so other commands are served
/// while a handshake or a statement is outstanding.
///
/// 拥有单个连接状态的actor。
///
/// 它逐个处理来自公共 `Connection` 句柄的命令。驱动调用作为 `operations`
/// 中的任务运行，因此在握手或语句进行期间仍可处理其他命令。
pub(crate) struct ConnectionActor<D: Driver> {
    conn: ConnectionId,
    driver: Arc<D>,
    params: Arc<D::Params>,
    config: Arc<Config>,
    lifecycle: LifecycleManager,
    printer: DebugPrinter,
    command_rx: mpsc::Receiver<ConnectionCommand>,
    operations: JoinSet<Operation>,
    pending_connect: Option<oneshot::Sender<Result<()>>>,
    /// 连接结束且驱动会话已拆除
    /// Ended and the driver session was torn down
    torn_down: bool,
    end_waiters: Vec<oneshot::Sender<()>>,
    busy_since: Option<Instant>,
    busy_warned: bool,
}

impl<D: Driver> ConnectionActor<D> {
    pub(crate) fn new(
        conn: ConnectionId,
        driver: Arc<D>,
        params: Arc<D::Params>,
        config: Arc<Config>,
        printer: DebugPrinter,
        command_rx: mpsc::Receiver<ConnectionCommand>,
    ) -> Self {
        Self {
            lifecycle: LifecycleManager::new(conn.clone(), config.connection.in_flight_limit()),
            conn,
            driver,
            params,
            config,
            printer,
            command_rx,
            operations: JoinSet::new(),
            pending_connect: None,
            torn_down: false,
            end_waiters: Vec::new(),
            busy_since: None,
            busy_warned: false,
        }
    }

    /// Runs the actor's main event loop until every handle is dropped.
    ///
    /// 运行actor的主事件循环，直到所有句柄都被丢弃。
    pub(crate) async fn run(&mut self) {
        loop {
            let busy_deadline = self.busy_deadline();

            tokio::select! {
                // 1. 处理来自句柄的命令
                // 1. Handle commands from the handles
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                // 2. 处理驱动任务的完成
                // 2. Handle completions of driver tasks
                Some(joined) = self.operations.join_next(), if !self.operations.is_empty() => {
                    self.handle_joined(joined);
                }
                // 3. 忙碌看门狗
                // 3. Busy watchdog
                _ = sleep_until(busy_deadline.unwrap_or_else(Instant::now)), if busy_deadline.is_some() => {
                    self.warn_busy();
                }
            }

            self.refresh_busy_watch();
        }

        self.shutdown().await;
    }

    /// Every handle is gone: let outstanding work settle, then end the connection.
    ///
    /// 所有句柄都已消失：等待未完成的工作结束，然后结束连接。
    async fn shutdown(&mut self) {
        debug!(conn = %self.conn, outstanding = self.operations.len(), "All handles dropped, shutting down");
        loop {
            if self.operations.is_empty() {
                self.finish(None);
                if self.operations.is_empty() {
                    break;
                }
            }
            if let Some(joined) = self.operations.join_next().await {
                self.handle_joined(joined);
            }
        }
    }

    fn handle_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { response_tx } => self.handle_connect(response_tx),
            ConnectionCommand::Query {
                context,
                response_tx,
            } => {
                self.start_statement(context, StatementReply::Query(response_tx), false);
            }
            ConnectionCommand::CreateTransaction { response_tx } => {
                if let Err(err) = self.lifecycle.begin_transaction() {
                    let _ = response_tx.send(Err(err));
                    return;
                }
                self.start_statement(
                    QueryContext::transaction_control(START_TRANSACTION),
                    StatementReply::StartTransaction(response_tx),
                    false,
                );
            }
            ConnectionCommand::FinishTransaction {
                action,
                response_tx,
            } => {
                if let Err(err) = self.lifecycle.check_transaction_end(action) {
                    let _ = response_tx.send(Err(err));
                    return;
                }
                debug!(conn = %self.conn, action = action.verb(), "Finishing transaction");
                self.start_statement(
                    QueryContext::transaction_control(action.statement()),
                    StatementReply::FinishTransaction(action, response_tx),
                    true,
                );
            }
            ConnectionCommand::RemoveFromPool { response_tx } => {
                let _ = response_tx.send(self.lifecycle.remove_from_pool());
            }
            ConnectionCommand::Kill { response_tx } => {
                match self.lifecycle.kill() {
                    KillOutcome::Ended(outcome) => self.after_end(outcome, None),
                    KillOutcome::Deferred => {
                        debug!(conn = %self.conn, "Kill deferred until the running query settles");
                    }
                    KillOutcome::Marked => {
                        debug!(conn = %self.conn, "Kill marked, the transaction ends itself");
                    }
                    KillOutcome::AlreadyEnded | KillOutcome::AlreadyKilled => {}
                }
                if self.lifecycle.is_ended() {
                    self.reply_when_torn_down(response_tx);
                } else {
                    let _ = response_tx.send(());
                }
            }
            ConnectionCommand::End { response_tx } => {
                self.finish(None);
                self.reply_when_torn_down(response_tx);
            }
            ConnectionCommand::Subscribe { response_tx } => {
                let _ = response_tx.send(self.lifecycle.subscribe());
            }
            ConnectionCommand::Status { response_tx } => {
                let _ = response_tx.send(self.lifecycle.status());
            }
        }
    }

    fn handle_connect(&mut self, response_tx: oneshot::Sender<Result<()>>) {
        if let Err(err) = self.lifecycle.check_connect() {
            let _ = response_tx.send(Err(err));
            return;
        }
        if self.pending_connect.is_some() {
            let _ = response_tx.send(Err(Error::misuse(
                "Cannot connect, a connect attempt is in progress already",
            )));
            return;
        }

        debug!(conn = %self.conn, "Connecting");
        self.pending_connect = Some(response_tx);

        let driver = self.driver.clone();
        let params = self.params.clone();
        let limit = self.config.connection.connect_timeout;
        let conn = self.conn.clone();
        self.operations.spawn(async move {
            Operation::Connect(connect_with_timeout(driver, params, limit, conn).await)
        });
    }

    fn start_statement(
        &mut self,
        mut context: QueryContext,
        reply: StatementReply,
        transaction_control: bool,
    ) {
        if let Err(err) = self.lifecycle.begin_statement(transaction_control) {
            debug!(conn = %self.conn, %err, "Statement rejected");
            reply.reject(err);
            return;
        }

        if let Some(reason) = context.invalid_because_of() {
            let err = Error::Validation(reason);
            context.set_status(QueryStatus::AfterExecute(Some(err.clone())));
            // 无效的查询从未到达驱动，不输出调试块
            // Invalid queries never reach the driver and print no debug block
            self.lifecycle.finish_statement(None);
            reply.reject(err);
            return;
        }

        context.set_status(QueryStatus::BeforeExecute);
        if self.config.debug.log_pre_query {
            let rendered = self.driver.render_sql(&context.sql, &context.values);
            self.printer.log_pre_query(&rendered);
        }

        let driver = self.driver.clone();
        let printer = self.printer.clone();
        let watchdog = self.config.connection.watchdog_for(context.mode);
        self.operations.spawn(async move {
            let result = execute_with_watchdog(driver.as_ref(), &context, watchdog, &printer).await;
            Operation::Statement(Box::new(SettledStatement {
                context,
                result,
                reply,
            }))
        });
    }

    fn handle_joined(&mut self, joined: std::result::Result<Operation, JoinError>) {
        match joined {
            Ok(Operation::Connect(attempt)) => self.on_connect_settled(attempt),
            Ok(Operation::Statement(settled)) => self.on_statement_settled(*settled),
            Ok(Operation::Teardown(result)) => {
                match result {
                    Ok(()) => debug!(conn = %self.conn, "Driver session torn down"),
                    Err(err) => warn!(conn = %self.conn, %err, "Driver failed to tear down the session"),
                }
                if self.lifecycle.is_ended() {
                    self.teardown_complete();
                }
            }
            Err(err) => {
                error!(conn = %self.conn, %err, "Connection task failed");
                self.finish(Some(&Error::connectivity(format!(
                    "A driver task failed: {err}"
                ))));
                if self.lifecycle.is_ended() && !self.torn_down && self.operations.is_empty() {
                    self.teardown_complete();
                }
            }
        }
    }

    fn on_connect_settled(&mut self, attempt: ConnectAttempt) {
        let response_tx = self.pending_connect.take();

        let result = match attempt {
            ConnectAttempt::Completed(Ok(())) => match self.lifecycle.connected() {
                Ok(()) => Ok(()),
                Err(err) => {
                    debug!(conn = %self.conn, "Connection ended during the handshake, tearing the late session down");
                    self.spawn_teardown();
                    Err(err)
                }
            },
            ConnectAttempt::Completed(Err(err)) => {
                warn!(conn = %self.conn, %err, "Failed to connect");
                self.finish(Some(&err));
                Err(err)
            }
            ConnectAttempt::TimedOut => {
                let err = Error::connectivity("Encountered a connect timeout!");
                self.finish(Some(&err));
                Err(err)
            }
        };

        if let Some(response_tx) = response_tx {
            let _ = response_tx.send(result);
        }
    }

    fn on_statement_settled(&mut self, settled: SettledStatement) {
        let SettledStatement {
            mut context,
            result,
            reply,
        } = settled;

        let failure = result.as_ref().err().cloned();
        context.set_status(QueryStatus::AfterExecute(failure.clone()));

        if let Settlement::Ended(outcome) = self.lifecycle.finish_statement(failure.as_ref()) {
            self.after_end(outcome, failure.as_ref());
        }

        if self.config.debug.should_print(&context, failure.is_some()) {
            let rendered = self.driver.render_sql(&context.sql, &context.values);
            let rows = result.as_ref().ok().map(QueryResult::len);
            self.printer.log_settled(&context, &rendered, rows);
        }

        match reply {
            StatementReply::Query(tx) => {
                let _ = tx.send(result);
            }
            StatementReply::StartTransaction(tx) => {
                let _ = tx.send(result.map(|_| ()));
            }
            StatementReply::FinishTransaction(action, tx) => {
                self.lifecycle.close_transaction();
                debug!(
                    conn = %self.conn,
                    action = action.verb(),
                    failed = failure.is_some(),
                    "Transaction finished, ending the connection"
                );
                self.finish(failure.as_ref());
                let _ = tx.send(result.map(|_| ()));
            }
        }
    }

    /// Ends the connection if it has not ended yet.
    ///
    /// 如果连接尚未结束则结束它。
    fn finish(&mut self, error: Option<&Error>) {
        if let Some(outcome) = self.lifecycle.end(error) {
            self.after_end(outcome, error);
        }
    }

    fn after_end(&mut self, outcome: EndOutcome, error: Option<&Error>) {
        if let Some(response_tx) = self.pending_connect.take() {
            let err = error.cloned().unwrap_or_else(|| {
                Error::ended("Cannot connect, the connection has ended!")
            });
            let _ = response_tx.send(Err(err));
        }

        if outcome.teardown {
            self.spawn_teardown();
        } else {
            self.teardown_complete();
        }
    }

    fn spawn_teardown(&mut self) {
        let driver = self.driver.clone();
        self.operations
            .spawn(async move { Operation::Teardown(driver.end_connection().await) });
    }

    fn teardown_complete(&mut self) {
        if !self.torn_down {
            info!(conn = %self.conn, "Connection ended");
        }
        self.torn_down = true;
        self.lifecycle.release_subscribers();
        for waiter in self.end_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn reply_when_torn_down(&mut self, response_tx: oneshot::Sender<()>) {
        if self.torn_down {
            let _ = response_tx.send(());
        } else {
            self.end_waiters.push(response_tx);
        }
    }

    fn busy_deadline(&self) -> Option<Instant> {
        if self.busy_warned {
            return None;
        }
        self.busy_since
            .map(|since| since + self.config.connection.timeout)
    }

    fn refresh_busy_watch(&mut self) {
        if self.lifecycle.is_pooled_busy() {
            if self.busy_since.is_none() {
                self.busy_since = Some(Instant::now());
                self.busy_warned = false;
            }
        } else {
            self.busy_since = None;
            self.busy_warned = false;
        }
    }

    fn warn_busy(&mut self) {
        self.busy_warned = true;
        warn!(
            conn = %self.conn,
            in_flight = self.lifecycle.in_flight(),
            "Connection is marked as busy for more than {}ms and cannot be used for other queries.",
            self.config.connection.timeout.as_millis()
        );
    }
}

/// Races the driver handshake against `limit`.
///
/// 让驱动握手与 `limit` 竞速。
async fn connect_with_timeout<D: Driver>(
    driver: Arc<D>,
    params: Arc<D::Params>,
    limit: Duration,
    conn: ConnectionId,
) -> ConnectAttempt {
    let attempt_driver = driver.clone();
    let mut attempt = tokio::spawn(async move { attempt_driver.connect(&params).await });

    match tokio::time::timeout(limit, &mut attempt).await {
        Ok(Ok(result)) => ConnectAttempt::Completed(result),
        Ok(Err(err)) => ConnectAttempt::Completed(Err(Error::connectivity(format!(
            "The connect attempt failed: {err}"
        )))),
        Err(_) => {
            warn!(
                conn = %conn,
                timeout_ms = limit.as_millis() as u64,
                "Connect timed out, abandoning the attempt"
            );
            tokio::spawn(async move {
                if let Ok(Ok(())) = attempt.await {
                    debug!(conn = %conn, "Abandoned connect attempt succeeded late, tearing it down");
                    if let Err(err) = driver.end_connection().await {
                        warn!(conn = %conn, %err, "Failed to tear down the late session");
                    }
                }
            });
            ConnectAttempt::TimedOut
        }
    }
}

/// Runs one statement. The watchdog only reports an overrun, the statement
/// always runs to completion.
///
/// 执行一条语句。看门狗只报告超时，语句总会运行至完成。
async fn execute_with_watchdog<D: Driver>(
    driver: &D,
    context: &QueryContext,
    watchdog: Option<Duration>,
    printer: &DebugPrinter,
) -> Result<QueryResult> {
    let execution = driver.execute(context);
    tokio::pin!(execution);

    if let Some(limit) = watchdog {
        tokio::select! {
            result = &mut execution => return result,
            _ = tokio::time::sleep(limit) => {
                let rendered = driver.render_sql(&context.sql, &context.values);
                printer.log_overrun(context, &rendered, limit);
            }
        }
    }

    execution.await
}
