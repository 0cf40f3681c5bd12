//! 连接生命周期管理器 - 统一管理连接的完整生命周期
//! Connection Lifecycle Manager - Unified management of connection lifecycle
//!
//! 管理器持有带标签的状态值以及池、终止、事务标志和在途计数。每个公开操作
//! 都会先检查前置条件，不满足时以类型化错误拒绝且不修改任何状态。
//! 它是同步的纯状态机，由连接actor驱动。
//!
//! The manager holds the tagged state together with the pool, kill and
//! transaction flags and the in-flight counter. Every operation checks its
//! preconditions first and rejects with a typed error, without mutating
//! anything, when they do not hold. It is a synchronous state machine driven
//! by the connection actor.

use super::{
    state::{ConnectionState, ConnectionStatus},
    transitions::{StateTransitionExecutor, TransitionContext},
    validation::StateValidator,
};
use crate::{
    connection::ConnectionId,
    error::{Error, Result},
    event::{ConnectionEvent, Subscription},
};
use tracing::{debug, info, trace, warn};

/// How a transaction is finished.
///
/// 事务的结束方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Rollback,
}

impl TransactionEnd {
    pub fn verb(self) -> &'static str {
        match self {
            TransactionEnd::Commit => "commit",
            TransactionEnd::Rollback => "rollback",
        }
    }

    /// The control statement issued for this action.
    /// 此操作发出的控制语句。
    pub fn statement(self) -> &'static str {
        match self {
            TransactionEnd::Commit => "commit;",
            TransactionEnd::Rollback => "rollback;",
        }
    }
}

/// Result of ending the connection.
///
/// 结束连接的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOutcome {
    /// The driver session was open and must be torn down now.
    /// 驱动会话处于打开状态，现在必须拆除。
    pub teardown: bool,
}

/// What `kill()` did.
///
/// `kill()` 的执行结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    AlreadyEnded,
    AlreadyKilled,
    /// Ended immediately.
    /// 立即结束。
    Ended(EndOutcome),
    /// Ends once the in-flight statements drain.
    /// 在途语句排空后结束。
    Deferred,
    /// Inside a transaction: only marked, the transaction ends itself.
    /// 处于事务中：仅做标记，事务会自行结束。
    Marked,
}

/// What settling a statement did to the connection.
///
/// 语句完成对连接产生的影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Back at rest: idle, reserved or still inside the transaction.
    /// 回到静止状态：空闲、保留或仍在事务中。
    Resting,
    /// This settlement ended the connection.
    /// 此次完成导致连接结束。
    Ended(EndOutcome),
    /// The connection had already ended while the statement was running.
    /// 语句运行期间连接已经结束。
    AfterEnd,
}

/// The connection lifecycle state machine.
///
/// 连接生命周期状态机。
#[derive(Debug)]
pub struct LifecycleManager {
    /// 连接ID，用于日志记录
    /// Connection ID for logging
    conn: ConnectionId,
    /// 当前连接状态
    /// Current connection state
    state: ConnectionState,
    pooled: bool,
    killed: bool,
    is_transaction: bool,
    transaction_open: bool,
    in_flight: u32,
    in_flight_limit: u32,
    /// 驱动会话是否已建立且尚未拆除
    /// Whether the driver session is established and not torn down yet
    session_open: bool,
    /// 状态转换执行器
    /// State transition executor
    executor: StateTransitionExecutor,
}

impl LifecycleManager {
    /// 创建新的生命周期管理器，初始状态为Connecting
    /// Create a new lifecycle manager in the Connecting state
    pub fn new(conn: ConnectionId, in_flight_limit: u32) -> Self {
        Self {
            executor: StateTransitionExecutor::new(conn.clone()),
            conn,
            state: ConnectionState::Connecting,
            pooled: true,
            killed: false,
            is_transaction: false,
            transaction_open: false,
            in_flight: 0,
            in_flight_limit: in_flight_limit.max(1),
            session_open: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn is_ended(&self) -> bool {
        StateValidator::is_ended(&self.state)
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// 仅当连接在池中、未结束且未被终止时才为空闲
    /// Idle only while pooled, not ended and not killed
    pub fn is_idle(&self) -> bool {
        self.state == ConnectionState::Idle && self.pooled && !self.killed
    }

    /// 池化连接是否处于忙碌状态
    /// Whether a pooled connection is busy
    pub fn is_pooled_busy(&self) -> bool {
        self.pooled && StateValidator::is_pooled_busy(&self.state)
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            idle: self.is_idle(),
            pooled: self.pooled,
            ended: self.is_ended(),
            killed: self.killed,
            is_transaction: self.is_transaction,
            transaction_open: self.transaction_open,
            in_flight: self.in_flight,
        }
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.executor.subscribe()
    }

    /// 释放所有订阅者，结束后由actor在拆除完成时调用
    /// Release every subscriber; called by the actor once teardown completed
    pub fn release_subscribers(&mut self) {
        self.executor.release_subscribers();
    }

    fn transition_context(&self) -> TransitionContext {
        TransitionContext {
            pooled: self.pooled,
            killed: self.killed,
        }
    }

    fn transition_to(&mut self, new_state: ConnectionState) -> Result<()> {
        let context = self.transition_context();
        self.state = self
            .executor
            .execute_transition(self.state, new_state, context)?;
        Ok(())
    }

    /// 检查是否可以开始握手
    /// Check whether the handshake may start
    pub fn check_connect(&self) -> Result<()> {
        if self.is_ended() || self.killed {
            return Err(Error::ended("Cannot connect, the connection has ended!"));
        }
        if !StateValidator::is_connecting(&self.state) {
            return Err(Error::misuse(
                "Cannot connect, the connection is established already",
            ));
        }
        Ok(())
    }

    /// 握手成功：Connecting -> Idle
    /// Handshake succeeded: Connecting -> Idle
    ///
    /// 如果连接在握手期间已结束，则返回错误，调用者必须拆除迟到的会话。
    /// Fails when the connection ended during the handshake; the caller must
    /// then tear down the late session.
    pub fn connected(&mut self) -> Result<()> {
        if !StateValidator::is_connecting(&self.state) {
            return Err(Error::ended(
                "The connection has ended before the handshake completed",
            ));
        }
        info!(conn = %self.conn, "Connection established");
        self.session_open = true;
        self.transition_to(ConnectionState::Idle)
    }

    /// 开始执行一条语句
    /// Begin executing a statement
    ///
    /// 事务控制语句（commit/rollback）可以在已被终止的事务上执行，
    /// 以便事务能自行结束。
    /// Transaction control statements may run on a killed transaction so the
    /// transaction can finish itself.
    pub fn begin_statement(&mut self, transaction_control: bool) -> Result<()> {
        if self.is_ended() || (self.killed && !transaction_control) {
            return Err(Error::ended(
                "Cannot execute the query, the connection has ended!",
            ));
        }
        if StateValidator::is_connecting(&self.state) {
            return Err(Error::misuse(
                "Cannot execute the query, the connection is not established yet",
            ));
        }
        if !StateValidator::accepts_statements(&self.state) {
            return Err(Error::ended(
                "Cannot execute the query, the connection is shutting down",
            ));
        }
        if self.in_flight >= self.in_flight_limit {
            return Err(Error::misuse(format!(
                "Cannot execute the query, {} statement(s) already in flight on this connection",
                self.in_flight
            )));
        }

        let next = match self.state {
            ConnectionState::Idle => ConnectionState::Busy,
            other => other,
        };
        self.transition_to(next)?;
        self.in_flight += 1;

        trace!(conn = %self.conn, in_flight = self.in_flight, "Statement started");
        Ok(())
    }

    /// 一条语句完成（成功或失败）
    /// A statement settled (successfully or not)
    pub fn finish_statement(&mut self, failure: Option<&Error>) -> Settlement {
        let was_running = self.in_flight > 0;
        self.in_flight = self.in_flight.saturating_sub(1);
        let drained = was_running && self.in_flight == 0;

        if self.is_ended() {
            return Settlement::AfterEnd;
        }

        // 连接性错误绕过空闲状态，直接结束连接
        // Connectivity failures bypass idle and end the connection
        if let Some(err) = failure.filter(|err| err.is_connectivity()) {
            warn!(conn = %self.conn, %err, "Connectivity failure while executing a statement");
            return self.settle_by_ending(Some(err));
        }

        if drained {
            trace!(conn = %self.conn, state = %self.state, "In-flight statements drained");
            match self.state {
                ConnectionState::KillPending => {
                    debug!(conn = %self.conn, "Drained, finishing deferred kill");
                    return self.settle_by_ending(None);
                }
                ConnectionState::Busy => {
                    if let Err(err) = self.transition_to(ConnectionState::Idle) {
                        warn!(conn = %self.conn, %err, "Failed to return the connection to idle");
                    }
                }
                _ => {}
            }
        }

        Settlement::Resting
    }

    fn settle_by_ending(&mut self, error: Option<&Error>) -> Settlement {
        match self.end(error) {
            Some(outcome) => Settlement::Ended(outcome),
            None => Settlement::AfterEnd,
        }
    }

    /// 从连接池移除连接
    /// Remove the connection from the pool
    pub fn remove_from_pool(&mut self) -> Result<()> {
        if self.is_ended() || self.killed {
            return Err(Error::ended(
                "Cannot remove the connection from the pool, the connection has ended!",
            ));
        }
        if StateValidator::is_connecting(&self.state) {
            return Err(Error::misuse(
                "Cannot remove the connection from the pool, it is not established yet",
            ));
        }
        if !self.pooled {
            return Err(Error::misuse(
                "Cannot remove the connection from the pool, it was removed already",
            ));
        }

        let next = match self.state {
            ConnectionState::Idle | ConnectionState::Busy => ConnectionState::Reserved,
            other => other,
        };
        // 先转换再清除pooled，以便离开Idle时仍发出Busy
        // Transition before clearing `pooled` so leaving Idle still emits Busy
        self.transition_to(next)?;
        self.pooled = false;
        self.executor.trigger_event(ConnectionEvent::PoolRemove);

        debug!(conn = %self.conn, "Connection removed from the pool");
        Ok(())
    }

    /// 开始事务：永久移出连接池并进入TransactionActive
    /// Begin a transaction: leave the pool for good and enter TransactionActive
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.is_ended() || self.killed {
            return Err(Error::ended(
                "Cannot start transaction, the connection has ended!",
            ));
        }
        if StateValidator::is_connecting(&self.state) {
            return Err(Error::misuse(
                "Cannot start transaction, the connection is not established yet",
            ));
        }
        if self.is_transaction {
            return Err(Error::misuse(
                "Cannot start transaction, the connection is part of a transaction already",
            ));
        }
        if self.in_flight >= self.in_flight_limit {
            return Err(Error::misuse(
                "Cannot start transaction while a statement is in flight",
            ));
        }

        if self.pooled {
            self.remove_from_pool()?;
        }
        self.transition_to(ConnectionState::TransactionActive)?;
        self.is_transaction = true;
        self.transaction_open = true;

        debug!(conn = %self.conn, "Transaction started");
        Ok(())
    }

    /// 检查是否可以提交或回滚
    /// Check whether the transaction can be committed or rolled back
    pub fn check_transaction_end(&self, action: TransactionEnd) -> Result<()> {
        let verb = action.verb();
        if !self.is_transaction {
            return Err(Error::misuse(format!("Cannot {verb}, this is no transaction!")));
        }
        if !self.transaction_open {
            return Err(Error::misuse(format!(
                "Cannot {verb}, the transaction has ended already!"
            )));
        }
        if self.is_ended() {
            return Err(Error::ended(format!(
                "Cannot {verb}, the connection has ended!"
            )));
        }
        Ok(())
    }

    /// 事务控制语句已完成
    /// The transaction control statement settled
    pub fn close_transaction(&mut self) {
        self.transaction_open = false;
    }

    /// 终止连接
    /// Kill the connection
    pub fn kill(&mut self) -> KillOutcome {
        if self.is_ended() {
            return KillOutcome::AlreadyEnded;
        }
        if self.killed {
            return KillOutcome::AlreadyKilled;
        }

        self.killed = true;
        debug!(conn = %self.conn, state = %self.state, in_flight = self.in_flight, "Killing connection");

        match self.state {
            // 事务会在提交或回滚后自行结束
            // Transactions end themselves once committed or rolled back
            ConnectionState::TransactionActive => KillOutcome::Marked,
            ConnectionState::Busy | ConnectionState::Reserved if self.in_flight > 0 => {
                match self.transition_to(ConnectionState::KillPending) {
                    Ok(()) => KillOutcome::Deferred,
                    Err(_) => self.kill_now(),
                }
            }
            _ => self.kill_now(),
        }
    }

    fn kill_now(&mut self) -> KillOutcome {
        match self.end(None) {
            Some(outcome) => KillOutcome::Ended(outcome),
            None => KillOutcome::AlreadyEnded,
        }
    }

    /// 结束连接。幂等：只有第一次调用生效并返回 `Some`。
    /// End the connection. Idempotent: only the first call has an effect and returns `Some`.
    pub fn end(&mut self, error: Option<&Error>) -> Option<EndOutcome> {
        if self.is_ended() {
            return None;
        }

        info!(
            conn = %self.conn,
            state = %self.state,
            error = ?error,
            "Ending connection"
        );

        if let Err(err) = self.transition_to(ConnectionState::Ended) {
            warn!(conn = %self.conn, %err, "Forcing the connection into the ended state");
            self.state = ConnectionState::Ended;
        }
        self.executor.trigger_end(error);

        Some(EndOutcome {
            teardown: std::mem::take(&mut self.session_open),
        })
    }
}
