//! Defines the connection state machine.
//!
//! 定义连接状态机。

use std::fmt;

/// The state of a connection.
/// 连接的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// The driver handshake is in progress.
    /// 驱动握手进行中。
    Connecting,

    /// Pooled and ready for a new query.
    /// 已入池，可以接受新的查询。
    Idle,

    /// Pooled with a query in flight.
    /// 已入池，有查询正在执行。
    Busy,

    /// Removed from the pool but still usable by whoever holds it.
    /// 已从连接池移除，但持有者仍可使用。
    Reserved,

    /// Consumed by a transaction. Never returns to the pool; ends once the
    /// transaction is committed or rolled back.
    ///
    /// 被事务占用。永远不会回到连接池；事务提交或回滚后结束。
    TransactionActive,

    /// Killed while a query was in flight; ends as soon as it drains.
    /// 在查询执行期间被终止；一旦排空即结束。
    KillPending,

    /// Terminal state.
    /// 终止状态。
    Ended,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Idle => "Idle",
            ConnectionState::Busy => "Busy",
            ConnectionState::Reserved => "Reserved",
            ConnectionState::TransactionActive => "TransactionActive",
            ConnectionState::KillPending => "KillPending",
            ConnectionState::Ended => "Ended",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point-in-time snapshot of a connection, for the pool and for diagnostics.
///
/// 连接在某一时刻的快照，供连接池和诊断使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Usable for a new query.
    /// 可用于新的查询。
    pub idle: bool,
    pub pooled: bool,
    pub ended: bool,
    pub killed: bool,
    pub is_transaction: bool,
    pub transaction_open: bool,
    /// Operations currently in flight.
    /// 当前进行中的操作数。
    pub in_flight: u32,
}
