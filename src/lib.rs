#![deny(clippy::expect_used, clippy::unwrap_used)]

//! A connection state machine for pooled database sessions.
//! 池化数据库会话的连接状态机。
//!
//! A [`Connection`] wraps one physical session opened through a [`Driver`].
//! It tracks whether the session is idle, busy, reserved, inside a
//! transaction or ended, enforces the legal order of operations and signals
//! its owning pool through [`Subscription`]s.
//!
//! [`Connection`] 封装了通过 [`Driver`] 打开的单个物理会话。它跟踪会话是否
//! 空闲、忙碌、被保留、处于事务中或已结束，强制操作的合法顺序，并通过
//! [`Subscription`] 向所属连接池发出信号。

pub mod config;
pub mod connection;
pub mod debug;
pub mod driver;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod query;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Config, ConnectionConfig, DebugConfig};
pub use connection::{Connection, ConnectionId, ConnectionOptions};
pub use driver::Driver;
pub use error::{Error, ErrorKind, Result};
pub use event::{ConnectionEvent, Subscription};
pub use lifecycle::{ConnectionState, ConnectionStatus};
pub use query::{QueryContext, QueryMode, QueryResult, QueryStatus, Row, Value};
