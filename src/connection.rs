//! 单个物理数据库会话的连接状态机。
//! The connection state machine wrapping one physical database session.
//!
//! 每个连接由一个actor任务拥有全部状态，公开的 [`Connection`] 句柄通过命令
//! 通道与其通信。驱动的握手、语句执行和拆除作为actor自己的任务运行，其完成
//! 结果回到同一个事件循环中。
//!
//! Each connection is owned by one actor task holding all of its state; the
//! public [`Connection`] handle talks to it over a command channel. Driver
//! handshakes, statements and teardowns run as tasks owned by the actor and
//! their completions are fed back into the same event loop.

mod actor;
mod command;
mod handle;
mod id;

pub use handle::{Connection, ConnectionOptions};
pub use id::ConnectionId;
