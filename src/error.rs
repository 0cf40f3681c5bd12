//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the pooled session library.
/// 连接池会话库的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The query specification is malformed and was never sent to the driver.
    /// 查询规范格式错误，从未发送给驱动。
    #[error("The query is invalid: {0}")]
    Validation(String),

    /// The operation is not legal in the current state of the connection,
    /// e.g. committing without an open transaction.
    ///
    /// 该操作在连接的当前状态下不合法，例如在没有打开事务的情况下提交。
    #[error("{0}")]
    ProtocolMisuse(String),

    /// The connection has ended or was killed and accepts no further work.
    /// 连接已结束或被终止，不再接受任何工作。
    #[error("{0}")]
    Ended(String),

    /// The statement itself failed (constraint violation, syntax error, ...).
    /// 语句本身执行失败（约束冲突、语法错误等）。
    #[error("Query failed: {0}")]
    Operation(String),

    /// The transport is unusable. Ends the connection and is reported to the pool.
    /// 传输层不可用。会结束连接并报告给连接池。
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    /// The internal channel to the connection actor was closed unexpectedly.
    /// 到连接actor的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// The classification tag of an [`Error`].
///
/// 错误的分类标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    ProtocolMisuse,
    Ended,
    Operation,
    Connectivity,
    ChannelClosed,
}

impl Error {
    /// Creates a connectivity error.
    /// 创建一个连接性错误。
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Creates an operation error.
    /// 创建一个操作错误。
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }

    pub(crate) fn misuse(message: impl Into<String>) -> Self {
        Self::ProtocolMisuse(message.into())
    }

    pub(crate) fn ended(message: impl Into<String>) -> Self {
        Self::Ended(message.into())
    }

    /// Returns the classification tag of this error.
    /// 返回此错误的分类标签。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::ProtocolMisuse(_) => ErrorKind::ProtocolMisuse,
            Error::Ended(_) => ErrorKind::Ended,
            Error::Operation(_) => ErrorKind::Operation,
            Error::Connectivity(_) => ErrorKind::Connectivity,
            Error::ChannelClosed => ErrorKind::ChannelClosed,
        }
    }

    /// Whether the transport itself is deemed broken.
    /// 传输层本身是否被认为已损坏。
    pub fn is_connectivity(&self) -> bool {
        self.kind() == ErrorKind::Connectivity
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

/// Socket level I/O failures reported by a driver always mean the session is gone.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connectivity(err.to_string())
    }
}
