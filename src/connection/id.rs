//! Connection identity.

use std::fmt;

/// Opaque identifier of a connection, used in logs and debug output.
///
/// 连接的不透明标识符，用于日志和调试输出。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    seq: u64,
    label: Option<String>,
}

impl ConnectionId {
    pub fn new() -> Self {
        Self {
            seq: rand::random(),
            label: None,
        }
    }

    /// An identifier that carries a human readable label, e.g. the host.
    ///
    /// 带有可读标签（例如主机名）的标识符。
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new()
        }
    }

}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label}#{:016x}", self.seq),
            None => write!(f, "#{:016x}", self.seq),
        }
    }
}
