//! 连接状态转换逻辑模块
//! Connection State Transition Logic Module
//!
//! 该模块负责执行状态转换，并从转换中派生发往连接池的信号。
//!
//! This module executes state transitions and derives the signals sent
//! to the pool from them.

use super::{state::ConnectionState, validation::StateValidator};
use crate::{
    connection::ConnectionId,
    error::{Error, Result},
    event::{ConnectionEvent, EventBus, Subscription},
};
use tracing::{trace, warn};

/// Flags that decide which signals a transition produces.
///
/// 决定一次转换产生哪些信号的标志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    pub pooled: bool,
    pub killed: bool,
}

/// 状态转换执行器，负责执行状态转换和相关的事件处理
/// State transition executor responsible for executing state transitions and related event handling
#[derive(Debug)]
pub struct StateTransitionExecutor {
    /// 连接ID，用于日志记录
    /// Connection ID for logging
    conn: ConnectionId,
    /// 订阅者
    /// Subscribers
    bus: EventBus,
}

impl StateTransitionExecutor {
    /// 创建新的状态转换执行器
    /// Create a new state transition executor
    pub fn new(conn: ConnectionId) -> Self {
        Self {
            conn,
            bus: EventBus::new(),
        }
    }

    /// 执行状态转换
    /// Execute state transition
    ///
    /// 离开Idle（且仍在池中）时发出 `Busy`，进入Idle（且在池中、未被终止）时发出 `Idle`。
    /// Leaving Idle while pooled emits `Busy`; entering Idle while pooled and not killed
    /// emits `Idle`.
    pub fn execute_transition(
        &mut self,
        current_state: ConnectionState,
        new_state: ConnectionState,
        context: TransitionContext,
    ) -> Result<ConnectionState> {
        if !StateValidator::is_valid_transition(&current_state, &new_state) {
            warn!(
                conn = %self.conn,
                current_state = %current_state,
                attempted_state = %new_state,
                "Invalid state transition attempted"
            );
            return Err(Error::misuse(format!(
                "Illegal connection state transition {current_state} -> {new_state}"
            )));
        }

        if current_state != new_state {
            trace!(
                conn = %self.conn,
                from = current_state.name(),
                to = new_state.name(),
                "State transition executed"
            );

            if current_state == ConnectionState::Idle && context.pooled {
                self.trigger_event(ConnectionEvent::Busy);
            }
            if new_state == ConnectionState::Idle && context.pooled && !context.killed {
                self.trigger_event(ConnectionEvent::Idle);
            }
        }

        Ok(new_state)
    }

    /// 注册订阅者
    /// Register a subscriber
    pub(crate) fn subscribe(&mut self) -> Subscription {
        self.bus.subscribe()
    }

    /// 释放所有订阅者
    /// Release all subscribers
    pub(crate) fn release_subscribers(&mut self) {
        self.bus.release();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    /// 触发事件
    /// Trigger event
    pub(crate) fn trigger_event(&mut self, event: ConnectionEvent) {
        self.bus.publish(event);
    }

    /// 触发结束相关的事件：连接性问题、错误，最后是结束
    /// Trigger the end events: connectivity problem, error, and finally end
    pub(crate) fn trigger_end(&mut self, error: Option<&Error>) {
        if let Some(err) = error {
            if err.is_connectivity() {
                self.trigger_event(ConnectionEvent::ConnectivityProblem);
            }
            self.trigger_event(ConnectionEvent::Error {
                kind: err.kind(),
                message: err.to_string(),
            });
        }
        self.trigger_event(ConnectionEvent::End {
            error: error.cloned(),
        });
    }
}
