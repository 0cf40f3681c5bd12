//! 连接状态验证逻辑模块
//! Connection State Validation Logic Module
//!
//! 该模块负责连接状态的转换合法性判断和各类状态检查。
//! 为生命周期管理器提供一致且可靠的状态验证服务。
//!
//! This module decides whether state transitions are legal and answers
//! state checks. It provides consistent state validation services for the
//! lifecycle manager.

use super::state::ConnectionState;

/// 状态验证器，负责所有状态相关的验证和检查逻辑
/// State validator responsible for all state-related validation and check logic
#[derive(Debug)]
pub struct StateValidator;

impl StateValidator {
    /// 验证状态转换是否合法
    /// Validate if state transition is legal
    pub fn is_valid_transition(current_state: &ConnectionState, new_state: &ConnectionState) -> bool {
        use ConnectionState::*;

        match (current_state, new_state) {
            // 终止状态不可离开，也不可重复进入
            // The terminal state can neither be left nor re-entered
            (Ended, _) => false,

            // 从任何其他状态都可以转换到Ended
            // Can transition to Ended from any other state
            (_, Ended) => true,

            // Connecting状态的转换
            // Transitions from Connecting state
            (Connecting, Idle) => true,

            // Idle状态的转换
            // Transitions from Idle state
            (Idle, Busy) => true,
            (Idle, Reserved) => true,

            // Busy状态的转换
            // Transitions from Busy state
            (Busy, Idle) => true,
            (Busy, Reserved) => true,
            (Busy, TransactionActive) => true,
            (Busy, KillPending) => true,

            // Reserved状态的转换
            // Transitions from Reserved state
            (Reserved, TransactionActive) => true,
            (Reserved, KillPending) => true,

            // 同状态转换（幂等）
            // Same state transition (idempotent)
            (state1, state2) if state1 == state2 => true,

            // 其他转换都是无效的，特别是事务永远不会回到连接池
            // All other transitions are invalid, in particular a transaction never returns to the pool
            _ => false,
        }
    }

    /// 检查是否可以开始执行新的语句（不考虑killed标志与在途限制）
    /// Check if a new statement may start (ignoring the killed flag and the in-flight limit)
    pub fn accepts_statements(state: &ConnectionState) -> bool {
        matches!(
            state,
            ConnectionState::Idle
                | ConnectionState::Busy
                | ConnectionState::Reserved
                | ConnectionState::TransactionActive
        )
    }

    /// 检查连接是否已结束
    /// Check if connection has ended
    pub fn is_ended(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Ended)
    }

    /// 检查握手是否仍在进行
    /// Check if the handshake is still in progress
    pub fn is_connecting(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connecting)
    }

    /// 检查连接是否处于可被池回收的忙碌状态（用于忙碌看门狗）
    /// Check if a pooled connection is busy (used by the busy watchdog)
    pub fn is_pooled_busy(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Busy | ConnectionState::KillPending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    const ALL: [ConnectionState; 7] = [
        Connecting,
        Idle,
        Busy,
        Reserved,
        TransactionActive,
        KillPending,
        Ended,
    ];

    #[test]
    fn test_valid_transitions() {
        // 正常的查询流程
        assert!(StateValidator::is_valid_transition(&Connecting, &Idle));
        assert!(StateValidator::is_valid_transition(&Idle, &Busy));
        assert!(StateValidator::is_valid_transition(&Busy, &Idle));

        // 事务流程
        assert!(StateValidator::is_valid_transition(&Idle, &Reserved));
        assert!(StateValidator::is_valid_transition(&Reserved, &TransactionActive));
        assert!(StateValidator::is_valid_transition(&TransactionActive, &Ended));

        // 延迟终止
        assert!(StateValidator::is_valid_transition(&Busy, &KillPending));
        assert!(StateValidator::is_valid_transition(&KillPending, &Ended));
    }

    #[test]
    fn test_every_live_state_can_end() {
        for state in ALL.iter().filter(|s| **s != Ended) {
            assert!(StateValidator::is_valid_transition(state, &Ended), "{state} -> Ended");
        }
    }

    #[test]
    fn test_ended_is_terminal() {
        for state in ALL {
            assert!(!StateValidator::is_valid_transition(&Ended, &state));
        }
    }

    #[test]
    fn test_transaction_never_returns_to_pool() {
        assert!(!StateValidator::is_valid_transition(&TransactionActive, &Idle));
        assert!(!StateValidator::is_valid_transition(&TransactionActive, &Busy));
        assert!(!StateValidator::is_valid_transition(&TransactionActive, &KillPending));
        assert!(!StateValidator::is_valid_transition(&Reserved, &Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!StateValidator::is_valid_transition(&Connecting, &Busy));
        assert!(!StateValidator::is_valid_transition(&Idle, &Connecting));
        assert!(!StateValidator::is_valid_transition(&KillPending, &Idle));
        assert!(!StateValidator::is_valid_transition(&Idle, &KillPending));
    }

    #[test]
    fn test_state_checks() {
        assert!(StateValidator::accepts_statements(&Idle));
        assert!(StateValidator::accepts_statements(&TransactionActive));
        assert!(!StateValidator::accepts_statements(&Connecting));
        assert!(!StateValidator::accepts_statements(&KillPending));
        assert!(!StateValidator::accepts_statements(&Ended));

        assert!(StateValidator::is_pooled_busy(&Busy));
        assert!(!StateValidator::is_pooled_busy(&Reserved));
    }
}
