//! 连接生命周期管理模块
//! Connection Lifecycle Management Module
//!
//! 该模块提供连接生命周期的统一管理，包括状态验证、转换逻辑和管理器实现。
//! 采用分层设计：验证器判断转换是否合法，执行器应用转换并派生信号，
//! 管理器负责标志位、在途计数以及各操作的前置条件。
//!
//! This module provides unified connection lifecycle management, including state validation,
//! transition logic, and manager implementation. It adopts a layered design: the validator
//! decides whether a transition is legal, the executor applies it and derives the signals,
//! and the manager owns the flags, the in-flight counter and the preconditions of each
//! operation.

mod manager;
mod state;
mod transitions;
mod validation;

pub use manager::{EndOutcome, KillOutcome, LifecycleManager, Settlement, TransactionEnd};
pub use state::{ConnectionState, ConnectionStatus};
pub use transitions::{StateTransitionExecutor, TransitionContext};
pub use validation::StateValidator;
