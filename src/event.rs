//! 连接向连接池发出的信号以及显式订阅接口。
//! Signals a connection emits towards its pool, and the explicit
//! subscription interface used to receive them.
//!
//! 每个订阅都是一个无界通道的接收端。连接结束时会丢弃所有发送端，
//! 因此订阅者在收到 `End` 之后会观察到通道关闭。
//!
//! Every subscription is the receiving half of an unbounded channel. When the
//! connection ends all senders are dropped, so subscribers observe the channel
//! closing after `End`.

use crate::error::{Error, ErrorKind};
use tokio::sync::mpsc;
use tracing::trace;

/// A signal emitted by a connection.
///
/// 连接发出的信号。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection can take a new query.
    /// 连接可以接受新的查询。
    Idle,
    /// The connection left the idle state.
    /// 连接离开了空闲状态。
    Busy,
    /// The connection must not be returned to the pool anymore.
    /// 连接不能再被归还到连接池。
    PoolRemove,
    /// A transport level failure was observed; the host may be down.
    /// 观察到传输层故障，主机可能已宕机。
    ConnectivityProblem,
    /// The connection ended because of a failure.
    /// 连接因故障而结束。
    Error { kind: ErrorKind, message: String },
    /// The connection has ended. Always the last event.
    /// 连接已结束。总是最后一个事件。
    End { error: Option<Error> },
}

/// The receiving side of a connection's signals.
///
/// 连接信号的接收端。
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the connection has ended
    /// and every queued event was consumed.
    ///
    /// 等待下一个事件。连接结束且所有排队事件都被消费后返回 `None`。
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.try_recv().ok()
    }

    /// Takes every event queued so far.
    ///
    /// 取出目前为止排队的所有事件。
    pub fn drain(&mut self) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Fan-out of events to every live subscription.
///
/// 向所有存活订阅分发事件。
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
    released: bool,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber. After release the returned subscription is
    /// already closed.
    ///
    /// 注册一个新的订阅者。释放之后返回的订阅已经处于关闭状态。
    pub(crate) fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.released {
            self.subscribers.push(tx);
        }
        Subscription { rx }
    }

    pub(crate) fn publish(&mut self, event: ConnectionEvent) {
        trace!(?event, subscribers = self.subscribers.len(), "Publishing connection event");
        // 丢弃已经关闭的订阅
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drops every subscriber. Idempotent.
    ///
    /// 丢弃所有订阅者。幂等。
    pub(crate) fn release(&mut self) {
        self.subscribers.clear();
        self.released = true;
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(ConnectionEvent::Idle);
        bus.publish(ConnectionEvent::Busy);

        assert_eq!(first.drain(), vec![ConnectionEvent::Idle, ConnectionEvent::Busy]);
        assert_eq!(second.drain(), vec![ConnectionEvent::Idle, ConnectionEvent::Busy]);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(ConnectionEvent::Idle);
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_release_closes_subscriptions() {
        let mut bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.publish(ConnectionEvent::End { error: None });
        bus.release();

        assert_eq!(sub.recv().await, Some(ConnectionEvent::End { error: None }));
        assert_eq!(sub.recv().await, None);

        // 释放之后的订阅立即关闭
        let mut late = bus.subscribe();
        assert_eq!(late.recv().await, None);
    }
}
