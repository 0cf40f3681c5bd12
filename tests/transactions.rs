//! 事务协议测试
//! Transaction protocol tests

pub mod common;

use common::harness::{TestHarness, count, count_ends};
use pooled_session::{
    ConnectionEvent, ConnectionState, Error, ErrorKind, QueryContext, QueryMode, Value,
};
use tokio::time::Duration;

#[tokio::test]
async fn test_transaction_leaves_the_pool_for_good() {
    let mut harness = TestHarness::connected().await;
    harness.drain_events();

    harness.connection.create_transaction().await.unwrap();
    let status = harness.connection.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::TransactionActive);
    assert!(status.is_transaction && status.transaction_open);
    assert!(!status.pooled && !status.idle);

    harness
        .connection
        .query(
            QueryContext::raw("update t set a = ?", vec![Value::Int(2)]).with_mode(QueryMode::Update),
        )
        .await
        .unwrap();

    let status = harness.connection.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::TransactionActive);
    assert!(!status.pooled && !status.idle);
    assert_eq!(
        harness.drain_events(),
        vec![ConnectionEvent::Busy, ConnectionEvent::PoolRemove]
    );
}

#[tokio::test]
async fn test_commit_ends_the_connection() {
    let harness = TestHarness::connected().await;
    harness.connection.create_transaction().await.unwrap();

    harness.connection.commit().await.unwrap();

    let status = harness.connection.status().await.unwrap();
    assert!(status.ended);
    assert!(!status.transaction_open);

    let err = harness.connection.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMisuse);
    assert_eq!(err.to_string(), "Cannot commit, the transaction has ended already!");
}

#[tokio::test]
async fn test_failed_rollback_still_ends_the_connection() {
    let mut harness = TestHarness::connected().await;
    harness
        .driver
        .fail_on("rollback", Error::operation("rollback refused"));

    harness.connection.create_transaction().await.unwrap();
    let err = harness.connection.rollback().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation);

    let events = harness.collect_until_closed().await;
    assert_eq!(count_ends(&events), 1);
    assert_eq!(count(&events, &ConnectionEvent::ConnectivityProblem), 0);
    assert_eq!(events.last(), Some(&ConnectionEvent::End { error: Some(err) }));
    assert_eq!(harness.driver.end_connection_calls(), 1);
}

#[tokio::test]
async fn test_commit_without_transaction() {
    let harness = TestHarness::connected().await;

    let err = harness.connection.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMisuse);
    assert_eq!(err.to_string(), "Cannot commit, this is no transaction!");

    let err = harness.connection.rollback().await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot rollback, this is no transaction!");
    assert!(harness.connection.is_idle().await);
}

#[tokio::test]
async fn test_second_transaction_is_rejected() {
    let harness = TestHarness::connected().await;
    harness.connection.create_transaction().await.unwrap();

    let err = harness.connection.create_transaction().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMisuse);
    assert_eq!(harness.driver.executed(), vec!["start transaction;"]);
}

#[tokio::test]
async fn test_transaction_after_end_is_rejected() {
    let harness = TestHarness::connected().await;
    harness.connection.end().await.unwrap();

    let err = harness.connection.create_transaction().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ended);
    assert_eq!(err.to_string(), "Cannot start transaction, the connection has ended!");
}

#[tokio::test(start_paused = true)]
async fn test_kill_inside_transaction_only_marks() {
    let harness = TestHarness::connected().await;
    harness.connection.create_transaction().await.unwrap();

    let gate = harness.driver.hold("insert");
    let connection = harness.connection.clone();
    let insert = tokio::spawn(async move {
        connection
            .query(QueryContext::new("insert into t values (1)").with_mode(QueryMode::Insert))
            .await
    });
    while harness.connection.status().await.unwrap().in_flight == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    harness.connection.kill().await.unwrap();
    gate.release();
    insert.await.unwrap().unwrap();

    // 事务没有被推迟终止，仍然可以回滚
    let status = harness.connection.status().await.unwrap();
    assert!(status.killed && !status.ended);
    assert_eq!(status.state, ConnectionState::TransactionActive);

    let err = harness.connection.query_raw("select 1", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ended);

    harness.connection.rollback().await.unwrap();
    assert!(harness.connection.status().await.unwrap().ended);
}

#[tokio::test]
async fn test_kill_idle_transaction_waits_for_rollback() {
    let mut harness = TestHarness::connected().await;
    harness.connection.create_transaction().await.unwrap();
    harness.drain_events();

    // 没有运行中的语句时，事务也只会被标记
    harness.connection.kill().await.unwrap();
    let status = harness.connection.status().await.unwrap();
    assert!(status.killed && !status.ended);
    assert_eq!(status.state, ConnectionState::TransactionActive);
    assert_eq!(harness.driver.end_connection_calls(), 0);

    harness.connection.rollback().await.unwrap();
    assert!(harness.connection.status().await.unwrap().ended);
    assert_eq!(count_ends(&harness.collect_until_closed().await), 1);
    assert_eq!(harness.driver.end_connection_calls(), 1);
}

#[tokio::test]
async fn test_connectivity_failure_during_commit() {
    let mut harness = TestHarness::connected().await;
    harness
        .driver
        .fail_on("commit", Error::connectivity("socket closed"));
    harness.connection.create_transaction().await.unwrap();

    let err = harness.connection.commit().await.unwrap_err();
    assert!(err.is_connectivity());

    let events = harness.collect_until_closed().await;
    assert_eq!(count(&events, &ConnectionEvent::ConnectivityProblem), 1);
    assert_eq!(count_ends(&events), 1);
}
