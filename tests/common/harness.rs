//! tests/common/harness.rs
#![allow(dead_code)]

use pooled_session::{
    Config, Connection, ConnectionEvent, ConnectionOptions, Subscription,
    testing::{MockDriver, MockParams},
};
use std::{
    io,
    sync::{Arc, Mutex, Once, PoisonError},
};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "pooled_session=debug,sql_debug=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .init();
    });
}

/// Collects the formatted log output of the current thread.
///
/// Tests run on a current-thread runtime, so the connection actor and its
/// driver tasks log through the same thread-local subscriber.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Installs a capturing subscriber for the current thread. Logs are
    /// captured while the guard is alive.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("pooled_session=debug,sql_debug=info")
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A test harness wiring a `Connection` to a `MockDriver` and an event subscription.
pub struct TestHarness {
    pub driver: MockDriver,
    pub connection: Connection<MockDriver>,
    pub events: Subscription,
}

impl TestHarness {
    /// Creates a connection that is not connected yet.
    pub async fn new(driver: MockDriver, config: Config) -> Self {
        init_tracing();
        let connection = Connection::with_options(
            driver.clone(),
            MockParams {
                host: "db.test".to_string(),
            },
            config,
            ConnectionOptions {
                label: Some("db.test".to_string()),
                roles: None,
            },
        );
        let events = connection.subscribe().await.unwrap();
        Self {
            driver,
            connection,
            events,
        }
    }

    /// Creates a connection with the default configuration and connects it.
    pub async fn connected() -> Self {
        Self::connected_with(MockDriver::new(), Config::default()).await
    }

    pub async fn connected_with(driver: MockDriver, config: Config) -> Self {
        let harness = Self::new(driver, config).await;
        harness.connection.connect().await.unwrap();
        harness
    }

    /// Every event queued so far.
    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        self.events.drain()
    }

    /// Waits until the subscription closes and returns every event it saw.
    pub async fn collect_until_closed(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }
}

pub fn count(events: &[ConnectionEvent], wanted: &ConnectionEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}

pub fn count_ends(events: &[ConnectionEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, ConnectionEvent::End { .. }))
        .count()
}
