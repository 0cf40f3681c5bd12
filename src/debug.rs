//! SQL调试输出。
//! SQL debug output.
//!
//! 调试块通过 `tracing` 以 `sql_debug` 为目标输出，由订阅者决定是否显示。
//! Debug blocks are emitted through `tracing` with the `sql_debug` target, so
//! the subscriber decides whether they are shown.

use crate::{connection::ConnectionId, query::QueryContext};
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tracing::{info, warn};

const BANNER_WIDTH: usize = 100;

/// Builds a banner line such as `▼▼▼ SQL DEBUGGER ▼▼▼`. Start banners point
/// down, end banners point up.
///
/// 构建横幅行。开始横幅向下，结束横幅向上。
pub fn create_debug_banner(title: &str, end: bool) -> String {
    let width = (BANNER_WIDTH.saturating_sub(title.chars().count()) / 2).saturating_sub(1);
    let boundary = if end { "▲" } else { "▼" }.repeat(width);
    format!("{boundary} {} {boundary}", title.to_uppercase())
}

/// Renders the debug blocks of one connection.
///
/// 渲染单个连接的调试块。
#[derive(Debug, Clone)]
pub struct DebugPrinter {
    conn: ConnectionId,
    brand: Arc<str>,
    roles: Arc<[String]>,
}

impl DebugPrinter {
    pub fn new(conn: ConnectionId, brand: &str, roles: Arc<[String]>) -> Self {
        Self {
            conn,
            brand: Arc::from(brand),
            roles,
        }
    }

    fn footer(&self) -> String {
        format!("{} {} [{}]", self.brand, self.conn, self.roles.join(", "))
    }

    /// The block printed after a query settled.
    ///
    /// 查询完成后打印的调试块。
    pub fn render_settled(&self, context: &QueryContext, rendered_sql: &str, rows: Option<usize>) -> String {
        let mut summary = format!(
            "Execution Time: {}, Waiting Time: {}",
            context.execution_time().as_millis(),
            context.wait_time().as_millis()
        );
        if let Some(rows) = rows.filter(|rows| *rows > 0) {
            let _ = write!(summary, ", Rows Returned: {rows}");
        }
        if let Some(err) = context.error() {
            let _ = write!(summary, "\n\n    The Query Failed: {err}");
        }

        format!(
            "{}\n{}\n\n{}\n\n{}\n{}",
            create_debug_banner("SQL DEBUGGER", false),
            summary,
            rendered_sql.trim(),
            self.footer(),
            create_debug_banner("SQL DEBUGGER", true)
        )
    }

    /// The block printed before a query is handed to the driver.
    ///
    /// 查询交给驱动之前打印的调试块。
    pub fn render_pre_query(&self, rendered_sql: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n{}",
            create_debug_banner("PRE QUERY SQL DEBUGGER", false),
            rendered_sql.trim(),
            self.footer(),
            create_debug_banner("PRE QUERY SQL DEBUGGER", true)
        )
    }

    pub fn log_settled(&self, context: &QueryContext, rendered_sql: &str, rows: Option<usize>) {
        info!(target: "sql_debug", "\n{}", self.render_settled(context, rendered_sql, rows));
    }

    pub fn log_pre_query(&self, rendered_sql: &str) {
        info!(target: "sql_debug", "\n{}", self.render_pre_query(rendered_sql));
    }

    /// Called when a statement outlives its watchdog. The statement keeps running.
    ///
    /// 语句超出看门狗时限时调用。语句会继续运行。
    pub fn log_overrun(&self, context: &QueryContext, rendered_sql: &str, timeout: Duration) {
        warn!(
            conn = %self.conn,
            mode = context.mode.as_str(),
            timeout_ms = timeout.as_millis() as u64,
            "The query is running for longer than the timeout, still waiting for it to settle"
        );
        info!(target: "sql_debug", "\n{}", self.render_settled(context, rendered_sql, None));
    }
}
