//! 查询规范及其生命周期跟踪。
//! Query specifications and their lifecycle tracking.

mod context;
mod value;

pub use context::{QueryContext, QueryMode, QueryStatus};
pub use value::{QueryResult, Row, Value};

pub(crate) use value::{count_placeholders, render_placeholders};
