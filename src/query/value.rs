//! Bound values and result rows.
//!
//! 绑定值与结果行。

use bytes::Bytes;
use std::fmt;

/// A value bound to a positional `?` placeholder or returned in a row.
///
/// 绑定到位置占位符 `?` 或在结果行中返回的值。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),
}

impl Value {
    /// Renders the value as a SQL literal. Only used for debug output, never
    /// for execution.
    ///
    /// 将值渲染为SQL字面量。仅用于调试输出，从不用于执行。
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("x'{hex}'")
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A single result row.
/// 单个结果行。
pub type Row = Vec<Value>;

/// What a driver hands back for one executed statement.
///
/// 驱动为一条已执行语句返回的结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows returned by the statement, empty for writes.
    /// 语句返回的行，写操作为空。
    pub rows: Vec<Row>,
    /// Rows changed by a write statement.
    /// 写语句影响的行数。
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            rows_affected: 0,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Counts the `?` placeholders outside of single quoted literals.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}

/// Substitutes placeholders with literal renderings of `values`, in order.
/// Placeholders without a matching value are left untouched.
///
/// 按顺序用 `values` 的字面量替换占位符。没有对应值的占位符保持不变。
pub(crate) fn render_placeholders(sql: &str, values: &[Value]) -> String {
    let mut rendered = String::with_capacity(sql.len());
    let mut remaining = values.iter();
    let mut in_literal = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                rendered.push(c);
            }
            '?' if !in_literal => match remaining.next() {
                Some(value) => rendered.push_str(&value.to_sql_literal()),
                None => rendered.push(c),
            },
            _ => rendered.push(c),
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literals() {
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::from(42).to_sql_literal(), "42");
        assert_eq!(Value::from("O'Brien").to_sql_literal(), "'O''Brien'");
        assert_eq!(Value::from(Bytes::from_static(&[0xde, 0xad])).to_sql_literal(), "x'dead'");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_count_placeholders_skips_literals() {
        assert_eq!(count_placeholders("select 1"), 0);
        assert_eq!(count_placeholders("select * from t where a = ? and b = ?"), 2);
        assert_eq!(count_placeholders("select '?' from t where a = ?"), 1);
    }

    #[test]
    fn test_render_placeholders() {
        let sql = "update t set name = ? where id = ?";
        let rendered = render_placeholders(sql, &[Value::from("x"), Value::from(7)]);
        assert_eq!(rendered, "update t set name = 'x' where id = 7");

        // 缺少参数时保留占位符
        let partial = render_placeholders("select ?, ?", &[Value::from(1)]);
        assert_eq!(partial, "select 1, ?");
    }
}
