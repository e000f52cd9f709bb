use chrono::{NaiveDate, NaiveDateTime};
use sqlx::Arguments;
use sqlx::mysql::MySqlArguments;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Packs values into MySQL bind arguments, in order.
pub fn to_arguments(values: &[SqlValue]) -> MySqlArguments {
    let mut args = MySqlArguments::default();
    for value in values {
        match value.clone() {
            SqlValue::String(v) => args.add(v),
            SqlValue::U64(v) => args.add(v),
            SqlValue::I64(v) => args.add(v),
            SqlValue::F64(v) => args.add(v),
            SqlValue::Date(v) => args.add(v),
            SqlValue::DateTime(v) => args.add(v),
            SqlValue::Null => args.add(None::<String>),
        }
    }
    args
}

/// ===============================
/// Dynamic UPDATE builder
/// ===============================
///
/// Columns come from code, never from request bodies, so the SET list is
/// always one of the fixed fields of the table.
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    assignments: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlUpdate {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Adds `column = ?` when `value` is present.
    pub fn set_if<T: Into<SqlValue>>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.set(column, v);
        }
        self
    }

    pub fn set<T: Into<SqlValue>>(&mut self, column: &'static str, value: T) -> &mut Self {
        self.assignments.push(format!("{column} = ?"));
        self.values.push(value.into());
        self
    }

    /// Adds a raw SQL expression with its own bind values, e.g. a computed column.
    pub fn set_expr(&mut self, column: &'static str, expr: &str, values: Vec<SqlValue>) -> &mut Self {
        self.assignments.push(format!("{column} = {expr}"));
        self.values.extend(values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// `UPDATE <table> SET ... WHERE id = ?` plus its bind values.
    pub fn build(mut self, id: u64) -> (String, Vec<SqlValue>) {
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table,
            self.assignments.join(", ")
        );
        self.values.push(SqlValue::U64(id));
        (sql, self.values)
    }
}

/// WHERE clause assembled from optional filters.
#[derive(Debug, Default)]
pub struct SqlFilter {
    conditions: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Into<SqlValue>>(&mut self, condition: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.conditions.push(condition.to_string());
            self.values.push(v.into());
        }
        self
    }

    /// `condition` containing several placeholders bound to the same value.
    pub fn push_repeated(&mut self, condition: &str, value: Option<SqlValue>) -> &mut Self {
        if let Some(v) = value {
            let placeholders = condition.matches('?').count();
            self.conditions.push(condition.to_string());
            self.values.extend(std::iter::repeat(v).take(placeholders));
        }
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}
