//! Typed values bound into queries.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tabula_core::{Column, ColumnType};
use tabula_error::{QueryError, QueryErrorKind, QueryResult};

/// A value coerced to its column's semantic type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// Text
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp without time zone
    DateTime(NaiveDateTime),
    /// JSON document
    Json(Value),
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn invalid(column: &Column, value: impl Into<String>) -> QueryError {
    QueryError::new(QueryErrorKind::InvalidLiteral {
        column: column.title().clone(),
        value: value.into(),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "checked" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl SqlValue {
    /// Coerces a filter literal to the column type.
    ///
    /// # Errors
    ///
    /// Returns [`QueryErrorKind::InvalidLiteral`] when the literal does not
    /// parse as the column type.
    pub fn from_literal(column: &Column, literal: &str) -> QueryResult<SqlValue> {
        let trimmed = literal.trim();
        match column.column_type() {
            ColumnType::Id | ColumnType::Number => trimmed
                .parse::<i64>()
                .map(SqlValue::Int)
                .or_else(|_| trimmed.parse::<f64>().map(SqlValue::Float))
                .map_err(|_| invalid(column, literal)),
            ColumnType::Decimal => trimmed
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| invalid(column, literal)),
            ColumnType::Checkbox => parse_bool(trimmed)
                .map(SqlValue::Bool)
                .ok_or_else(|| invalid(column, literal)),
            ColumnType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(SqlValue::Date)
                .or_else(|_| parse_date_time(trimmed).map(|dt| SqlValue::Date(dt.date())).ok_or(()))
                .map_err(|_| invalid(column, literal)),
            ColumnType::DateTime => parse_date_time(trimmed)
                .map(SqlValue::DateTime)
                .ok_or_else(|| invalid(column, literal)),
            ColumnType::Json | ColumnType::Attachment => serde_json::from_str(literal)
                .map(SqlValue::Json)
                .map_err(|_| invalid(column, literal)),
            _ => Ok(SqlValue::Text(literal.to_string())),
        }
    }

    /// Coerces a payload value to the column type.
    ///
    /// JSON `null` maps to [`SqlValue::Null`]. Strings go through
    /// [`SqlValue::from_literal`]; arrays are accepted for multi-select
    /// columns and stored comma separated.
    pub fn from_json(column: &Column, value: &Value) -> QueryResult<SqlValue> {
        let column_type = *column.column_type();
        match (column_type, value) {
            (_, Value::Null) => Ok(SqlValue::Null),
            (ColumnType::Json | ColumnType::Attachment, v) => Ok(SqlValue::Json(v.clone())),
            (_, Value::String(s)) => SqlValue::from_literal(column, s),
            (ColumnType::Checkbox, Value::Bool(b)) => Ok(SqlValue::Bool(*b)),
            (ColumnType::Checkbox, Value::Number(n)) => Ok(SqlValue::Bool(n.as_f64() != Some(0.0))),
            (ColumnType::Decimal, Value::Number(n)) => {
                n.as_f64().map(SqlValue::Float).ok_or_else(|| invalid(column, n.to_string()))
            }
            (ColumnType::Id | ColumnType::Number, Value::Number(n)) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float))
                .ok_or_else(|| invalid(column, n.to_string())),
            (ColumnType::MultiSelect, Value::Array(items)) => {
                let parts = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.trim().to_string()),
                        other => Err(invalid(column, other.to_string())),
                    })
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(SqlValue::Text(parts.join(",")))
            }
            (t, Value::Number(_) | Value::Bool(_)) if t.is_textual() || t == ColumnType::SingleSelect => {
                Ok(SqlValue::Text(value.to_string()))
            }
            (_, other) => Err(invalid(column, other.to_string())),
        }
    }

    /// JSON representation, as returned to clients.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            SqlValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            SqlValue::Json(v) => v.clone(),
        }
    }

    /// Whether the value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(ty: ColumnType) -> Column {
        Column::builder()
            .id("c1")
            .title("Field")
            .column_name("field")
            .column_type(ty)
            .build()
            .unwrap()
    }

    #[test]
    fn numeric_literals_coerce() {
        assert_eq!(SqlValue::from_literal(&column(ColumnType::Number), " 42 ").unwrap(), SqlValue::Int(42));
        assert_eq!(SqlValue::from_literal(&column(ColumnType::Number), "2.5").unwrap(), SqlValue::Float(2.5));
        assert_eq!(SqlValue::from_literal(&column(ColumnType::Decimal), "3").unwrap(), SqlValue::Float(3.0));
    }

    #[test]
    fn bad_literal_names_column() {
        let err = SqlValue::from_literal(&column(ColumnType::Number), "many").unwrap_err();
        assert_eq!(
            err.kind,
            QueryErrorKind::InvalidLiteral {
                column: "Field".into(),
                value: "many".into()
            }
        );
    }

    #[test]
    fn temporal_literals_coerce() {
        let date = SqlValue::from_literal(&column(ColumnType::Date), "2024-02-29").unwrap();
        assert_eq!(date, SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));

        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        for raw in ["2024-01-02 03:04:05", "2024-01-02T03:04:05", "2024-01-02T03:04:05Z"] {
            let value = SqlValue::from_literal(&column(ColumnType::DateTime), raw).unwrap();
            assert_eq!(value, SqlValue::DateTime(expected), "parsing {}", raw);
        }
        assert!(SqlValue::from_literal(&column(ColumnType::Date), "yesterday").is_err());
    }

    #[test]
    fn checkbox_accepts_common_spellings() {
        let col = column(ColumnType::Checkbox);
        assert_eq!(SqlValue::from_literal(&col, "TRUE").unwrap(), SqlValue::Bool(true));
        assert_eq!(SqlValue::from_json(&col, &json!(0)).unwrap(), SqlValue::Bool(false));
    }

    #[test]
    fn json_payloads_coerce_by_type() {
        assert_eq!(SqlValue::from_json(&column(ColumnType::Number), &json!(7)).unwrap(), SqlValue::Int(7));
        assert_eq!(SqlValue::from_json(&column(ColumnType::Text), &json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(
            SqlValue::from_json(&column(ColumnType::MultiSelect), &json!(["a", " b"])).unwrap(),
            SqlValue::Text("a,b".into())
        );
        assert_eq!(
            SqlValue::from_json(&column(ColumnType::Json), &json!({"k": 1})).unwrap(),
            SqlValue::Json(json!({"k": 1}))
        );
        assert!(SqlValue::from_json(&column(ColumnType::Number), &json!({"k": 1})).is_err());
    }
}
