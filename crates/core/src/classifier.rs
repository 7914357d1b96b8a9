use serde_json::Value;

use crate::models::{QueryResponse, TabularResult};

pub const ERROR_DISCRIMINATOR: &str = "ERROR";
pub const QUERY_ERROR_FALLBACK: &str = "An error occurred";

/// Interprets a raw `/sql/query` body. Never fails: every optional field is
/// defaulted, and anything that is not an `ERROR` envelope is a table.
#[must_use]
pub fn classify(raw: &Value) -> QueryResponse {
    let data = raw.get("data").filter(|data| data.is_object());

    if is_error_envelope(raw) {
        let error_message = data
            .and_then(|data| data.get("errorMessage"))
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .unwrap_or(QUERY_ERROR_FALLBACK)
            .to_string();
        return QueryResponse::Error { error_message };
    }

    let Some(data) = data else {
        return QueryResponse::Table(TabularResult::default());
    };

    QueryResponse::Table(TabularResult {
        columns: columns_of(data),
        rows: rows_of(data),
        count: non_negative(data.get("count")),
        exec_time_ms: non_negative(data.get("execTimeMs")),
    })
}

#[must_use]
pub fn is_error_envelope(raw: &Value) -> bool {
    raw.get("type").and_then(Value::as_str) == Some(ERROR_DISCRIMINATOR)
}

fn columns_of(data: &Value) -> Vec<String> {
    let Some(columns) = data.get("columns").and_then(Value::as_array) else {
        return Vec::new();
    };
    columns
        .iter()
        .map(|column| match column {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn rows_of(data: &Value) -> Vec<Vec<Value>> {
    let Some(rows) = data.get("rows").and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| row.as_array().cloned().unwrap_or_default())
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn non_negative(value: Option<&Value>) -> u64 {
    let Some(value) = value else {
        return 0;
    };
    if let Some(integer) = value.as_u64() {
        return integer;
    }
    match value.as_f64() {
        Some(float) if float.is_finite() && float > 0.0 => float as u64,
        _ => 0,
    }
}
