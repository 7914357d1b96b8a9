use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A predefined example statement delivered by the health call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SampleQuery {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl SampleQuery {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        query: impl Into<String>,
        category: Option<&str>,
    ) -> Self {
        Self {
            title: title.into(),
            query: query.into(),
            category: category.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sample_queries: Vec<SampleQuery>,
    #[serde(default)]
    pub table_names: Vec<String>,
}

impl HealthReport {
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Reads the `data` field of a health envelope. Anything missing or
    /// malformed collapses to the disconnected report.
    #[must_use]
    pub fn from_envelope(raw: &Value) -> Self {
        match raw.get("data") {
            Some(data) if data.is_object() => {
                serde_json::from_value(data.clone()).unwrap_or_else(|_| Self::lenient(data))
            }
            _ => Self::disconnected(),
        }
    }

    fn lenient(data: &Value) -> Self {
        let sample_queries = data
            .get("sampleQueries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let table_names = data
            .get("tableNames")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            connected: data
                .get("connected")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            message: data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            sample_queries,
            table_names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub count: u64,
    pub exec_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Table(TabularResult),
    Error { error_message: String },
}

impl QueryResponse {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
