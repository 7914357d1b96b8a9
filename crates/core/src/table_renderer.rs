use serde_json::Value;

use crate::badge::TimingBadge;
use crate::markup::escape_html;
use crate::models::TabularResult;

pub const NO_RESULTS_TEXT: &str = "No results found.";
pub const NULL_CELL_TEXT: &str = "NULL";
pub const LOADING_TEXT: &str = "Executing query...";

/// Placeholder shown while a submission is in flight.
#[must_use]
pub fn loading_html() -> String {
    format!("<div class=\"loading\"></div> {LOADING_TEXT}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub header: Vec<String>,
    pub body: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedTable {
    NoResults,
    Table(TableView),
}

impl RenderedTable {
    #[must_use]
    pub fn to_html(&self) -> String {
        let view = match self {
            Self::NoResults => return format!("<p>{NO_RESULTS_TEXT}</p>"),
            Self::Table(view) => view,
        };

        let mut html = String::from("<div class=\"table-view\"><table><thead><tr>");
        for column in &view.header {
            html.push_str(&format!("<th>{}</th>", escape_html(column)));
        }
        html.push_str("</tr></thead><tbody>");
        for row in &view.body {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td>{}</td>", escape_html(cell)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table></div>");
        html
    }
}

/// Everything a results surface shows for a successful query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub table: RenderedTable,
    pub records_returned: u64,
    pub badge: TimingBadge,
}

impl RenderedResult {
    #[must_use]
    pub fn stats_html(&self) -> String {
        format!(
            "<h4>📈 Data Statistics</h4><p><strong>Records returned:</strong> {}</p>",
            self.records_returned
        )
    }
}

/// Builds the table body. Cells are positional against `columns`: short
/// rows are padded with empty cells and long rows are cut.
#[must_use]
pub fn render(columns: &[String], rows: &[Vec<Value>]) -> RenderedTable {
    if rows.is_empty() {
        return RenderedTable::NoResults;
    }

    let body = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|index| row.get(index).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    RenderedTable::Table(TableView {
        header: columns.to_vec(),
        body,
    })
}

#[must_use]
pub fn render_result(result: &TabularResult) -> RenderedResult {
    RenderedResult {
        table: render(&result.columns, &result.rows),
        records_returned: result.count,
        badge: TimingBadge::success(result.exec_time_ms),
    }
}

#[must_use]
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => NULL_CELL_TEXT.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
