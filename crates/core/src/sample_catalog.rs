use std::collections::HashMap;

use crate::markup::escape_html;
use crate::models::SampleQuery;

/// Bucket for sample queries whose category is missing or blank.
pub const DEFAULT_CATEGORY: &str = "Other";
pub const QUERY_PLACEHOLDER: &str = "Enter your query...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub category: String,
    pub items: Vec<SampleQuery>,
}

#[must_use]
pub fn category_key(query: &SampleQuery) -> &str {
    query
        .category
        .as_deref()
        .filter(|category| !category.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Groups queries by category. Groups come back in first-seen order and
/// each group keeps the input order of its items.
#[must_use]
pub fn ingest(queries: &[SampleQuery]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index_by_category: HashMap<&str, usize> = HashMap::new();

    for query in queries {
        let key = category_key(query);
        let slot = *index_by_category.entry(key).or_insert_with(|| {
            groups.push(CategoryGroup {
                category: key.to_string(),
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(query.clone());
    }

    groups
}

#[must_use]
pub fn initial_query_text(queries: &[SampleQuery]) -> &str {
    queries
        .first()
        .map_or(QUERY_PLACEHOLDER, |query| query.query.as_str())
}

/// Session-wide view over the most recent sample-query ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleQueryCatalog {
    groups: Vec<CategoryGroup>,
    initial_text: String,
}

impl Default for SampleQueryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleQueryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            initial_text: QUERY_PLACEHOLDER.to_string(),
        }
    }

    #[must_use]
    pub fn from_queries(queries: &[SampleQuery]) -> Self {
        Self {
            groups: ingest(queries),
            initial_text: initial_query_text(queries).to_string(),
        }
    }

    /// Replaces the catalog contents; a re-run with the same input yields the same groups.
    pub fn replace(&mut self, queries: &[SampleQuery]) {
        *self = Self::from_queries(queries);
    }

    #[must_use]
    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    #[must_use]
    pub fn initial_query_text(&self) -> &str {
        &self.initial_text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.items.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Looks up a query by its position in the flattened, grouped listing.
    #[must_use]
    pub fn get(&self, flat_index: usize) -> Option<&SampleQuery> {
        self.groups
            .iter()
            .flat_map(|group| group.items.iter())
            .nth(flat_index)
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for group in &self.groups {
            html.push_str(&format!(
                "<div class=\"query-category-header\">{}</div>",
                escape_html(&group.category)
            ));
            for item in &group.items {
                let query = escape_html(&item.query);
                html.push_str(&format!(
                    "<div class=\"sample-query\" data-query=\"{query}\">\
                     <div class=\"sample-query-title\">{}</div>\
                     <div class=\"sample-query-code\">{query}</div></div>",
                    escape_html(&item.title)
                ));
            }
        }
        html
    }
}
