use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::row::{CustomDbRow, column_index};
use crate::types::RowValues;

/// A fully materialized result set from a read query
///
/// Rows keep the order the server produced them in.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index_cache: Arc::default(),
        }
    }

    /// Convenience constructor used by drivers and test doubles.
    #[must_use]
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(rows.len());
        result_set.set_column_names(Arc::new(column_names));
        for row in rows {
            result_set.add_row_values(row);
        }
        result_set
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Arc::new(column_index(&column_names));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let Some(column_names) = &self.column_names {
            self.results.push(CustomDbRow {
                column_names: column_names.clone(),
                rows: row_values,
                column_index_cache: self.column_index_cache.clone(),
            });
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Column names that appear more than once, in first-seen order.
    #[must_use]
    pub fn duplicate_columns(&self) -> Vec<&str> {
        let Some(names) = &self.column_names else {
            return Vec::new();
        };
        let mut dupes: Vec<&str> = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if self.column_index_cache.get(name) != Some(&i) && !dupes.contains(&name.as_str()) {
                dupes.push(name.as_str());
            }
        }
        dupes
    }

    /// JSON array of row objects, as sent over the bridge.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let dupes = self.duplicate_columns();
        if !dupes.is_empty() {
            tracing::warn!(
                columns = ?dupes,
                "result has repeated column names; JSON rows keep the last value for each"
            );
        }
        JsonValue::Array(self.results.iter().map(CustomDbRow::to_json).collect())
    }
}

/// Outcome of a write or DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateResult {
    #[serde(rename = "affectedRows")]
    pub affected_rows: u64,
}

impl UpdateResult {
    #[must_use]
    pub fn new(affected_rows: u64) -> Self {
        Self { affected_rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> ResultSet {
        ResultSet::from_rows(
            vec!["id".into(), "name".into()],
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Text("b".into())],
            ],
        )
    }

    #[test]
    fn rows_serialize_in_result_order() {
        assert_eq!(
            fixture().to_json(),
            json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
        );
    }

    #[test]
    fn lookup_by_name_and_index() {
        let rs = fixture();
        assert_eq!(rs.len(), 2);
        let row = &rs.results[1];
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("b"));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(2)));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn repeated_columns_stay_positional_but_json_keeps_last() {
        let rs = ResultSet::from_rows(
            vec!["id".into(), "name".into(), "id".into()],
            vec![vec![
                RowValues::Int(1),
                RowValues::Text("a".into()),
                RowValues::Int(99),
            ]],
        );
        assert_eq!(rs.duplicate_columns(), vec!["id"]);

        let row = &rs.results[0];
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert_eq!(row.get_by_index(2), Some(&RowValues::Int(99)));

        let out = rs.to_json();
        assert_eq!(out, json!([{"id": 99, "name": "a"}]));
        let keys: Vec<&String> = out[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["id", "name"]);
    }

    #[test]
    fn rows_before_columns_are_dropped() {
        let mut rs = ResultSet::with_capacity(1);
        rs.add_row_values(vec![RowValues::Null]);
        assert!(rs.is_empty());
        assert_eq!(rs.to_json(), json!([]));
    }

    #[test]
    fn update_result_wire_shape() {
        let out = serde_json::to_value(UpdateResult::new(3)).unwrap();
        assert_eq!(out, json!({"affectedRows": 3}));
    }
}
