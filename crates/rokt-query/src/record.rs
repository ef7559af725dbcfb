//! C3: record-container helpers over a plain `&[Value]`. The predicate
//! engine (`condition.rs`) is used directly by executors for full WHERE
//! lists with AND/OR; these are the single-predicate/index primitives
//! from the container's original contract (§4.3).

use serde_json::Value;

use crate::condition::{evaluate_one, Condition};
use crate::error::QueryError;

pub fn at(records: &[Value], index: usize) -> Result<&Value, QueryError> {
    records.get(index).ok_or(QueryError::Unrecognised)
}

pub fn head(records: &[Value], n: usize) -> &[Value] {
    &records[..n.min(records.len())]
}

pub fn last(records: &[Value]) -> Result<&Value, QueryError> {
    records.last().ok_or(QueryError::Unrecognised)
}

/// Legacy single-predicate filter, same comparison rules as the full
/// predicate engine.
pub fn where_single(records: &[Value], cond: &Condition) -> Result<Vec<Value>, QueryError> {
    records
        .iter()
        .filter_map(|record| match evaluate_one(record, cond) {
            Ok(true) => Some(Ok(record.clone())),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        })
        .collect()
}

/// Projection: the per-element value at `key`, skipping elements
/// without it.
pub fn project(records: &[Value], key: &str) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| record.get(key).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Op;

    #[test]
    fn head_clamps_to_length() {
        let records = vec![serde_json::json!(1), serde_json::json!(2)];
        assert_eq!(head(&records, 10).len(), 2);
        assert_eq!(head(&records, 1).len(), 1);
    }

    #[test]
    fn last_on_empty_fails() {
        let records: Vec<Value> = Vec::new();
        assert!(last(&records).is_err());
    }

    #[test]
    fn project_skips_rows_missing_key() {
        let records = vec![
            serde_json::json!({"name": "Alice"}),
            serde_json::json!({"age": 10}),
        ];
        assert_eq!(project(&records, "name"), vec![serde_json::json!("Alice")]);
    }

    #[test]
    fn where_single_filters_matching_rows() {
        let records = vec![
            serde_json::json!({"age": 10}),
            serde_json::json!({"age": 30}),
        ];
        let cond = Condition { field: "age".to_string(), op: Op::Gt, value: "20".to_string(), logic: None };
        assert_eq!(where_single(&records, &cond).unwrap(), vec![serde_json::json!({"age": 30})]);
    }
}
