//! C7 executor semantics: one function per verb, dispatched from a
//! keyword table (§9 "Handler chain") rather than a chain of
//! responsibility. The single entry point, [`execute`], is the seam
//! where every internal error becomes a response envelope — nothing
//! upstream of it ever sees a `QueryError` (§7).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rokt_storage::{Catalog, DatasetType};
use serde_json::Value;

use crate::condition::{canonical_text, evaluate_all, resolve_path};
use crate::error::QueryError;
use crate::parser::{self, Command};
use crate::record;
use crate::response::Response;

/// Parses and runs one request against `catalog`. Never panics on
/// malformed input; always returns a complete envelope.
pub fn execute(catalog: &Catalog, request: &str) -> Response {
    match run(catalog, request) {
        Ok(response) => response,
        Err(err) => response_for_error(&err),
    }
}

fn run(catalog: &Catalog, request: &str) -> Result<Response, QueryError> {
    let command = parser::parse(request)?;
    match command {
        Command::Create { name } => {
            catalog.create(&name, DatasetType::Simple, &[])?;
            Ok(Response::ok())
        }
        Command::Delete { name } => {
            catalog.drop_dataset(&name)?;
            Ok(Response::ok())
        }
        Command::Add { record, unique, dataset } => execute_add(catalog, record, unique, dataset),
        Command::Remove { conditions, dataset } => execute_remove(catalog, conditions, dataset),
        Command::Change { field, value, conditions, dataset } => {
            execute_change(catalog, field, value, conditions, dataset)
        }
        Command::Empty { name } => {
            let ds = catalog.from(&name)?;
            ds.overwrite(&[])?;
            Ok(Response::ok_with_reason("OK, table vide"))
        }
        Command::Count { dataset, condition } => execute_count(catalog, dataset, condition),
        Command::Get { field, alias, dataset, conditions, group_by, order_by, limit } => {
            execute_get(catalog, field, alias, dataset, conditions, group_by, order_by, limit)
        }
    }
}

fn execute_add(
    catalog: &Catalog,
    record: Value,
    unique: Option<String>,
    dataset: String,
) -> Result<Response, QueryError> {
    let ds = catalog.from(&dataset)?;
    if let Some(field) = &unique {
        let new_value = record
            .get(field)
            .ok_or_else(|| QueryError::MissingField(field.clone()))?;
        let existing = ds.read_all()?;
        if existing.iter().any(|row| row.get(field) == Some(new_value)) {
            return Err(QueryError::AlreadyExists(dataset));
        }
    }
    ds.insert(record)?;
    Ok(Response::new(2, ""))
}

fn execute_remove(
    catalog: &Catalog,
    conditions: Vec<crate::condition::Condition>,
    dataset: String,
) -> Result<Response, QueryError> {
    let ds = catalog.from(&dataset)?;
    let rows = ds.read_all()?;
    let mut kept = Vec::with_capacity(rows.len());
    let mut removed = 0usize;
    for row in rows {
        if evaluate_all(&row, &conditions)? {
            removed += 1;
        } else {
            kept.push(row);
        }
    }
    ds.overwrite(&kept)?;
    Ok(Response::ok_with_reason(format!("OK, supprimé {removed} ligne(s).")))
}

fn execute_change(
    catalog: &Catalog,
    field: String,
    value: String,
    conditions: Vec<crate::condition::Condition>,
    dataset: String,
) -> Result<Response, QueryError> {
    let ds = catalog.from(&dataset)?;
    let mut rows = ds.read_all()?;
    let mut changed = 0usize;
    for row in &mut rows {
        if evaluate_all(row, &conditions)? {
            if let Value::Object(map) = row {
                map.insert(field.clone(), Value::String(value.clone()));
            }
            changed += 1;
        }
    }
    ds.overwrite(&rows)?;
    Ok(Response::ok_with_reason(format!("OK, mis à jour {changed} ligne(s).")))
}

fn execute_count(
    catalog: &Catalog,
    dataset: String,
    condition: Option<(String, String)>,
) -> Result<Response, QueryError> {
    let ds = catalog.from(&dataset)?;
    let rows = ds.read_all()?;
    let count = match condition {
        None => rows.len(),
        Some((key, expected)) => rows
            .iter()
            .filter(|row| resolve_path(row, &key).map(canonical_text).as_deref() == Some(expected.as_str()))
            .count(),
    };
    Ok(Response::ok().with_datas(serde_json::json!({ "count": count })))
}

#[allow(clippy::too_many_arguments)]
fn execute_get(
    catalog: &Catalog,
    field: String,
    alias: Option<String>,
    dataset: String,
    conditions: Vec<crate::condition::Condition>,
    group_by: Option<String>,
    order_by: Option<(String, bool)>,
    limit: Option<usize>,
) -> Result<Response, QueryError> {
    let ds = catalog.from(&dataset)?;
    let mut rows = ds.read_all()?;

    let used_extra =
        !conditions.is_empty() || group_by.is_some() || order_by.is_some() || limit.is_some() || alias.is_some();

    if !conditions.is_empty() {
        let mut filtered = Vec::with_capacity(rows.len());
        for row in rows {
            if evaluate_all(&row, &conditions)? {
                filtered.push(row);
            }
        }
        rows = filtered;
    }

    if let Some(key) = &group_by {
        let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for row in rows {
            let group_key = resolve_path(&row, key)
                .map(canonical_text)
                .unwrap_or_else(|| "undefined".to_string());
            groups.entry(group_key).or_default().push(row);
        }
        let grouped = serde_json::to_value(groups).expect("BTreeMap<String, Vec<Value>> always serialises");
        return Ok(wrap_result(grouped, None, used_extra));
    }

    let mut ignored = 0usize;
    if let Some((key, descending)) = &order_by {
        let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(rows.len());
        for row in rows {
            match resolve_path(&row, key).cloned() {
                Some(sort_key) => keyed.push((sort_key, row)),
                None => ignored += 1,
            }
        }
        keyed.sort_by(|(a, _), (b, _)| compare_order_keys(a, b));
        if *descending {
            keyed.reverse();
        }
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    if let Some(n) = limit {
        rows = record::head(&rows, n).to_vec();
    }

    let projected: Vec<Value> = if field == "*" {
        rows
    } else {
        record::project(&rows, &field)
    };

    let final_value = match &alias {
        Some(alias_name) => Value::Array(
            projected
                .into_iter()
                .map(|v| serde_json::json!({ alias_name.clone(): v }))
                .collect(),
        ),
        None => Value::Array(projected),
    };

    let ignored = (order_by.is_some() && ignored > 0).then_some(ignored);
    Ok(wrap_result(final_value, ignored, used_extra))
}

fn compare_order_keys(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => canonical_text(a).cmp(&canonical_text(b)),
    }
}

fn wrap_result(value: Value, ignored: Option<usize>, used_extra: bool) -> Response {
    if !used_extra {
        return Response::ok().with_datas(value);
    }
    let mut obj = serde_json::Map::new();
    obj.insert("result".to_string(), value);
    if let Some(n) = ignored {
        obj.insert("ignored".to_string(), serde_json::json!(n));
    }
    Response::ok().with_datas(Value::Object(obj))
}

fn response_for_error(err: &QueryError) -> Response {
    let reason = match err {
        QueryError::InvalidJson => "JSON invalide".to_string(),
        QueryError::Unrecognised => "Commande non reconnue".to_string(),
        _ => String::new(),
    };
    Response::new(err.status_code(), reason)
}
