//! C2: the predicate engine. A `Condition` is `(field, op, value, logic)`;
//! a `WHERE` clause is a left-to-right accumulated list of them.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Has,
}

impl Op {
    /// Parses a token, normalising `IS`→`==` and `NOT`→`!=` (§3, §4.2).
    /// Any other token is not a recognised operator (status 244).
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        match token {
            "==" | "IS" => Ok(Op::Eq),
            "!=" | "NOT" => Ok(Op::Ne),
            "<" => Ok(Op::Lt),
            "<=" => Ok(Op::Le),
            ">" => Ok(Op::Gt),
            ">=" => Ok(Op::Ge),
            "HAS" => Ok(Op::Has),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: String,
    /// `None` only for the first condition in a WHERE list.
    pub logic: Option<Logic>,
}

/// Dotted-path lookup: a missing segment at any point yields "absent".
pub(crate) fn resolve_path<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in field.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub(crate) fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn compare_numeric(resolved: f64, literal: f64, op: Op) -> Result<bool, QueryError> {
    match op {
        Op::Eq => Ok(resolved == literal),
        Op::Ne => Ok(resolved != literal),
        Op::Lt => Ok(resolved < literal),
        Op::Le => Ok(resolved <= literal),
        Op::Gt => Ok(resolved > literal),
        Op::Ge => Ok(resolved >= literal),
        Op::Has => Err(QueryError::PredicateFailure),
    }
}

fn compare_text(resolved: &str, literal: &str, op: Op) -> Result<bool, QueryError> {
    let ordering = resolved.cmp(literal);
    match op {
        Op::Eq => Ok(ordering == Ordering::Equal),
        Op::Ne => Ok(ordering != Ordering::Equal),
        Op::Lt => Ok(ordering == Ordering::Less),
        Op::Le => Ok(ordering != Ordering::Greater),
        Op::Gt => Ok(ordering == Ordering::Greater),
        Op::Ge => Ok(ordering != Ordering::Less),
        Op::Has => Err(QueryError::PredicateFailure),
    }
}

/// Evaluates a single `(field, op, value)` triple against `record`.
pub fn evaluate_one(record: &Value, cond: &Condition) -> Result<bool, QueryError> {
    let Some(resolved) = resolve_path(record, &cond.field) else {
        return Ok(false);
    };
    if resolved.is_null() {
        return Ok(false);
    }

    if let Ok(literal_num) = cond.value.parse::<f64>() {
        if let Some(resolved_num) = resolved.as_f64() {
            return compare_numeric(resolved_num, literal_num, cond.op);
        }
    }

    if cond.op == Op::Has {
        return match resolved.as_array() {
            Some(items) => Ok(items.iter().any(|item| canonical_text(item) == cond.value)),
            None => Err(QueryError::PredicateFailure),
        };
    }

    let resolved_text = canonical_text(resolved);
    compare_text(&resolved_text, &cond.value, cond.op)
}

/// Evaluates a left-to-right accumulated WHERE list. Empty list is
/// vacuously true. Implements the combinator strictly as
/// `accumulator ← accumulator OP predicate(i)` (§9, fixing the source's
/// evaluator-ordering bug).
pub fn evaluate_all(record: &Value, conditions: &[Condition]) -> Result<bool, QueryError> {
    let Some((first, rest)) = conditions.split_first() else {
        return Ok(true);
    };
    let mut accumulator = evaluate_one(record, first)?;
    for cond in rest {
        let current = evaluate_one(record, cond)?;
        accumulator = match cond.logic {
            Some(Logic::And) => accumulator && current,
            Some(Logic::Or) => accumulator || current,
            None => accumulator && current,
        };
    }
    Ok(accumulator)
}
