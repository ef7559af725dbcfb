//! C7: the hand-written, whitespace-separated command parser (§4.7).
//!
//! One tokeniser covers all eight verbs uniformly (§9 "Regex-based ADD
//! parser") — ADD's case-insensitive leading keyword is handled by
//! normalising the first token's case before dispatch, not by pulling in
//! a separate regex engine for one verb.

use serde_json::Value;

use crate::condition::{Condition, Logic, Op};
use crate::error::QueryError;

#[derive(Debug, Clone)]
pub enum Command {
    Create {
        name: String,
    },
    Delete {
        name: String,
    },
    Add {
        record: Value,
        unique: Option<String>,
        dataset: String,
    },
    Remove {
        conditions: Vec<Condition>,
        dataset: String,
    },
    Change {
        field: String,
        value: String,
        conditions: Vec<Condition>,
        dataset: String,
    },
    Empty {
        name: String,
    },
    Count {
        dataset: String,
        condition: Option<(String, String)>,
    },
    Get {
        field: String,
        alias: Option<String>,
        dataset: String,
        conditions: Vec<Condition>,
        group_by: Option<String>,
        order_by: Option<(String, bool)>,
        limit: Option<usize>,
    },
}

struct Tokens<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(tokens: Vec<&'a str>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<&'a str, QueryError> {
        let tok = self.tokens.get(self.pos).copied().ok_or(QueryError::Unrecognised)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, literal: &str) -> Result<(), QueryError> {
        if self.next()? == literal {
            Ok(())
        } else {
            Err(QueryError::Unrecognised)
        }
    }

    fn rest(&self) -> &[&'a str] {
        &self.tokens[self.pos..]
    }
}

fn strip_trailing_semicolon(input: &str) -> &str {
    input.trim().strip_suffix(';').unwrap_or(input.trim()).trim()
}

/// Finds a balanced `{...}` JSON object starting at `s`'s first `{`,
/// respecting quoted strings so braces inside string values don't
/// confuse the scan. Returns the object text and the byte offset just
/// past its closing brace.
fn extract_json_object(s: &str) -> Option<(&str, usize)> {
    let start = s.find('{')?;
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((&s[start..=i], i + 1));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn parse_where(cursor: &mut Tokens) -> Result<Vec<Condition>, QueryError> {
    let mut conditions = Vec::new();

    let field = cursor.next()?.to_string();
    let op = Op::parse(cursor.next()?)?;
    let value = cursor.next()?.to_string();
    conditions.push(Condition { field, op, value, logic: None });

    loop {
        match cursor.peek() {
            Some("AND") => {
                cursor.pos += 1;
                let field = cursor.next()?.to_string();
                let op = Op::parse(cursor.next()?)?;
                let value = cursor.next()?.to_string();
                conditions.push(Condition { field, op, value, logic: Some(Logic::And) });
            }
            Some("OR") => {
                cursor.pos += 1;
                let field = cursor.next()?.to_string();
                let op = Op::parse(cursor.next()?)?;
                let value = cursor.next()?.to_string();
                conditions.push(Condition { field, op, value, logic: Some(Logic::Or) });
            }
            _ => break,
        }
    }
    Ok(conditions)
}

/// Parses one complete command line into a [`Command`].
pub fn parse(input: &str) -> Result<Command, QueryError> {
    let stripped = strip_trailing_semicolon(input);

    let leading_keyword = stripped.split_whitespace().next().unwrap_or("");
    if leading_keyword.eq_ignore_ascii_case("add") {
        return parse_add(stripped);
    }

    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    let mut cursor = Tokens::new(tokens);
    let keyword = cursor.next().unwrap_or("");

    match keyword {
        "CREATE" => {
            cursor.expect("TABLE")?;
            let name = cursor.next()?.to_string();
            Ok(Command::Create { name })
        }
        "DELETE" => {
            let name = cursor.next()?.to_string();
            Ok(Command::Delete { name })
        }
        "EMPTY" => {
            let name = cursor.next()?.to_string();
            Ok(Command::Empty { name })
        }
        "REMOVE" => {
            let conditions = if cursor.peek() == Some("WHERE") {
                cursor.pos += 1;
                parse_where(&mut cursor)?
            } else {
                let value = cursor.next()?.to_string();
                vec![Condition {
                    field: "name".to_string(),
                    op: Op::Eq,
                    value,
                    logic: None,
                }]
            };
            cursor.expect("IN")?;
            let dataset = cursor.next()?.to_string();
            Ok(Command::Remove { conditions, dataset })
        }
        "CHANGE" => {
            let field = cursor.next()?.to_string();
            cursor.expect("=")?;
            let value = cursor.next()?.to_string();
            let conditions = if cursor.peek() == Some("WHERE") {
                cursor.pos += 1;
                parse_where(&mut cursor)?
            } else {
                Vec::new()
            };
            cursor.expect("IN")?;
            let dataset = cursor.next()?.to_string();
            Ok(Command::Change { field, value, conditions, dataset })
        }
        "COUNT" => {
            let dataset = cursor.next()?.to_string();
            let condition = match cursor.peek() {
                Some(tok) => {
                    let (key, value) = tok.split_once(':').ok_or(QueryError::Unrecognised)?;
                    cursor.pos += 1;
                    Some((key.to_string(), value.to_string()))
                }
                None => None,
            };
            Ok(Command::Count { dataset, condition })
        }
        "GET" => {
            let field = cursor.next()?.to_string();
            let alias = if cursor.peek() == Some("AS") {
                cursor.pos += 1;
                Some(cursor.next()?.to_string())
            } else {
                None
            };
            cursor.expect("IN")?;
            let dataset = cursor.next()?.to_string();

            let conditions = if cursor.peek() == Some("WHERE") {
                cursor.pos += 1;
                parse_where(&mut cursor)?
            } else {
                Vec::new()
            };

            let group_by = if cursor.peek() == Some("GROUP") {
                cursor.pos += 1;
                cursor.expect("BY")?;
                Some(cursor.next()?.to_string())
            } else {
                None
            };

            let order_by = if cursor.peek() == Some("ORDER") {
                cursor.pos += 1;
                cursor.expect("BY")?;
                let key = cursor.next()?.to_string();
                let descending = match cursor.peek() {
                    Some("DESC") => {
                        cursor.pos += 1;
                        true
                    }
                    Some("ASC") => {
                        cursor.pos += 1;
                        false
                    }
                    _ => false,
                };
                Some((key, descending))
            } else {
                None
            };

            let limit = if cursor.peek() == Some("LIMIT") {
                cursor.pos += 1;
                let raw = cursor.next()?;
                Some(raw.parse::<usize>().map_err(|_| QueryError::Unrecognised)?)
            } else {
                None
            };

            if !cursor.rest().is_empty() {
                return Err(QueryError::Unrecognised);
            }

            Ok(Command::Get { field, alias, dataset, conditions, group_by, order_by, limit })
        }
        _ => Err(QueryError::Unrecognised),
    }
}

fn parse_add(stripped: &str) -> Result<Command, QueryError> {
    let after_keyword = &stripped[stripped.find(char::is_whitespace).unwrap_or(stripped.len())..];
    let (json_text, offset_in_tail) =
        extract_json_object(after_keyword).ok_or(QueryError::InvalidJson)?;
    let record: Value = serde_json::from_str(json_text).map_err(|_| QueryError::InvalidJson)?;

    let remainder = after_keyword[offset_in_tail..].trim();
    let tokens: Vec<&str> = remainder.split_whitespace().collect();
    let mut cursor = Tokens::new(tokens);

    let unique = if cursor.peek() == Some("UNIQUE") {
        cursor.pos += 1;
        Some(cursor.next()?.to_string())
    } else {
        None
    };

    cursor.expect("IN")?;
    let dataset = cursor.next()?.to_string();

    Ok(Command::Add { record, unique, dataset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table() {
        match parse("CREATE TABLE users;").unwrap() {
            Command::Create { name } => assert_eq!(name, "users"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_delete() {
        match parse("DELETE users").unwrap() {
            Command::Delete { name } => assert_eq!(name, "users"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_add_with_unique_and_whitespace_inside_json() {
        match parse(r#"ADD {"id": 1, "name": "Alice"} UNIQUE id IN users;"#).unwrap() {
            Command::Add { record, unique, dataset } => {
                assert_eq!(record, serde_json::json!({"id": 1, "name": "Alice"}));
                assert_eq!(unique, Some("id".to_string()));
                assert_eq!(dataset, "users");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn add_is_case_insensitive_on_leading_keyword() {
        assert!(parse(r#"add {"id":1} IN users"#).is_ok());
        assert!(parse(r#"AdD {"id":1} IN users"#).is_ok());
    }

    #[test]
    fn add_without_unique() {
        match parse(r#"ADD {"id": 1} IN users"#).unwrap() {
            Command::Add { unique, .. } => assert_eq!(unique, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn add_rejects_malformed_json() {
        assert!(matches!(parse("ADD {not json} IN users"), Err(QueryError::InvalidJson)));
    }

    #[test]
    fn parses_bare_remove_as_name_equality() {
        match parse("REMOVE Alice IN users").unwrap() {
            Command::Remove { conditions, dataset } => {
                assert_eq!(dataset, "users");
                assert_eq!(conditions.len(), 1);
                assert_eq!(conditions[0].field, "name");
                assert_eq!(conditions[0].value, "Alice");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_remove_with_where_and_or() {
        match parse("REMOVE WHERE age < 10 OR age > 65 IN users").unwrap() {
            Command::Remove { conditions, .. } => assert_eq!(conditions.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_change_with_where() {
        match parse("CHANGE age = 40 WHERE name IS Alice IN users").unwrap() {
            Command::Change { field, value, conditions, dataset } => {
                assert_eq!(field, "age");
                assert_eq!(value, "40");
                assert_eq!(conditions.len(), 1);
                assert_eq!(dataset, "users");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_count_with_condition() {
        match parse("COUNT u details.age:30").unwrap() {
            Command::Count { dataset, condition } => {
                assert_eq!(dataset, "u");
                assert_eq!(condition, Some(("details.age".to_string(), "30".to_string())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_count_without_condition() {
        match parse("COUNT u").unwrap() {
            Command::Count { condition, .. } => assert_eq!(condition, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_get_with_full_clause_set() {
        match parse("GET * IN u WHERE age > 10 GROUP BY city ORDER BY age DESC LIMIT 5").unwrap() {
            Command::Get { field, dataset, conditions, group_by, order_by, limit, .. } => {
                assert_eq!(field, "*");
                assert_eq!(dataset, "u");
                assert_eq!(conditions.len(), 1);
                assert_eq!(group_by, Some("city".to_string()));
                assert_eq!(order_by, Some(("age".to_string(), true)));
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_get_with_alias() {
        match parse("GET name AS person_name IN u").unwrap() {
            Command::Get { alias, .. } => assert_eq!(alias, Some("person_name".to_string())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrecognised_command_is_an_error() {
        assert!(matches!(parse("FROBNICATE users"), Err(QueryError::Unrecognised)));
    }

    #[test]
    fn get_rejects_trailing_garbage() {
        assert!(matches!(parse("GET * IN u EXTRA"), Err(QueryError::Unrecognised)));
    }
}
