//! Priority derivation for the C8 work queue (§4.8): a pure function of
//! the leading keyword, kept here so `rokt-server` never has to parse a
//! command to schedule it.

/// Returns the priority for the first whitespace-delimited token of a
/// request line. Unrecognised keywords get the lowest priority so they
/// don't starve real work while still being served.
pub fn priority_for_keyword(keyword: &str) -> u8 {
    match keyword.to_ascii_uppercase().as_str() {
        "CREATE" | "DELETE" => 10,
        "ADD" | "REMOVE" | "CHANGE" => 5,
        "GET" | "COUNT" | "EMPTY" => 1,
        _ => 0,
    }
}
