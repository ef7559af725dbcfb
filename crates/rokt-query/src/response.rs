//! C6: the uniform `{status, reason, datas?}` response envelope.

use serde::Serialize;
use serde_json::Value;

/// Returns the canonical phrase for `code`, or `"Unknown Error"` for any
/// code not in the table (§4.6).
fn phrase_for(code: i32) -> &'static str {
    match code {
        0 => "OK",
        1 => "ERROR",
        2 => "Inserted",
        3 => "Can't get params / predicate failure",
        10 => "Already Exists",
        11 => "Bad file size format / invalid JSON in ADD",
        12 => "Bad file number format / missing required field",
        168 => "Config file not found",
        244 => "Operator not found",
        423 => "Cannot create file",
        457 => "Cannot delete files",
        503 => "Server overloaded",
        504 => "Request timeout",
        567 => "NULL / unknown dataset",
        _ => "Unknown Error",
    }
}

/// A complete, owned reply. Constructed once and handed to the socket
/// layer for serialisation — never shared or returned by pointer
/// (§9 "Pointer-owned response objects").
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: i32,
    reason: String,
    datas: Option<Value>,
}

impl Response {
    /// Negative codes are coerced to 1 (§4.6, §7).
    pub fn new(status: i32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if status < 0 {
            return Self {
                status: 1,
                reason: "Invalid negative code corrected to ERROR".to_string(),
                datas: None,
            };
        }
        let reason = if reason.is_empty() {
            phrase_for(status).to_string()
        } else {
            reason
        };
        Self {
            status,
            reason,
            datas: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(0, "")
    }

    pub fn ok_with_reason(reason: impl Into<String>) -> Self {
        Self::new(0, reason)
    }

    /// `datas` is only ever emitted when `status == 0` (§4.6); attaching
    /// it on a non-OK response is silently dropped at serialisation.
    pub fn with_datas(mut self, datas: Value) -> Self {
        self.datas = Some(datas);
        self
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn from_code(code: i32) -> Self {
        Self::new(code, "")
    }
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let include_datas = self.status == 0 && self.datas.is_some();
        let len = if include_datas { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("reason", &self.reason)?;
        if include_datas {
            map.serialize_entry("datas", self.datas.as_ref().unwrap())?;
        }
        map.end()
    }
}
