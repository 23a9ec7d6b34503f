//! Response validation for the validated profile.

use serde_json::Value;
use std::time::Duration;

use super::ProbeResponse;

/// Value the burn endpoint reports in `status` once it has done its work.
pub const BURNED_STATUS: &str = "burned";

#[derive(Debug, Clone, Copy)]
pub struct CheckLimits {
    /// Probe-reported duration must stay strictly below this.
    pub max_duration: Duration,
}

impl Default for CheckLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_millis(5000),
        }
    }
}

/// Result of the three independent response checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status_is_200: bool,
    pub duration_ok: bool,
    pub has_burned_status: bool,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.status_is_200 && self.duration_ok && self.has_burned_status
    }

    /// Names of the checks that failed, for log fields.
    pub fn failures(&self) -> Vec<&'static str> {
        [
            (self.status_is_200, "status is 200"),
            (self.duration_ok, "duration under limit"),
            (self.has_burned_status, "has burned status"),
        ]
        .into_iter()
        .filter_map(|(ok, name)| (!ok).then_some(name))
        .collect()
    }
}

/// True when the body is JSON with `status == "burned"`. Anything else,
/// including malformed JSON, is simply `false`.
pub fn has_burned_status(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| parsed.get("status").and_then(Value::as_str).map(|s| s == BURNED_STATUS))
        .unwrap_or(false)
}

pub fn check_response(response: &ProbeResponse, limits: &CheckLimits) -> CheckOutcome {
    CheckOutcome {
        status_is_200: response.status == 200,
        duration_ok: response.duration < limits.max_duration,
        has_burned_status: has_burned_status(&response.body),
    }
}

/// First `max_chars` characters of a body, cut on a char boundary.
pub fn body_preview(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
