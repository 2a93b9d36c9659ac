//! Quota detection for YouTube Data API responses
//!
//! The search endpoint signals a depleted daily quota with HTTP 403 and the
//! error reason `quotaExceeded`. Only that combination should rotate to the
//! next key; every other non-2xx response is a fault the caller must surface
//! rather than burn another key on.

/// Error reason the API uses for a depleted quota.
const QUOTA_REASON: &str = "quotaExceeded";

/// Whether a response signals quota exhaustion for the key that made it.
///
/// True iff the status is 403 and the body either contains the literal
/// `quotaExceeded` substring or carries it as a structured error reason
/// (`error.errors[].reason`). A 403 for any other reason (e.g. a disabled
/// API or a referrer restriction) is not a quota signal.
pub fn is_quota_exceeded(status: u16, body: &str) -> bool {
    if status != 403 {
        return false;
    }
    body.contains(QUOTA_REASON) || has_quota_reason(body)
}

/// Parse the structured error envelope and look for the quota reason.
fn has_quota_reason(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    value
        .get("error")
        .and_then(|e| e.get("errors"))
        .and_then(|e| e.as_array())
        .is_some_and(|errors| {
            errors
                .iter()
                .any(|e| e.get("reason").and_then(|r| r.as_str()) == Some(QUOTA_REASON))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_quota_reason_detected() {
        let body = r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#;
        assert!(is_quota_exceeded(403, body));
    }

    #[test]
    fn substring_in_plain_text_detected() {
        let body = "The request cannot be completed: quotaExceeded for this project";
        assert!(is_quota_exceeded(403, body));
    }

    #[test]
    fn forbidden_for_other_reason_is_not_quota() {
        let body = r#"{"error":{"errors":[{"reason":"accessNotConfigured"}]}}"#;
        assert!(!is_quota_exceeded(403, body));
    }

    #[test]
    fn quota_body_on_non_403_status_ignored() {
        let body = r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#;
        assert!(!is_quota_exceeded(429, body));
        assert!(!is_quota_exceeded(200, body));
        assert!(!is_quota_exceeded(500, body));
    }

    #[test]
    fn empty_body_is_not_quota() {
        assert!(!is_quota_exceeded(403, ""));
    }

    #[test]
    fn malformed_json_without_substring_is_not_quota() {
        assert!(!is_quota_exceeded(403, "not json {{{"));
    }

    #[test]
    fn reason_among_multiple_errors_detected() {
        let body = r#"{"error":{"errors":[{"reason":"backendError"},{"reason":"quotaExceeded"}],"code":403}}"#;
        assert!(is_quota_exceeded(403, body));
    }

    #[test]
    fn not_found_is_never_quota() {
        assert!(!is_quota_exceeded(404, "quota page not found"));
    }
}
