use crate::error::AppError;

/// Default replay window for the `X-Timestamp` header.
pub const DEFAULT_TIMESTAMP_TOLERANCE_MS: i64 = 5 * 60 * 1000;

/// Policy for the optional request timestamp.
#[derive(Clone, Copy, Debug)]
pub struct TimestampPolicy {
    pub required: bool,
    pub tolerance_ms: i64,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self {
            required: false,
            tolerance_ms: DEFAULT_TIMESTAMP_TOLERANCE_MS,
        }
    }
}

/// Validates an `X-Timestamp` header value (Unix milliseconds) against `now_ms`.
///
/// An absent header passes unless the policy makes it mandatory.
pub fn check_request_timestamp(
    header: Option<&str>,
    now_ms: i64,
    policy: TimestampPolicy,
) -> Result<(), AppError> {
    let raw = match header.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ if policy.required => {
            return Err(AppError::InvalidTimestamp(
                "X-Timestamp header is required".to_string(),
            ));
        }
        _ => return Ok(()),
    };

    let timestamp = raw
        .parse::<i64>()
        .ok()
        .filter(|timestamp| *timestamp >= 0)
        .ok_or_else(|| {
            AppError::InvalidTimestamp("X-Timestamp must be a Unix timestamp in milliseconds".to_string())
        })?;

    if timestamp > now_ms {
        return Err(AppError::InvalidTimestamp(
            "timestamp is in the future".to_string(),
        ));
    }

    let age_ms = now_ms.checked_sub(timestamp).unwrap_or(i64::MAX);
    if age_ms > policy.tolerance_ms {
        return Err(AppError::InvalidTimestamp(format!(
            "timestamp is older than {} seconds",
            policy.tolerance_ms / 1000
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn test_absent_header_is_allowed_by_default() {
        assert!(check_request_timestamp(None, NOW, TimestampPolicy::default()).is_ok());
        assert!(check_request_timestamp(Some(""), NOW, TimestampPolicy::default()).is_ok());
    }

    #[test]
    fn test_absent_header_rejected_when_required() {
        let policy = TimestampPolicy { required: true, ..TimestampPolicy::default() };
        let err = check_request_timestamp(None, NOW, policy).unwrap_err();
        assert_eq!(err.code(), "INVALID_TIMESTAMP");
    }

    #[test]
    fn test_fresh_timestamp_accepted() {
        let policy = TimestampPolicy::default();
        assert!(check_request_timestamp(Some(&NOW.to_string()), NOW, policy).is_ok());
        let edge = (NOW - DEFAULT_TIMESTAMP_TOLERANCE_MS).to_string();
        assert!(check_request_timestamp(Some(&edge), NOW, policy).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let stale = (NOW - DEFAULT_TIMESTAMP_TOLERANCE_MS - 1).to_string();
        let err = check_request_timestamp(Some(&stale), NOW, TimestampPolicy::default()).unwrap_err();
        assert!(err.to_string().contains("older than 300 seconds"));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let future = (NOW + 1).to_string();
        let err = check_request_timestamp(Some(&future), NOW, TimestampPolicy::default()).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let err = check_request_timestamp(Some("yesterday"), NOW, TimestampPolicy::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_TIMESTAMP");
    }

    #[test]
    fn test_negative_timestamps_rejected() {
        let policy = TimestampPolicy::default();
        for raw in ["-1", "-9223372036854775808"] {
            let err = check_request_timestamp(Some(raw), NOW, policy).unwrap_err();
            assert_eq!(err.code(), "INVALID_TIMESTAMP", "header: {}", raw);
        }
    }

    #[test]
    fn test_epoch_timestamp_is_stale() {
        let err = check_request_timestamp(Some("0"), NOW, TimestampPolicy::default()).unwrap_err();
        assert!(err.to_string().contains("older than"));
    }
}
