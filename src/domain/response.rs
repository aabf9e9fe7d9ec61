//! APNs service response.

/// Outcome of one request/response exchange with APNs.
///
/// Carries enough status information for retry classification: the HTTP
/// status plus the `reason` string APNs returns in error bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code of the exchange.
    pub status: u16,
    /// APNs reason code from the error body, when present.
    pub reason: Option<String>,
    /// Canonical notification id assigned by APNs (`apns-id` header).
    pub apns_id: Option<String>,
    /// For 410 Unregistered: when APNs last confirmed the token was invalid.
    pub timestamp: Option<u64>,
}

/// Reason codes that indicate a transient service-side condition.
const RETRIABLE_REASONS: &[&str] = &[
    "TooManyRequests",
    "InternalServerError",
    "ServiceUnavailable",
    "Shutdown",
    "ExpiredProviderToken",
];

impl Response {
    /// A successful delivery acknowledgement.
    pub fn accepted(apns_id: Option<String>) -> Self {
        Self {
            status: 200,
            reason: None,
            apns_id,
            timestamp: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this outcome is worth another attempt. Throttling and
    /// service-side failures are; client errors (bad token, bad payload)
    /// are not.
    pub fn is_retriable(&self) -> bool {
        if self.is_success() {
            return false;
        }
        if self.status == 429 || self.status >= 500 {
            return true;
        }
        self.reason
            .as_deref()
            .is_some_and(|r| RETRIABLE_REASONS.contains(&r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(status: u16) -> Response {
        Response {
            status,
            reason: None,
            apns_id: None,
            timestamp: None,
        }
    }

    #[test]
    fn accepted_is_success() {
        let r = Response::accepted(Some("id-1".to_string()));
        assert!(r.is_success());
        assert!(!r.is_retriable());
    }

    #[test]
    fn throttling_and_server_errors_are_retriable() {
        assert!(with_status(429).is_retriable());
        assert!(with_status(500).is_retriable());
        assert!(with_status(503).is_retriable());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert!(!with_status(400).is_retriable());
        assert!(!with_status(403).is_retriable());
        assert!(!with_status(410).is_retriable());
    }

    #[test]
    fn retriable_reason_overrides_client_status() {
        let r = Response {
            status: 403,
            reason: Some("ExpiredProviderToken".to_string()),
            apns_id: None,
            timestamp: None,
        };
        assert!(r.is_retriable());

        let terminal = Response {
            status: 400,
            reason: Some("BadDeviceToken".to_string()),
            apns_id: None,
            timestamp: None,
        };
        assert!(!terminal.is_retriable());
    }
}
