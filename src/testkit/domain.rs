//! Builders for domain primitives used across tests.

use crate::domain::{Notification, Payload, Response};

/// A minimal alert notification for the given token.
pub fn notification(token: &str) -> Notification {
    Notification::new(token, Payload::alert("test"))
}

/// `count` notifications with sequence-numbered tokens (`tok-0`, `tok-1`,
/// ...), handy for ordering assertions.
pub fn make_notifications(count: usize) -> Vec<Notification> {
    (0..count).map(|i| notification(&format!("tok-{i}"))).collect()
}

/// A 200 acknowledgement.
pub fn accepted() -> Response {
    Response::accepted(Some("mock-apns-id".to_string()))
}

/// A 503 the retry classifier accepts.
pub fn retriable() -> Response {
    Response {
        status: 503,
        reason: Some("ServiceUnavailable".to_string()),
        apns_id: None,
        timestamp: None,
    }
}

/// A 400 the retry classifier rejects.
pub fn terminal() -> Response {
    Response {
        status: 400,
        reason: Some("BadDeviceToken".to_string()),
        apns_id: None,
        timestamp: None,
    }
}
