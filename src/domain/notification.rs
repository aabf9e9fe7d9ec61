//! A single push request bound for one device.

use std::fmt;

use crate::domain::Payload;

/// Hex-encoded APNs device token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery priority, mapped onto the `apns-priority` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Deliver immediately (priority 10).
    High,
    /// Deliver at a time that conserves power (priority 5).
    Normal,
}

impl Priority {
    pub fn header_value(self) -> &'static str {
        match self {
            Self::High => "10",
            Self::Normal => "5",
        }
    }
}

/// One push notification plus its delivery attempt counter.
///
/// The attempt counter starts at zero and is bumped each time the request
/// is re-injected through the retry path.
#[derive(Debug, Clone)]
pub struct Notification {
    device_token: DeviceToken,
    payload: Payload,
    topic: Option<String>,
    priority: Option<Priority>,
    collapse_id: Option<String>,
    /// UNIX timestamp after which APNs stops trying to deliver.
    expiration: Option<u64>,
    attempts: u32,
}

impl Notification {
    pub fn new(device_token: impl Into<DeviceToken>, payload: Payload) -> Self {
        Self {
            device_token: device_token.into(),
            payload,
            topic: None,
            priority: None,
            collapse_id: None,
            expiration: None,
            attempts: 0,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_collapse_id(mut self, id: impl Into<String>) -> Self {
        self.collapse_id = Some(id.into());
        self
    }

    pub fn with_expiration(mut self, epoch_secs: u64) -> Self {
        self.expiration = Some(epoch_secs);
        self
    }

    pub fn device_token(&self) -> &DeviceToken {
        &self.device_token
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn collapse_id(&self) -> Option<&str> {
        self.collapse_id.as_deref()
    }

    pub fn expiration(&self) -> Option<u64> {
        self.expiration
    }

    /// How many times this notification has been re-injected for retry.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn bump_attempts(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Rough wire size of this notification in bits, used for bandwidth
    /// accounting. Token and headers are a small constant next to the
    /// payload, so only the encoded payload is measured.
    pub(crate) fn approx_wire_bits(&self) -> u64 {
        let body = serde_json::to_vec(&self.payload).map(|b| b.len()).unwrap_or(0);
        (body as u64).saturating_mul(8)
    }
}
