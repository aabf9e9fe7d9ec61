//! APNs JSON payload model.
//!
//! Serializes to the wire shape APNs expects: an `aps` dictionary with the
//! standard keys, plus any custom keys flattened into the top level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alert content shown to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<String>,
    #[serde(
        rename = "content-available",
        skip_serializing_if = "Option::is_none"
    )]
    content_available: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(rename = "thread-id", skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

/// The JSON body of one push notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    aps: Aps,
    #[serde(flatten)]
    custom: Map<String, Value>,
}

impl Payload {
    /// A visible alert with the given body text.
    pub fn alert(body: impl Into<String>) -> Self {
        Self {
            aps: Aps {
                alert: Some(Alert {
                    body: Some(body.into()),
                    ..Alert::default()
                }),
                ..Aps::default()
            },
            custom: Map::new(),
        }
    }

    /// A silent background-refresh payload (`content-available: 1`).
    pub fn background() -> Self {
        Self {
            aps: Aps {
                content_available: Some(1),
                ..Aps::default()
            },
            custom: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.aps.alert.get_or_insert_with(Alert::default).title = Some(title.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.aps.alert.get_or_insert_with(Alert::default).subtitle = Some(subtitle.into());
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.aps.category = Some(category.into());
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.aps.thread_id = Some(thread_id.into());
        self
    }

    /// Attach a custom top-level key next to the `aps` dictionary.
    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alert_payload_wire_shape() {
        let p = Payload::alert("Hello").with_title("Greeting").with_badge(3);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            json!({
                "aps": {
                    "alert": { "title": "Greeting", "body": "Hello" },
                    "badge": 3
                }
            })
        );
    }

    #[test]
    fn background_payload_wire_shape() {
        let v = serde_json::to_value(Payload::background()).unwrap();
        assert_eq!(v, json!({ "aps": { "content-available": 1 } }));
    }

    #[test]
    fn custom_keys_flatten_to_top_level() {
        let p = Payload::alert("hi").with_custom("match_id", json!(42));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["match_id"], json!(42));
        assert!(v["aps"]["alert"]["body"].is_string());
    }

    #[test]
    fn round_trips_through_json() {
        let p = Payload::alert("hi")
            .with_sound("default")
            .with_thread_id("chat-7")
            .with_custom("k", json!("v"));
        let back: Payload = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
    }
}
