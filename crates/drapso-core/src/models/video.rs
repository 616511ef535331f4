//! Video records and the small records that hang off them.
//!
//! One fixed shape per record. Backend rows are mapped into these in
//! `row_ext` and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shortest accepted upload, in seconds.
pub const MIN_DURATION_SECS: f64 = 5.0;
/// Longest accepted upload, in seconds.
pub const MAX_DURATION_SECS: f64 = 180.0;

/// Avatar shown when an owner has none.
pub const DEFAULT_AVATAR: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=default";

/// The user a video (or comment) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl Owner {
    /// Placeholder owner when the backend returned only an id.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: "unknown".into(),
            avatar: None,
        }
    }

    pub fn avatar_or_default(&self) -> &str {
        self.avatar.as_deref().unwrap_or(DEFAULT_AVATAR)
    }
}

/// A published short video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub duration_secs: f64,
    pub owner: Owner,
    pub likes: u64,
    pub views: u64,
    pub comments: u64,
    pub has_affiliate: bool,
    pub affiliate_link: Option<String>,
    pub has_location: bool,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Video {
    pub fn owner_id(&self) -> &str {
        &self.owner.id
    }

    /// Maps search link for the location overlay, if the video has one.
    pub fn location_link(&self) -> Option<String> {
        if !self.has_location {
            return None;
        }
        let query = self.location.as_deref().unwrap_or("");
        Some(format!(
            "https://www.google.com/maps/search/?api=1&query={}",
            encode_query(query)
        ))
    }
}

/// Record sent to the backend when an upload is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVideo {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub duration: f64,
    pub has_affiliate: bool,
    pub affiliate_link: Option<String>,
    pub has_location: bool,
    pub location: Option<String>,
}

/// Affiliate product shown in a video's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub video_id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub product_url: String,
    pub image_url: String,
}

/// Product entered in the upload form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    pub text: String,
    pub author: Owner,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Follow,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// Recipient.
    pub user_id: String,
    pub actor: Owner,
    pub kind: NotificationKind,
    pub video_id: Option<String>,
    pub comment_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn encode_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::video;

    #[test]
    fn location_link_encodes_query() {
        let mut v = video("a");
        v.has_location = true;
        v.location = Some("Café de Flore, Paris".into());
        assert_eq!(
            v.location_link().unwrap(),
            "https://www.google.com/maps/search/?api=1&query=Caf%C3%A9%20de%20Flore%2C%20Paris"
        );
    }

    #[test]
    fn location_link_absent_without_flag() {
        let mut v = video("a");
        v.location = Some("Paris".into());
        assert!(v.location_link().is_none());
    }

    #[test]
    fn unknown_owner_uses_default_avatar() {
        assert_eq!(Owner::unknown("u1").avatar_or_default(), DEFAULT_AVATAR);
    }
}
