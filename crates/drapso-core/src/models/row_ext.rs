//! Row normalization. Backend JSON becomes records here and nowhere else.
//!
//! Backend rows arrive as `serde_json::Value`. Relational embeds may come
//! back as an object, a one-element array, or not at all depending on the
//! select alias; that is resolved here so nothing downstream branches on
//! shape.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::profile::Profile;
use super::video::{Comment, Notification, NotificationKind, Owner, Product, Video};

/// Typed lenses over raw row JSON.
pub trait RowExt {
    fn str_field(&self, key: &str) -> Option<&str>;
    /// Non-empty string field.
    fn text_field(&self, key: &str) -> Option<&str>;
    /// Identifier stored as string or number.
    fn id_field(&self, key: &str) -> Option<String>;
    fn u64_field(&self, key: &str) -> u64;
    fn f64_field(&self, key: &str) -> f64;
    fn bool_field(&self, key: &str) -> bool;
    fn timestamp_field(&self, key: &str) -> DateTime<Utc>;
}

impl RowExt for Value {
    fn str_field(&self, key: &str) -> Option<&str> {
        self[key].as_str()
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self[key].as_str().filter(|s| !s.trim().is_empty())
    }

    fn id_field(&self, key: &str) -> Option<String> {
        match &self[key] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn u64_field(&self, key: &str) -> u64 {
        match &self[key] {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn f64_field(&self, key: &str) -> f64 {
        self[key].as_f64().unwrap_or(0.0)
    }

    fn bool_field(&self, key: &str) -> bool {
        self[key].as_bool().unwrap_or(false)
    }

    fn timestamp_field(&self, key: &str) -> DateTime<Utc> {
        match &self[key] {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_default(),
            _ => DateTime::default(),
        }
    }
}

/// Resolve an embedded relation under any of `keys` to a single object.
fn embedded<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match &row[*key] {
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    })
}

/// Owner from a user row, falling back to `fallback_id` when the row lacks one.
pub fn owner_from_row(row: &Value, fallback_id: &str) -> Owner {
    let id = row.id_field("id").unwrap_or_else(|| fallback_id.to_string());
    let username = row
        .text_field("username")
        .or_else(|| row.text_field("full_name"))
        .unwrap_or("unknown")
        .to_string();
    Owner {
        id,
        username,
        avatar: row.text_field("avatar").map(String::from),
    }
}

fn owner_of(row: &Value, embed_keys: &[&str], id_key: &str) -> Owner {
    let owner_id = row.id_field(id_key).unwrap_or_default();
    match embedded(row, embed_keys) {
        Some(user) => owner_from_row(user, &owner_id),
        None => Owner::unknown(&owner_id),
    }
}

/// Video from a `videos` row (optionally with an embedded `user`/`users`).
pub fn video_from_row(row: &Value) -> Option<Video> {
    let id = row.id_field("id")?;
    Some(Video {
        id,
        url: row.str_field("video_url").unwrap_or("").to_string(),
        title: row.str_field("title").unwrap_or("").to_string(),
        description: row.str_field("description").unwrap_or("").to_string(),
        duration_secs: row.f64_field("duration"),
        owner: owner_of(row, &["user", "users"], "user_id"),
        likes: row.u64_field("likes"),
        views: row.u64_field("views"),
        comments: row.u64_field("comments_count"),
        has_affiliate: row.bool_field("has_affiliate"),
        affiliate_link: row.text_field("affiliate_link").map(String::from),
        has_location: row.bool_field("has_location"),
        location: row.text_field("location").map(String::from),
        created_at: row.timestamp_field("created_at"),
    })
}

/// Normalize a list of rows, dropping any without an id.
pub fn videos_from_rows(rows: &Value) -> Vec<Video> {
    rows.as_array()
        .map(|arr| arr.iter().filter_map(video_from_row).collect())
        .unwrap_or_default()
}

pub fn profile_from_row(row: &Value) -> Option<Profile> {
    let id = row.id_field("id")?;
    let username = row.text_field("username").unwrap_or(&id).to_string();
    let display_name = row
        .text_field("full_name")
        .or_else(|| row.text_field("name"))
        .unwrap_or(&username)
        .to_string();
    Some(Profile {
        username,
        display_name,
        avatar: row.text_field("avatar").map(String::from),
        bio: row.str_field("bio").unwrap_or("").to_string(),
        follower_count: row.u64_field("follower_count"),
        following_count: row.u64_field("following_count"),
        id,
    })
}

pub fn comment_from_row(row: &Value) -> Option<Comment> {
    Some(Comment {
        id: row.id_field("id")?,
        video_id: row.id_field("video_id").unwrap_or_default(),
        user_id: row.id_field("user_id").unwrap_or_default(),
        text: row.str_field("comment_text").unwrap_or("").to_string(),
        author: owner_of(row, &["users", "user"], "user_id"),
        created_at: row.timestamp_field("created_at"),
    })
}

pub fn product_from_row(row: &Value) -> Option<Product> {
    Some(Product {
        id: row.id_field("id")?,
        video_id: row.id_field("video_id").unwrap_or_default(),
        name: row.str_field("name").unwrap_or("").to_string(),
        description: row.str_field("description").unwrap_or("").to_string(),
        price: row.str_field("price").unwrap_or("").to_string(),
        product_url: row.str_field("product_url").unwrap_or("").to_string(),
        image_url: row.str_field("image_url").unwrap_or("").to_string(),
    })
}

pub fn notification_from_row(row: &Value) -> Option<Notification> {
    let kind = match row.str_field("type")? {
        "like" => NotificationKind::Like,
        "follow" => NotificationKind::Follow,
        "comment" => NotificationKind::Comment,
        _ => return None,
    };
    Some(Notification {
        id: row.id_field("id")?,
        user_id: row.id_field("user_id").unwrap_or_default(),
        actor: owner_of(row, &["actor"], "actor_id"),
        kind,
        video_id: row.id_field("video_id"),
        comment_id: row.id_field("comment_id"),
        is_read: row.bool_field("is_read"),
        created_at: row.timestamp_field("created_at"),
    })
}

/// Map every row through `f`, skipping rows it rejects.
pub fn rows_into<T>(rows: &Value, f: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    rows.as_array()
        .map(|arr| arr.iter().filter_map(|r| f(r)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_row() -> Value {
        json!({
            "id": "v1",
            "video_url": "https://cdn.test/v1.mp4",
            "title": "Sunset",
            "description": "golden hour",
            "duration": 42.5,
            "user_id": "u1",
            "likes": 3,
            "views": 10,
            "has_affiliate": true,
            "affiliate_link": "https://shop.test/x",
            "has_location": false,
            "location": "",
            "created_at": "2024-05-01T10:00:00+00:00"
        })
    }

    #[test]
    fn owner_embedded_as_object() {
        let mut row = base_row();
        row["user"] = json!({"id": "u1", "username": "mira", "avatar": "a.png"});
        let v = video_from_row(&row).unwrap();
        assert_eq!(v.owner.username, "mira");
        assert_eq!(v.owner.avatar.as_deref(), Some("a.png"));
    }

    #[test]
    fn owner_embedded_as_array() {
        let mut row = base_row();
        row["users"] = json!([{"id": "u1", "username": "mira"}]);
        let v = video_from_row(&row).unwrap();
        assert_eq!(v.owner.id, "u1");
        assert_eq!(v.owner.username, "mira");
        assert!(v.owner.avatar.is_none());
    }

    #[test]
    fn owner_missing_falls_back_to_user_id() {
        let v = video_from_row(&base_row()).unwrap();
        assert_eq!(v.owner, Owner::unknown("u1"));
    }

    #[test]
    fn empty_strings_become_none() {
        let v = video_from_row(&base_row()).unwrap();
        assert!(v.location.is_none());
        assert_eq!(v.affiliate_link.as_deref(), Some("https://shop.test/x"));
    }

    #[test]
    fn numeric_ids_and_epoch_timestamps() {
        let row = json!({"id": 17, "user_id": 4, "created_at": 1_700_000_000_000i64});
        let v = video_from_row(&row).unwrap();
        assert_eq!(v.id, "17");
        assert_eq!(v.owner.id, "4");
        assert_eq!(v.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn row_without_id_is_dropped() {
        let rows = json!([base_row(), {"title": "orphan"}]);
        assert_eq!(videos_from_rows(&rows).len(), 1);
    }

    #[test]
    fn profile_display_name_falls_back() {
        let p = profile_from_row(&json!({"id": "u1", "username": "mira"})).unwrap();
        assert_eq!(p.display_name, "mira");
        let p = profile_from_row(&json!({"id": "u2", "full_name": "Mira K"})).unwrap();
        assert_eq!(p.username, "u2");
        assert_eq!(p.display_name, "Mira K");
    }

    #[test]
    fn notification_requires_known_type() {
        let row = json!({"id": "n1", "user_id": "u1", "actor_id": "u2", "type": "like"});
        let n = notification_from_row(&row).unwrap();
        assert_eq!(n.kind, NotificationKind::Like);
        assert_eq!(n.actor.id, "u2");
        assert!(notification_from_row(&json!({"id": "n2", "type": "poke"})).is_none());
    }
}
