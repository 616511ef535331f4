//! Drapso path conventions over 9S.
//!
//! Local settings and session live under `/drapso/settings` and
//! `/drapso/session`. The offline backend keeps its tables under
//! `/drapso/db` and object storage under `/drapso/storage`.

// ---------------------------------------------------------------------------
// Settings & session
// ---------------------------------------------------------------------------

pub const SETTINGS_THEME: &str = "/drapso/settings/theme";
pub const SETTINGS_GESTURE: &str = "/drapso/settings/gesture";

/// Cached identity of the signed-in viewer.
pub const SESSION_USER: &str = "/drapso/session/user";

// ---------------------------------------------------------------------------
// Effect outbox
// ---------------------------------------------------------------------------

pub const OUTBOX_MUTATION: &str = "/drapso/outbox/mutation";

// ---------------------------------------------------------------------------
// Offline backend tables
// ---------------------------------------------------------------------------

pub const VIDEOS_PREFIX: &str = "/drapso/db/videos";
pub const USERS_PREFIX: &str = "/drapso/db/users";
pub const LIKES_PREFIX: &str = "/drapso/db/likes";
pub const FOLLOWS_PREFIX: &str = "/drapso/db/follows";
pub const COMMENTS_PREFIX: &str = "/drapso/db/comments";
pub const PRODUCTS_PREFIX: &str = "/drapso/db/products";
pub const NOTIFICATIONS_PREFIX: &str = "/drapso/db/notifications";

pub fn video_path(id: &str) -> String {
    format!("{}/{}", VIDEOS_PREFIX, id)
}

pub fn user_path(id: &str) -> String {
    format!("{}/{}", USERS_PREFIX, id)
}

/// One flat row per (user, video) pair, so duplicate likes collapse.
pub fn like_path(video_id: &str, user_id: &str) -> String {
    format!("{}/{}@{}", LIKES_PREFIX, user_id, video_id)
}

pub fn follow_path(follower_id: &str, following_id: &str) -> String {
    format!("{}/{}@{}", FOLLOWS_PREFIX, follower_id, following_id)
}

pub fn comment_path(id: &str) -> String {
    format!("{}/{}", COMMENTS_PREFIX, id)
}

pub fn product_path(id: &str) -> String {
    format!("{}/{}", PRODUCTS_PREFIX, id)
}

pub fn notification_path(id: &str) -> String {
    format!("{}/{}", NOTIFICATIONS_PREFIX, id)
}

// ---------------------------------------------------------------------------
// Offline object storage
// ---------------------------------------------------------------------------

pub fn storage_path(bucket: &str, object: &str) -> String {
    format!("/drapso/storage/{}/{}", bucket, object)
}

/// Public URL handed out for objects in the offline store.
pub fn local_url(bucket: &str, object: &str) -> String {
    format!("local://{}/{}", bucket, object)
}

// ---------------------------------------------------------------------------
// Watch patterns
// ---------------------------------------------------------------------------

pub const WATCH_SETTINGS: &str = "/drapso/settings/**";
pub const WATCH_SESSION: &str = "/drapso/session/**";
pub const WATCH_NOTIFICATIONS: &str = "/drapso/db/notifications/**";
