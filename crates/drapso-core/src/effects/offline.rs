//! Offline backend over the local 9S store.
//!
//! Tables are flat scroll prefixes under `/drapso/db`, one row per scroll,
//! shaped like the hosted backend's rows so both go through the same
//! `row_ext` normalization. Deletes are tombstones (`metadata.deleted`) and
//! tombstoned rows are invisible to every read. Object storage keeps the
//! bytes base64-encoded under `/drapso/storage`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use nine_s_shell::Shell;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{Backend, BackendResult, NOTIFICATION_LIMIT};
use crate::error::BackendError;
use crate::models::row_ext::{
    comment_from_row, notification_from_row, product_from_row, profile_from_row, video_from_row,
};
use crate::models::{
    Comment, NewProduct, NewVideo, Notification, NotificationKind, Product, Profile, ProfileUpdate,
    RowExt, Video,
};
use crate::paths;

pub struct ScrollBackend {
    shell: Arc<Shell>,
    /// Serializes read-modify-write on counters and unique rows.
    write: Mutex<()>,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Newest first by `created_at`.
fn sort_newest(rows: &mut [Value]) {
    rows.sort_by(|a, b| b.timestamp_field("created_at").cmp(&a.timestamp_field("created_at")));
}

impl ScrollBackend {
    pub fn new(shell: Arc<Shell>) -> Self {
        Self {
            shell,
            write: Mutex::new(()),
        }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    fn row(&self, path: &str) -> BackendResult<Option<Value>> {
        Ok(self
            .shell
            .get(path)?
            .filter(|s| s.metadata.deleted != Some(true))
            .map(|s| s.data))
    }

    fn rows(&self, prefix: &str) -> BackendResult<Vec<Value>> {
        let mut out = Vec::new();
        for path in self.shell.all(prefix)? {
            if let Some(row) = self.row(&path)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn rows_where(&self, prefix: &str, key: &str, value: &str) -> BackendResult<Vec<Value>> {
        Ok(self
            .rows(prefix)?
            .into_iter()
            .filter(|r| r.id_field(key).as_deref() == Some(value))
            .collect())
    }

    /// Write a row, reviving it if a tombstone sits at `path`.
    fn write_row(&self, path: &str, data: Value) -> BackendResult<()> {
        match self.shell.get(path)? {
            Some(mut scroll) if scroll.metadata.deleted == Some(true) => {
                scroll.data = data;
                scroll.metadata.deleted = None;
                self.shell.put_scroll(scroll)?;
            }
            _ => {
                self.shell.put(path, data)?;
            }
        }
        Ok(())
    }

    /// Tombstone a row. Returns false if there was nothing live to delete.
    fn delete_row(&self, path: &str) -> BackendResult<bool> {
        match self.shell.get(path)? {
            Some(mut scroll) if scroll.metadata.deleted != Some(true) => {
                scroll.metadata.deleted = Some(true);
                self.shell.put_scroll(scroll)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Adjust a numeric field on a row. Counters never go below zero.
    fn bump(&self, path: &str, field: &str, delta: i64) -> BackendResult<()> {
        let mut row = self
            .row(path)?
            .ok_or_else(|| BackendError::NotFound(path.to_string()))?;
        let current = row.u64_field(field);
        let next = if delta >= 0 {
            current.saturating_add(delta as u64)
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        row[field] = next.into();
        self.shell.put(path, row)?;
        Ok(())
    }

    /// `bump` on a row that may not exist. Only a missing row is ignored.
    fn bump_if_present(&self, path: &str, field: &str, delta: i64) -> BackendResult<()> {
        match self.bump(path, field, delta) {
            Err(BackendError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    /// Tombstone every live row under `prefix` whose `key` matches.
    fn delete_where(&self, prefix: &str, key: &str, value: &str) -> BackendResult<()> {
        for path in self.shell.all(prefix)? {
            let matches = self
                .row(&path)?
                .is_some_and(|r| r.id_field(key).as_deref() == Some(value));
            if matches {
                self.delete_row(&path)?;
            }
        }
        Ok(())
    }

    /// Embed the user row under `key`, the way the hosted API joins it.
    fn embed_user(&self, mut row: Value, id_key: &str, key: &str) -> BackendResult<Value> {
        if let Some(uid) = row.id_field(id_key) {
            if let Some(user) = self.row(&paths::user_path(&uid))? {
                row[key] = user;
            }
        }
        Ok(row)
    }

    fn videos_where(&self, filter: Option<&str>) -> BackendResult<Vec<Video>> {
        let mut rows = match filter {
            Some(uid) => self.rows_where(paths::VIDEOS_PREFIX, "user_id", uid)?,
            None => self.rows(paths::VIDEOS_PREFIX)?,
        };
        sort_newest(&mut rows);
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(v) = video_from_row(&self.embed_user(row, "user_id", "users")?) {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Notify the owner of `video_id` about `actor_id`'s action, unless it
    /// is their own video.
    fn notify_owner(
        &self,
        video_id: &str,
        actor_id: &str,
        kind: NotificationKind,
        comment_id: Option<&str>,
    ) -> BackendResult<()> {
        let owner = match self.row(&paths::video_path(video_id))? {
            Some(v) => v.id_field("user_id"),
            None => None,
        };
        match owner {
            Some(owner) if owner != actor_id => {
                self.notify(&owner, actor_id, kind, Some(video_id), comment_id)
            }
            _ => Ok(()),
        }
    }

    fn notify(
        &self,
        recipient: &str,
        actor_id: &str,
        kind: NotificationKind,
        video_id: Option<&str>,
        comment_id: Option<&str>,
    ) -> BackendResult<()> {
        let id = new_id();
        let kind = serde_json::to_value(kind).unwrap_or(Value::Null);
        self.write_row(
            &paths::notification_path(&id),
            json!({
                "id": id,
                "user_id": recipient,
                "actor_id": actor_id,
                "type": kind,
                "video_id": video_id,
                "comment_id": comment_id,
                "is_read": false,
                "created_at": now_stamp(),
            }),
        )
    }
}

impl Backend for ScrollBackend {
    fn list_videos(&self) -> BackendResult<Vec<Video>> {
        self.videos_where(None)
    }

    fn user_videos(&self, user_id: &str) -> BackendResult<Vec<Video>> {
        self.videos_where(Some(user_id))
    }

    fn create_video(&self, video: &NewVideo) -> BackendResult<Video> {
        let id = new_id();
        let mut row = serde_json::to_value(video).map_err(|e| BackendError::Decode(e.to_string()))?;
        row["id"] = id.clone().into();
        row["likes"] = 0.into();
        row["views"] = 0.into();
        row["comments_count"] = 0.into();
        row["created_at"] = now_stamp().into();
        self.write_row(&paths::video_path(&id), row.clone())?;

        let row = self.embed_user(row, "user_id", "users")?;
        video_from_row(&row).ok_or_else(|| BackendError::Decode("video row".into()))
    }

    fn video(&self, video_id: &str) -> BackendResult<Option<Video>> {
        match self.row(&paths::video_path(video_id))? {
            Some(row) => Ok(video_from_row(&self.embed_user(row, "user_id", "users")?)),
            None => Ok(None),
        }
    }

    fn delete_video(&self, video_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        if !self.delete_row(&paths::video_path(video_id))? {
            return Err(BackendError::NotFound(format!("video {}", video_id)));
        }
        // Child rows go with the video, as the hosted schema cascades.
        self.delete_where(paths::LIKES_PREFIX, "video_id", video_id)?;
        self.delete_where(paths::COMMENTS_PREFIX, "video_id", video_id)?;
        self.delete_where(paths::PRODUCTS_PREFIX, "video_id", video_id)
    }

    fn store_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> BackendResult<String> {
        self.shell.put(
            &paths::storage_path(bucket, object),
            json!({
                "bucket": bucket,
                "object": object,
                "content_type": content_type,
                "size": bytes.len(),
                "data": STANDARD.encode(bytes),
            }),
        )?;
        Ok(paths::local_url(bucket, object))
    }

    fn like_video(&self, video_id: &str, user_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        let path = paths::like_path(video_id, user_id);
        if self.row(&path)?.is_some() {
            return Err(BackendError::Conflict(format!("like {}", video_id)));
        }
        self.write_row(
            &path,
            json!({
                "id": new_id(),
                "video_id": video_id,
                "user_id": user_id,
                "created_at": now_stamp(),
            }),
        )?;
        self.bump(&paths::video_path(video_id), "likes", 1)?;
        self.notify_owner(video_id, user_id, NotificationKind::Like, None)
    }

    fn unlike_video(&self, video_id: &str, user_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        if self.delete_row(&paths::like_path(video_id, user_id))? {
            self.bump(&paths::video_path(video_id), "likes", -1)?;
        }
        Ok(())
    }

    fn user_likes(&self, user_id: &str) -> BackendResult<Vec<String>> {
        Ok(self
            .rows_where(paths::LIKES_PREFIX, "user_id", user_id)?
            .iter()
            .filter_map(|r| r.id_field("video_id"))
            .collect())
    }

    fn follow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        let path = paths::follow_path(follower_id, following_id);
        if self.row(&path)?.is_some() {
            return Err(BackendError::Conflict(format!("follow {}", following_id)));
        }
        self.write_row(
            &path,
            json!({
                "id": new_id(),
                "follower_id": follower_id,
                "following_id": following_id,
                "created_at": now_stamp(),
            }),
        )?;
        // Profiles are optional offline; counts only move on known rows.
        self.bump_if_present(&paths::user_path(following_id), "follower_count", 1)?;
        self.bump_if_present(&paths::user_path(follower_id), "following_count", 1)?;
        self.notify(following_id, follower_id, NotificationKind::Follow, None, None)
    }

    fn unfollow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        if self.delete_row(&paths::follow_path(follower_id, following_id))? {
            self.bump_if_present(&paths::user_path(following_id), "follower_count", -1)?;
            self.bump_if_present(&paths::user_path(follower_id), "following_count", -1)?;
        }
        Ok(())
    }

    fn user_follows(&self, user_id: &str) -> BackendResult<Vec<String>> {
        Ok(self
            .rows_where(paths::FOLLOWS_PREFIX, "follower_id", user_id)?
            .iter()
            .filter_map(|r| r.id_field("following_id"))
            .collect())
    }

    fn increment_views(&self, video_id: &str) -> BackendResult<()> {
        let _guard = self.write.lock();
        self.bump(&paths::video_path(video_id), "views", 1)
    }

    fn comment_count(&self, video_id: &str) -> BackendResult<u64> {
        self.row(&paths::video_path(video_id))?
            .map(|r| r.u64_field("comments_count"))
            .ok_or_else(|| BackendError::NotFound(format!("video {}", video_id)))
    }

    fn comments(&self, video_id: &str) -> BackendResult<Vec<Comment>> {
        let mut rows = self.rows_where(paths::COMMENTS_PREFIX, "video_id", video_id)?;
        sort_newest(&mut rows);
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(c) = comment_from_row(&self.embed_user(row, "user_id", "users")?) {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn add_comment(&self, video_id: &str, user_id: &str, text: &str) -> BackendResult<Comment> {
        let _guard = self.write.lock();
        if self.row(&paths::video_path(video_id))?.is_none() {
            return Err(BackendError::NotFound(format!("video {}", video_id)));
        }
        let id = new_id();
        let row = json!({
            "id": id,
            "video_id": video_id,
            "user_id": user_id,
            "comment_text": text,
            "created_at": now_stamp(),
        });
        self.write_row(&paths::comment_path(&id), row.clone())?;
        self.bump(&paths::video_path(video_id), "comments_count", 1)?;
        self.notify_owner(video_id, user_id, NotificationKind::Comment, Some(&id))?;

        let row = self.embed_user(row, "user_id", "users")?;
        comment_from_row(&row).ok_or_else(|| BackendError::Decode("comment row".into()))
    }

    fn products(&self, video_id: &str) -> BackendResult<Vec<Product>> {
        Ok(self
            .rows_where(paths::PRODUCTS_PREFIX, "video_id", video_id)?
            .iter()
            .filter_map(product_from_row)
            .collect())
    }

    fn add_products(&self, video_id: &str, products: &[NewProduct]) -> BackendResult<()> {
        for p in products {
            let id = new_id();
            self.write_row(
                &paths::product_path(&id),
                json!({
                    "id": id,
                    "video_id": video_id,
                    "name": p.name,
                    "description": p.description,
                    "price": p.price,
                    "product_url": p.url,
                    "image_url": p.image_url,
                }),
            )?;
        }
        Ok(())
    }

    fn profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        Ok(self
            .row(&paths::user_path(user_id))?
            .as_ref()
            .and_then(profile_from_row))
    }

    fn ensure_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        let _guard = self.write.lock();
        let path = paths::user_path(&profile.id);
        if let Some(row) = self.row(&path)? {
            return profile_from_row(&row).ok_or_else(|| BackendError::Decode("user row".into()));
        }
        self.write_row(
            &path,
            json!({
                "id": profile.id,
                "username": profile.username,
                "full_name": profile.display_name,
                "avatar": profile.avatar,
                "bio": profile.bio,
                "follower_count": 0,
                "following_count": 0,
                "created_at": now_stamp(),
            }),
        )?;
        Ok(profile.clone())
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile> {
        let _guard = self.write.lock();
        let path = paths::user_path(user_id);
        let mut row = self
            .row(&path)?
            .ok_or_else(|| BackendError::NotFound(format!("user {}", user_id)))?;
        if let Some(name) = &update.display_name {
            row["full_name"] = name.as_str().into();
        }
        if let Some(bio) = &update.bio {
            row["bio"] = bio.as_str().into();
        }
        if let Some(avatar) = &update.avatar {
            row["avatar"] = avatar.as_str().into();
        }
        self.shell.put(&path, row.clone())?;
        profile_from_row(&row).ok_or_else(|| BackendError::Decode("user row".into()))
    }

    fn notifications(&self, user_id: &str) -> BackendResult<Vec<Notification>> {
        let mut rows = self.rows_where(paths::NOTIFICATIONS_PREFIX, "user_id", user_id)?;
        sort_newest(&mut rows);
        rows.truncate(NOTIFICATION_LIMIT);
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(n) = notification_from_row(&self.embed_user(row, "actor_id", "actor")?) {
                out.push(n);
            }
        }
        Ok(out)
    }

    fn mark_notification_read(&self, notification_id: &str) -> BackendResult<()> {
        let path = paths::notification_path(notification_id);
        let mut row = self
            .row(&path)?
            .ok_or_else(|| BackendError::NotFound(format!("notification {}", notification_id)))?;
        row["is_read"] = true.into();
        self.shell.put(&path, row)?;
        Ok(())
    }

    fn mark_all_notifications_read(&self, user_id: &str) -> BackendResult<()> {
        for mut row in self.rows_where(paths::NOTIFICATIONS_PREFIX, "user_id", user_id)? {
            if row.bool_field("is_read") {
                continue;
            }
            if let Some(id) = row.id_field("id") {
                row["is_read"] = true.into();
                self.shell.put(&paths::notification_path(&id), row)?;
            }
        }
        Ok(())
    }
}
