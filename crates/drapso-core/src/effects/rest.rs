//! Hosted backend over HTTP: PostgREST tables, RPC counters, object storage.
//!
//! Every request carries the anon key as `apikey` and as a bearer token.
//! Rows come back as JSON and are normalized through `row_ext` before they
//! leave this module. Feature-gated behind `http`.

use serde_json::{json, Value};
use ureq::Agent;

use super::{Backend, BackendResult, NOTIFICATION_LIMIT};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::models::row_ext::{
    comment_from_row, notification_from_row, product_from_row, profile_from_row, rows_into,
    video_from_row, videos_from_rows,
};
use crate::models::{
    Comment, NewProduct, NewVideo, Notification, NotificationKind, Product, Profile, ProfileUpdate,
    RowExt, Video,
};

const VIDEO_SELECT: &str = "*,users(id,username,avatar,follower_count)";
const CREATED_VIDEO_SELECT: &str = "*,user:user_id(id,username,avatar,full_name)";
const COMMENT_SELECT: &str = "*,users(id,username,avatar)";
const NOTIFICATION_SELECT: &str = "*,actor:actor_id(id,username,avatar)";

impl From<ureq::Error> for BackendError {
    fn from(e: ureq::Error) -> Self {
        match e {
            // Unique-constraint violation from PostgREST.
            ureq::Error::StatusCode(409) => BackendError::Conflict("duplicate row".into()),
            ureq::Error::StatusCode(code) => BackendError::Status(code),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn first_row(rows: Value, what: &str) -> BackendResult<Value> {
    match rows {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        _ => Err(BackendError::NotFound(what.to_string())),
    }
}

pub struct RestBackend {
    config: BackendConfig,
    agent: Agent,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            agent: Agent::new_with_defaults(),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn authed<B>(&self, req: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        req.header("apikey", &self.config.anon_key)
            .header("Authorization", &format!("Bearer {}", self.config.anon_key))
    }

    /// GET rows from `table` with PostgREST query params.
    fn select(&self, table: &str, params: &[(&str, String)]) -> BackendResult<Value> {
        let mut req = self.authed(self.agent.get(self.config.rest_url(table).as_str()));
        for (key, value) in params {
            req = req.query(*key, value);
        }
        let mut resp = req.call()?;
        resp.body_mut()
            .read_json::<Value>()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// POST rows, asking for the inserted representation back.
    fn insert(&self, table: &str, body: &Value, select: Option<&str>) -> BackendResult<Value> {
        let mut req = self
            .authed(self.agent.post(self.config.rest_url(table).as_str()))
            .header("Prefer", "return=representation");
        if let Some(select) = select {
            req = req.query("select", select);
        }
        let mut resp = req.send_json(body)?;
        resp.body_mut()
            .read_json::<Value>()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn update(&self, table: &str, filters: &[(&str, String)], body: &Value) -> BackendResult<Value> {
        let mut req = self
            .authed(self.agent.patch(self.config.rest_url(table).as_str()))
            .header("Prefer", "return=representation");
        for (key, value) in filters {
            req = req.query(*key, value);
        }
        let mut resp = req.send_json(body)?;
        resp.body_mut()
            .read_json::<Value>()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn remove(&self, table: &str, filters: &[(&str, String)]) -> BackendResult<()> {
        let mut req = self.authed(self.agent.delete(self.config.rest_url(table).as_str()));
        for (key, value) in filters {
            req = req.query(*key, value);
        }
        req.call()?;
        Ok(())
    }

    fn rpc(&self, function: &str, video_id: &str) -> BackendResult<()> {
        self.authed(self.agent.post(self.config.rpc_url(function).as_str()))
            .send_json(json!({ "video_id": video_id }))?;
        Ok(())
    }

    fn video_owner(&self, video_id: &str) -> BackendResult<Option<String>> {
        let rows = self.select(
            "videos",
            &[("select", "user_id".into()), ("id", eq(video_id))],
        )?;
        Ok(first_row(rows, video_id)
            .ok()
            .and_then(|row| row.id_field("user_id")))
    }

    fn notify(
        &self,
        recipient: &str,
        actor_id: &str,
        kind: NotificationKind,
        video_id: Option<&str>,
        comment_id: Option<&str>,
    ) -> BackendResult<()> {
        let kind = serde_json::to_value(kind).unwrap_or(Value::Null);
        self.insert(
            "notifications",
            &json!([{
                "user_id": recipient,
                "actor_id": actor_id,
                "type": kind,
                "video_id": video_id,
                "comment_id": comment_id,
            }]),
            None,
        )?;
        Ok(())
    }

    fn notify_owner(
        &self,
        video_id: &str,
        actor_id: &str,
        kind: NotificationKind,
        comment_id: Option<&str>,
    ) -> BackendResult<()> {
        match self.video_owner(video_id)? {
            Some(owner) if owner != actor_id => {
                self.notify(&owner, actor_id, kind, Some(video_id), comment_id)
            }
            _ => Ok(()),
        }
    }
}

impl Backend for RestBackend {
    fn list_videos(&self) -> BackendResult<Vec<Video>> {
        let rows = self.select(
            "videos",
            &[
                ("select", VIDEO_SELECT.into()),
                ("order", "created_at.desc".into()),
            ],
        )?;
        Ok(videos_from_rows(&rows))
    }

    fn user_videos(&self, user_id: &str) -> BackendResult<Vec<Video>> {
        let rows = self.select(
            "videos",
            &[
                ("select", VIDEO_SELECT.into()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".into()),
            ],
        )?;
        Ok(videos_from_rows(&rows))
    }

    fn video(&self, video_id: &str) -> BackendResult<Option<Video>> {
        let rows = self.select(
            "videos",
            &[("select", VIDEO_SELECT.into()), ("id", eq(video_id))],
        )?;
        Ok(videos_from_rows(&rows).into_iter().next())
    }

    fn create_video(&self, video: &NewVideo) -> BackendResult<Video> {
        let body = serde_json::to_value([video]).map_err(|e| BackendError::Decode(e.to_string()))?;
        let rows = self.insert("videos", &body, Some(CREATED_VIDEO_SELECT))?;
        video_from_row(&first_row(rows, "inserted video")?)
            .ok_or_else(|| BackendError::Decode("inserted video".into()))
    }

    fn delete_video(&self, video_id: &str) -> BackendResult<()> {
        self.remove("videos", &[("id", eq(video_id))])
    }

    fn store_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> BackendResult<String> {
        let url = self.config.object_url(bucket, object);
        let result = self
            .authed(self.agent.post(url.as_str()))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .send(bytes);
        match result {
            Ok(_) => Ok(self.config.public_url(bucket, object)),
            Err(ureq::Error::StatusCode(404)) => Err(BackendError::BucketMissing(bucket.into())),
            Err(e) => Err(e.into()),
        }
    }

    fn like_video(&self, video_id: &str, user_id: &str) -> BackendResult<()> {
        self.insert(
            "likes",
            &json!([{ "video_id": video_id, "user_id": user_id }]),
            None,
        )?;
        self.rpc("increment_video_likes", video_id)?;
        self.notify_owner(video_id, user_id, NotificationKind::Like, None)
    }

    fn unlike_video(&self, video_id: &str, user_id: &str) -> BackendResult<()> {
        self.remove(
            "likes",
            &[("video_id", eq(video_id)), ("user_id", eq(user_id))],
        )?;
        self.rpc("decrement_video_likes", video_id)
    }

    fn user_likes(&self, user_id: &str) -> BackendResult<Vec<String>> {
        let rows = self.select(
            "likes",
            &[("select", "video_id".into()), ("user_id", eq(user_id))],
        )?;
        Ok(rows_into(&rows, |r| r.id_field("video_id")))
    }

    fn follow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()> {
        self.insert(
            "follows",
            &json!([{ "follower_id": follower_id, "following_id": following_id }]),
            None,
        )?;
        self.notify(following_id, follower_id, NotificationKind::Follow, None, None)
    }

    fn unfollow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()> {
        self.remove(
            "follows",
            &[
                ("follower_id", eq(follower_id)),
                ("following_id", eq(following_id)),
            ],
        )
    }

    fn user_follows(&self, user_id: &str) -> BackendResult<Vec<String>> {
        let rows = self.select(
            "follows",
            &[("select", "following_id".into()), ("follower_id", eq(user_id))],
        )?;
        Ok(rows_into(&rows, |r| r.id_field("following_id")))
    }

    fn increment_views(&self, video_id: &str) -> BackendResult<()> {
        self.rpc("increment_video_views", video_id)
    }

    fn comment_count(&self, video_id: &str) -> BackendResult<u64> {
        let rows = self.select(
            "videos",
            &[("select", "comments_count".into()), ("id", eq(video_id))],
        )?;
        Ok(first_row(rows, video_id)?.u64_field("comments_count"))
    }

    fn comments(&self, video_id: &str) -> BackendResult<Vec<Comment>> {
        let rows = self.select(
            "comments",
            &[
                ("select", COMMENT_SELECT.into()),
                ("video_id", eq(video_id)),
                ("order", "created_at.desc".into()),
            ],
        )?;
        Ok(rows_into(&rows, comment_from_row))
    }

    fn add_comment(&self, video_id: &str, user_id: &str, text: &str) -> BackendResult<Comment> {
        let rows = self.insert(
            "comments",
            &json!([{ "video_id": video_id, "user_id": user_id, "comment_text": text }]),
            Some(COMMENT_SELECT),
        )?;
        let comment = comment_from_row(&first_row(rows, "inserted comment")?)
            .ok_or_else(|| BackendError::Decode("inserted comment".into()))?;
        self.rpc("increment_video_comments", video_id)?;
        self.notify_owner(video_id, user_id, NotificationKind::Comment, Some(&comment.id))?;
        Ok(comment)
    }

    fn products(&self, video_id: &str) -> BackendResult<Vec<Product>> {
        let rows = self.select(
            "products",
            &[("select", "*".into()), ("video_id", eq(video_id))],
        )?;
        Ok(rows_into(&rows, product_from_row))
    }

    fn add_products(&self, video_id: &str, products: &[NewProduct]) -> BackendResult<()> {
        if products.is_empty() {
            return Ok(());
        }
        let rows: Vec<Value> = products
            .iter()
            .map(|p| {
                json!({
                    "video_id": video_id,
                    "name": p.name,
                    "description": p.description,
                    "price": p.price,
                    "product_url": p.url,
                    "image_url": p.image_url,
                })
            })
            .collect();
        self.insert("products", &Value::Array(rows), None)?;
        Ok(())
    }

    fn profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        let rows = self.select("users", &[("select", "*".into()), ("id", eq(user_id))])?;
        Ok(first_row(rows, user_id).ok().as_ref().and_then(profile_from_row))
    }

    fn ensure_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        if let Some(existing) = self.profile(&profile.id)? {
            return Ok(existing);
        }
        let rows = self.insert(
            "users",
            &json!([{
                "id": profile.id,
                "username": profile.username,
                "full_name": profile.display_name,
                "avatar": profile.avatar,
                "bio": profile.bio,
            }]),
            None,
        )?;
        first_row(rows, "inserted user")
            .ok()
            .as_ref()
            .and_then(profile_from_row)
            .ok_or_else(|| BackendError::Decode("inserted user".into()))
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile> {
        let mut body = json!({});
        if let Some(name) = &update.display_name {
            body["full_name"] = name.as_str().into();
        }
        if let Some(bio) = &update.bio {
            body["bio"] = bio.as_str().into();
        }
        if let Some(avatar) = &update.avatar {
            body["avatar"] = avatar.as_str().into();
        }
        let rows = self.update("users", &[("id", eq(user_id))], &body)?;
        profile_from_row(&first_row(rows, user_id)?)
            .ok_or_else(|| BackendError::Decode("updated user".into()))
    }

    fn notifications(&self, user_id: &str) -> BackendResult<Vec<Notification>> {
        let rows = self.select(
            "notifications",
            &[
                ("select", NOTIFICATION_SELECT.into()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".into()),
                ("limit", NOTIFICATION_LIMIT.to_string()),
            ],
        )?;
        Ok(rows_into(&rows, notification_from_row))
    }

    fn mark_notification_read(&self, notification_id: &str) -> BackendResult<()> {
        self.update(
            "notifications",
            &[("id", eq(notification_id))],
            &json!({ "is_read": true }),
        )?;
        Ok(())
    }

    fn mark_all_notifications_read(&self, user_id: &str) -> BackendResult<()> {
        self.update(
            "notifications",
            &[("user_id", eq(user_id)), ("is_read", "eq.false".into())],
            &json!({ "is_read": true }),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_conflict() {
        assert!(matches!(
            BackendError::from(ureq::Error::StatusCode(409)),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            BackendError::from(ureq::Error::StatusCode(500)),
            BackendError::Status(500)
        ));
    }

    #[test]
    fn first_row_of_empty_is_not_found() {
        assert!(matches!(first_row(json!([]), "x"), Err(BackendError::NotFound(_))));
        assert_eq!(first_row(json!([{"id": 1}, {"id": 2}]), "x").unwrap()["id"], 1);
    }

    #[test]
    fn filters_use_postgrest_syntax() {
        assert_eq!(eq("abc"), "eq.abc");
    }
}
