//! Backend boundary. The one injected handle for everything remote.
//!
//! The engine only ever talks to a `dyn Backend`. `ScrollBackend` keeps all
//! tables in the local 9S store; `RestBackend` (feature `http`) talks to the
//! hosted PostgREST/Storage API. Both hand back normalized records.

use crate::error::BackendError;
use crate::models::{
    Comment, Mutation, NewProduct, NewVideo, Notification, Product, Profile, ProfileUpdate, Video,
};

pub type BackendResult<T> = Result<T, BackendError>;

/// Remote data operations. All methods take `&self`; backends manage their
/// own concurrency.
pub trait Backend: Send + Sync {
    /// Every video, newest first.
    fn list_videos(&self) -> BackendResult<Vec<Video>>;
    fn user_videos(&self, user_id: &str) -> BackendResult<Vec<Video>>;
    /// One video by id, `None` if it does not exist.
    fn video(&self, video_id: &str) -> BackendResult<Option<Video>>;
    fn create_video(&self, video: &NewVideo) -> BackendResult<Video>;
    fn delete_video(&self, video_id: &str) -> BackendResult<()>;

    /// Store an object and return its public URL.
    fn store_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> BackendResult<String>;

    /// Insert a like and bump the counter. A duplicate is a `Conflict`.
    fn like_video(&self, video_id: &str, user_id: &str) -> BackendResult<()>;
    fn unlike_video(&self, video_id: &str, user_id: &str) -> BackendResult<()>;
    /// Video ids liked by `user_id`.
    fn user_likes(&self, user_id: &str) -> BackendResult<Vec<String>>;

    fn follow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()>;
    fn unfollow_user(&self, follower_id: &str, following_id: &str) -> BackendResult<()>;
    /// User ids followed by `user_id`.
    fn user_follows(&self, user_id: &str) -> BackendResult<Vec<String>>;

    fn increment_views(&self, video_id: &str) -> BackendResult<()>;

    fn comment_count(&self, video_id: &str) -> BackendResult<u64>;
    /// Comments on a video, newest first.
    fn comments(&self, video_id: &str) -> BackendResult<Vec<Comment>>;
    fn add_comment(&self, video_id: &str, user_id: &str, text: &str) -> BackendResult<Comment>;

    fn products(&self, video_id: &str) -> BackendResult<Vec<Product>>;
    fn add_products(&self, video_id: &str, products: &[NewProduct]) -> BackendResult<()>;

    fn profile(&self, user_id: &str) -> BackendResult<Option<Profile>>;
    /// Insert the profile row if it does not exist yet; returns the stored row.
    fn ensure_profile(&self, profile: &Profile) -> BackendResult<Profile>;
    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile>;

    /// Latest notifications for `user_id`, newest first.
    fn notifications(&self, user_id: &str) -> BackendResult<Vec<Notification>>;
    fn mark_notification_read(&self, notification_id: &str) -> BackendResult<()>;
    fn mark_all_notifications_read(&self, user_id: &str) -> BackendResult<()>;
}

/// Cap on notifications returned per fetch.
pub const NOTIFICATION_LIMIT: usize = 50;

/// Perform one dispatched mutation. Duplicate inserts count as success.
pub fn apply_mutation(backend: &dyn Backend, mutation: &Mutation) -> BackendResult<()> {
    let result = match mutation {
        Mutation::Like { video_id, user_id } => backend.like_video(video_id, user_id),
        Mutation::Unlike { video_id, user_id } => backend.unlike_video(video_id, user_id),
        Mutation::Follow {
            follower_id,
            following_id,
        } => backend.follow_user(follower_id, following_id),
        Mutation::Unfollow {
            follower_id,
            following_id,
        } => backend.unfollow_user(follower_id, following_id),
        Mutation::View { video_id } => backend.increment_views(video_id),
    };
    match result {
        Err(BackendError::Conflict(what)) => {
            log::debug!("drapso: {} already recorded ({})", mutation.label(), what);
            Ok(())
        }
        other => other,
    }
}

pub mod offline;
#[cfg(feature = "http")]
pub mod rest;

pub use offline::ScrollBackend;
#[cfg(feature = "http")]
pub use rest::RestBackend;
