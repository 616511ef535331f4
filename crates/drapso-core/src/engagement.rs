//! Viewer engagement: liked videos, followed users, displayed counters.
//!
//! Every toggle updates local state first and hands back the backend
//! mutation to dispatch. A failed mutation is never rolled back here; local
//! state stays authoritative for the session and the next reload
//! reconciles with the backend.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{Mutation, Video};

/// Counters shown on a video's action buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub likes: u64,
    pub views: u64,
    pub comments: u64,
}

impl From<&Video> for Counters {
    fn from(v: &Video) -> Self {
        Self {
            likes: v.likes,
            views: v.views,
            comments: v.comments,
        }
    }
}

#[derive(Debug, Default)]
pub struct Engagement {
    viewer: Option<String>,
    liked: HashSet<String>,
    followed: HashSet<String>,
    counters: HashMap<String, Counters>,
}

impl Engagement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a viewer session from the backend's likes and follows.
    pub fn begin(&mut self, viewer: &str, liked: Vec<String>, followed: Vec<String>) {
        self.viewer = Some(viewer.to_string());
        self.liked = liked.into_iter().collect();
        self.followed = followed.into_iter().collect();
    }

    /// Drop everything tied to the viewer.
    pub fn end(&mut self) {
        self.viewer = None;
        self.liked.clear();
        self.followed.clear();
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    pub fn is_liked(&self, video_id: &str) -> bool {
        self.liked.contains(video_id)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.followed.contains(user_id)
    }

    pub fn liked(&self) -> &HashSet<String> {
        &self.liked
    }

    pub fn followed(&self) -> &HashSet<String> {
        &self.followed
    }

    /// Remember a video's backend counters unless the session already
    /// tracks its own (optimistic) values.
    pub fn seed(&mut self, video: &Video) {
        self.counters
            .entry(video.id.clone())
            .or_insert_with(|| Counters::from(video));
    }

    pub fn seed_all<'a>(&mut self, videos: impl IntoIterator<Item = &'a Video>) {
        for v in videos {
            self.seed(v);
        }
    }

    /// Displayed counters, falling back to the record's own numbers.
    pub fn counters(&self, video: &Video) -> Counters {
        self.counters
            .get(&video.id)
            .copied()
            .unwrap_or_else(|| Counters::from(video))
    }

    pub fn counters_by_id(&self, video_id: &str) -> Option<Counters> {
        self.counters.get(video_id).copied()
    }

    /// Toggle the viewer's like. `None` without a signed-in viewer.
    pub fn toggle_like(&mut self, video_id: &str) -> Option<Mutation> {
        let user_id = self.viewer.clone()?;
        let counters = self.counters.entry(video_id.to_string()).or_default();

        if self.liked.remove(video_id) {
            counters.likes = counters.likes.saturating_sub(1);
            Some(Mutation::Unlike {
                video_id: video_id.to_string(),
                user_id,
            })
        } else {
            self.liked.insert(video_id.to_string());
            counters.likes += 1;
            Some(Mutation::Like {
                video_id: video_id.to_string(),
                user_id,
            })
        }
    }

    /// Toggle following `user_id`. `None` for self-follows or without a viewer.
    pub fn toggle_follow(&mut self, user_id: &str) -> Option<Mutation> {
        let viewer = self.viewer.clone()?;
        if user_id.is_empty() || viewer == user_id {
            return None;
        }

        if self.followed.remove(user_id) {
            Some(Mutation::Unfollow {
                follower_id: viewer,
                following_id: user_id.to_string(),
            })
        } else {
            self.followed.insert(user_id.to_string());
            Some(Mutation::Follow {
                follower_id: viewer,
                following_id: user_id.to_string(),
            })
        }
    }

    /// Count a view locally and return the increment to dispatch. The
    /// once-per-session guard lives with the open player.
    pub fn record_view(&mut self, video_id: &str) -> Mutation {
        self.counters.entry(video_id.to_string()).or_default().views += 1;
        Mutation::View {
            video_id: video_id.to_string(),
        }
    }

    /// Replace the cached comment count with the backend's.
    pub fn set_comment_count(&mut self, video_id: &str, count: u64) {
        self.counters.entry(video_id.to_string()).or_default().comments = count;
    }

    pub fn bump_comment_count(&mut self, video_id: &str) {
        self.counters.entry(video_id.to_string()).or_default().comments += 1;
    }
}
