//! Player commands and backend mutations.
//!
//! Both are tagged enums: the player command is what a shell sends, the
//! mutation is what the effect loop picks up from `/drapso/outbox/mutation`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command a presentation shell sends to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Open over the cached feed, starting at `video_id`.
    Open { video_id: String },
    Advance,
    Retreat,
    Close,
    LikeCurrent,
    FollowCurrentOwner,
    UsernameClick,
    OpenComments,
    CloseComments,
    OpenProducts,
    CloseProducts,
}

impl PlayerCommand {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }
}

/// A fire-and-forget backend write, produced by an optimistic local update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Mutation {
    Like { video_id: String, user_id: String },
    Unlike { video_id: String, user_id: String },
    Follow { follower_id: String, following_id: String },
    Unfollow { follower_id: String, following_id: String },
    View { video_id: String },
}

impl Mutation {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Like { .. } => "like",
            Mutation::Unlike { .. } => "unlike",
            Mutation::Follow { .. } => "follow",
            Mutation::Unfollow { .. } => "unfollow",
            Mutation::View { .. } => "view",
        }
    }
}
