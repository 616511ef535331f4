//! Viewer identity, profile edits and the locally cached session blob.

use serde::{Deserialize, Serialize};

use super::video::Owner;

/// Fallback avatar for a freshly signed-in identity without one.
pub const DEFAULT_PROFILE_AVATAR: &str = "https://i.pravatar.cc/50?img=3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
}

impl Profile {
    pub fn as_owner(&self) -> Owner {
        Owner {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Owner-only edit of a profile. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    /// Already-stored avatar URL. Set by the engine after an avatar upload.
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.bio.is_none() && self.avatar.is_none()
    }
}

/// Identity blob kept in the local store between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub id: String,
    #[serde(default)]
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: String,
}

impl From<&Profile> for CachedIdentity {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id.clone(),
            username: p.username.clone(),
            full_name: p.display_name.clone(),
            avatar: p.avatar.clone(),
            bio: p.bio.clone(),
        }
    }
}

impl CachedIdentity {
    pub fn into_profile(self) -> Profile {
        Profile {
            username: if self.username.is_empty() {
                self.id.clone()
            } else {
                self.username
            },
            id: self.id,
            display_name: self.full_name,
            avatar: self
                .avatar
                .or_else(|| Some(DEFAULT_PROFILE_AVATAR.to_string())),
            bio: self.bio,
            follower_count: 0,
            following_count: 0,
        }
    }
}

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}
