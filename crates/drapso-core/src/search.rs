//! Local search over the cached feed and known users.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Owner, Profile, Video};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHit {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl From<&Owner> for UserHit {
    fn from(o: &Owner) -> Self {
        Self {
            id: o.id.clone(),
            username: o.username.clone(),
            display_name: o.username.clone(),
            avatar: o.avatar.clone(),
        }
    }
}

impl From<&Profile> for UserHit {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id.clone(),
            username: p.username.clone(),
            display_name: p.display_name.clone(),
            avatar: p.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub users: Vec<UserHit>,
    pub videos: Vec<Video>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.videos.is_empty()
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Case-insensitive substring match. Videos match on title or description;
/// users (the viewer first, then feed owners, deduplicated by id) match on
/// display name, username or id. A blank query matches nothing.
pub fn search(query: &str, videos: &[Video], viewer: Option<&Profile>) -> SearchResults {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return SearchResults::default();
    }

    let matched_videos = videos
        .iter()
        .filter(|v| contains(&v.title, &q) || contains(&v.description, &q))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let users = viewer
        .map(UserHit::from)
        .into_iter()
        .chain(videos.iter().map(|v| UserHit::from(&v.owner)))
        .filter(|u| seen.insert(u.id.clone()))
        .filter(|u| contains(&u.display_name, &q) || contains(&u.username, &q) || contains(&u.id, &q))
        .collect();

    SearchResults {
        users,
        videos: matched_videos,
    }
}
