//! Full-screen vertical player: `Closed` or an open session.
//!
//! A session bundles the playback queue, the gesture router, the set of
//! videos already counted as viewed and the two side panels. Closing drops
//! all of it; nothing here is persisted.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;

use crate::engagement::Counters;
use crate::gesture::{GestureConfig, GestureInput, GestureRouter, Intent};
use crate::models::Video;
use crate::queue::PlaybackQueue;

/// Result of applying an intent to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The cursor moved; a different slot is showing.
    Moved,
    /// Nothing changed (first slot, empty pool, or already closed).
    Stayed,
    Closed,
}

#[derive(Debug)]
struct Session {
    queue: PlaybackQueue,
    router: GestureRouter,
    viewed: HashSet<String>,
    comments_open: bool,
    products_open: bool,
}

#[derive(Debug, Default)]
pub struct Player {
    session: Option<Session>,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open (or reopen) over `pool`, starting at `start`.
    pub fn open(&mut self, start: Video, pool: Vec<Video>, gestures: GestureConfig) -> &Video {
        let session = self.session.insert(Session {
            queue: PlaybackQueue::open(start, pool),
            router: GestureRouter::new(gestures),
            viewed: HashSet::new(),
            comments_open: false,
            products_open: false,
        });
        session.queue.current()
    }

    /// Tear down the session. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        self.session.take().is_some()
    }

    pub fn current(&self) -> Option<&Video> {
        self.session.as_ref().map(|s| s.queue.current())
    }

    pub fn queue(&self) -> Option<&PlaybackQueue> {
        self.session.as_ref().map(|s| &s.queue)
    }

    pub fn replace_pool(&mut self, pool: Vec<Video>) {
        if let Some(s) = self.session.as_mut() {
            s.queue.replace_pool(pool);
        }
    }

    /// Route raw input through the session's gesture router and apply it.
    pub fn input(&mut self, input: GestureInput, now: Instant) -> Transition {
        let intent = match self.session.as_mut() {
            Some(s) => s.router.route(input, now),
            None => return Transition::Stayed,
        };
        match intent {
            Some(intent) => self.apply(intent),
            None => Transition::Stayed,
        }
    }

    pub fn apply(&mut self, intent: Intent) -> Transition {
        if intent == Intent::Close {
            return if self.close() {
                Transition::Closed
            } else {
                Transition::Stayed
            };
        }
        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Transition::Stayed,
        };

        let moved = match intent {
            Intent::Advance => session.queue.advance(),
            Intent::Retreat => session.queue.retreat(),
            Intent::Close => false,
        };

        if moved {
            // Panels belong to the video they were opened on.
            session.comments_open = false;
            session.products_open = false;
            Transition::Moved
        } else {
            Transition::Stayed
        }
    }

    /// Mark the current video as viewed for this session. Returns its id
    /// the first time only.
    pub fn take_first_view(&mut self) -> Option<String> {
        let session = self.session.as_mut()?;
        let id = session.queue.current().id.clone();
        if session.viewed.insert(id.clone()) {
            Some(id)
        } else {
            None
        }
    }

    pub fn set_comments_open(&mut self, open: bool) -> bool {
        match self.session.as_mut() {
            Some(s) => {
                s.comments_open = open;
                true
            }
            None => false,
        }
    }

    pub fn set_products_open(&mut self, open: bool) -> bool {
        match self.session.as_mut() {
            Some(s) => {
                s.products_open = open;
                true
            }
            None => false,
        }
    }

    pub fn comments_open(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.comments_open)
    }

    pub fn products_open(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.products_open)
    }

    pub fn is_locked(&self, now: Instant) -> bool {
        self.session.as_ref().is_some_and(|s| s.router.is_locked(now))
    }
}

/// What a shell needs to render the open player.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub video: Video,
    pub cursor: usize,
    pub len: usize,
    pub counters: Counters,
    pub liked: bool,
    pub following_owner: bool,
    /// False when the viewer owns the video (no follow button).
    pub can_follow: bool,
    pub comments_open: bool,
    pub products_open: bool,
    pub location_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Key;
    use crate::testing::{video, videos};
    use std::time::Duration;

    fn open_player(start: &str, pool: &[&str]) -> Player {
        let mut p = Player::new();
        p.open(video(start), videos(pool), GestureConfig::default());
        p
    }

    #[test]
    fn closed_player_ignores_everything() {
        let mut p = Player::new();
        assert_eq!(p.apply(Intent::Advance), Transition::Stayed);
        assert_eq!(
            p.input(GestureInput::Key { key: Key::Escape }, Instant::now()),
            Transition::Stayed
        );
        assert!(p.take_first_view().is_none());
        assert!(!p.set_comments_open(true));
        assert!(p.current().is_none());
    }

    #[test]
    fn view_counted_once_per_session() {
        let mut p = open_player("a", &["a", "b"]);
        assert_eq!(p.take_first_view().as_deref(), Some("a"));
        assert!(p.take_first_view().is_none());

        p.apply(Intent::Advance);
        assert!(p.take_first_view().is_some());
        p.apply(Intent::Retreat);
        assert!(p.take_first_view().is_none());
    }

    #[test]
    fn reopen_resets_viewed_set() {
        let mut p = open_player("a", &["a"]);
        p.take_first_view();
        p.close();
        p.open(video("a"), videos(&["a"]), GestureConfig::default());
        assert_eq!(p.take_first_view().as_deref(), Some("a"));
    }

    #[test]
    fn escape_closes_and_tears_down() {
        let mut p = open_player("a", &["a", "b", "c"]);
        p.apply(Intent::Advance);
        let t = p.input(GestureInput::Key { key: Key::Escape }, Instant::now());
        assert_eq!(t, Transition::Closed);
        assert!(!p.is_open());
        assert!(p.queue().is_none());
    }

    #[test]
    fn wheel_burst_moves_once() {
        let mut p = open_player("a", &["a", "b", "c", "d"]);
        let t0 = Instant::now();
        let mut moves = 0;
        for i in 0..5 {
            let t = p.input(GestureInput::Wheel { delta_y: 120.0 }, t0 + Duration::from_millis(i * 50));
            if t == Transition::Moved {
                moves += 1;
            }
        }
        assert_eq!(moves, 1);
        assert!(p.is_locked(t0 + Duration::from_millis(250)));
    }

    #[test]
    fn moving_closes_panels() {
        let mut p = open_player("a", &["a", "b"]);
        p.set_comments_open(true);
        p.set_products_open(true);
        assert!(p.comments_open() && p.products_open());
        assert_eq!(p.apply(Intent::Advance), Transition::Moved);
        assert!(!p.comments_open());
        assert!(!p.products_open());
    }

    #[test]
    fn retreat_at_first_slot_keeps_panels() {
        let mut p = open_player("outsider", &["a"]);
        p.set_comments_open(true);
        assert_eq!(p.apply(Intent::Retreat), Transition::Stayed);
        assert!(p.comments_open());
    }
}
