//! Shuffled, append-only playback queue for the vertical player.
//!
//! The queue holds what has been (or is about to be) shown, a cursor into
//! it, and the set of ids shown this session. Running off the end appends
//! one more video, unseen ones first, so a small pool still scrolls forever.
//!
//! Invariants: the queue is never empty, `cursor < queue.len()`, and the id
//! at the cursor is always in `history`.

use std::collections::HashSet;

use rand::Rng;

use crate::models::Video;
use crate::shuffle::shuffle_with;

#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    queue: Vec<Video>,
    cursor: usize,
    history: HashSet<String>,
    pool: Vec<Video>,
}

impl PlaybackQueue {
    /// Build a fresh queue starting at `start`, drawing from `pool`.
    pub fn open(start: Video, pool: Vec<Video>) -> Self {
        Self::open_with(start, pool, &mut rand::rng())
    }

    pub fn open_with<R: Rng + ?Sized>(start: Video, pool: Vec<Video>, rng: &mut R) -> Self {
        let shuffled = shuffle_with(&pool, rng);
        let history = HashSet::from([start.id.clone()]);

        let (queue, cursor) = match shuffled.iter().position(|v| v.id == start.id) {
            Some(index) => (shuffled, index),
            None => {
                // Start video is outside the pool (e.g. a search hit).
                let mut queue = Vec::with_capacity(shuffled.len() + 1);
                queue.push(start);
                queue.extend(shuffled);
                (queue, 0)
            }
        };

        Self {
            queue,
            cursor,
            history,
            pool,
        }
    }

    pub fn current(&self) -> &Video {
        &self.queue[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Always false; kept for the `len` convention.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn videos(&self) -> &[Video] {
        &self.queue
    }

    pub fn history(&self) -> &HashSet<String> {
        &self.history
    }

    pub fn pool(&self) -> &[Video] {
        &self.pool
    }

    /// Swap in a refreshed candidate pool. Only future appends see it.
    pub fn replace_pool(&mut self, pool: Vec<Video>) {
        self.pool = pool;
    }

    /// Move to the next video. Returns false only when the pool is empty
    /// and the queue is exhausted.
    pub fn advance(&mut self) -> bool {
        self.advance_with(&mut rand::rng())
    }

    pub fn advance_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.cursor + 1 < self.queue.len() {
            self.cursor += 1;
            let id = self.queue[self.cursor].id.clone();
            self.history.insert(id);
            return true;
        }

        if self.pool.is_empty() {
            return false;
        }

        let available: Vec<Video> = self
            .pool
            .iter()
            .filter(|v| !self.history.contains(&v.id))
            .cloned()
            .collect();

        // Everything has been shown: allow a repeat from the whole pool.
        let source = if available.is_empty() {
            &self.pool
        } else {
            &available
        };
        let next = match shuffle_with(source, rng).into_iter().next() {
            Some(v) => v,
            None => return false,
        };

        self.history.insert(next.id.clone());
        self.queue.push(next);
        self.cursor += 1;
        true
    }

    /// Move back one slot. No-op at the first slot.
    pub fn retreat(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{video, videos};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(vs: &[Video]) -> Vec<String> {
        let mut out: Vec<String> = vs.iter().map(|v| v.id.clone()).collect();
        out.sort();
        out
    }

    fn assert_invariants(q: &PlaybackQueue) {
        assert!(q.cursor() < q.len());
        assert!(q.history().contains(&q.current().id));
    }

    #[test]
    fn open_with_member_uses_shuffled_pool() {
        let pool = videos(&["a", "b", "c", "d", "e"]);
        for _ in 0..20 {
            let q = PlaybackQueue::open(video("c"), pool.clone());
            assert_eq!(q.len(), pool.len());
            assert_eq!(ids(q.videos()), ids(&pool));
            assert_eq!(q.current().id, "c");
            assert_eq!(q.history().len(), 1);
            assert_invariants(&q);
        }
    }

    #[test]
    fn open_with_outsider_prepends_it() {
        let pool = videos(&["a", "b"]);
        let q = PlaybackQueue::open(video("search-hit"), pool);
        assert_eq!(q.len(), 3);
        assert_eq!(q.cursor(), 0);
        assert_eq!(q.current().id, "search-hit");
        assert_invariants(&q);
    }

    #[test]
    fn first_pass_visits_each_video_once() {
        let names: Vec<String> = (0..12).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let pool = videos(&refs);

        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut q = PlaybackQueue::open_with(video("v5"), pool.clone(), &mut rng);
            let mut seen = vec![q.current().id.clone()];
            for _ in 0..pool.len() - 1 {
                assert!(q.advance_with(&mut rng));
                assert_invariants(&q);
                seen.push(q.current().id.clone());
            }
            let mut dedup = seen.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), pool.len(), "repeat before pool exhausted");
        }
    }

    #[test]
    fn exhausted_pool_still_advances() {
        let pool = videos(&["a", "b"]);
        let mut q = PlaybackQueue::open(video("a"), pool);
        for _ in 0..10 {
            assert!(q.advance());
            assert_invariants(&q);
        }
        assert_eq!(q.history().len(), 2);
        assert_eq!(q.cursor(), q.len() - 1);
    }

    #[test]
    fn three_video_walkthrough() {
        let pool = videos(&["a", "b", "c"]);
        let mut q = PlaybackQueue::open(video("b"), pool);
        let start = q.cursor();
        assert_eq!(q.history().len(), 1);

        q.advance();
        assert_eq!(q.cursor(), start + 1);
        assert_eq!(q.history().len(), 2);
        assert_eq!(q.len(), 3.max(start + 2));

        q.advance();
        assert_eq!(q.history().len(), 3);
        assert_eq!(q.len(), 3.max(start + 3));

        // Every id has been shown; the next step repeats one.
        let before = q.len();
        let at_end = q.cursor() + 1 == before;
        q.advance();
        assert_eq!(q.history().len(), 3);
        if at_end {
            assert_eq!(q.len(), before + 1);
        }
        assert_invariants(&q);
    }

    #[test]
    fn retreat_at_start_is_noop() {
        let pool = videos(&["a", "b", "c"]);
        let q0 = PlaybackQueue::open(video("outside"), pool);
        let mut q = q0.clone();
        assert!(!q.retreat());
        assert_eq!(q.cursor(), q0.cursor());
        assert_eq!(ids(q.videos()), ids(q0.videos()));
        assert_eq!(q.history(), q0.history());
    }

    #[test]
    fn retreat_then_advance_replays_order() {
        let pool = videos(&["a", "b", "c", "d"]);
        let mut q = PlaybackQueue::open(video("x"), pool);
        q.advance();
        q.advance();
        let order: Vec<String> = q.videos().iter().map(|v| v.id.clone()).collect();
        let here = q.current().id.clone();

        assert!(q.retreat());
        assert!(q.advance());
        assert_eq!(q.current().id, here);
        let again: Vec<String> = q.videos().iter().map(|v| v.id.clone()).collect();
        assert_eq!(again, order);
    }

    #[test]
    fn empty_pool_advance_is_noop() {
        let mut q = PlaybackQueue::open(video("solo"), Vec::new());
        assert!(!q.advance());
        assert_eq!(q.len(), 1);
        assert_eq!(q.cursor(), 0);
    }

    #[test]
    fn replaced_pool_feeds_later_appends() {
        let mut q = PlaybackQueue::open(video("a"), videos(&["a"]));
        q.replace_pool(videos(&["a", "fresh"]));
        assert!(q.advance());
        assert_eq!(q.current().id, "fresh");
    }
}
