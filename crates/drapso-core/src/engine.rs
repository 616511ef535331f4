//! Drapso engine — client kernel over 9S scrolls and one backend handle.
//!
//! Owns the Shell (local settings and session), the injected backend, the
//! viewer's engagement state, the cached feed and the player. Backend
//! mutations are fire-and-forget: they are written to the outbox scroll and
//! a background effect loop performs them in dispatch order.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use nine_s_shell::Shell;
use parking_lot::Mutex;
use serde_json::{json, Value};

#[cfg(feature = "http")]
use crate::config::BackendConfig;
use crate::effects::{apply_mutation, Backend, ScrollBackend};
#[cfg(feature = "http")]
use crate::effects::RestBackend;
use crate::engagement::{Counters, Engagement};
use crate::error::{Error, Result, UploadError};
use crate::gesture::{GestureConfig, GestureInput, Intent};
use crate::models::{
    CachedIdentity, Comment, Mutation, Notification, PlayerCommand, Product, Profile,
    ProfileUpdate, Theme, Video,
};
use crate::paths;
use crate::player::{Player, PlayerSnapshot, Transition};
use crate::search::{self, SearchResults};
use crate::shuffle;
use crate::upload::{UploadForm, VIDEO_BUCKET};

/// Storage bucket for profile pictures.
pub const AVATAR_BUCKET: &str = "profile-pictures";

/// Hooks for the presentation shell. All methods default to no-ops and are
/// never called while engine locks are held.
pub trait PlayerObserver: Send + Sync {
    /// A video became the current slot.
    fn on_show(&self, _video: &Video) {}
    fn on_username_click(&self, _user_id: &str) {}
    fn on_close(&self) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    shell: Arc<Shell>,
    backend: Arc<dyn Backend>,
    viewer: Mutex<Option<Profile>>,
    engagement: Mutex<Engagement>,
    /// Last fetched feed, newest first. Doubles as the player's pool.
    feed: Mutex<Vec<Video>>,
    player: Mutex<Player>,
    observer: Mutex<Option<Arc<dyn PlayerObserver>>>,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Boot against the offline backend stored in the same shell.
    pub fn new(shell: Shell) -> Self {
        let shell = Arc::new(shell);
        let backend = Arc::new(ScrollBackend::new(Arc::clone(&shell)));
        Self::build(shell, backend)
    }

    /// Boot with a custom backend.
    pub fn with_backend(shell: Shell, backend: Arc<dyn Backend>) -> Self {
        Self::build(Arc::new(shell), backend)
    }

    /// Hosted backend when `DRAPSO_BACKEND_URL`/`DRAPSO_ANON_KEY` are set
    /// (and the `http` feature is on), offline otherwise.
    pub fn from_env(shell: Shell) -> Self {
        #[cfg(feature = "http")]
        {
            if let Some(config) = BackendConfig::from_env() {
                log::info!("drapso: using hosted backend at {}", config.url);
                return Self::with_backend(shell, Arc::new(RestBackend::new(config)));
            }
        }
        Self::new(shell)
    }

    fn build(shell: Arc<Shell>, backend: Arc<dyn Backend>) -> Self {
        Self {
            shell,
            backend,
            viewer: Mutex::new(None),
            engagement: Mutex::new(Engagement::new()),
            feed: Mutex::new(Vec::new()),
            player: Mutex::new(Player::new()),
            observer: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start the mutation effect loop. Idempotent.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);
        if let Some(handle) = self.start_mutation_loop() {
            handles.push(handle);
        }
    }

    /// Stop the effect loop after it has drained every queued mutation.
    pub fn shutdown(&self) {
        // Emptying `handles` under the lock sends later dispatches inline;
        // anything dispatched before it lands ahead of the sentinel.
        let handles: Vec<JoinHandle<()>> = {
            let mut handles = self.handles.lock();
            self.shutdown.store(true, Ordering::SeqCst);
            if !handles.is_empty() {
                // Wake the watcher; it exits on the first non-mutation after the flag.
                log_err(
                    self.shell.put(paths::OUTBOX_MUTATION, json!({"action": "noop"})),
                    "shutdown sentinel outbox",
                );
            }
            handles.drain(..).collect()
        };

        for handle in handles {
            let _ = handle.join();
        }
    }

    fn start_mutation_loop(&self) -> Option<JoinHandle<()>> {
        // Subscribe before spawning so nothing dispatched after start() is missed.
        let rx = match self.shell.on(paths::OUTBOX_MUTATION) {
            Ok(rx) => rx,
            Err(e) => {
                log::error!("drapso: failed to watch mutation outbox: {}", e);
                return None;
            }
        };
        let backend = Arc::clone(&self.backend);
        let shutdown = Arc::clone(&self.shutdown);

        Some(thread::spawn(move || {
            for scroll in rx.iter() {
                match Mutation::from_value(&scroll.data) {
                    Some(mutation) => perform(&*backend, &mutation),
                    None if shutdown.load(Ordering::SeqCst) => break,
                    None => {}
                }
            }
        }))
    }

    /// Hand a mutation to the effect loop, or perform it inline when the
    /// loop is not running.
    fn dispatch(&self, mutation: Mutation) {
        let handles = self.handles.lock();
        if handles.is_empty() {
            drop(handles);
            perform(&*self.backend, &mutation);
            return;
        }
        // Written under the lock so shutdown cannot slip its sentinel in first.
        log_err(
            self.shell.put(paths::OUTBOX_MUTATION, mutation.to_value()),
            "dispatch mutation",
        );
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub fn set_observer(&self, observer: Arc<dyn PlayerObserver>) {
        *self.observer.lock() = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn PlayerObserver>> {
        self.observer.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Sign in as `profile`: make sure the backend knows the user, cache the
    /// identity locally and mirror the viewer's likes and follows.
    pub fn sign_in(&self, profile: Profile) -> Result<Profile> {
        let stored = self.backend.ensure_profile(&profile)?;
        self.cache_identity(&stored)?;
        self.begin_viewer(&stored);
        Ok(stored)
    }

    /// Restore the cached identity from a previous launch, if any.
    pub fn restore_session(&self) -> Result<Option<Profile>> {
        let cached = match self.shell.get(paths::SESSION_USER)? {
            Some(scroll) => serde_json::from_value::<CachedIdentity>(scroll.data).ok(),
            None => None,
        };
        let cached = match cached {
            Some(c) => c,
            None => return Ok(None),
        };

        let profile = match self.backend.profile(&cached.id) {
            Ok(Some(fresh)) => fresh,
            Ok(None) => cached.into_profile(),
            Err(e) => {
                log::warn!("drapso: profile refresh failed, using cached identity: {}", e);
                cached.into_profile()
            }
        };
        self.begin_viewer(&profile);
        Ok(Some(profile))
    }

    pub fn sign_out(&self) -> Result<()> {
        self.shell.put(paths::SESSION_USER, Value::Null)?;
        self.engagement.lock().end();
        *self.viewer.lock() = None;
        Ok(())
    }

    pub fn viewer(&self) -> Option<Profile> {
        self.viewer.lock().clone()
    }

    fn viewer_id(&self) -> Result<String> {
        self.viewer
            .lock()
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or(Error::NotSignedIn)
    }

    fn cache_identity(&self, profile: &Profile) -> Result<()> {
        let blob = serde_json::to_value(CachedIdentity::from(profile))
            .map_err(|e| Error::Store(e.to_string()))?;
        self.shell.put(paths::SESSION_USER, blob)?;
        Ok(())
    }

    fn begin_viewer(&self, profile: &Profile) {
        let liked = self.backend.user_likes(&profile.id).unwrap_or_else(|e| {
            log::warn!("drapso: loading likes failed: {}", e);
            Vec::new()
        });
        let followed = self.backend.user_follows(&profile.id).unwrap_or_else(|e| {
            log::warn!("drapso: loading follows failed: {}", e);
            Vec::new()
        });
        self.engagement.lock().begin(&profile.id, liked, followed);
        *self.viewer.lock() = Some(profile.clone());
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Stored theme, dark when unset or unreadable.
    pub fn theme(&self) -> Theme {
        self.shell
            .get(paths::SETTINGS_THEME)
            .ok()
            .flatten()
            .and_then(|s| s.data["theme"].as_str().and_then(Theme::parse))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.shell
            .put(paths::SETTINGS_THEME, json!({ "theme": theme.as_str() }))?;
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    /// Validate and store gesture thresholds. Applies from the next open.
    pub fn configure_gestures(&self, config: Value) -> Result<GestureConfig> {
        let parsed = GestureConfig::from_value(&config)
            .ok_or_else(|| Error::InvalidInput("gesture config".into()))?;
        self.shell.put(
            paths::SETTINGS_GESTURE,
            serde_json::to_value(parsed).map_err(|e| Error::Store(e.to_string()))?,
        )?;
        Ok(parsed)
    }

    /// Gesture config from settings, falling back to defaults.
    pub fn gesture_config(&self) -> GestureConfig {
        if let Ok(Some(scroll)) = self.shell.get(paths::SETTINGS_GESTURE) {
            if let Some(config) = GestureConfig::from_value(&scroll.data) {
                return config;
            }
            log::warn!("drapso: invalid gesture settings, using defaults");
        }
        GestureConfig::default()
    }

    // -----------------------------------------------------------------------
    // Feed
    // -----------------------------------------------------------------------

    /// Reload every video from the backend. The open player only sees the
    /// new pool on its next append.
    pub fn refresh_feed(&self) -> Result<Vec<Video>> {
        let videos = self.backend.list_videos()?;
        self.engagement.lock().seed_all(&videos);
        *self.feed.lock() = videos.clone();
        self.player.lock().replace_pool(videos.clone());
        Ok(videos)
    }

    pub fn feed(&self) -> Vec<Video> {
        self.feed.lock().clone()
    }

    pub fn user_videos(&self, user_id: &str) -> Result<Vec<Video>> {
        let videos = self.backend.user_videos(user_id)?;
        self.engagement.lock().seed_all(&videos);
        Ok(videos)
    }

    /// Cached feed videos the viewer has liked.
    pub fn liked_videos(&self) -> Vec<Video> {
        let feed = self.feed.lock().clone();
        let engagement = self.engagement.lock();
        feed.into_iter()
            .filter(|v| engagement.is_liked(&v.id))
            .collect()
    }

    /// Random sample of the cached feed.
    pub fn random_videos(&self, count: usize) -> Vec<Video> {
        shuffle::sample(&self.feed.lock(), count)
    }

    /// Displayed counters for a video.
    pub fn counters(&self, video_id: &str) -> Option<Counters> {
        if let Some(c) = self.engagement.lock().counters_by_id(video_id) {
            return Some(c);
        }
        self.feed
            .lock()
            .iter()
            .find(|v| v.id == video_id)
            .map(Counters::from)
    }

    /// Make sure displayed counters for `video_id` start from the record,
    /// looking it up on the backend when neither feed nor queue holds it.
    fn seed_counters(&self, video_id: &str) -> Result<()> {
        if self.engagement.lock().counters_by_id(video_id).is_some() {
            return Ok(());
        }
        let video = match self.find_video(video_id) {
            Some(v) => v,
            None => self
                .backend
                .video(video_id)?
                .ok_or_else(|| Error::NotFound(format!("video {}", video_id)))?,
        };
        self.engagement.lock().seed(&video);
        Ok(())
    }

    fn find_video(&self, video_id: &str) -> Option<Video> {
        if let Some(v) = self.feed.lock().iter().find(|v| v.id == video_id) {
            return Some(v.clone());
        }
        self.player
            .lock()
            .queue()
            .and_then(|q| q.videos().iter().find(|v| v.id == video_id).cloned())
    }

    // -----------------------------------------------------------------------
    // Player
    // -----------------------------------------------------------------------

    /// Open the player at `start` over `pool`.
    pub fn open_player(&self, start: Video, pool: Vec<Video>) -> Option<PlayerSnapshot> {
        let gestures = self.gesture_config();
        self.engagement.lock().seed(&start);
        self.engagement.lock().seed_all(&pool);
        self.player.lock().open(start, pool, gestures);
        self.after_move()
    }

    /// Open the player at a cached feed video, using the feed as the pool.
    pub fn open_player_from_feed(&self, video_id: &str) -> Result<PlayerSnapshot> {
        let pool = self.feed();
        let start = pool
            .iter()
            .find(|v| v.id == video_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("video {}", video_id)))?;
        self.open_player(start, pool)
            .ok_or_else(|| Error::NotFound(format!("video {}", video_id)))
    }

    /// Route raw shell input. `None` once the player is closed.
    pub fn player_input(&self, input: GestureInput) -> Option<PlayerSnapshot> {
        self.player_input_at(input, Instant::now())
    }

    pub fn player_input_at(&self, input: GestureInput, now: Instant) -> Option<PlayerSnapshot> {
        let transition = self.player.lock().input(input, now);
        self.settle(transition)
    }

    pub fn advance(&self) -> Option<PlayerSnapshot> {
        let transition = self.player.lock().apply(Intent::Advance);
        self.settle(transition)
    }

    pub fn retreat(&self) -> Option<PlayerSnapshot> {
        let transition = self.player.lock().apply(Intent::Retreat);
        self.settle(transition)
    }

    /// Close the player. Returns false if it was not open.
    pub fn close_player(&self) -> bool {
        let closed = self.player.lock().close();
        if closed {
            if let Some(obs) = self.observer() {
                obs.on_close();
            }
        }
        closed
    }

    pub fn is_player_open(&self) -> bool {
        self.player.lock().is_open()
    }

    pub fn current_video(&self) -> Option<Video> {
        self.player.lock().current().cloned()
    }

    fn settle(&self, transition: Transition) -> Option<PlayerSnapshot> {
        match transition {
            Transition::Moved => self.after_move(),
            Transition::Stayed => self.player_snapshot(),
            Transition::Closed => {
                if let Some(obs) = self.observer() {
                    obs.on_close();
                }
                None
            }
        }
    }

    /// Count the first view of the current video and notify the observer.
    fn after_move(&self) -> Option<PlayerSnapshot> {
        let (shown, first_view) = {
            let mut player = self.player.lock();
            let first_view = player.take_first_view();
            (player.current().cloned(), first_view)
        };
        if let Some(id) = first_view {
            let mutation = self.engagement.lock().record_view(&id);
            self.dispatch(mutation);
        }
        if let (Some(video), Some(obs)) = (&shown, self.observer()) {
            obs.on_show(video);
        }
        self.player_snapshot()
    }

    pub fn player_snapshot(&self) -> Option<PlayerSnapshot> {
        let viewer = self.viewer.lock().as_ref().map(|p| p.id.clone());
        let player = self.player.lock();
        let queue = player.queue()?;
        let video = queue.current().clone();
        let engagement = self.engagement.lock();
        Some(PlayerSnapshot {
            cursor: queue.cursor(),
            len: queue.len(),
            counters: engagement.counters(&video),
            liked: engagement.is_liked(&video.id),
            following_owner: engagement.is_following(video.owner_id()),
            can_follow: viewer.as_deref().is_some_and(|id| id != video.owner_id()),
            comments_open: player.comments_open(),
            products_open: player.products_open(),
            location_link: video.location_link(),
            video,
        })
    }

    /// Report a click on the current owner's name; returns their id.
    pub fn username_click(&self) -> Option<String> {
        let owner = self.current_video()?.owner.id;
        if let Some(obs) = self.observer() {
            obs.on_username_click(&owner);
        }
        Some(owner)
    }

    /// Show the comments panel and load its comments.
    pub fn open_comments(&self) -> Result<Vec<Comment>> {
        let video = self.current_video().ok_or_else(|| Error::NotFound("open video".into()))?;
        self.player.lock().set_comments_open(true);
        self.refresh_comment_count(&video.id);
        self.comments(&video.id)
    }

    pub fn close_comments(&self) {
        let current = self.current_video();
        if self.player.lock().set_comments_open(false) {
            if let Some(video) = current {
                self.refresh_comment_count(&video.id);
            }
        }
    }

    /// Show the product cart for the current video.
    pub fn open_products(&self) -> Result<Vec<Product>> {
        let video = self.current_video().ok_or_else(|| Error::NotFound("open video".into()))?;
        self.player.lock().set_products_open(true);
        Ok(self.products(&video.id))
    }

    pub fn close_products(&self) {
        self.player.lock().set_products_open(false);
    }

    /// Apply a shell command to the player.
    pub fn command(&self, cmd: PlayerCommand) -> Result<Option<PlayerSnapshot>> {
        match cmd {
            PlayerCommand::Open { video_id } => self.open_player_from_feed(&video_id).map(Some),
            PlayerCommand::Advance => Ok(self.advance()),
            PlayerCommand::Retreat => Ok(self.retreat()),
            PlayerCommand::Close => {
                self.close_player();
                Ok(None)
            }
            PlayerCommand::LikeCurrent => {
                if let Some(video) = self.current_video() {
                    self.toggle_like(&video.id)?;
                }
                Ok(self.player_snapshot())
            }
            PlayerCommand::FollowCurrentOwner => {
                if let Some(video) = self.current_video() {
                    self.toggle_follow(video.owner_id())?;
                }
                Ok(self.player_snapshot())
            }
            PlayerCommand::UsernameClick => {
                self.username_click();
                Ok(self.player_snapshot())
            }
            PlayerCommand::OpenComments => {
                self.open_comments()?;
                Ok(self.player_snapshot())
            }
            PlayerCommand::CloseComments => {
                self.close_comments();
                Ok(self.player_snapshot())
            }
            PlayerCommand::OpenProducts => {
                self.open_products()?;
                Ok(self.player_snapshot())
            }
            PlayerCommand::CloseProducts => {
                self.close_products();
                Ok(self.player_snapshot())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Engagement
    // -----------------------------------------------------------------------

    /// Toggle the viewer's like on `video_id`. Returns the new state.
    pub fn toggle_like(&self, video_id: &str) -> Result<bool> {
        self.viewer_id()?;
        self.seed_counters(video_id)?;
        let (mutation, liked) = {
            let mut engagement = self.engagement.lock();
            let mutation = engagement.toggle_like(video_id).ok_or(Error::NotSignedIn)?;
            (mutation, engagement.is_liked(video_id))
        };
        self.dispatch(mutation);
        Ok(liked)
    }

    /// Toggle following `user_id`. Following yourself changes nothing.
    pub fn toggle_follow(&self, user_id: &str) -> Result<bool> {
        let (mutation, following) = {
            let mut engagement = self.engagement.lock();
            if engagement.viewer().is_none() {
                return Err(Error::NotSignedIn);
            }
            let mutation = engagement.toggle_follow(user_id);
            (mutation, engagement.is_following(user_id))
        };
        if let Some(mutation) = mutation {
            self.dispatch(mutation);
        }
        Ok(following)
    }

    pub fn is_liked(&self, video_id: &str) -> bool {
        self.engagement.lock().is_liked(video_id)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.engagement.lock().is_following(user_id)
    }

    // -----------------------------------------------------------------------
    // Comments & products
    // -----------------------------------------------------------------------

    pub fn comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        Ok(self.backend.comments(video_id)?)
    }

    pub fn add_comment(&self, video_id: &str, text: &str) -> Result<Comment> {
        let user_id = self.viewer_id()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("empty comment".into()));
        }
        let comment = self.backend.add_comment(video_id, &user_id, text)?;
        self.engagement.lock().bump_comment_count(video_id);
        Ok(comment)
    }

    /// Reconcile the cached comment count. Failures are ignored.
    pub fn refresh_comment_count(&self, video_id: &str) {
        match self.backend.comment_count(video_id) {
            Ok(count) => self.engagement.lock().set_comment_count(video_id, count),
            Err(e) => log::debug!("drapso: comment count for {} failed: {}", video_id, e),
        }
    }

    /// Products attached to a video; empty on failure.
    pub fn products(&self, video_id: &str) -> Vec<Product> {
        self.backend.products(video_id).unwrap_or_else(|e| {
            log::warn!("drapso: loading products for {} failed: {}", video_id, e);
            Vec::new()
        })
    }

    // -----------------------------------------------------------------------
    // Upload & videos
    // -----------------------------------------------------------------------

    /// Submit the form as the viewer. On failure the form stays editable.
    pub fn upload(&self, form: &mut UploadForm) -> Result<Video> {
        let user_id = self.viewer_id()?;
        let job = form.begin(&user_id, now_ms())?;

        let outcome = (|| -> Result<Video> {
            let bytes = std::fs::read(&job.source).map_err(|e| UploadError::Io(e.to_string()))?;
            let url = self
                .backend
                .store_object(VIDEO_BUCKET, &job.object, job.content_type, &bytes)?;
            let mut record = job.video.clone();
            record.video_url = url;
            let video = self.backend.create_video(&record)?;
            if !job.products.is_empty() {
                log_err(
                    self.backend.add_products(&video.id, &job.products),
                    "attach products",
                );
            }
            Ok(video)
        })();

        match outcome {
            Ok(video) => {
                form.finish();
                self.engagement.lock().seed(&video);
                self.feed.lock().insert(0, video.clone());
                log::info!("drapso: uploaded {} ({})", video.id, job.object);
                Ok(video)
            }
            Err(e) => {
                form.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Hard-delete one of the viewer's own videos.
    pub fn delete_video(&self, video_id: &str) -> Result<()> {
        let user_id = self.viewer_id()?;
        let video = match self.find_video(video_id) {
            Some(v) => v,
            None => self
                .backend
                .user_videos(&user_id)?
                .into_iter()
                .find(|v| v.id == video_id)
                .ok_or_else(|| Error::NotFound(format!("video {}", video_id)))?,
        };
        if video.owner_id() != user_id {
            return Err(Error::Forbidden);
        }

        self.backend.delete_video(video_id)?;
        let pool = {
            let mut feed = self.feed.lock();
            feed.retain(|v| v.id != video_id);
            feed.clone()
        };
        self.player.lock().replace_pool(pool);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.backend.profile(user_id)?)
    }

    /// Save the viewer's own profile, optionally with a new avatar file.
    pub fn save_profile(&self, mut update: ProfileUpdate, avatar: Option<&Path>) -> Result<Profile> {
        let user_id = self.viewer_id()?;

        if let Some(path) = avatar {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            let content_type = image_content_type(&ext)
                .ok_or_else(|| Error::InvalidInput(format!("avatar format: {}", ext)))?;
            let bytes = std::fs::read(path).map_err(|e| UploadError::Io(e.to_string()))?;
            let object = format!("avatars/{}-{}.{}", user_id, now_ms(), ext);
            let url = self
                .backend
                .store_object(AVATAR_BUCKET, &object, content_type, &bytes)?;
            update.avatar = Some(url);
        }

        if update.is_empty() {
            return self.viewer().ok_or(Error::NotSignedIn);
        }

        let saved = self.backend.update_profile(&user_id, &update)?;
        self.cache_identity(&saved)?;
        *self.viewer.lock() = Some(saved.clone());
        Ok(saved)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    pub fn notifications(&self) -> Result<Vec<Notification>> {
        let user_id = self.viewer_id()?;
        Ok(self.backend.notifications(&user_id)?)
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        self.viewer_id()?;
        Ok(self.backend.mark_notification_read(notification_id)?)
    }

    pub fn mark_all_notifications_read(&self) -> Result<()> {
        let user_id = self.viewer_id()?;
        Ok(self.backend.mark_all_notifications_read(&user_id)?)
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Search the cached feed and known users.
    pub fn search(&self, query: &str) -> SearchResults {
        let viewer = self.viewer();
        search::search(query, &self.feed.lock(), viewer.as_ref())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if !self.handles.get_mut().is_empty() {
            // Unblock the watcher; don't join here.
            log_err(
                self.shell.put(paths::OUTBOX_MUTATION, json!({"action": "noop"})),
                "drop sentinel outbox",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Log errors from fire-and-forget operations without panicking.
fn log_err<T, E: std::fmt::Display>(result: std::result::Result<T, E>, context: &str) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            log::warn!("drapso: {} failed: {}", context, e);
            false
        }
    }
}

/// Perform a mutation; failures are logged and never rolled back.
fn perform(backend: &dyn Backend, mutation: &Mutation) {
    log_err(apply_mutation(backend, mutation), mutation.label());
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
