//! drapso-core — short-video client kernel over 9S scrolls.
//!
//! Local state (theme, cached identity, the mutation outbox) is scrolls.
//! Everything remote goes through one injected [`effects::Backend`].
//!
//! # Architecture
//!
//! ```text
//! Layer 0: 9S substrate (settings, session, outbox, offline tables)
//! Layer 1: Pure state (shuffle, queue, gestures, engagement, player, upload form)
//! Layer 2: Engine + effect loop (backend mutations, fire-and-forget)
//! Layer 3: Shells (CLI, FFI hosts) drive the engine and render snapshots
//! ```

pub mod config;
pub mod effects;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod models;
pub mod paths;
pub mod player;
pub mod queue;
pub mod search;
pub mod shuffle;
pub mod upload;

pub use engagement::Counters;
pub use engine::{Engine, PlayerObserver};
pub use error::{BackendError, Error, Result, UploadError};
pub use gesture::{GestureConfig, GestureInput, Intent, Key};
pub use models::*;
pub use player::PlayerSnapshot;
pub use search::SearchResults;
pub use upload::{PickedMedia, UploadForm};

#[cfg(test)]
pub(crate) mod testing {
    use crate::models::{Owner, Video};
    use nine_s_shell::Shell;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    /// `NINE_S_ROOT` is process-wide; tests that open a shell take this first.
    pub(crate) static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    pub(crate) fn temp_shell(app: &str) -> (TempDir, Shell, MutexGuard<'static, ()>) {
        let guard = ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        std::env::set_var("NINE_S_ROOT", dir.path());
        let shell = Shell::open(app, &[]).expect("shell");
        (dir, shell, guard)
    }

    pub(crate) fn video_by(id: &str, owner_id: &str, username: &str) -> Video {
        Video {
            id: id.into(),
            url: format!("local://videos/{}.mp4", id),
            title: format!("Video {}", id),
            description: format!("clip {}", id),
            duration_secs: 30.0,
            owner: Owner {
                id: owner_id.into(),
                username: username.into(),
                avatar: None,
            },
            likes: 0,
            views: 0,
            comments: 0,
            has_affiliate: false,
            affiliate_link: None,
            has_location: false,
            location: None,
            created_at: Default::default(),
        }
    }

    pub(crate) fn video(id: &str) -> Video {
        video_by(id, "owner", "owner")
    }

    pub(crate) fn videos(ids: &[&str]) -> Vec<Video> {
        ids.iter().map(|id| video(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Backend;
    use crate::testing::temp_shell;
    use std::sync::{Arc, MutexGuard};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn temp_engine(app: &str) -> (TempDir, Engine, MutexGuard<'static, ()>) {
        let (dir, shell, guard) = temp_shell(app);
        (dir, Engine::new(shell), guard)
    }

    fn person(id: &str) -> Profile {
        Profile {
            id: id.into(),
            username: id.into(),
            display_name: format!("{} display", id),
            avatar: None,
            bio: String::new(),
            follower_count: 0,
            following_count: 0,
        }
    }

    fn publish(engine: &Engine, owner: &str, title: &str) -> Video {
        engine
            .backend()
            .create_video(&NewVideo {
                user_id: owner.into(),
                title: title.into(),
                description: format!("{} description", title),
                video_url: format!("local://videos/{}.mp4", title),
                duration: 20.0,
                has_affiliate: false,
                affiliate_link: None,
                has_location: false,
                location: None,
            })
            .unwrap()
    }

    fn outbox_is_empty(engine: &Engine) -> bool {
        engine
            .shell()
            .get(paths::OUTBOX_MUTATION)
            .unwrap()
            .is_none()
    }

    #[derive(Default)]
    struct Recorder {
        events: parking_lot::Mutex<Vec<String>>,
    }

    impl PlayerObserver for Recorder {
        fn on_show(&self, video: &Video) {
            self.events.lock().push(format!("show:{}", video.id));
        }
        fn on_username_click(&self, user_id: &str) {
            self.events.lock().push(format!("user:{}", user_id));
        }
        fn on_close(&self) {
            self.events.lock().push("close".into());
        }
    }

    #[test]
    fn theme_defaults_dark_and_persists() {
        let (_dir, engine, _guard) = temp_engine("test-theme");
        assert_eq!(engine.theme(), Theme::Dark);
        assert_eq!(engine.toggle_theme().unwrap(), Theme::Light);
        assert_eq!(engine.theme(), Theme::Light);

        let scroll = engine.shell().get(paths::SETTINGS_THEME).unwrap().unwrap();
        assert_eq!(scroll.data["theme"], "light");
    }

    #[test]
    fn sign_in_caches_identity_and_restores() {
        let (_dir, engine, _guard) = temp_engine("test-session");
        assert!(engine.restore_session().unwrap().is_none());

        engine.sign_in(person("alice")).unwrap();
        let scroll = engine.shell().get(paths::SESSION_USER).unwrap().unwrap();
        assert_eq!(scroll.data["id"], "alice");
        assert_eq!(scroll.data["full_name"], "alice display");
        drop(engine);

        let shell = nine_s_shell::Shell::open("test-session", &[]).unwrap();
        let engine = Engine::new(shell);
        let restored = engine.restore_session().unwrap().unwrap();
        assert_eq!(restored.id, "alice");
        assert_eq!(engine.viewer().unwrap().display_name, "alice display");

        engine.sign_out().unwrap();
        assert!(engine.viewer().is_none());
        assert!(engine.restore_session().unwrap().is_none());
    }

    #[test]
    fn sign_in_mirrors_likes_and_follows() {
        let (_dir, engine, _guard) = temp_engine("test-mirror");
        let v = publish(&engine, "bob", "clip");
        engine.backend().like_video(&v.id, "alice").unwrap();
        engine.backend().follow_user("alice", "bob").unwrap();

        engine.sign_in(person("alice")).unwrap();
        assert!(engine.is_liked(&v.id));
        assert!(engine.is_following("bob"));
    }

    #[test]
    fn anonymous_like_issues_no_mutation() {
        let (_dir, engine, _guard) = temp_engine("test-anon-like");
        engine.start();
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();

        assert!(matches!(engine.toggle_like(&v.id), Err(Error::NotSignedIn)));
        assert!(matches!(engine.toggle_follow("bob"), Err(Error::NotSignedIn)));
        assert!(!engine.is_liked(&v.id));
        assert!(outbox_is_empty(&engine));
        engine.shutdown();
    }

    #[test]
    fn self_follow_is_noop() {
        let (_dir, engine, _guard) = temp_engine("test-self-follow");
        engine.start();
        engine.sign_in(person("alice")).unwrap();
        assert!(!engine.toggle_follow("alice").unwrap());
        assert!(!engine.is_following("alice"));
        assert!(outbox_is_empty(&engine));
        engine.shutdown();
    }

    #[test]
    fn like_goes_through_effect_loop() {
        let (_dir, engine, _guard) = temp_engine("test-like-loop");
        engine.start();
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();

        assert!(engine.toggle_like(&v.id).unwrap());
        assert_eq!(engine.counters(&v.id).unwrap().likes, 1);
        engine.shutdown();

        let stored = engine.backend().list_videos().unwrap();
        assert_eq!(stored[0].likes, 1);
        assert_eq!(engine.backend().user_likes("alice").unwrap(), vec![v.id.clone()]);
        let notes = engine.backend().notifications("bob").unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn like_outside_feed_counts_from_stored_likes() {
        let (_dir, engine, _guard) = temp_engine("test-like-unseen");
        let v = publish(&engine, "bob", "clip");
        for fan in ["u1", "u2", "u3", "u4", "u5"] {
            engine.backend().like_video(&v.id, fan).unwrap();
        }
        engine.sign_in(person("alice")).unwrap();

        assert!(engine.toggle_like(&v.id).unwrap());
        assert_eq!(engine.counters(&v.id).unwrap().likes, 6);
        assert_eq!(engine.backend().video(&v.id).unwrap().unwrap().likes, 6);
        assert!(matches!(engine.toggle_like("no-such-video"), Err(Error::NotFound(_))));
    }

    #[test]
    fn mutations_after_shutdown_apply_inline() {
        let (_dir, engine, _guard) = temp_engine("test-after-shutdown");
        engine.start();
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();
        engine.shutdown();

        assert!(engine.toggle_like(&v.id).unwrap());
        assert_eq!(engine.backend().user_likes("alice").unwrap(), vec![v.id.clone()]);
        assert_eq!(engine.backend().video(&v.id).unwrap().unwrap().likes, 1);
    }

    #[test]
    fn double_like_toggle_round_trips() {
        let (_dir, engine, _guard) = temp_engine("test-double-like");
        engine.start();
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();

        assert!(engine.toggle_like(&v.id).unwrap());
        assert!(!engine.toggle_like(&v.id).unwrap());
        assert_eq!(engine.counters(&v.id).unwrap().likes, 0);
        engine.shutdown();

        assert_eq!(engine.backend().list_videos().unwrap()[0].likes, 0);
        assert!(engine.backend().user_likes("alice").unwrap().is_empty());
    }

    #[test]
    fn view_counted_once_per_open_session() {
        let (_dir, engine, _guard) = temp_engine("test-views");
        let a = publish(&engine, "bob", "a");
        let b = publish(&engine, "bob", "b");
        engine.refresh_feed().unwrap();

        let snap = engine.open_player_from_feed(&a.id).unwrap();
        assert_eq!(snap.video.id, a.id);
        assert_eq!(snap.counters.views, 1);

        assert_eq!(engine.advance().unwrap().video.id, b.id);
        assert_eq!(engine.retreat().unwrap().video.id, a.id);
        assert_eq!(engine.player_snapshot().unwrap().counters.views, 1);

        let views = |id: &str| {
            engine
                .backend()
                .list_videos()
                .unwrap()
                .into_iter()
                .find(|v| v.id == id)
                .unwrap()
                .views
        };
        assert_eq!(views(&a.id), 1);
        assert_eq!(views(&b.id), 1);

        assert!(engine.close_player());
        engine.open_player_from_feed(&a.id).unwrap();
        assert_eq!(views(&a.id), 2);
    }

    #[test]
    fn wheel_burst_advances_once() {
        let (_dir, engine, _guard) = temp_engine("test-wheel");
        for t in ["a", "b", "c", "d"] {
            publish(&engine, "bob", t);
        }
        let feed = engine.refresh_feed().unwrap();
        let start = engine.open_player_from_feed(&feed[0].id).unwrap();

        let t0 = Instant::now();
        let mut last = start.cursor;
        let mut moves = 0;
        for i in 0..6 {
            let snap = engine
                .player_input_at(GestureInput::Wheel { delta_y: 90.0 }, t0 + Duration::from_millis(i * 40))
                .unwrap();
            if snap.cursor != last {
                moves += 1;
                last = snap.cursor;
            }
        }
        assert_eq!(moves, 1);
    }

    #[test]
    fn escape_closes_and_observer_sees_it() {
        let (_dir, engine, _guard) = temp_engine("test-observer");
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();
        let recorder = Arc::new(Recorder::default());
        engine.set_observer(recorder.clone());

        engine.open_player_from_feed(&v.id).unwrap();
        assert_eq!(engine.username_click().as_deref(), Some("bob"));
        let after = engine.player_input(GestureInput::Key { key: Key::Escape });
        assert!(after.is_none());
        assert!(!engine.is_player_open());
        assert!(engine.player_snapshot().is_none());

        let events = recorder.events.lock().clone();
        assert_eq!(events, vec![format!("show:{}", v.id), "user:bob".to_string(), "close".to_string()]);
    }

    #[test]
    fn player_commands_drive_session() {
        let (_dir, engine, _guard) = temp_engine("test-commands");
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();

        let cmd = PlayerCommand::from_value(&serde_json::json!({"action": "open", "video_id": v.id})).unwrap();
        let snap = engine.command(cmd).unwrap().unwrap();
        assert!(snap.can_follow);
        assert!(!snap.liked);

        let snap = engine.command(PlayerCommand::LikeCurrent).unwrap().unwrap();
        assert!(snap.liked);
        assert_eq!(snap.counters.likes, 1);

        let snap = engine.command(PlayerCommand::FollowCurrentOwner).unwrap().unwrap();
        assert!(snap.following_owner);

        let snap = engine.command(PlayerCommand::OpenComments).unwrap().unwrap();
        assert!(snap.comments_open);
        let snap = engine.command(PlayerCommand::CloseComments).unwrap().unwrap();
        assert!(!snap.comments_open);

        assert!(engine.command(PlayerCommand::Close).unwrap().is_none());
        assert!(matches!(
            engine.command(PlayerCommand::Open { video_id: "missing".into() }),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn gesture_settings_validate_and_fall_back() {
        let (_dir, engine, _guard) = temp_engine("test-gesture-settings");
        assert_eq!(engine.gesture_config(), GestureConfig::default());

        let cfg = engine
            .configure_gestures(serde_json::json!({"cooldown_ms": 250}))
            .unwrap();
        assert_eq!(cfg.cooldown_ms, 250);
        assert_eq!(engine.gesture_config().cooldown_ms, 250);

        assert!(matches!(
            engine.configure_gestures(serde_json::json!({"swipe_threshold": -1})),
            Err(Error::InvalidInput(_))
        ));

        engine
            .shell()
            .put(paths::SETTINGS_GESTURE, serde_json::json!({"cooldown_ms": "soon"}))
            .unwrap();
        assert_eq!(engine.gesture_config(), GestureConfig::default());
    }

    #[test]
    fn comments_trim_and_reconcile_count() {
        let (_dir, engine, _guard) = temp_engine("test-comments");
        let v = publish(&engine, "bob", "clip");
        engine.refresh_feed().unwrap();

        assert!(matches!(engine.add_comment(&v.id, "hi"), Err(Error::NotSignedIn)));
        engine.sign_in(person("alice")).unwrap();
        assert!(matches!(engine.add_comment(&v.id, "   "), Err(Error::InvalidInput(_))));

        let c = engine.add_comment(&v.id, "  nice one  ").unwrap();
        assert_eq!(c.text, "nice one");
        assert_eq!(c.author.username, "alice");
        assert_eq!(engine.counters(&v.id).unwrap().comments, 1);

        // Another client comments; opening the panel picks it up.
        engine.backend().add_comment(&v.id, "carol", "me too").unwrap();
        engine.open_player_from_feed(&v.id).unwrap();
        let comments = engine.open_comments().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(engine.counters(&v.id).unwrap().comments, 2);
    }

    #[test]
    fn upload_publishes_and_resets_form() {
        let (dir, engine, _guard) = temp_engine("test-upload");
        engine.sign_in(person("alice")).unwrap();

        let file = dir.path().join("beach.mp4");
        std::fs::write(&file, b"fake mp4 bytes").unwrap();

        let mut form = UploadForm::new();
        form.set_media(PickedMedia::with_duration(&file, 42.0)).unwrap();
        assert!(form.next());
        form.title = "Beach".into();
        form.description = "Waves".into();
        form.has_location = true;
        form.location = "Lisbon".into();
        form.products.push(NewProduct {
            name: "Towel".into(),
            url: "https://shop.example/towel".into(),
            ..Default::default()
        });

        let video = engine.upload(&mut form).unwrap();
        assert!(video.url.starts_with("local://videos/videos/alice-"));
        assert!(video.url.ends_with(".mp4"));
        assert_eq!(video.duration_secs, 42.0);
        assert_eq!(video.location.as_deref(), Some("Lisbon"));
        assert!(form.media().is_none());
        assert!(form.title.is_empty());

        assert_eq!(engine.feed()[0].id, video.id);
        assert_eq!(engine.user_videos("alice").unwrap().len(), 1);
        assert_eq!(engine.products(&video.id).len(), 1);

        engine.open_player_from_feed(&video.id).unwrap();
        assert_eq!(engine.open_products().unwrap().len(), 1);
        assert!(engine.player_snapshot().unwrap().products_open);
        assert!(engine.player_snapshot().unwrap().location_link.is_some());
    }

    #[test]
    fn too_short_clip_never_reaches_backend() {
        let (dir, engine, _guard) = temp_engine("test-upload-short");
        engine.sign_in(person("alice")).unwrap();
        let file = dir.path().join("blink.mp4");
        std::fs::write(&file, b"fake mp4 bytes").unwrap();

        let mut form = UploadForm::new();
        form.title = "Blink".into();
        form.description = "Too quick".into();
        assert!(matches!(
            form.set_media(PickedMedia::with_duration(&file, 4.9)),
            Err(UploadError::InvalidDuration)
        ));
        assert!(form.media().is_none());

        assert!(matches!(
            engine.upload(&mut form),
            Err(Error::Upload(UploadError::NoMedia))
        ));
        assert!(engine.backend().list_videos().unwrap().is_empty());
        assert_eq!(form.title, "Blink");
    }

    #[test]
    fn failed_upload_keeps_inputs() {
        let (dir, engine, _guard) = temp_engine("test-upload-fail");
        let file = dir.path().join("missing.mp4");

        let mut form = UploadForm::new();
        form.set_media(PickedMedia::with_duration(&file, 10.0)).unwrap();
        form.title = "Title".into();
        form.description = "Desc".into();

        assert!(matches!(engine.upload(&mut form), Err(Error::NotSignedIn)));
        assert!(form.can_upload());

        engine.sign_in(person("alice")).unwrap();
        assert!(matches!(
            engine.upload(&mut form),
            Err(Error::Upload(UploadError::Io(_)))
        ));
        assert!(!form.is_uploading());
        assert_eq!(form.title, "Title");
        assert!(form.error().is_some());
        assert!(engine.feed().is_empty());
    }

    #[test]
    fn delete_is_owner_only() {
        let (_dir, engine, _guard) = temp_engine("test-delete");
        let theirs = publish(&engine, "bob", "theirs");
        let mine = publish(&engine, "alice", "mine");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();

        assert!(matches!(engine.delete_video(&theirs.id), Err(Error::Forbidden)));
        engine.delete_video(&mine.id).unwrap();

        let ids: Vec<String> = engine.feed().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![theirs.id.clone()]);
        assert_eq!(engine.refresh_feed().unwrap().len(), 1);
    }

    #[test]
    fn notifications_for_viewer() {
        let (_dir, engine, _guard) = temp_engine("test-notifications");
        let v = publish(&engine, "alice", "clip");
        engine.backend().like_video(&v.id, "bob").unwrap();
        engine.backend().follow_user("bob", "alice").unwrap();

        assert!(matches!(engine.notifications(), Err(Error::NotSignedIn)));
        engine.sign_in(person("alice")).unwrap();
        let notes = engine.notifications().unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| !n.is_read));

        engine.mark_notification_read(&notes[0].id).unwrap();
        assert_eq!(engine.notifications().unwrap().iter().filter(|n| n.is_read).count(), 1);
        engine.mark_all_notifications_read().unwrap();
        assert!(engine.notifications().unwrap().iter().all(|n| n.is_read));
    }

    #[test]
    fn save_profile_updates_cache() {
        let (_dir, engine, _guard) = temp_engine("test-profile");
        assert!(matches!(
            engine.save_profile(ProfileUpdate::default(), None),
            Err(Error::NotSignedIn)
        ));
        engine.sign_in(person("alice")).unwrap();

        let saved = engine
            .save_profile(
                ProfileUpdate {
                    display_name: Some("Alice A.".into()),
                    bio: Some("hello".into()),
                    avatar: None,
                },
                None,
            )
            .unwrap();
        assert_eq!(saved.display_name, "Alice A.");
        assert_eq!(engine.viewer().unwrap().bio, "hello");

        let scroll = engine.shell().get(paths::SESSION_USER).unwrap().unwrap();
        assert_eq!(scroll.data["full_name"], "Alice A.");
        assert_eq!(engine.profile("alice").unwrap().unwrap().bio, "hello");
    }

    #[test]
    fn search_covers_feed_and_viewer() {
        let (_dir, engine, _guard) = temp_engine("test-search");
        publish(&engine, "bob", "sunset");
        publish(&engine, "bob", "coffee");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();

        let hits = engine.search("SUNSET");
        assert_eq!(hits.videos.len(), 1);
        assert!(engine.search("").is_empty());
        assert_eq!(engine.search("alice").users[0].id, "alice");
    }

    #[test]
    fn liked_and_random_videos() {
        let (_dir, engine, _guard) = temp_engine("test-liked");
        let a = publish(&engine, "bob", "a");
        publish(&engine, "bob", "b");
        engine.refresh_feed().unwrap();
        engine.sign_in(person("alice")).unwrap();
        engine.toggle_like(&a.id).unwrap();

        let liked: Vec<String> = engine.liked_videos().into_iter().map(|v| v.id).collect();
        assert_eq!(liked, vec![a.id.clone()]);
        assert_eq!(engine.random_videos(10).len(), 2);
        assert_eq!(engine.random_videos(1).len(), 1);
    }

    #[test]
    fn shutdown_completes_and_is_idempotent() {
        let (_dir, engine, _guard) = temp_engine("test-shutdown");
        engine.start();
        engine.start();
        std::thread::sleep(Duration::from_millis(50));
        engine.shutdown();
        engine.shutdown();
    }
}
