//! C FFI surface for drapso.
//!
//! Pattern: opaque EngineHandle + C strings + JSON serialization.
//!
//! Web views, Flutter (`dart:ffi`), Swift or Kotlin shells render the
//! player from the snapshot JSON and feed raw gestures back in.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use drapso_core::{Engine, GestureInput, PlayerCommand, Profile, Theme};
use nine_s_shell::Shell;

// ---------------------------------------------------------------------------
// Error handling (thread-local last error)
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_error(msg: String) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(msg));
}

fn clear_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Returns the last error message (caller frees with `drapso_string_free`).
#[no_mangle]
pub extern "C" fn drapso_last_error() -> *mut c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow_mut()
            .take()
            .and_then(|s| CString::new(s).ok())
            .map(|s| s.into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Frees a string returned from drapso FFI.
///
/// # Safety
/// Must be a pointer returned from this FFI and not already freed.
#[no_mangle]
pub unsafe extern "C" fn drapso_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------------------------------------------------------------------------
// Opaque handle
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct EngineHandle {
    _private: [u8; 0],
}

struct EngineHandleInner {
    engine: Engine,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Sets the 9S storage root directory.
///
/// # Safety
/// `path` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn drapso_set_root(path: *const c_char) -> i32 {
    clear_error();
    match read_cstr(path) {
        Ok(p) => {
            std::env::set_var("NINE_S_ROOT", p);
            1
        }
        Err(e) => {
            set_error(e);
            0
        }
    }
}

/// Opens the drapso engine, restores any cached session and starts the
/// effect loop. Returns an opaque handle.
///
/// # Safety
/// `app_id` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn drapso_open(app_id: *const c_char) -> *mut EngineHandle {
    clear_error();
    let app = match read_cstr(app_id) {
        Ok(a) => a,
        Err(e) => {
            set_error(e);
            return ptr::null_mut();
        }
    };

    match Shell::open(&app, &[]) {
        Ok(shell) => {
            let engine = Engine::from_env(shell);
            if let Err(e) = engine.restore_session() {
                set_error(e.to_string());
            }
            engine.start();
            Box::into_raw(Box::new(EngineHandleInner { engine })) as *mut EngineHandle
        }
        Err(e) => {
            set_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Closes the engine after draining queued mutations.
#[no_mangle]
pub extern "C" fn drapso_close(handle: *mut EngineHandle) {
    if !handle.is_null() {
        unsafe {
            let inner = Box::from_raw(handle as *mut EngineHandleInner);
            inner.engine.shutdown();
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Sign in with a profile JSON. Returns the stored profile JSON (caller frees).
#[no_mangle]
pub extern "C" fn drapso_sign_in(handle: *mut EngineHandle, json: *const c_char) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let profile: Profile = match read_json(json) {
        Ok(p) => p,
        Err(e) => return err_null(e),
    };
    match engine.sign_in(profile) {
        Ok(stored) => json_to_cstr(&stored),
        Err(e) => err_null(e.to_string()),
    }
}

/// Signed-in profile JSON, or `null` (caller frees).
#[no_mangle]
pub extern "C" fn drapso_viewer(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.viewer()),
        Err(e) => err_null(e),
    }
}

/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn drapso_sign_out(handle: *mut EngineHandle) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => {
            set_error(e);
            return 0;
        }
    };
    match engine.sign_out() {
        Ok(()) => 1,
        Err(e) => {
            set_error(e.to_string());
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Feed & player
// ---------------------------------------------------------------------------

/// Reload the feed. Returns a JSON array of videos (caller frees).
#[no_mangle]
pub extern "C" fn drapso_refresh_feed(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    match engine.refresh_feed() {
        Ok(videos) => json_to_cstr(&videos),
        Err(e) => err_null(e.to_string()),
    }
}

/// Open the player at a feed video. Returns the snapshot JSON (caller frees).
#[no_mangle]
pub extern "C" fn drapso_player_open(
    handle: *mut EngineHandle,
    video_id: *const c_char,
) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let id = match read_cstr(video_id) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    match engine.open_player_from_feed(&id) {
        Ok(snapshot) => json_to_cstr(&snapshot),
        Err(e) => err_null(e.to_string()),
    }
}

/// Route one raw gesture, e.g. `{"kind":"wheel","delta_y":80}`.
/// Returns the snapshot JSON, or `null` once the player closed (caller frees).
#[no_mangle]
pub extern "C" fn drapso_player_input(
    handle: *mut EngineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let input: GestureInput = match read_json(json) {
        Ok(i) => i,
        Err(e) => return err_null(e),
    };
    json_to_cstr(&engine.player_input(input))
}

/// Apply a player command, e.g. `{"action":"like_current"}`.
/// Returns the snapshot JSON or `null` (caller frees).
#[no_mangle]
pub extern "C" fn drapso_player_command(
    handle: *mut EngineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let cmd: PlayerCommand = match read_json(json) {
        Ok(c) => c,
        Err(e) => return err_null(e),
    };
    match engine.command(cmd) {
        Ok(snapshot) => json_to_cstr(&snapshot),
        Err(e) => err_null(e.to_string()),
    }
}

/// Current player snapshot JSON, or `null` when closed (caller frees).
#[no_mangle]
pub extern "C" fn drapso_player_state(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.player_snapshot()),
        Err(e) => err_null(e),
    }
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

/// Toggle a like. Returns 1 if now liked, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn drapso_toggle_like(handle: *mut EngineHandle, video_id: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => {
            set_error(e);
            return -1;
        }
    };
    let id = match read_cstr(video_id) {
        Ok(s) => s,
        Err(e) => {
            set_error(e);
            return -1;
        }
    };
    match engine.toggle_like(&id) {
        Ok(liked) => liked as i32,
        Err(e) => {
            set_error(e.to_string());
            -1
        }
    }
}

/// Toggle a follow. Returns 1 if now following, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn drapso_toggle_follow(handle: *mut EngineHandle, user_id: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => {
            set_error(e);
            return -1;
        }
    };
    let id = match read_cstr(user_id) {
        Ok(s) => s,
        Err(e) => {
            set_error(e);
            return -1;
        }
    };
    match engine.toggle_follow(&id) {
        Ok(following) => following as i32,
        Err(e) => {
            set_error(e.to_string());
            -1
        }
    }
}

/// Comments JSON array for a video (caller frees).
#[no_mangle]
pub extern "C" fn drapso_comments(handle: *mut EngineHandle, video_id: *const c_char) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let id = match read_cstr(video_id) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    match engine.comments(&id) {
        Ok(comments) => json_to_cstr(&comments),
        Err(e) => err_null(e.to_string()),
    }
}

/// Post a comment. Returns the comment JSON (caller frees).
#[no_mangle]
pub extern "C" fn drapso_add_comment(
    handle: *mut EngineHandle,
    video_id: *const c_char,
    text: *const c_char,
) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let id = match read_cstr(video_id) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    let body = match read_cstr(text) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    match engine.add_comment(&id, &body) {
        Ok(comment) => json_to_cstr(&comment),
        Err(e) => err_null(e.to_string()),
    }
}

/// Viewer's notifications JSON array (caller frees).
#[no_mangle]
pub extern "C" fn drapso_notifications(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    match engine.notifications() {
        Ok(notes) => json_to_cstr(&notes),
        Err(e) => err_null(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Search & settings
// ---------------------------------------------------------------------------

/// Search the cached feed. Returns `{"users":[..],"videos":[..]}` (caller frees).
#[no_mangle]
pub extern "C" fn drapso_search(handle: *mut EngineHandle, query: *const c_char) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let q = match read_cstr(query) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    json_to_cstr(&engine.search(&q))
}

/// Current theme name, `dark` or `light` (caller frees).
#[no_mangle]
pub extern "C" fn drapso_theme(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => to_cstr(engine.theme().as_str().to_string()),
        Err(e) => err_null(e),
    }
}

/// Set the theme by name. Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn drapso_set_theme(handle: *mut EngineHandle, name: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => {
            set_error(e);
            return 0;
        }
    };
    let theme = match read_cstr(name).map(|n| Theme::parse(&n)) {
        Ok(Some(t)) => t,
        Ok(None) => {
            set_error("unknown theme".into());
            return 0;
        }
        Err(e) => {
            set_error(e);
            return 0;
        }
    };
    match engine.set_theme(theme) {
        Ok(()) => 1,
        Err(e) => {
            set_error(e.to_string());
            0
        }
    }
}

/// Store gesture thresholds. Returns the effective config JSON (caller frees).
#[no_mangle]
pub extern "C" fn drapso_configure_gestures(
    handle: *mut EngineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_null(e),
    };
    let value: serde_json::Value = match read_json(json) {
        Ok(v) => v,
        Err(e) => return err_null(e),
    };
    match engine.configure_gestures(value) {
        Ok(config) => json_to_cstr(&config),
        Err(e) => err_null(e.to_string()),
    }
}

/// FFI surface version.
#[no_mangle]
pub extern "C" fn drapso_version() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine_ref<'a>(handle: *mut EngineHandle) -> Result<&'a Engine, String> {
    if handle.is_null() {
        return Err("null engine handle".into());
    }
    let inner = unsafe { &*(handle as *mut EngineHandleInner) };
    Ok(&inner.engine)
}

fn read_cstr(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("null string pointer".into());
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_str()
            .map(String::from)
            .map_err(|_| "invalid utf-8".into())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(ptr: *const c_char) -> Result<T, String> {
    let raw = read_cstr(ptr)?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_cstr(json),
        Err(e) => err_null(e.to_string()),
    }
}

fn to_cstr(s: String) -> *mut c_char {
    CString::new(s)
        .map(|c| c.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn err_null(msg: String) -> *mut c_char {
    set_error(msg);
    ptr::null_mut()
}

// ---------------------------------------------------------------------------
// FFI Integration Tests
// ---------------------------------------------------------------------------
