//! drapso CLI — terminal client for the drapso engine.
//!
//! Commands:
//!   drapso login <id> <username> [name]   Sign in and cache the identity
//!   drapso logout                         Forget the cached identity
//!   drapso whoami                         Show the signed-in user
//!   drapso feed                           List every video, newest first
//!   drapso watch [video_id]               Scroll the feed (j/k/l/f/c/p/u/q)
//!   drapso search <query>                 Search videos and users
//!   drapso upload <file> <title> <desc>   Publish a video
//!   drapso delete <video_id>              Delete one of your videos
//!   drapso like <video_id>                Toggle a like
//!   drapso follow <user_id>               Toggle a follow
//!   drapso comments <video_id>            List comments
//!   drapso comment <video_id> <text>      Post a comment
//!   drapso profile [user_id]              Show a profile and its videos
//!   drapso edit-profile [--name ..] [--bio ..] [--avatar file]
//!   drapso notifications [read-all]       Recent notifications
//!   drapso theme [dark|light|toggle]      Show or set the theme

use std::io::{BufRead, Write};
use std::path::Path;

use drapso_core::upload::UploadForm;
use drapso_core::{Engine, GestureInput, Key, NewProduct, PlayerSnapshot, Profile, ProfileUpdate, Theme};
use nine_s_shell::Shell;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    // 9S root defaults to ~/.drapso
    if std::env::var("NINE_S_ROOT").is_err() {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let root = format!("{}/.drapso", home);
        std::fs::create_dir_all(&root).ok();
        std::env::set_var("NINE_S_ROOT", &root);
    }

    let shell = match Shell::open("drapso", &[]) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("failed to open 9S shell: {}", e);
            std::process::exit(1);
        }
    };
    let engine = Engine::from_env(shell);
    if let Err(e) = engine.restore_session() {
        log::warn!("drapso: restoring session failed: {}", e);
    }
    engine.start();

    match args[0].as_str() {
        "login" => cmd_login(&engine, &args[1..]),
        "logout" => cmd_logout(&engine),
        "whoami" => cmd_whoami(&engine),
        "feed" => cmd_feed(&engine),
        "watch" => cmd_watch(&engine, &args[1..]),
        "search" => cmd_search(&engine, &args[1..]),
        "upload" => cmd_upload(&engine, &args[1..]),
        "delete" => cmd_delete(&engine, &args[1..]),
        "like" => cmd_like(&engine, &args[1..]),
        "follow" => cmd_follow(&engine, &args[1..]),
        "comments" => cmd_comments(&engine, &args[1..]),
        "comment" => cmd_comment(&engine, &args[1..]),
        "profile" => cmd_profile(&engine, &args[1..]),
        "edit-profile" => cmd_edit_profile(&engine, &args[1..]),
        "notifications" => cmd_notifications(&engine, &args[1..]),
        "theme" => cmd_theme(&engine, &args[1..]),
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
        }
    }

    // Drains queued likes, follows and views before exit.
    engine.shutdown();
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn cmd_login(engine: &Engine, args: &[String]) {
    if args.len() < 2 {
        eprintln!("usage: drapso login <id> <username> [display name]");
        return;
    }
    let display_name = if args.len() > 2 {
        args[2..].join(" ")
    } else {
        args[1].clone()
    };
    let profile = Profile {
        id: args[0].clone(),
        username: args[1].clone(),
        display_name,
        avatar: None,
        bio: String::new(),
        follower_count: 0,
        following_count: 0,
    };
    match engine.sign_in(profile) {
        Ok(p) => println!("signed in as @{} ({})", p.username, p.display_name),
        Err(e) => eprintln!("login failed: {}", e),
    }
}

fn cmd_logout(engine: &Engine) {
    match engine.sign_out() {
        Ok(()) => println!("signed out"),
        Err(e) => eprintln!("logout failed: {}", e),
    }
}

fn cmd_whoami(engine: &Engine) {
    match engine.viewer() {
        Some(p) => println!("@{}  {}  ({})", p.username, p.display_name, p.id),
        None => println!("not signed in"),
    }
}

// ---------------------------------------------------------------------------
// Feed & player
// ---------------------------------------------------------------------------

fn cmd_feed(engine: &Engine) {
    let videos = match engine.refresh_feed() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("feed failed: {}", e);
            return;
        }
    };
    if videos.is_empty() {
        println!("no videos yet");
        return;
    }
    for v in &videos {
        println!(
            "{}  {} — @{}  ♥ {}  ▶ {}  💬 {}",
            v.id, v.title, v.owner.username, v.likes, v.views, v.comments
        );
    }
}

fn cmd_watch(engine: &Engine, args: &[String]) {
    let feed = match engine.refresh_feed() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("feed failed: {}", e);
            return;
        }
    };
    let start = match args.first() {
        Some(id) => id.clone(),
        None => match feed.first() {
            Some(v) => v.id.clone(),
            None => {
                println!("no videos yet");
                return;
            }
        },
    };
    let mut snap = match engine.open_player_from_feed(&start) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("j next · k previous · l like · f follow · c comments · p products · u owner · q quit");
    print_slot(&snap);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let next = match line.trim() {
            "j" => engine.player_input(GestureInput::Key { key: Key::ArrowDown }),
            "k" => engine.player_input(GestureInput::Key { key: Key::ArrowUp }),
            "q" => engine.player_input(GestureInput::Key { key: Key::Escape }),
            "l" => {
                if let Err(e) = engine.toggle_like(&snap.video.id) {
                    eprintln!("{}", e);
                }
                engine.player_snapshot()
            }
            "f" => {
                if let Err(e) = engine.toggle_follow(snap.video.owner_id()) {
                    eprintln!("{}", e);
                }
                engine.player_snapshot()
            }
            "c" => {
                match engine.open_comments() {
                    Ok(comments) => print_comments(&comments),
                    Err(e) => eprintln!("{}", e),
                }
                engine.close_comments();
                engine.player_snapshot()
            }
            "p" => {
                match engine.open_products() {
                    Ok(products) if products.is_empty() => println!("  no products"),
                    Ok(products) => {
                        for p in &products {
                            println!("  {}  {}  {}", p.name, p.price, p.product_url);
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
                engine.close_products();
                engine.player_snapshot()
            }
            "u" => {
                if let Some(owner) = engine.username_click() {
                    println!("  owner: {}", owner);
                }
                engine.player_snapshot()
            }
            _ => engine.player_snapshot(),
        };
        match next {
            Some(s) => {
                print_slot(&s);
                snap = s;
            }
            None => break,
        }
    }
    engine.close_player();
}

fn cmd_search(engine: &Engine, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: drapso search <query>");
        return;
    }
    if let Err(e) = engine.refresh_feed() {
        eprintln!("feed failed: {}", e);
        return;
    }
    let results = engine.search(&args.join(" "));
    if results.is_empty() {
        println!("no results");
        return;
    }
    for u in &results.users {
        println!("user   @{}  {}  ({})", u.username, u.display_name, u.id);
    }
    for v in &results.videos {
        println!("video  {}  {} — @{}", v.id, v.title, v.owner.username);
    }
}

// ---------------------------------------------------------------------------
// Upload & videos
// ---------------------------------------------------------------------------

fn cmd_upload(engine: &Engine, args: &[String]) {
    if args.len() < 3 {
        eprintln!("usage: drapso upload <file> <title> <description> [--location <place>] [--affiliate <url>] [--product <name> <url>]");
        return;
    }
    let mut form = UploadForm::new();
    if let Err(e) = form.pick_file(Path::new(&args[0])) {
        eprintln!("{}", e);
        return;
    }
    form.next();
    form.title = args[1].clone();
    form.description = args[2].clone();

    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--location" => {
                form.has_location = true;
                form.location = rest.next().cloned().unwrap_or_default();
            }
            "--affiliate" => {
                form.has_affiliate = true;
                form.affiliate_link = rest.next().cloned().unwrap_or_default();
            }
            "--product" => {
                let name = rest.next().cloned().unwrap_or_default();
                let url = rest.next().cloned().unwrap_or_default();
                form.products.push(NewProduct {
                    name,
                    url,
                    ..Default::default()
                });
            }
            other => eprintln!("ignoring unknown flag: {}", other),
        }
    }

    match engine.upload(&mut form) {
        Ok(v) => println!("uploaded {}  {}", v.id, v.url),
        Err(e) => eprintln!("upload failed: {}", e),
    }
}

fn cmd_delete(engine: &Engine, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: drapso delete <video_id>");
        return;
    }
    if let Err(e) = engine.refresh_feed() {
        log::warn!("drapso: feed refresh failed: {}", e);
    }
    match engine.delete_video(&args[0]) {
        Ok(()) => println!("deleted {}", args[0]),
        Err(e) => eprintln!("delete failed: {}", e),
    }
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

fn cmd_like(engine: &Engine, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: drapso like <video_id>");
        return;
    }
    if let Err(e) = engine.refresh_feed() {
        log::warn!("drapso: feed refresh failed: {}", e);
    }
    match engine.toggle_like(&args[0]) {
        Ok(true) => println!("liked {}", args[0]),
        Ok(false) => println!("unliked {}", args[0]),
        Err(e) => eprintln!("{}", e),
    }
}

fn cmd_follow(engine: &Engine, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: drapso follow <user_id>");
        return;
    }
    match engine.toggle_follow(&args[0]) {
        Ok(true) => println!("following {}", args[0]),
        Ok(false) => println!("not following {}", args[0]),
        Err(e) => eprintln!("{}", e),
    }
}

fn cmd_comments(engine: &Engine, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: drapso comments <video_id>");
        return;
    }
    match engine.comments(&args[0]) {
        Ok(comments) => print_comments(&comments),
        Err(e) => eprintln!("{}", e),
    }
}

fn cmd_comment(engine: &Engine, args: &[String]) {
    if args.len() < 2 {
        eprintln!("usage: drapso comment <video_id> <text>");
        return;
    }
    match engine.add_comment(&args[0], &args[1..].join(" ")) {
        Ok(c) => println!("commented {}", c.id),
        Err(e) => eprintln!("comment failed: {}", e),
    }
}

// ---------------------------------------------------------------------------
// Profiles & notifications
// ---------------------------------------------------------------------------

fn cmd_profile(engine: &Engine, args: &[String]) {
    let user_id = match args.first().cloned().or_else(|| engine.viewer().map(|p| p.id)) {
        Some(id) => id,
        None => {
            eprintln!("usage: drapso profile <user_id>");
            return;
        }
    };
    match engine.profile(&user_id) {
        Ok(Some(p)) => {
            println!("@{}  {}", p.username, p.display_name);
            if !p.bio.is_empty() {
                println!("  {}", p.bio);
            }
            println!("  {} followers · {} following", p.follower_count, p.following_count);
        }
        Ok(None) => {
            println!("no such user: {}", user_id);
            return;
        }
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    }
    match engine.user_videos(&user_id) {
        Ok(videos) => {
            for v in &videos {
                println!("  {}  {}  ♥ {}", v.id, v.title, v.likes);
            }
        }
        Err(e) => eprintln!("{}", e),
    }
}

fn cmd_edit_profile(engine: &Engine, args: &[String]) {
    let mut update = ProfileUpdate::default();
    let mut avatar = None;
    let mut rest = args.iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--name" => update.display_name = rest.next().cloned(),
            "--bio" => update.bio = rest.next().cloned(),
            "--avatar" => avatar = rest.next().cloned(),
            other => eprintln!("ignoring unknown flag: {}", other),
        }
    }
    match engine.save_profile(update, avatar.as_deref().map(Path::new)) {
        Ok(p) => println!("saved @{}  {}", p.username, p.display_name),
        Err(e) => eprintln!("save failed: {}", e),
    }
}

fn cmd_notifications(engine: &Engine, args: &[String]) {
    if args.first().map(String::as_str) == Some("read-all") {
        if let Err(e) = engine.mark_all_notifications_read() {
            eprintln!("{}", e);
        }
        return;
    }
    match engine.notifications() {
        Ok(notes) if notes.is_empty() => println!("no notifications"),
        Ok(notes) => {
            for n in &notes {
                let mark = if n.is_read { " " } else { "*" };
                println!(
                    "{} {:?} from @{}  {}",
                    mark,
                    n.kind,
                    n.actor.username,
                    n.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Err(e) => eprintln!("{}", e),
    }
}

fn cmd_theme(engine: &Engine, args: &[String]) {
    let result = match args.first().map(String::as_str) {
        None => {
            println!("{}", engine.theme().as_str());
            return;
        }
        Some("toggle") => engine.toggle_theme(),
        Some(name) => match Theme::parse(name) {
            Some(theme) => engine.set_theme(theme).map(|_| theme),
            None => {
                eprintln!("usage: drapso theme [dark|light|toggle]");
                return;
            }
        },
    };
    match result {
        Ok(theme) => println!("{}", theme.as_str()),
        Err(e) => eprintln!("{}", e),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_slot(snap: &PlayerSnapshot) {
    let v = &snap.video;
    let heart = if snap.liked { "♥" } else { "♡" };
    let follow = match (snap.can_follow, snap.following_owner) {
        (true, true) => "  [following]",
        (true, false) => "  [follow]",
        _ => "",
    };
    println!(
        "[{}/{}] {} — @{}{}  {}s",
        snap.cursor + 1,
        snap.len,
        v.title,
        v.owner.username,
        follow,
        v.duration_secs.round()
    );
    println!(
        "        {} {}  ▶ {}  💬 {}",
        heart, snap.counters.likes, snap.counters.views, snap.counters.comments
    );
    if let Some(link) = &snap.location_link {
        println!("        📍 {}", link);
    }
    std::io::stdout().flush().ok();
}

fn print_comments(comments: &[drapso_core::Comment]) {
    if comments.is_empty() {
        println!("  no comments");
        return;
    }
    for c in comments {
        println!("  @{}: {}", c.author.username, c.text);
    }
}

fn print_usage() {
    println!("drapso - short videos in the terminal");
    println!();
    println!("usage: drapso <command> [args]");
    println!();
    println!("commands:");
    println!("  login <id> <username> [name]  Sign in and cache the identity");
    println!("  logout                        Forget the cached identity");
    println!("  whoami                        Show the signed-in user");
    println!("  feed                          List every video, newest first");
    println!("  watch [video_id]              Scroll the feed (j/k/l/f/c/p/u/q)");
    println!("  search <query>                Search videos and users");
    println!("  upload <file> <title> <desc>  Publish a video");
    println!("  delete <video_id>             Delete one of your videos");
    println!("  like <video_id>               Toggle a like");
    println!("  follow <user_id>              Toggle a follow");
    println!("  comments <video_id>           List comments");
    println!("  comment <video_id> <text>     Post a comment");
    println!("  profile [user_id]             Show a profile and its videos");
    println!("  edit-profile [--name ..] [--bio ..] [--avatar file]");
    println!("  notifications [read-all]      Recent notifications");
    println!("  theme [dark|light|toggle]     Show or set the theme");
}
