//! Terminal front-end: logs in, pumps gateway notices through the session,
//! and renders the view-models as lines. Slash commands drive everything the
//! sidebar and context menus would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::AsyncBufReadExt;
use tracing::debug;

use huddle_cache::Cache;
use huddle_client::api::ApiClient;
use huddle_client::notify::{Notice, ToastLevel};
use huddle_client::session::{SendError, Session};
use huddle_client::theme::{ThemeMode, ThemePreference};
use huddle_client::view::TranscriptItem;

struct Config {
    server_url: String,
    db_path: PathBuf,
    username: String,
    password: String,
}

fn load_config() -> Result<Config> {
    Ok(Config {
        server_url: std::env::var("HUDDLE_SERVER_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into()),
        db_path: std::env::var("HUDDLE_DB_PATH")
            .unwrap_or_else(|_| "huddle.db".into())
            .into(),
        username: std::env::var("HUDDLE_USERNAME").context("HUDDLE_USERNAME is not set")?,
        password: std::env::var("HUDDLE_PASSWORD").context("HUDDLE_PASSWORD is not set")?,
    })
}

/// What has already been printed, so renders are incremental.
#[derive(Default)]
struct Screen {
    rendered_through: i64,
    last_status: Option<String>,
    last_typing: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug".into()),
        )
        .init();

    let config = load_config()?;
    let cache = Arc::new(Cache::open(&config.db_path)?);
    let api = ApiClient::new(&config.server_url)?;
    let mut session = Session::new(api, cache);
    session.run_cache_cleanup();

    let user = session.login(&config.username, &config.password).await?;
    println!("signed in as {}", user.nickname);

    let mut notices = session.connect_gateway(&config.server_url)?;
    session.reload_rooms().await;
    print_rooms(&session);

    let mut screen = Screen::default();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            maybe = notices.recv() => {
                let Some(first) = maybe else {
                    println!("! connection closed for good");
                    break;
                };
                // Coalesce bursts: drain everything queued, render once.
                let mut batch = vec![first];
                while let Ok(notice) = notices.try_recv() {
                    batch.push(notice);
                }
                debug!("handling {} gateway notices", batch.len());
                for notice in batch {
                    session.handle_notice(notice).await;
                }
                render_new_messages(&session, &mut screen);
                render_notices(&mut session);
                render_status(&session, &mut screen);
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&mut session, line.trim(), &mut screen).await? {
                    break;
                }
                render_notices(&mut session);
            }

            _ = ticker.tick() => {
                session.tick(Instant::now()).await;
                render_typing(&mut session, &mut screen);
                render_status(&session, &mut screen);
            }
        }
    }

    session.logout().await;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_input(session: &mut Session, input: &str, screen: &mut Screen) -> Result<bool> {
    let (command, rest) = match input.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    };

    match command {
        "" => {}
        "/quit" => return Ok(false),
        "/rooms" => {
            session.reload_rooms().await;
            print_rooms(session);
        }
        "/open" => match rest.parse::<i64>() {
            Ok(room_id) => match session.open_room(room_id).await {
                Ok(()) => print_transcript(session, screen),
                Err(e) => println!("! {}", e),
            },
            Err(_) => println!("usage: /open <room-id>"),
        },
        "/older" => {
            let added = session.load_older_messages().await;
            println!("· loaded {} older messages", added);
        }
        "/reply" => match rest.parse::<i64>() {
            Ok(id) => session.set_reply_to(Some(id)),
            Err(_) => session.set_reply_to(None),
        },
        "/edit" => match rest
            .split_once(' ')
            .and_then(|(id, text)| id.parse::<i64>().ok().map(|id| (id, text)))
        {
            Some((id, text)) => report_send(session.edit_message(id, text).await),
            None => println!("usage: /edit <id> <text>"),
        },
        "/del" => match rest.parse::<i64>() {
            Ok(id) => report_send(session.delete_message(id).await),
            Err(_) => println!("usage: /del <id>"),
        },
        "/react" => match rest
            .split_once(' ')
            .and_then(|(id, emoji)| id.parse::<i64>().ok().map(|id| (id, emoji)))
        {
            Some((id, emoji)) => session.toggle_reaction(id, emoji).await,
            None => println!("usage: /react <id> <emoji>"),
        },
        "/pin" | "/mute" | "/leave" => {
            let target = match rest.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => session.current_room().map(|o| o.room.id),
            };
            let Some(room_id) = target else {
                println!("! no room given or open");
                return Ok(true);
            };
            let result = match command {
                "/pin" => session.api().pin_room(room_id).await,
                "/mute" => session.api().mute_room(room_id).await,
                _ => session.api().leave_room(room_id).await,
            };
            match result {
                Ok(()) => {
                    session.reload_rooms().await;
                    print_rooms(session);
                }
                Err(e) => println!("! {}", e),
            }
        }
        "/who" => match session.api().online_users().await {
            Ok(users) => {
                let names: Vec<&str> = users.iter().map(|u| u.nickname.as_str()).collect();
                println!("· online: {}", names.join(", "));
            }
            Err(e) => println!("! {}", e),
        },
        "/search" => {
            let room_id = session.current_room().map(|o| o.room.id);
            match session.api().search(room_id, rest, 50).await {
                Ok(found) => {
                    let key = session.current_room().and_then(|o| o.key.clone());
                    println!("-- {} results --", found.messages.len());
                    for msg in &found.messages {
                        let body = match session.me() {
                            Some(me) => {
                                huddle_client::view::message_view(msg, key.as_deref(), me).body
                            }
                            None => msg.content.clone(),
                        };
                        println!("  #{} <{}> {}", msg.id, msg.sender_name, body);
                    }
                }
                Err(e) => println!("! {}", e),
            }
        }
        "/theme" => {
            let mode = match rest {
                "dark" => ThemeMode::Dark,
                _ => ThemeMode::Light,
            };
            let theme = ThemePreference {
                mode,
                ..session.theme()
            };
            session.set_theme(&theme);
            println!("· theme saved");
        }
        _ if command.starts_with('/') => {
            println!("! unknown command {}", command);
        }
        _ => {
            session.notice_local_typing().await;
            report_send(session.send_text(input).await);
        }
    }
    Ok(true)
}

fn report_send(result: Result<(), SendError>) {
    if let Err(e) = result {
        // Validation failures are inline messages, not toasts.
        println!("! {}", e);
    }
}

fn print_rooms(session: &Session) {
    println!("-- rooms --");
    for entry in session.room_entries() {
        let mut flags = String::new();
        if entry.pinned {
            flags.push('*');
        }
        if entry.muted {
            flags.push('-');
        }
        let unread = if entry.unread_count > 0 {
            format!(" ({})", entry.unread_count)
        } else {
            String::new()
        };
        println!("  [{}] {}{}{}", entry.id, entry.title, flags, unread);
    }
}

fn print_transcript(session: &Session, screen: &mut Screen) {
    screen.rendered_through = 0;
    for item in session.transcript() {
        print_item(&item, screen);
    }
}

fn render_new_messages(session: &Session, screen: &mut Screen) {
    for item in session.transcript() {
        if let TranscriptItem::Message(view) = &item {
            if view.id <= screen.rendered_through {
                continue;
            }
        } else {
            continue;
        }
        print_item(&item, screen);
    }
}

fn print_item(item: &TranscriptItem, screen: &mut Screen) {
    match item {
        TranscriptItem::DateDivider(date) => println!("---- {} ----", date),
        TranscriptItem::UnreadDivider => println!("---- unread ----"),
        TranscriptItem::Message(view) => {
            let time = view.timestamp.format("%H:%M");
            let mut suffix = String::new();
            if view.edited {
                suffix.push_str(" (edited)");
            }
            if view.undecryptable {
                suffix.push_str(" [undecryptable]");
            }
            if view.mentions_me {
                suffix.push_str(" [mention]");
            }
            for chip in &view.reactions {
                suffix.push_str(&format!(" {}x{}", chip.emoji, chip.count));
            }
            println!(
                "{} <{}> #{} {}{}",
                time, view.sender_name, view.id, view.body, suffix
            );
            screen.rendered_through = screen.rendered_through.max(view.id);
        }
    }
}

fn render_notices(session: &mut Session) {
    for notice in session.drain_notices() {
        match notice {
            Notice::Toast { level, message } => {
                let prefix = match level {
                    ToastLevel::Info => "i",
                    ToastLevel::Success => "+",
                    ToastLevel::Error => "!",
                };
                println!("{} {}", prefix, message);
            }
            Notice::Mention { sender, preview, .. } => {
                println!("@ {} mentioned you: {}", sender, preview);
            }
            Notice::RoomMessage { title, body, room_id, .. } => {
                println!("* [{}] {}: {}", room_id, title, body);
            }
        }
    }
}

fn render_typing(session: &mut Session, screen: &mut Screen) {
    let label = session.typing_label(Instant::now());
    if label != screen.last_typing {
        if let Some(label) = &label {
            println!("· {}", label);
        }
        screen.last_typing = label;
    }
}

fn render_status(session: &Session, screen: &mut Screen) {
    let indicator = session.status_indicator();
    let label = indicator
        .is_visible(Instant::now())
        .then(|| indicator.label());
    if label != screen.last_status {
        if let Some(label) = &label {
            println!("· {}", label);
        }
        screen.last_status = label;
    }
}
