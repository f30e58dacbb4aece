//! The coordinator.
//!
//! One `Session` owns what the browser client scattered across globals:
//! authenticated user, room list, the open room (key, timeline, members,
//! read marks), typing state, the request-generation guard, and the notice
//! queue. A front-end feeds it gateway notices and user input; nothing in
//! here touches a screen.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use huddle_cache::Cache;
use huddle_gateway::{
    ConnectionStatus, Gateway, GatewayHandle, GatewayNotice, StatusIndicator, gateway_url,
};
use huddle_types::api::{RoomMember, RoomMessagesResponse};
use huddle_types::events::{ClientCommand, OutgoingMessage, ServerEvent};
use huddle_types::models::{Message, MessageType, Room, User};

use crate::api::{ApiClient, ApiError};
use crate::notify::{Notice, Notifier, ToastLevel, mentions};
use crate::receipts::ReadLedger;
use crate::theme::ThemePreference;
use crate::timeline::{self, Timeline};
use crate::typing::{LOCAL_TYPING_LINGER, TypingTracker};
use crate::view::{self, RoomEntryView, TranscriptItem};

/// Cached messages older than this are dropped at startup.
pub const MESSAGE_CACHE_KEEP_DAYS: i64 = 7;

const ASSET_CACHE_KEEP_DAYS: i64 = 30;

/// Why a mutation was rejected before reaching the server. Surfaced inline;
/// no network round trip happens for any of these.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,
    #[error("no room is open")]
    NoRoomOpen,
    #[error("room key is missing")]
    NoKey,
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Gateway(#[from] huddle_gateway::GatewayError),
}

/// Viewport state for the room the user is looking at. UI state, not domain
/// state: it is rebuilt on every open and never persisted.
pub struct OpenRoom {
    pub room: Room,
    pub key: Option<String>,
    pub timeline: Timeline,
    pub members: Vec<RoomMember>,
    /// The user's own server-side read mark at open time.
    pub last_read_id: i64,
    mention_cache: Option<Vec<RoomMember>>,
}

struct PendingOpen {
    generation: u64,
    room: Room,
}

pub struct Session {
    api: ApiClient,
    cache: Arc<Cache>,
    /// Keeps the gateway task alive; the handle below is what gets used.
    transport: Option<Gateway>,
    gateway: Option<GatewayHandle>,
    me: Option<User>,
    rooms: Vec<Room>,
    open: Option<OpenRoom>,
    pending_open: Option<PendingOpen>,
    typing: TypingTracker,
    reads: ReadLedger,
    notifier: Notifier,
    indicator: StatusIndicator,
    reply_to: Option<i64>,
    /// Monotonic request generation; responses from a superseded room open
    /// are discarded by comparing against this.
    open_generation: u64,
    local_typing_until: Option<Instant>,
    rooms_dirty: bool,
}

impl Session {
    pub fn new(api: ApiClient, cache: Arc<Cache>) -> Self {
        Self {
            api,
            cache,
            transport: None,
            gateway: None,
            me: None,
            rooms: Vec::new(),
            open: None,
            pending_open: None,
            typing: TypingTracker::default(),
            reads: ReadLedger::default(),
            notifier: Notifier::default(),
            indicator: StatusIndicator::new(),
            reply_to: None,
            open_generation: 0,
            local_typing_until: None,
            rooms_dirty: false,
        }
    }

    // -- Accessors --

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn me(&self) -> Option<&User> {
        self.me.as_ref()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn current_room(&self) -> Option<&OpenRoom> {
        self.open.as_ref()
    }

    pub fn status_indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    pub fn is_connected(&self) -> bool {
        self.gateway.as_ref().is_some_and(|g| g.is_connected())
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notifier.drain()
    }

    pub fn reply_to(&self) -> Option<i64> {
        self.reply_to
    }

    pub fn set_reply_to(&mut self, message_id: Option<i64>) {
        self.reply_to = message_id;
    }

    // -- Lifecycle --

    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError> {
        let res = self.api.login(username, password).await?;
        info!("logged in as {} ({})", res.user.nickname, res.user.id);
        self.me = Some(res.user.clone());
        Ok(res.user)
    }

    /// Install a user restored from a session check (`/api/me`) instead of a
    /// fresh login.
    pub fn restore_user(&mut self, user: User) {
        self.me = Some(user);
    }

    pub async fn logout(&mut self) {
        if let Err(e) = self.api.logout().await {
            warn!("logout failed: {}", e);
        }
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
        self.gateway = None;
        self.me = None;
        self.rooms.clear();
        self.open = None;
        self.pending_open = None;
        self.typing.clear();
        self.reads.clear();
        self.reply_to = None;
    }

    /// Spawn the realtime connection. Notices must be pumped back into
    /// [`Session::handle_notice`] by the front-end's event loop.
    pub fn connect_gateway(
        &mut self,
        server_url: &str,
    ) -> Result<mpsc::Receiver<GatewayNotice>> {
        let url = gateway_url(server_url)?;
        let (gateway, notices) = Gateway::connect(url, self.api.session_cookie());
        self.gateway = Some(gateway.handle());
        self.transport = Some(gateway);
        Ok(notices)
    }

    /// Wire in an externally created handle (tests, embedded front-ends).
    pub fn attach_gateway(&mut self, handle: GatewayHandle) {
        self.gateway = Some(handle);
    }

    /// Age out old cache rows; called once at startup.
    pub fn run_cache_cleanup(&self) {
        if let Err(e) = self.cache.cleanup(MESSAGE_CACHE_KEEP_DAYS) {
            warn!("cache cleanup failed: {}", e);
        }
        if let Err(e) = self.cache.prune_assets(ASSET_CACHE_KEEP_DAYS) {
            warn!("asset prune failed: {}", e);
        }
    }

    async fn emit(&self, cmd: ClientCommand) {
        let Some(gateway) = &self.gateway else { return };
        if let Err(e) = gateway.send(cmd).await {
            warn!("gateway emit failed: {}", e);
        }
    }

    // -- Notices from the gateway --

    pub async fn handle_notice(&mut self, notice: GatewayNotice) {
        match notice {
            GatewayNotice::Status(status) => {
                self.indicator.apply(status, Instant::now());
                if status == ConnectionStatus::Disconnected {
                    self.notifier
                        .toast(ToastLevel::Error, "Connection lost. Restart to retry.");
                }
            }
            GatewayNotice::Connected { resumed } => {
                if resumed {
                    self.resync().await;
                } else {
                    self.reload_rooms().await;
                }
            }
            GatewayNotice::Event(event) => self.handle_event(event).await,
        }
    }

    /// Post-reconnect recovery: rejoin the open room, reload the room list,
    /// and splice in messages missed while offline. Fetch failures are
    /// logged and swallowed; the UI stays on its last known-good state and
    /// the next reconnect tries again.
    async fn resync(&mut self) {
        self.reload_rooms().await;

        let Some(room_id) = self.open.as_ref().map(|o| o.room.id) else {
            return;
        };
        self.emit(ClientCommand::JoinRoom { room_id }).await;

        match self.api.room_messages(room_id, None, None).await {
            Ok(resp) => {
                let added = self.apply_resync(room_id, resp.messages);
                if added > 0 {
                    info!("synced {} missed messages", added);
                }
            }
            Err(e) => warn!("failed to sync messages on reconnect: {}", e),
        }
    }

    /// Splice strictly-newer messages into the open room's timeline.
    /// Idempotent: applying the same server list twice adds nothing.
    pub fn apply_resync(&mut self, room_id: i64, messages: Vec<Message>) -> usize {
        let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) else {
            return 0;
        };
        open.timeline.splice_newer(messages)
    }

    pub async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::NewMessage(msg) => self.on_new_message(msg).await,

            ServerEvent::MessageDeleted { room_id, message_id } => {
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    open.timeline.remove(message_id);
                }
                if let Err(e) = self.cache.remove_message(message_id) {
                    warn!("cache delete failed: {}", e);
                }
                self.rooms_dirty = true;
            }

            ServerEvent::MessageEdited { room_id, message_id, content, encrypted } => {
                let edited = self
                    .open
                    .as_mut()
                    .filter(|o| o.room.id == room_id)
                    .and_then(|open| {
                        open.timeline.apply_edit(message_id, content, encrypted);
                        open.timeline.get(message_id).cloned()
                    });
                if let Some(msg) = edited {
                    if let Err(e) = self
                        .cache
                        .cache_messages(room_id, std::slice::from_ref(&msg))
                    {
                        warn!("cache update failed: {}", e);
                    }
                }
            }

            ServerEvent::ReadUpdated { room_id, message_id, user_id } => {
                let Some(me_id) = self.me.as_ref().map(|u| u.id) else {
                    return;
                };
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    self.reads.apply(&mut open.timeline, me_id, message_id, user_id);
                }
            }

            ServerEvent::UserTyping { room_id, user_id, nickname, is_typing } => {
                let me_id = self.me.as_ref().map(|u| u.id);
                if Some(user_id) != me_id
                    && self.open.as_ref().is_some_and(|o| o.room.id == room_id)
                {
                    self.typing.observe(user_id, &nickname, is_typing, Instant::now());
                }
            }

            ServerEvent::UserStatus { .. } => {
                self.rooms_dirty = true;
            }

            ServerEvent::RoomUpdated { .. } => {
                self.rooms_dirty = true;
            }

            ServerEvent::RoomNameUpdated { room_id, name } => {
                if let Some(room) = self.rooms.iter_mut().find(|r| r.id == room_id) {
                    room.name = Some(name.clone());
                }
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    open.room.name = Some(name);
                }
            }

            ServerEvent::RoomMembersUpdated { room_id } => {
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    open.mention_cache = None;
                }
                self.rooms_dirty = true;
            }

            ServerEvent::UserProfileUpdated { user_id, nickname, .. } => {
                if let (Some(open), Some(name)) = (self.open.as_mut(), nickname.as_deref()) {
                    for member in open.members.iter_mut().filter(|m| m.id == user_id) {
                        member.nickname = name.to_string();
                    }
                    for msg in open
                        .timeline
                        .messages_mut()
                        .iter_mut()
                        .filter(|m| m.sender_id == user_id)
                    {
                        msg.sender_name = name.to_string();
                    }
                    open.mention_cache = None;
                }
                self.rooms_dirty = true;
            }

            ServerEvent::ReactionUpdated { room_id, message_id, reactions } => {
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    open.timeline.set_reactions(message_id, reactions);
                }
            }

            // Named by the protocol but out of scope for this client.
            ServerEvent::PinUpdated { room_id }
            | ServerEvent::PollCreated { room_id }
            | ServerEvent::PollUpdated { room_id }
            | ServerEvent::AdminUpdated { room_id } => {
                debug!("ignoring unsupported event for room {}", room_id);
            }

            ServerEvent::JoinedRoom { room_id } => {
                debug!("joined room {}", room_id);
            }

            ServerEvent::Error { message } => {
                warn!("server error event: {}", message);
            }
        }
    }

    async fn on_new_message(&mut self, msg: Message) {
        let mine = self.me.as_ref().is_some_and(|u| u.id == msg.sender_id);
        let open_matches = self.open.as_ref().is_some_and(|o| o.room.id == msg.room_id);

        if open_matches {
            let (appended, key) = match self.open.as_mut() {
                Some(open) => (open.timeline.append(msg.clone()), open.key.clone()),
                None => (false, None),
            };
            if !appended {
                return;
            }
            if let Err(e) = self
                .cache
                .cache_messages(msg.room_id, std::slice::from_ref(&msg))
            {
                warn!("message cache failed: {}", e);
            }
            if self.is_connected() {
                self.emit(ClientCommand::MessageRead {
                    room_id: msg.room_id,
                    message_id: msg.id,
                })
                .await;
            }
            if !mine {
                if let Some(me) = &self.me {
                    let body = display_body(&msg, key.as_deref());
                    if mentions(&body, &me.nickname) {
                        self.notifier.mention(msg.room_id, msg.id, &msg.sender_name, &body);
                    }
                }
            }
        } else {
            if let Err(e) = self
                .cache
                .cache_messages(msg.room_id, std::slice::from_ref(&msg))
            {
                warn!("message cache failed: {}", e);
            }
            if !mine {
                let room = self.rooms.iter().find(|r| r.id == msg.room_id);
                let muted = room.is_some_and(|r| r.muted);
                if !muted {
                    let key = room.and_then(|r| r.encryption_key.clone());
                    let body = display_body(&msg, key.as_deref());
                    let tag = format!("room-{}-{}", msg.room_id, msg.id);
                    self.notifier.room_message(msg.room_id, &msg.sender_name, &body, tag);
                }
            }
        }
        self.rooms_dirty = true;
    }

    // -- Room list --

    pub async fn reload_rooms(&mut self) {
        match self.api.rooms().await {
            Ok(rooms) => {
                if let Err(e) = self.cache.cache_rooms(&rooms) {
                    warn!("room cache failed: {}", e);
                }
                self.install_rooms(rooms);
            }
            Err(e) => {
                warn!("room list load failed: {}", e);
                match self.cache.cached_rooms() {
                    Ok(rooms) if !rooms.is_empty() => {
                        info!("showing {} cached rooms", rooms.len());
                        self.install_rooms(rooms);
                    }
                    _ => self
                        .notifier
                        .toast(ToastLevel::Error, "Could not load rooms"),
                }
            }
        }
        self.rooms_dirty = false;
    }

    /// Replace the room list wholesale and keep the open room's copy in
    /// sync. No merging — the server owns this list.
    pub fn install_rooms(&mut self, rooms: Vec<Room>) {
        if let Some(open) = self.open.as_mut() {
            if let Some(fresh) = rooms.iter().find(|r| r.id == open.room.id) {
                open.room = fresh.clone();
                if open.key.is_none() {
                    open.key = fresh.encryption_key.clone();
                }
            }
        }
        self.rooms = rooms;
    }

    pub fn room_entries(&self) -> Vec<RoomEntryView> {
        view::sorted_entries(&self.rooms)
    }

    // -- Opening a room --

    /// First phase of a room switch: leave the previous room, clear per-room
    /// state, join the new one, and stamp a request generation. Returns
    /// `None` when the room is already open.
    pub async fn begin_open(&mut self, room_id: i64) -> Result<Option<u64>> {
        if self.open.as_ref().is_some_and(|o| o.room.id == room_id) {
            return Ok(None);
        }
        let room = self
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
            .context("unknown room")?;

        self.open_generation += 1;
        let generation = self.open_generation;

        if let Some(prev) = self.open.take() {
            self.emit(ClientCommand::Typing {
                room_id: prev.room.id,
                is_typing: false,
            })
            .await;
            self.emit(ClientCommand::LeaveRoom { room_id: prev.room.id }).await;
        }
        // Typing state must not leak across rooms.
        self.typing.clear();
        self.local_typing_until = None;
        self.reply_to = None;

        self.emit(ClientCommand::JoinRoom { room_id }).await;
        self.pending_open = Some(PendingOpen { generation, room });
        Ok(Some(generation))
    }

    /// Second phase: install the fetch result, unless a newer open
    /// superseded this one — then the response is stale and dropped.
    pub async fn finish_open(
        &mut self,
        generation: u64,
        result: Result<RoomMessagesResponse, ApiError>,
    ) -> bool {
        if generation != self.open_generation {
            debug!("ignoring stale room-open response");
            return false;
        }
        let Some(pending) = self
            .pending_open
            .take()
            .filter(|p| p.generation == generation)
        else {
            debug!("ignoring stale room-open response");
            return false;
        };
        let room = pending.room;
        let room_id = room.id;

        match result {
            Ok(resp) => {
                let me_id = self.me.as_ref().map(|u| u.id);
                let last_read_id = resp
                    .members
                    .iter()
                    .find(|m| Some(m.id) == me_id)
                    .map(|m| m.last_read_message_id)
                    .unwrap_or(0);

                if let Err(e) = self.cache.cache_messages(room_id, &resp.messages) {
                    warn!("message cache failed: {}", e);
                }

                let newest = resp.messages.iter().map(|m| m.id).max();
                let key = resp.encryption_key.or_else(|| room.encryption_key.clone());
                self.open = Some(OpenRoom {
                    room,
                    key,
                    timeline: Timeline::from_initial(resp.messages),
                    members: resp.members,
                    last_read_id,
                    mention_cache: None,
                });
                self.reads.clear();

                if let Some(newest) = newest {
                    if self.is_connected() {
                        self.emit(ClientCommand::MessageRead {
                            room_id,
                            message_id: newest,
                        })
                        .await;
                    }
                }
            }
            Err(e) => {
                warn!("message load failed: {}", e);
                self.notifier
                    .toast(ToastLevel::Error, format!("Failed to load messages: {}", e));

                let cached = self
                    .cache
                    .cached_messages(room_id, timeline::INITIAL_PAGE as u32)
                    .unwrap_or_default();
                if !cached.is_empty() {
                    info!("showing {} cached messages", cached.len());
                }
                let key = room.encryption_key.clone();
                self.open = Some(OpenRoom {
                    room,
                    key,
                    timeline: Timeline::from_cached(cached),
                    members: Vec::new(),
                    last_read_id: 0,
                    mention_cache: None,
                });
                self.reads.clear();
            }
        }
        true
    }

    pub async fn open_room(&mut self, room_id: i64) -> Result<()> {
        let Some(generation) = self.begin_open(room_id).await? else {
            return Ok(());
        };
        let result = self.api.room_messages(room_id, None, None).await;
        self.finish_open(generation, result).await;
        Ok(())
    }

    // -- Pagination --

    /// Fetch the page of messages strictly older than the current head.
    /// Returns how many were prepended; a fetch error clears the in-flight
    /// flag so the next scroll can retry.
    pub async fn load_older_messages(&mut self) -> usize {
        let Some((room_id, before_id)) = self.open.as_mut().and_then(|open| {
            let room_id = open.room.id;
            open.timeline.begin_older_fetch().map(|b| (room_id, b))
        }) else {
            return 0;
        };

        match self
            .api
            .room_messages(room_id, Some(before_id), Some(timeline::OLDER_PAGE as u32))
            .await
        {
            Ok(resp) => self.finish_older(room_id, resp.messages),
            Err(e) => {
                warn!("older message load failed: {}", e);
                if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                    open.timeline.abort_older_fetch();
                }
                0
            }
        }
    }

    pub fn finish_older(&mut self, room_id: i64, messages: Vec<Message>) -> usize {
        let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) else {
            return 0;
        };
        if let Err(e) = self.cache.cache_messages(room_id, &messages) {
            warn!("message cache failed: {}", e);
        }
        open.timeline.finish_older_fetch(messages)
    }

    // -- Mutations --

    /// Validate, seal, emit. The message renders only when the server echoes
    /// it back as `new_message` — there is no optimistic insertion.
    pub async fn send_text(&mut self, input: &str) -> Result<(), SendError> {
        let content = input.trim();
        if content.is_empty() {
            return Err(SendError::Empty);
        }
        let (room_id, key) = match self.open.as_ref() {
            Some(open) => (open.room.id, open.key.clone()),
            None => return Err(SendError::NoRoomOpen),
        };
        let key = key.ok_or(SendError::NoKey)?;
        let gateway = self.gateway.as_ref().ok_or(SendError::NotConnected)?;
        if !gateway.is_connected() {
            return Err(SendError::NotConnected);
        }

        let outgoing = OutgoingMessage {
            room_id,
            content: huddle_crypto::seal(content, &key),
            message_type: MessageType::Text,
            encrypted: true,
            reply_to: self.reply_to.take(),
            file_path: None,
            file_name: None,
        };
        gateway.send(ClientCommand::SendMessage(outgoing)).await?;

        if let Err(e) = self.cache.clear_draft(room_id) {
            warn!("draft clear failed: {}", e);
        }
        Ok(())
    }

    /// Re-seal the new content with the same room key and emit. The local
    /// copy is patched only when the `message_edited` broadcast comes back.
    pub async fn edit_message(
        &mut self,
        message_id: i64,
        new_content: &str,
    ) -> Result<(), SendError> {
        let content = new_content.trim();
        if content.is_empty() {
            return Err(SendError::Empty);
        }
        let (room_id, key) = match self.open.as_ref() {
            Some(open) => (open.room.id, open.key.clone()),
            None => return Err(SendError::NoRoomOpen),
        };
        let gateway = self.gateway.as_ref().ok_or(SendError::NotConnected)?;
        if !gateway.is_connected() {
            return Err(SendError::NotConnected);
        }

        let (sealed, encrypted) = match &key {
            Some(k) => (huddle_crypto::seal(content, k), true),
            None => (content.to_string(), false),
        };
        gateway
            .send(ClientCommand::EditMessage {
                message_id,
                room_id,
                content: sealed,
                encrypted,
            })
            .await?;
        Ok(())
    }

    /// Emit a delete; removal happens on the broadcast-back. Confirmation is
    /// the front-end's responsibility.
    pub async fn delete_message(&mut self, message_id: i64) -> Result<(), SendError> {
        let room_id = self
            .open
            .as_ref()
            .map(|o| o.room.id)
            .ok_or(SendError::NoRoomOpen)?;
        let gateway = self.gateway.as_ref().ok_or(SendError::NotConnected)?;
        if !gateway.is_connected() {
            return Err(SendError::NotConnected);
        }
        gateway
            .send(ClientCommand::DeleteMessage { message_id, room_id })
            .await?;
        Ok(())
    }

    pub async fn toggle_reaction(&mut self, message_id: i64, emoji: &str) {
        match self.api.toggle_reaction(message_id, emoji).await {
            Ok(resp) => {
                if let Some(open) = self.open.as_mut() {
                    open.timeline.set_reactions(resp.message_id, resp.reactions);
                }
            }
            Err(e) => {
                warn!("reaction toggle failed: {}", e);
                self.notifier
                    .toast(ToastLevel::Error, "Could not update the reaction");
            }
        }
    }

    // -- Typing --

    /// Call on every local keystroke. Emits `is_typing: true` and arms the
    /// linger timer that [`Session::tick`] resolves into a stop event.
    pub async fn notice_local_typing(&mut self) {
        let Some(room_id) = self.open.as_ref().map(|o| o.room.id) else {
            return;
        };
        if !self.is_connected() {
            return;
        }
        self.emit(ClientCommand::Typing { room_id, is_typing: true }).await;
        self.local_typing_until = Some(Instant::now() + LOCAL_TYPING_LINGER);
    }

    pub fn typing_label(&mut self, now: Instant) -> Option<String> {
        self.typing.label(now)
    }

    /// Periodic housekeeping: emit the deferred typing stop and run the
    /// throttled room-list reload that events have requested.
    pub async fn tick(&mut self, now: Instant) {
        if self.local_typing_until.is_some_and(|deadline| now >= deadline) {
            self.local_typing_until = None;
            if let Some(room_id) = self.open.as_ref().map(|o| o.room.id) {
                if self.is_connected() {
                    self.emit(ClientCommand::Typing { room_id, is_typing: false }).await;
                }
            }
        }
        if self.rooms_dirty {
            self.reload_rooms().await;
        }
    }

    // -- Uploads --

    /// Upload a file, then announce it as an image/file message. All
    /// failures end as toasts; nothing here is fatal.
    pub async fn upload_file(&mut self, file_name: &str, content_type: &str, bytes: Vec<u8>) {
        let Some(room_id) = self.open.as_ref().map(|o| o.room.id) else {
            self.notifier
                .toast(ToastLevel::Error, "Open a room before uploading");
            return;
        };

        match self.api.upload(room_id, file_name, content_type, bytes).await {
            Ok(resp) if resp.success => {
                let message_type = if content_type.starts_with("image/") {
                    MessageType::Image
                } else {
                    MessageType::File
                };
                let outgoing = OutgoingMessage {
                    room_id,
                    content: String::new(),
                    message_type,
                    encrypted: false,
                    reply_to: self.reply_to.take(),
                    file_path: resp.file_path,
                    file_name: resp.file_name,
                };
                self.emit(ClientCommand::SendMessage(outgoing)).await;
                self.notifier.toast(ToastLevel::Success, "File sent");
            }
            Ok(resp) => {
                self.notifier.toast(
                    ToastLevel::Error,
                    resp.error.unwrap_or_else(|| "Upload failed".into()),
                );
            }
            Err(e) => {
                warn!("upload failed: {}", e);
                self.notifier.toast(ToastLevel::Error, "Upload failed");
            }
        }
    }

    // -- Drafts --

    pub fn save_draft(&self, content: &str) {
        if let Some(room_id) = self.open.as_ref().map(|o| o.room.id) {
            if let Err(e) = self.cache.save_draft(room_id, content) {
                warn!("draft save failed: {}", e);
            }
        }
    }

    pub fn draft(&self) -> String {
        self.open
            .as_ref()
            .map(|o| o.room.id)
            .and_then(|room_id| self.cache.draft(room_id).ok())
            .unwrap_or_default()
    }

    // -- Mentions --

    /// Autocomplete candidates for an `@` prefix, served from the cached
    /// member list; the cache is invalidated by `room_members_updated`.
    pub async fn mention_candidates(&mut self, query: &str) -> Vec<RoomMember> {
        let Some(room_id) = self.open.as_ref().map(|o| o.room.id) else {
            return Vec::new();
        };
        if self.open.as_ref().is_some_and(|o| o.mention_cache.is_none()) {
            match self.api.room_info(room_id).await {
                Ok(info) => {
                    if let Some(open) = self.open.as_mut().filter(|o| o.room.id == room_id) {
                        open.mention_cache = Some(info.members);
                    }
                }
                Err(e) => warn!("member list load failed: {}", e),
            }
        }

        let me_id = self.me.as_ref().map(|u| u.id);
        let prefix = query.to_lowercase();
        self.open
            .as_ref()
            .and_then(|o| o.mention_cache.as_ref())
            .map(|members| {
                members
                    .iter()
                    .filter(|m| Some(m.id) != me_id)
                    .filter(|m| m.nickname.to_lowercase().starts_with(&prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- Theme --

    pub fn theme(&self) -> ThemePreference {
        ThemePreference::load(&self.cache)
    }

    pub fn set_theme(&mut self, theme: &ThemePreference) {
        if let Err(e) = theme.store(&self.cache) {
            warn!("theme save failed: {}", e);
            self.notifier
                .toast(ToastLevel::Error, "Could not save the theme");
        }
    }

    // -- View-models --

    pub fn transcript(&self) -> Vec<TranscriptItem> {
        let (Some(open), Some(me)) = (self.open.as_ref(), self.me.as_ref()) else {
            return Vec::new();
        };
        view::transcript(
            open.timeline.messages(),
            open.key.as_deref(),
            me,
            open.last_read_id,
        )
    }
}

fn display_body(msg: &Message, key: Option<&str>) -> String {
    if msg.encrypted {
        huddle_crypto::open(&msg.content, key.unwrap_or("")).into_string()
    } else {
        msg.content.clone()
    }
}
