//! # Client chat synchronizer
//!
//! [`ChatClient`] owns the local view state and reconciles it with the
//! server through timed polling and user actions. It is a cheap clone over
//! shared state; poll timers hold only a weak reference, so dropping the
//! last client handle aborts every timer.
//!
//! Public operations never return errors. Failures are logged with
//! `tracing` and turned into a [`Notification`] on the [`ChatView`]; the
//! boolean results only say whether the action took effect.
//!
//! ## Polling
//!
//! | Timer | Default | Work |
//! |---|---|---|
//! | messages | 2 s | room messages + room presence |
//! | unread | 5 s | unread counts |
//! | rooms | 10 s | room list (session) |
//! | online users | 5 s | global presence for the DM list (session) |
//! | heartbeat | 10 s | keep-alive (session) |
//! | dm | 2 s | open DM thread |
//!
//! Ticks start one period after the timer is installed. A failed tick is
//! not retried; the next tick tries again.

pub mod state;
pub mod timers;

use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::{
    ChatApi, FileUpload, Message, MessageId, ModAction, PresenceSet, Registration, Reply,
    RoomSummary, UnreadCounts,
};
use crate::config::{ClientConfig, Flavor};
use crate::error::{ChatError, Result};
use crate::render::{RenderContext, RenderPipeline};
use crate::session::{Phase, RoomCode, Session};
use crate::text::{extract_mentions, generate_guest_name};
use crate::view::{ChatView, Notification};

pub use state::{ClientState, DmContext, RoomContext};
pub use timers::{TimerSlot, Timers};

/// Consecutive message-poll failures before the log escalates to `error!`.
const POLL_FAILURE_ESCALATION: u32 = 5;

struct Shared {
    config: ClientConfig,
    api: Arc<dyn ChatApi>,
    view: Arc<dyn ChatView>,
    room_pipeline: RenderPipeline,
    dm_pipeline: RenderPipeline,
    state: Mutex<ClientState>,
    timers: Mutex<Timers>,
}

/// Handle to the synchronizer. Clones share one state.
#[derive(Clone)]
pub struct ChatClient {
    shared: Arc<Shared>,
}

impl ChatClient {
    pub fn builder(config: ClientConfig) -> ChatClientBuilder {
        ChatClientBuilder::new(config)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    pub fn session(&self) -> Session {
        self.state().session.clone()
    }

    pub fn last_message_count(&self) -> usize {
        self.state().last_message_count
    }

    /// Latest room message snapshot.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn presence(&self) -> PresenceSet {
        self.state().presence.clone()
    }

    pub fn online_users(&self) -> PresenceSet {
        self.state().online.clone()
    }

    pub fn unread_counts(&self) -> UnreadCounts {
        self.state().unread.clone()
    }

    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.state().rooms.clone()
    }

    pub fn is_room_admin(&self) -> bool {
        self.state().is_room_admin()
    }

    pub fn is_timer_active(&self, slot: TimerSlot) -> bool {
        self.timers().is_active(slot)
    }

    pub fn active_timers(&self) -> Vec<TimerSlot> {
        self.timers().active()
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub async fn login(&self, username: &str, password: &str) -> bool {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            self.report(
                &ChatError::InvalidInput("Username and password are required".into()),
                "",
            );
            return false;
        }

        let resp = match self.shared.api.login(username, password).await {
            Ok(resp) => resp,
            Err(e) => {
                self.report(&e, "Login failed");
                return false;
            }
        };

        self.end_session().await;
        {
            let mut state = self.state();
            state.session = Session {
                user: resp.username.clone(),
                token: Some(resp.token),
                avatar: resp.avatar,
                room: None,
            };
            state.bump_epoch();
        }
        info!(user = %resp.username, "logged in");
        self.notify(Notification::success(format!("Welcome, {}!", resp.username)));

        self.load_rooms(false).await;
        self.refresh_online_users().await;
        self.start_session_timers();
        true
    }

    pub async fn register(&self, username: &str, password: &str, avatar: &str) -> bool {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            self.report(
                &ChatError::InvalidInput("Username and password are required".into()),
                "",
            );
            return false;
        }
        let registration = Registration {
            username: username.to_string(),
            password: password.to_string(),
            avatar: avatar.to_string(),
        };
        match self.shared.api.register(&registration).await {
            Ok(()) => {
                info!(user = %username, "registered");
                self.notify(Notification::success("Registration successful! Please log in."));
                true
            }
            Err(e) => {
                self.report(&e, "Registration failed");
                false
            }
        }
    }

    /// Tokenless sign-in for the legacy flavor. A random name is generated
    /// when `name` is blank. Returns the name in use.
    pub async fn sign_in_as_guest(&self, name: Option<&str>) -> String {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_guest_name(&mut rand::thread_rng()));

        self.end_session().await;
        {
            let mut state = self.state();
            state.session = Session {
                user: name.clone(),
                ..Session::default()
            };
            state.bump_epoch();
        }
        info!(user = %name, "signed in as guest");
        self.notify(Notification::success(format!("Signed in as {name}")));
        self.start_session_timers();
        name
    }

    /// Leave the room, stop every timer, and forget the session.
    pub async fn logout(&self) -> bool {
        if !self.state().session.is_logged_in() {
            return false;
        }
        self.end_session().await;
        self.shared.view.clear();
        self.notify(Notification::info("Logged out"));
        true
    }

    pub async fn heartbeat(&self) {
        let token = {
            let state = self.state();
            if !state.session.is_logged_in() {
                return;
            }
            state.session.token.clone()
        };
        if let Err(e) = self.shared.api.heartbeat(token.as_deref()).await {
            warn!(error = %e, "heartbeat failed");
        }
    }

    async fn end_session(&self) {
        self.leave_room().await;
        self.timers().cancel_all();
        let had_user = {
            let mut state = self.state();
            let had_user = state.session.is_logged_in();
            state.reset();
            had_user
        };
        if had_user {
            debug!("session state reset");
        }
    }

    fn start_session_timers(&self) {
        if !self.rich() {
            return;
        }
        let polling = &self.shared.config.polling;
        self.spawn_ticker(TimerSlot::Heartbeat, polling.heartbeat(), |c| async move {
            c.heartbeat().await
        });
        self.spawn_ticker(TimerSlot::Rooms, polling.rooms(), |c| async move {
            c.refresh_rooms().await
        });
        self.spawn_ticker(TimerSlot::OnlineUsers, polling.online(), |c| async move {
            c.refresh_online_users().await
        });
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    pub async fn join_room(&self, code: &str) -> bool {
        self.join_room_with_password(code, None).await
    }

    pub async fn join_room_with_password(&self, code: &str, password: Option<&str>) -> bool {
        match self.try_join(code, password).await {
            Ok(room) => {
                self.notify(Notification::success(format!("Joined room {room}")));
                true
            }
            Err(e) => {
                self.report(&e, "Failed to join room");
                false
            }
        }
    }

    async fn try_join(&self, code: &str, password: Option<&str>) -> Result<RoomCode> {
        let room = RoomCode::parse(code)?;
        let password = password.filter(|p| !p.is_empty());
        let (user, token, previous) = {
            let state = self.state();
            if !state.session.is_logged_in() {
                return Err(ChatError::NotAuthenticated);
            }
            if self.rich() && state.session.token.is_none() {
                return Err(ChatError::NotAuthenticated);
            }
            (
                state.session.user.clone(),
                state.session.token.clone(),
                state.session.room.clone(),
            )
        };

        self.shared
            .api
            .join_room(token.as_deref(), &room, &user, password)
            .await?;

        if let Some(previous) = previous.filter(|p| *p != room) {
            if let Err(e) = self
                .shared
                .api
                .leave_room(token.as_deref(), &previous, &user)
                .await
            {
                warn!(error = %e, room = %previous, "leave of previous room failed; not retried");
            }
        }

        let ctx = {
            let mut state = self.state();
            state.session.room = Some(room.clone());
            state.active_dm = None;
            state.reset_room_cache();
            let epoch = state.bump_epoch();
            RoomContext {
                room: room.clone(),
                user,
                token,
                epoch,
            }
        };
        self.timers().cancel(TimerSlot::Dm);
        self.shared.view.clear();
        info!(room = %room, user = %ctx.user, "joined room");

        if self.rich() {
            if let Err(e) = self.shared.api.mark_room_read(ctx.auth(), &room).await {
                debug!(error = %e, room = %room, "mark_read failed");
            }
        }
        // An empty room still gets a frame.
        self.refresh_messages().await;
        self.fetch_presence().await;
        self.start_polling();
        Ok(room)
    }

    /// No-op when not in a room. Local state is reset before the server is
    /// told; a pending `typing=false` goes out first. A failed leave request
    /// is logged and not retried.
    pub async fn leave_room(&self) -> bool {
        let (room, user, token) = {
            let mut state = self.state();
            let Some(room) = state.session.room.take() else {
                return false;
            };
            state.active_dm = None;
            state.reset_room_cache();
            state.bump_epoch();
            (room, state.session.user.clone(), state.session.token.clone())
        };
        self.stop_polling();
        self.timers().cancel(TimerSlot::Dm);
        self.flush_typing_stop(token.as_deref(), &room, &user).await;
        self.shared.view.clear();

        if let Err(e) = self
            .shared
            .api
            .leave_room(token.as_deref(), &room, &user)
            .await
        {
            warn!(error = %e, room = %room, "leave request failed; not retried");
        }
        info!(room = %room, "left room");
        true
    }

    pub async fn create_room(&self, name: &str, password: Option<&str>) -> bool {
        match self.try_create_room(name, password).await {
            Ok(name) => {
                self.notify(Notification::success(format!("Room '{name}' created")));
                self.load_rooms(true).await;
                true
            }
            Err(e) => {
                self.report(&e, "Failed to create room");
                false
            }
        }
    }

    async fn try_create_room(&self, name: &str, password: Option<&str>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("Room name is required".into()));
        }
        let token = self.require_token()?;
        let password = password.filter(|p| !p.is_empty());
        self.shared
            .api
            .create_room(token.as_deref(), name, password)
            .await?;
        info!(room = %name, "room created");
        Ok(name.to_string())
    }

    /// Poll path: re-renders the room list only when it changed.
    pub async fn refresh_rooms(&self) {
        self.load_rooms(false).await;
    }

    /// Fetch and always render the room list.
    pub async fn show_rooms(&self) {
        self.load_rooms(true).await;
    }

    async fn load_rooms(&self, force: bool) {
        let token = {
            let state = self.state();
            if !state.session.is_logged_in() {
                return;
            }
            state.session.token.clone()
        };
        match self.shared.api.list_rooms(token.as_deref()).await {
            Ok(rooms) => {
                let changed = {
                    let mut state = self.state();
                    let changed = state.rooms != rooms;
                    state.rooms = rooms.clone();
                    changed
                };
                if changed || force {
                    self.shared.view.render_rooms(&rooms);
                }
            }
            Err(e) if force => self.report(&e, "Failed to load rooms"),
            Err(e) => debug!(error = %e, "room list refresh failed"),
        }
    }

    pub async fn clear_room(&self) -> bool {
        let Some(ctx) = self.joined_room_context() else {
            self.report(&ChatError::NoActiveRoom, "");
            return false;
        };
        match self.shared.api.clear_room(ctx.auth(), &ctx.room).await {
            Ok(()) => {
                info!(room = %ctx.room, "room cleared");
                self.notify(Notification::success("Chat cleared"));
                self.refresh_messages().await;
                true
            }
            Err(e) => {
                self.report(&e, "Failed to clear chat");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Replace the message and unread timers. Calling this twice leaves
    /// exactly one of each.
    pub fn start_polling(&self) {
        self.stop_polling();
        let polling = &self.shared.config.polling;
        self.spawn_ticker(TimerSlot::Messages, polling.messages(), |c| async move {
            c.fetch_messages().await;
            c.fetch_presence().await;
        });
        if self.rich() {
            self.spawn_ticker(TimerSlot::Unread, polling.unread(), |c| async move {
                c.update_unread_counts().await
            });
        }
    }

    pub fn stop_polling(&self) {
        let mut timers = self.timers();
        timers.cancel(TimerSlot::Messages);
        timers.cancel(TimerSlot::Unread);
    }

    /// Run `tick` every `period` in `slot`, first tick one period from now.
    fn spawn_ticker<F, Fut>(&self, slot: TimerSlot, period: Duration, tick: F)
    where
        F: Fn(ChatClient) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                tick(ChatClient { shared }).await;
            }
        });
        self.timers().replace(slot, handle);
        debug!(timer = %slot, period_ms = period.as_millis() as u64, "timer started");
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Poll path. Re-renders only when the message count changed; no-op
    /// without an active room or while a DM is open.
    pub async fn fetch_messages(&self) {
        let Some(ctx) = self.room_context() else {
            return;
        };
        match self.shared.api.fetch_messages(ctx.auth(), &ctx.room).await {
            Ok(messages) => {
                self.record_poll_success();
                let changed = {
                    let state = self.state();
                    state.is_current(ctx.epoch) && state.last_message_count != messages.len()
                };
                if changed {
                    self.render_room(&ctx, messages, true).await;
                }
            }
            Err(e) => self.record_poll_failure(&e),
        }
    }

    /// Fetch and render unconditionally.
    pub async fn refresh_messages(&self) {
        let Some(ctx) = self.room_context() else {
            return;
        };
        match self.shared.api.fetch_messages(ctx.auth(), &ctx.room).await {
            Ok(messages) => self.render_room(&ctx, messages, false).await,
            Err(e) => self.report(&e, "Failed to load messages"),
        }
    }

    /// `only_if_changed` repeats the count check at commit time; another
    /// render may have landed while pins and replies were in flight.
    async fn render_room(
        &self,
        ctx: &RoomContext,
        messages: Vec<Message>,
        only_if_changed: bool,
    ) {
        let (pinned, replies) = if self.rich() {
            tokio::join!(self.fetch_pins(ctx), self.fetch_replies(ctx, &messages))
        } else {
            (Vec::new(), HashMap::new())
        };

        let title = format!("Room {}", ctx.room);
        let render_ctx = RenderContext {
            current_user: &ctx.user,
            messages: &messages,
            pinned: &pinned,
            replies: &replies,
        };
        let frame = self.shared.room_pipeline.render(&title, &render_ctx);

        {
            let mut state = self.state();
            if !state.is_current(ctx.epoch) {
                debug!(room = %ctx.room, "dropping stale room render");
                return;
            }
            if only_if_changed && state.last_message_count == messages.len() {
                debug!(room = %ctx.room, "count already rendered");
                return;
            }
            state.last_message_count = messages.len();
            state.messages = messages.clone();
            self.shared.view.render_frame(&frame);
        }
        debug!(room = %ctx.room, count = messages.len(), "room rendered");

        if self.rich() {
            self.mark_visible_read(ctx, &messages);
        }
    }

    async fn fetch_pins(&self, ctx: &RoomContext) -> Vec<Message> {
        self.shared
            .api
            .pinned_messages(ctx.auth(), &ctx.room)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, room = %ctx.room, "pinned messages unavailable");
                Vec::new()
            })
    }

    async fn fetch_replies(
        &self,
        ctx: &RoomContext,
        messages: &[Message],
    ) -> HashMap<MessageId, Vec<Reply>> {
        let api = &self.shared.api;
        let requests = messages.iter().filter_map(|m| m.id.as_ref()).map(|id| async move {
            let result = api.replies(ctx.auth(), &ctx.room, id).await;
            (id.clone(), result)
        });

        join_all(requests)
            .await
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(replies) if !replies.is_empty() => Some((id, replies)),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, id = %id, "replies unavailable");
                    None
                }
            })
            .collect()
    }

    /// Fire-and-forget read marks for other users' messages not yet read.
    fn mark_visible_read(&self, ctx: &RoomContext, messages: &[Message]) {
        let ids: Vec<MessageId> = messages
            .iter()
            .filter(|m| m.needs_read_mark(&ctx.user))
            .filter_map(|m| m.id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }
        let api = Arc::clone(&self.shared.api);
        let token = ctx.token.clone();
        tokio::spawn(async move {
            let marks = ids.iter().map(|id| api.mark_message_read(token.as_deref(), id));
            for (id, result) in ids.iter().zip(join_all(marks).await) {
                if let Err(e) = result {
                    debug!(error = %e, id = %id, "mark_message_read failed");
                }
            }
        });
    }

    /// Send `text` to the current room. Blank text is dropped without a
    /// request and without a notice.
    pub async fn send_message(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            debug!("empty message dropped");
            return false;
        }
        let Some(ctx) = self.room_context() else {
            self.report(&ChatError::NoActiveRoom, "");
            return false;
        };

        match self
            .shared
            .api
            .send_message(ctx.auth(), &ctx.room, &ctx.user, text, None)
            .await
        {
            Ok(()) => {
                debug!(room = %ctx.room, "message sent");
                self.fetch_messages().await;
                let mentions = extract_mentions(text);
                if !mentions.is_empty() {
                    self.notify(Notification::info(format!(
                        "Mentioned: {}",
                        mentions.join(", ")
                    )));
                }
                true
            }
            Err(e) => {
                self.report(&e, "Failed to send message");
                false
            }
        }
    }

    /// A plain input line: the open DM thread gets it, otherwise the room.
    /// Line input has no per-key events, so a non-blank line in a room
    /// counts as the keystroke that raises the typing indicator.
    pub async fn submit_line(&self, text: &str) -> bool {
        match self.phase() {
            Phase::InDm { .. } => self.send_dm(text).await,
            Phase::InRoom(_) => {
                if !text.trim().is_empty() {
                    self.notify_typing().await;
                }
                self.send_message(text).await
            }
            _ => self.send_message(text).await,
        }
    }

    pub async fn reply_to(&self, id: &MessageId, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            debug!("empty reply dropped");
            return false;
        }
        let Some(ctx) = self.room_context() else {
            self.report(&ChatError::NoActiveRoom, "");
            return false;
        };
        match self.shared.api.reply(ctx.auth(), &ctx.room, id, text).await {
            Ok(()) => {
                self.refresh_messages().await;
                true
            }
            Err(e) => {
                self.report(&e, "Failed to send reply");
                false
            }
        }
    }

    pub async fn update_unread_counts(&self) {
        let token = {
            let state = self.state();
            if !state.session.is_logged_in() {
                return;
            }
            state.session.token.clone()
        };
        match self.shared.api.unread_counts(token.as_deref()).await {
            Ok(counts) => {
                let changed = {
                    let mut state = self.state();
                    let changed = state.unread != counts;
                    state.unread = counts.clone();
                    changed
                };
                if changed {
                    self.shared.view.render_unread(&counts);
                }
            }
            Err(e) => debug!(error = %e, "unread count refresh failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Presence & typing
    // -----------------------------------------------------------------------

    pub async fn fetch_presence(&self) {
        let Some(ctx) = self.room_context() else {
            return;
        };
        let users = match self.shared.api.room_users(ctx.auth(), &ctx.room).await {
            Ok(users) => users,
            Err(e) => {
                debug!(error = %e, room = %ctx.room, "presence refresh failed");
                return;
            }
        };
        let users: PresenceSet = users.into_iter().collect();
        let (changed, admin) = {
            let mut state = self.state();
            if !state.is_current(ctx.epoch) {
                return;
            }
            state.known_users.extend(users.iter().cloned());
            let changed = state.presence != users;
            state.presence = users.clone();
            (changed, state.is_room_admin())
        };
        if changed {
            self.shared
                .view
                .render_presence(ctx.room.as_str(), &users, &ctx.user, admin);
            self.render_dm_list();
        }
    }

    pub async fn refresh_online_users(&self) {
        let token = {
            let state = self.state();
            if !state.session.is_logged_in() {
                return;
            }
            state.session.token.clone()
        };
        match self.shared.api.online_users(token.as_deref()).await {
            Ok(users) => {
                let users: PresenceSet = users.into_iter().collect();
                let changed = {
                    let mut state = self.state();
                    state.known_users.extend(users.iter().cloned());
                    let changed = state.online != users;
                    state.online = users;
                    changed
                };
                if changed {
                    self.render_dm_list();
                }
            }
            Err(e) => debug!(error = %e, "online users refresh failed"),
        }
    }

    /// Keystroke hook: send `typing=true` now and (re)arm the single
    /// `typing=false` timer.
    pub async fn notify_typing(&self) {
        let Some(ctx) = self.room_context() else {
            return;
        };
        if let Err(e) = self
            .shared
            .api
            .set_typing(ctx.auth(), &ctx.room, &ctx.user, true)
            .await
        {
            debug!(error = %e, "typing start failed");
        }

        let idle = self.shared.config.polling.typing_idle();
        let api = Arc::clone(&self.shared.api);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Err(e) = api
                .set_typing(ctx.auth(), &ctx.room, &ctx.user, false)
                .await
            {
                debug!(error = %e, "typing stop failed");
            }
        });
        self.timers().replace(TimerSlot::TypingStop, handle);
    }

    /// Send a pending `typing=false` now instead of after the idle gap.
    async fn flush_typing_stop(&self, auth: Option<&str>, room: &RoomCode, user: &str) {
        let pending = {
            let mut timers = self.timers();
            let pending = timers.is_active(TimerSlot::TypingStop);
            timers.cancel(TimerSlot::TypingStop);
            pending
        };
        if !pending {
            return;
        }
        if let Err(e) = self.shared.api.set_typing(auth, room, user, false).await {
            debug!(error = %e, "typing stop failed");
        }
    }

    fn render_dm_list(&self) {
        let entries = self.state().dm_entries();
        self.shared.view.render_dm_list(&entries);
    }

    // -----------------------------------------------------------------------
    // Direct messages
    // -----------------------------------------------------------------------

    /// Switch to the DM view with `peer`. The room message timer stops
    /// until [`back_to_room`](Self::back_to_room).
    pub async fn open_dm(&self, peer: &str) -> bool {
        let peer = peer.trim();
        let opened = {
            let mut state = self.state();
            if !state.session.is_logged_in() {
                Err(ChatError::NotAuthenticated)
            } else if peer.is_empty() || peer == state.session.user {
                Err(ChatError::InvalidInput("Pick another user to message".into()))
            } else {
                let room = state.room_context();
                state.active_dm = Some(peer.to_string());
                state.last_dm_count = None;
                state.bump_epoch();
                Ok(room)
            }
        };
        let room = match opened {
            Ok(room) => room,
            Err(e) => {
                self.report(&e, "");
                return false;
            }
        };

        self.timers().cancel(TimerSlot::Messages);
        // Still joined to the room, so the typing indicator must not linger.
        if let Some(ctx) = room {
            self.flush_typing_stop(ctx.auth(), &ctx.room, &ctx.user).await;
        }
        self.shared.view.clear();
        info!(peer = %peer, "opened direct messages");
        self.render_dm_list();
        self.fetch_dm().await;
        self.spawn_ticker(
            TimerSlot::Dm,
            self.shared.config.polling.dm(),
            |c| async move { c.fetch_dm().await },
        );
        true
    }

    /// DM poll path; renders when the thread length changed.
    pub async fn fetch_dm(&self) {
        let Some(ctx) = self.dm_context() else {
            return;
        };
        let messages = match self.shared.api.direct_messages(ctx.auth(), &ctx.peer).await {
            Ok(messages) => messages,
            Err(e) => {
                debug!(error = %e, peer = %ctx.peer, "direct message poll failed");
                return;
            }
        };

        let title = format!("DM with {}", ctx.peer);
        let replies = HashMap::new();
        let render_ctx = RenderContext {
            current_user: &ctx.user,
            messages: &messages,
            pinned: &[],
            replies: &replies,
        };
        let mut state = self.state();
        if !state.is_current(ctx.epoch) || state.last_dm_count == Some(messages.len()) {
            return;
        }
        state.last_dm_count = Some(messages.len());
        let frame = self.shared.dm_pipeline.render(&title, &render_ctx);
        self.shared.view.render_frame(&frame);
    }

    pub async fn send_dm(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            debug!("empty direct message dropped");
            return false;
        }
        let Some(ctx) = self.dm_context() else {
            self.report(&ChatError::NoActiveDm, "");
            return false;
        };
        match self.shared.api.send_direct(ctx.auth(), &ctx.peer, text).await {
            Ok(()) => {
                self.state().last_dm_count = None;
                self.fetch_dm().await;
                true
            }
            Err(e) => {
                self.report(&e, "Failed to send message");
                false
            }
        }
    }

    /// Close the DM view and resume the room, if any.
    pub async fn back_to_room(&self) -> bool {
        let in_room = {
            let mut state = self.state();
            if state.active_dm.take().is_none() {
                return false;
            }
            state.last_dm_count = None;
            state.bump_epoch();
            state.session.room.is_some()
        };
        self.timers().cancel(TimerSlot::Dm);
        self.shared.view.clear();
        self.render_dm_list();
        if in_room {
            self.refresh_messages().await;
            self.start_polling();
        }
        true
    }

    // -----------------------------------------------------------------------
    // Moderation & mentions
    // -----------------------------------------------------------------------

    /// Always sent; the creator check is only a display hint.
    pub async fn moderate(&self, action: ModAction, user: &str) -> bool {
        let user = user.trim();
        if user.is_empty() {
            self.report(&ChatError::InvalidInput("Username is required".into()), "");
            return false;
        }
        let Some(ctx) = self.joined_room_context() else {
            self.report(&ChatError::NoActiveRoom, "");
            return false;
        };
        if !self.is_room_admin() {
            debug!(room = %ctx.room, action = %action, "moderating without creator hint");
        }
        match self
            .shared
            .api
            .moderate(ctx.auth(), action, &ctx.room, user)
            .await
        {
            Ok(()) => {
                info!(room = %ctx.room, action = %action, target = %user, "moderation applied");
                self.notify(Notification::success(format!(
                    "{} {user}",
                    action.past_tense()
                )));
                self.fetch_presence().await;
                true
            }
            Err(e) => {
                self.report(&e, &format!("Failed to {action} user"));
                false
            }
        }
    }

    pub async fn show_mod_logs(&self) -> bool {
        let Some(ctx) = self.joined_room_context() else {
            self.report(&ChatError::NoActiveRoom, "");
            return false;
        };
        match self.shared.api.mod_logs(ctx.auth(), &ctx.room).await {
            Ok(logs) => {
                self.shared.view.render_mod_logs(ctx.room.as_str(), &logs);
                true
            }
            Err(e) => {
                self.report(&e, "Failed to load moderation logs");
                false
            }
        }
    }

    pub async fn show_mentions(&self) -> bool {
        let token = match self.require_token() {
            Ok(token) => token,
            Err(e) => {
                self.report(&e, "");
                return false;
            }
        };
        match self.shared.api.mentions(token.as_deref()).await {
            Ok(mentions) => {
                self.shared.view.render_mentions(&mentions);
                true
            }
            Err(e) => {
                self.report(&e, "Failed to load mentions");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Upload `path` and post it to the room. The size ceiling is checked
    /// before anything is read or sent.
    pub async fn upload_file(&self, path: &Path, caption: Option<&str>) -> bool {
        match self.try_upload(path, caption).await {
            Ok(filename) => {
                self.notify(Notification::success(format!("Uploaded {filename}")));
                true
            }
            Err(e) => {
                self.report(&e, "Failed to upload file");
                false
            }
        }
    }

    async fn try_upload(&self, path: &Path, caption: Option<&str>) -> Result<String> {
        let ctx = self.room_context().ok_or(ChatError::NoActiveRoom)?;
        let limit = self.shared.config.upload.max_bytes;

        let size = tokio::fs::metadata(path).await?.len();
        if size > limit {
            return Err(ChatError::FileTooLarge { size, limit });
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ChatError::InvalidInput(format!("Not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        // The file may have grown since the metadata call.
        if bytes.len() as u64 > limit {
            return Err(ChatError::FileTooLarge {
                size: bytes.len() as u64,
                limit,
            });
        }

        let attachment = self
            .shared
            .api
            .upload_file(ctx.auth(), FileUpload { filename, bytes })
            .await?;
        let text = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Shared file: {}", attachment.filename));
        self.shared
            .api
            .send_message(ctx.auth(), &ctx.room, &ctx.user, &text, Some(&attachment))
            .await?;
        info!(room = %ctx.room, file = %attachment.filename, size = attachment.size, "file shared");

        self.fetch_messages().await;
        Ok(attachment.filename)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Leave the current room and stop every timer. The session survives.
    pub async fn shutdown(&self) {
        self.leave_room().await;
        self.timers().cancel_all();
        debug!("client shut down");
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.shared
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn room_context(&self) -> Option<RoomContext> {
        self.state().room_context()
    }

    fn joined_room_context(&self) -> Option<RoomContext> {
        self.state().joined_room_context()
    }

    fn dm_context(&self) -> Option<DmContext> {
        self.state().dm_context()
    }

    /// Token flavor backends expose unread counts, pins, replies, read
    /// marks and the session endpoints; the legacy one does not.
    fn rich(&self) -> bool {
        self.shared.config.server.flavor == Flavor::Token
    }

    fn require_token(&self) -> Result<Option<String>> {
        let state = self.state();
        if !state.session.is_logged_in() {
            return Err(ChatError::NotAuthenticated);
        }
        if self.rich() && state.session.token.is_none() {
            return Err(ChatError::NotAuthenticated);
        }
        Ok(state.session.token.clone())
    }

    fn notify(&self, notice: Notification) {
        self.shared.view.notify(notice);
    }

    fn report(&self, err: &ChatError, fallback: &str) {
        if err.is_validation() {
            debug!(error = %err, "rejected locally");
        } else {
            warn!(error = %err, "{fallback}");
        }
        self.notify(Notification::error(err.user_message(fallback)));
    }

    fn record_poll_failure(&self, err: &ChatError) {
        let failures = {
            let mut state = self.state();
            state.poll_failures = state.poll_failures.saturating_add(1);
            state.poll_failures
        };
        if failures >= POLL_FAILURE_ESCALATION {
            error!(
                error = %err,
                consecutive_failures = failures,
                "message poll failed repeatedly, will retry next tick"
            );
        } else {
            warn!(error = %err, "message poll failed, will retry next tick");
        }
        if failures == 1 {
            self.notify(Notification::error("Connection lost. Retrying").persistent());
        }
    }

    fn record_poll_success(&self) {
        let previous = std::mem::take(&mut self.state().poll_failures);
        if previous > 0 {
            info!(failed_polls = previous, "message poll recovered");
            self.notify(Notification::success("Reconnected"));
        }
    }
}

/// Builder for [`ChatClient`].
///
/// ```rust,ignore
/// let client = ChatClient::builder(config)
///     .api(Arc::new(HttpChatApi::from_config(&config, "localhost")))
///     .view(Arc::new(TerminalView::default()))
///     .build()?;
/// ```
pub struct ChatClientBuilder {
    config: ClientConfig,
    api: Option<Arc<dyn ChatApi>>,
    view: Option<Arc<dyn ChatView>>,
    room_pipeline: RenderPipeline,
    dm_pipeline: RenderPipeline,
}

impl ChatClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            api: None,
            view: None,
            room_pipeline: RenderPipeline::room(),
            dm_pipeline: RenderPipeline::direct(),
        }
    }

    /// Required.
    pub fn api(mut self, api: Arc<dyn ChatApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Required.
    pub fn view(mut self, view: Arc<dyn ChatView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn room_pipeline(mut self, pipeline: RenderPipeline) -> Self {
        self.room_pipeline = pipeline;
        self
    }

    pub fn dm_pipeline(mut self, pipeline: RenderPipeline) -> Self {
        self.dm_pipeline = pipeline;
        self
    }

    /// # Errors
    /// `ChatError::Config` when the config fails validation or the api or
    /// view was not set.
    pub fn build(self) -> Result<ChatClient> {
        self.config.validate()?;
        let api = self
            .api
            .ok_or_else(|| ChatError::Config("api is required".into()))?;
        let view = self
            .view
            .ok_or_else(|| ChatError::Config("view is required".into()))?;

        Ok(ChatClient {
            shared: Arc::new(Shared {
                config: self.config,
                api,
                view,
                room_pipeline: self.room_pipeline,
                dm_pipeline: self.dm_pipeline,
                state: Mutex::new(ClientState::default()),
                timers: Mutex::new(Timers::new()),
            }),
        })
    }
}
