//! Local mirror of the server-side slice the client displays.

use std::collections::BTreeSet;

use crate::api::{Message, PresenceSet, RoomSummary, UnreadCounts};
use crate::session::{Phase, RoomCode, Session};
use crate::view::DmEntry;

/// Everything the synchronizer knows. Lives behind one mutex in
/// [`ChatClient`](super::ChatClient); never locked across an await.
#[derive(Debug, Default)]
pub struct ClientState {
    pub session: Session,
    /// Peer of the open DM thread.
    pub active_dm: Option<String>,
    /// Bumped on every room/DM transition; responses from an older epoch
    /// are dropped.
    pub epoch: u64,
    /// Length of the last rendered room message list.
    pub last_message_count: usize,
    /// Length of the last rendered DM thread; `None` forces a render.
    pub last_dm_count: Option<usize>,
    pub messages: Vec<Message>,
    /// Users in the current room.
    pub presence: PresenceSet,
    /// Users online anywhere.
    pub online: PresenceSet,
    /// Every user seen in presence or online lists this session.
    pub known_users: BTreeSet<String>,
    pub rooms: Vec<RoomSummary>,
    pub unread: UnreadCounts,
    pub poll_failures: u32,
}

/// Snapshot captured when a room request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomContext {
    pub room: RoomCode,
    pub user: String,
    pub token: Option<String>,
    pub epoch: u64,
}

impl RoomContext {
    pub fn auth(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Snapshot captured when a DM request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmContext {
    pub peer: String,
    pub user: String,
    pub token: Option<String>,
    pub epoch: u64,
}

impl DmContext {
    pub fn auth(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl ClientState {
    pub fn phase(&self) -> Phase {
        Phase::of(&self.session, self.active_dm.as_deref())
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Room view context; `None` when logged out, roomless, or a DM is open.
    pub fn room_context(&self) -> Option<RoomContext> {
        if !self.session.is_logged_in() || self.active_dm.is_some() {
            return None;
        }
        let room = self.session.room.clone()?;
        Some(RoomContext {
            room,
            user: self.session.user.clone(),
            token: self.session.token.clone(),
            epoch: self.epoch,
        })
    }

    /// Like [`room_context`](Self::room_context) but ignores an open DM.
    pub fn joined_room_context(&self) -> Option<RoomContext> {
        if !self.session.is_logged_in() {
            return None;
        }
        let room = self.session.room.clone()?;
        Some(RoomContext {
            room,
            user: self.session.user.clone(),
            token: self.session.token.clone(),
            epoch: self.epoch,
        })
    }

    pub fn dm_context(&self) -> Option<DmContext> {
        if !self.session.is_logged_in() {
            return None;
        }
        let peer = self.active_dm.clone()?;
        Some(DmContext {
            peer,
            user: self.session.user.clone(),
            token: self.session.token.clone(),
            epoch: self.epoch,
        })
    }

    /// Drop everything cached for the current room view.
    pub fn reset_room_cache(&mut self) {
        self.last_message_count = 0;
        self.messages.clear();
        self.presence.clear();
    }

    /// Display hint only: the server decides whether moderation succeeds.
    pub fn is_room_admin(&self) -> bool {
        let Some(room) = &self.session.room else {
            return false;
        };
        self.rooms
            .iter()
            .any(|r| r.name == room.as_str() && r.creator == self.session.user)
    }

    /// DM sidebar rows: every known user except self, sorted by name.
    pub fn dm_entries(&self) -> Vec<DmEntry> {
        self.known_users
            .iter()
            .chain(self.online.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|u| **u != self.session.user)
            .map(|u| DmEntry {
                user: u.clone(),
                online: self.online.contains(u) || self.presence.contains(u),
                active: self.active_dm.as_deref() == Some(u.as_str()),
            })
            .collect()
    }

    /// Fresh state for a new session; the epoch keeps counting so late
    /// responses from the old session stay stale.
    pub fn reset(&mut self) {
        let epoch = self.epoch;
        *self = ClientState::default();
        self.epoch = epoch;
        self.bump_epoch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in(user: &str) -> ClientState {
        let mut state = ClientState::default();
        state.session.user = user.to_string();
        state.session.token = Some("jwt".to_string());
        state
    }

    #[test]
    fn room_context_requires_room_and_no_dm() {
        let mut state = logged_in("alice");
        assert!(state.room_context().is_none());

        state.session.room = Some(RoomCode::parse("1234").unwrap());
        let ctx = state.room_context().unwrap();
        assert_eq!(ctx.room.as_str(), "1234");
        assert_eq!(ctx.auth(), Some("jwt"));

        state.active_dm = Some("bob".into());
        assert!(state.room_context().is_none());
        assert!(state.joined_room_context().is_some());
        assert_eq!(state.dm_context().unwrap().peer, "bob");
    }

    #[test]
    fn bump_epoch_invalidates_captured_context() {
        let mut state = logged_in("alice");
        state.session.room = Some(RoomCode::parse("1").unwrap());
        let ctx = state.room_context().unwrap();
        assert!(state.is_current(ctx.epoch));
        state.bump_epoch();
        assert!(!state.is_current(ctx.epoch));
    }

    #[test]
    fn admin_hint_matches_creator() {
        let mut state = logged_in("alice");
        state.session.room = Some(RoomCode::parse("general").unwrap());
        state.rooms = vec![RoomSummary {
            name: "general".into(),
            has_password: false,
            creator: "alice".into(),
        }];
        assert!(state.is_room_admin());
        state.session.user = "bob".into();
        assert!(!state.is_room_admin());
    }

    #[test]
    fn dm_entries_exclude_self_and_flag_online() {
        let mut state = logged_in("alice");
        state.known_users = ["alice", "bob", "carol"].map(String::from).into();
        state.online = ["bob", "dave"].map(String::from).into();
        state.active_dm = Some("carol".into());

        let entries = state.dm_entries();
        let names: Vec<&str> = entries.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol", "dave"]);
        assert!(entries[0].online);
        assert!(!entries[1].online);
        assert!(entries[1].active);
    }

    #[test]
    fn reset_keeps_epoch_moving() {
        let mut state = logged_in("alice");
        state.bump_epoch();
        let before = state.epoch;
        state.reset();
        assert!(state.epoch > before);
        assert_eq!(state.phase(), Phase::LoggedOut);
    }
}
