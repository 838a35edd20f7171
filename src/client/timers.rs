//! Named timer slots.
//!
//! Each slot holds at most one spawned task. Installing a task into an
//! occupied slot aborts the previous one, which is what makes
//! `start_polling` idempotent and the typing stop timer a debounce.

use std::collections::HashMap;
use std::fmt;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    /// Room messages + room presence.
    Messages,
    Unread,
    Rooms,
    OnlineUsers,
    Heartbeat,
    /// DM thread poll.
    Dm,
    /// One-shot `typing=false` after the idle gap.
    TypingStop,
}

impl TimerSlot {
    pub const ALL: [TimerSlot; 7] = [
        TimerSlot::Messages,
        TimerSlot::Unread,
        TimerSlot::Rooms,
        TimerSlot::OnlineUsers,
        TimerSlot::Heartbeat,
        TimerSlot::Dm,
        TimerSlot::TypingStop,
    ];
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerSlot::Messages => "messages",
            TimerSlot::Unread => "unread",
            TimerSlot::Rooms => "rooms",
            TimerSlot::OnlineUsers => "online_users",
            TimerSlot::Heartbeat => "heartbeat",
            TimerSlot::Dm => "dm",
            TimerSlot::TypingStop => "typing_stop",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
pub struct Timers {
    handles: HashMap<TimerSlot, JoinHandle<()>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` in `slot`, aborting whatever ran there before.
    pub fn replace(&mut self, slot: TimerSlot, handle: JoinHandle<()>) {
        if let Some(old) = self.handles.insert(slot, handle) {
            old.abort();
        }
    }

    /// Abort the task in `slot`. Returns whether one was present.
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        match self.handles.remove(&slot) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    /// A slot counts as active while its task has not finished.
    pub fn is_active(&self, slot: TimerSlot) -> bool {
        self.handles.get(&slot).is_some_and(|h| !h.is_finished())
    }

    pub fn active(&self) -> Vec<TimerSlot> {
        let mut slots: Vec<TimerSlot> = self
            .handles
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(slot, _)| *slot)
            .collect();
        slots.sort();
        slots
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
