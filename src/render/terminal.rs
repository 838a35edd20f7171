//! Coloured terminal implementation of [`ChatView`].

use colored::*;
use std::sync::Mutex;

use super::{Frame, Line, LineKind};
use crate::api::{Mention, ModLogEntry, PresenceSet, RoomSummary, UnreadCounts};
use crate::text::{avatar_initial, mod_action_text, split_mentions};
use crate::theme::Theme;
use crate::view::{ChatView, DmEntry, NoticeLevel, Notification};

/// Prints frames and notices to stdout. The active theme's primary colour
/// marks the current user's messages.
pub struct TerminalView {
    theme: Mutex<Theme>,
}

impl TerminalView {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme: Mutex::new(theme),
        }
    }

    pub fn theme(&self) -> Theme {
        *self.theme.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_theme(&self, theme: Theme) {
        *self.theme.lock().unwrap_or_else(|e| e.into_inner()) = theme;
    }

    fn own_color(&self, text: &str) -> ColoredString {
        match self.theme().primary_rgb() {
            Some((r, g, b)) => text.truecolor(r, g, b),
            None => text.bright_cyan(),
        }
    }

    /// `@name` tokens are highlighted inside body text.
    fn highlight_mentions(text: &str) -> String {
        split_mentions(text)
            .into_iter()
            .map(|(is_mention, part)| {
                if is_mention {
                    part.bright_yellow().bold().to_string()
                } else {
                    part.to_string()
                }
            })
            .collect()
    }

    pub fn format_line(&self, line: &Line) -> String {
        match line.kind {
            LineKind::PinnedHeader => line.text.bright_yellow().bold().to_string(),
            LineKind::Pinned => format!("  {}", line.text.yellow()),
            LineKind::Header => {
                let initial = avatar_initial(&line.text);
                let header = if line.own {
                    self.own_color(&line.text).bold()
                } else {
                    line.text.bright_white().bold()
                };
                format!("[{initial}] {header}")
            }
            LineKind::Body => format!("    {}", Self::highlight_mentions(&line.text)),
            LineKind::Attachment => format!("    {}", line.text.bright_blue()),
            LineKind::Receipt => format!("    {}", line.text.dimmed()),
            LineKind::Reactions => format!("    {}", line.text),
            LineKind::Reply => format!("      {}", line.text.dimmed()),
        }
    }

    pub fn format_frame(&self, frame: &Frame) -> String {
        let mut out = format!("{}\n", format!("── {} ──", frame.title).bright_cyan().bold());
        for line in &frame.lines {
            out.push_str(&self.format_line(line));
            out.push('\n');
        }
        out
    }

    pub fn format_notice(notice: &Notification) -> String {
        let text = match notice.level {
            NoticeLevel::Info => notice.text.bright_blue(),
            NoticeLevel::Success => notice.text.bright_green(),
            NoticeLevel::Error => notice.text.bright_red(),
        };
        if notice.persistent {
            format!("[!] {}", text.bold())
        } else {
            format!("» {text}")
        }
    }

    pub fn format_dm_entry(entry: &DmEntry) -> String {
        let dot = if entry.online {
            "●".bright_green()
        } else {
            "●".dimmed()
        };
        let name = if entry.active {
            entry.user.bold().to_string()
        } else {
            entry.user.clone()
        };
        format!("{dot} {name}")
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

impl ChatView for TerminalView {
    fn render_frame(&self, frame: &Frame) {
        print!("{}", self.format_frame(frame));
    }

    fn notify(&self, notice: Notification) {
        println!("{}", Self::format_notice(&notice));
    }

    fn render_presence(
        &self,
        room: &str,
        users: &PresenceSet,
        current_user: &str,
        show_moderation: bool,
    ) {
        let names: Vec<String> = users
            .iter()
            .map(|u| {
                if u == current_user {
                    format!("{u} (you)")
                } else {
                    u.clone()
                }
            })
            .collect();
        println!(
            "{} {} online in {room}: {}",
            "●".bright_green(),
            users.len(),
            names.join(", ")
        );
        if show_moderation {
            println!("{}", "  /kick <user>  /ban <user>  /modlogs".dimmed());
        }
    }

    fn render_unread(&self, counts: &UnreadCounts) {
        let parts: Vec<String> = counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(room, n)| format!("{room} ({n})"))
            .collect();
        if !parts.is_empty() {
            println!("{} {}", "Unread:".bright_yellow(), parts.join(", "));
        }
    }

    fn render_rooms(&self, rooms: &[RoomSummary]) {
        println!("{}", "Rooms".bright_cyan().bold());
        for room in rooms {
            let lock = if room.has_password { " 🔒" } else { "" };
            println!("  {}{lock}", room.name);
        }
    }

    fn render_dm_list(&self, entries: &[DmEntry]) {
        if entries.is_empty() {
            return;
        }
        let parts: Vec<String> = entries.iter().map(Self::format_dm_entry).collect();
        println!("{} {}", "DMs:".bright_cyan(), parts.join("  "));
    }

    fn render_mentions(&self, mentions: &[Mention]) {
        if mentions.is_empty() {
            println!("{}", "No mentions yet".dimmed());
            return;
        }
        println!("{}", "Mentions".bright_cyan().bold());
        for mention in mentions {
            println!(
                "  [{}] {}: {}",
                mention.room,
                mention.message.sender.bold(),
                Self::highlight_mentions(&mention.message.text)
            );
        }
    }

    fn render_mod_logs(&self, room: &str, logs: &[ModLogEntry]) {
        println!("{}", format!("Moderation log for {room}").bright_cyan().bold());
        if logs.is_empty() {
            println!("{}", "  No moderation actions yet".dimmed());
            return;
        }
        for log in logs {
            println!(
                "  {} {} {} {}",
                log.timestamp.dimmed(),
                log.admin.bold(),
                mod_action_text(&log.action),
                log.target
            );
        }
    }

    fn clear(&self) {
        print!("\x1B[2J\x1B[1;1H");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::THEMES;

    fn plain() -> TerminalView {
        colored::control::set_override(false);
        TerminalView::default()
    }

    #[test]
    fn header_carries_avatar_initial() {
        let view = plain();
        let line = Line::new(LineKind::Header, false, "bob • 12:00");
        assert_eq!(view.format_line(&line), "[B] bob • 12:00");
    }

    #[test]
    fn body_is_indented() {
        let view = plain();
        let line = Line::new(LineKind::Body, true, "hello @bob");
        assert_eq!(view.format_line(&line), "    hello @bob");
    }

    #[test]
    fn frame_has_title_and_one_row_per_line() {
        let view = plain();
        let mut frame = Frame::new("Room 1234");
        frame.push(LineKind::Header, false, "bob • 12:00");
        frame.push(LineKind::Body, false, "hi");
        let out = view.format_frame(&frame);
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().next().unwrap().contains("Room 1234"));
    }

    #[test]
    fn persistent_notice_is_marked() {
        colored::control::set_override(false);
        let n = Notification::error("Connection lost").persistent();
        assert_eq!(TerminalView::format_notice(&n), "[!] Connection lost");
        assert_eq!(
            TerminalView::format_notice(&Notification::info("hi")),
            "» hi"
        );
    }

    #[test]
    fn dm_entry_shows_dot() {
        colored::control::set_override(false);
        let entry = DmEntry {
            user: "bob".into(),
            online: true,
            active: false,
        };
        assert_eq!(TerminalView::format_dm_entry(&entry), "● bob");
    }

    #[test]
    fn theme_can_be_switched() {
        let view = TerminalView::default();
        view.set_theme(THEMES[2]);
        assert_eq!(view.theme().name, THEMES[2].name);
    }
}
