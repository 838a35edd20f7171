//! Stateless text helpers: mentions, file sizes, read receipts, emoji, guest names.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::BTreeSet;

/// Reactions shown under every message, in display order.
pub const REACTION_EMOJIS: [&str; 8] = ["👍", "😂", "❤️", "🔥", "🎉", "😮", "😢", "😡"];

/// Emoji offered by the composer picker (`/emoji N`).
pub const EMOJI_PICKER: &[&str] = &[
    "😀", "😂", "😍", "😎", "🤔", "😢", "😡", "👍", "👎", "👏", "🙏", "🔥", "🎉", "❤️", "💯", "🚀",
];

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("mention pattern is valid"));

const GUEST_ADJECTIVES: &[&str] = &[
    "Cool", "Smart", "Fast", "Bright", "Quick", "Bold", "Epic", "Super", "Mega", "Ultra",
];
const GUEST_NOUNS: &[&str] = &[
    "User", "Guest", "Chat", "Friend", "Buddy", "Star", "Hero", "Pro", "Master", "Legend",
];

/// Names mentioned as `@name` in `text`, first occurrence order, no duplicates.
///
/// Cosmetic only: the server decides who is actually notified.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Split `text` into `(is_mention, segment)` pieces for highlighting.
pub fn split_mentions(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in MENTION_RE.find_iter(text) {
        if m.start() > last {
            out.push((false, &text[last..m.start()]));
        }
        out.push((true, m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        out.push((false, &text[last..]));
    }
    out
}

/// Human-readable size with binary units, e.g. `1536 -> "1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let mut num = format!("{value:.2}");
    if num.contains('.') {
        num = num.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{num} {}", UNITS[unit])
}

/// Receipt line shown under the current user's own messages.
pub fn read_receipt_text(read_by: &BTreeSet<String>, current_user: &str) -> String {
    let others: Vec<&String> = read_by.iter().filter(|u| *u != current_user).collect();
    match others.as_slice() {
        [] => "Sent".to_string(),
        [one] => format!("Read by {one}"),
        many => format!("Read by {} people", many.len()),
    }
}

/// Append an emoji to the composer draft.
pub fn append_emoji(draft: &mut String, emoji: &str) {
    draft.push_str(emoji);
}

/// Picker emoji by 1-based index.
pub fn picker_emoji(index: usize) -> Option<&'static str> {
    index.checked_sub(1).and_then(|i| EMOJI_PICKER.get(i).copied())
}

/// Avatar letter for a username.
pub fn avatar_initial(name: &str) -> char {
    name.chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('U')
}

/// Random guest name such as `BoldStar42`, used by the legacy flavor.
pub fn generate_guest_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adj = GUEST_ADJECTIVES[rng.gen_range(0..GUEST_ADJECTIVES.len())];
    let noun = GUEST_NOUNS[rng.gen_range(0..GUEST_NOUNS.len())];
    let num: u32 = rng.gen_range(1..=999);
    format!("{adj}{noun}{num}")
}

/// Verb phrase for a moderation log action.
pub fn mod_action_text(action: &str) -> &str {
    match action {
        "kick" => "kicked",
        "ban" => "banned",
        "pin" => "pinned message",
        "delete" => "deleted message",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    // -----------------------------------------------------------------------
    // Mentions
    // -----------------------------------------------------------------------

    #[test]
    fn extract_single_mention() {
        assert_eq!(extract_mentions("hello @bob"), vec!["bob"]);
    }

    #[test]
    fn extract_multiple_mentions_dedupes_in_order() {
        assert_eq!(
            extract_mentions("@carol and @bob, then @carol again"),
            vec!["carol", "bob"]
        );
    }

    #[test]
    fn extract_ignores_bare_at_sign() {
        assert!(extract_mentions("mail me @ home").is_empty());
    }

    #[test]
    fn mention_stops_at_punctuation() {
        assert_eq!(extract_mentions("thanks @dave!"), vec!["dave"]);
    }

    #[test]
    fn split_mentions_marks_segments() {
        let parts = split_mentions("hi @bob how are you");
        assert_eq!(
            parts,
            vec![(false, "hi "), (true, "@bob"), (false, " how are you")]
        );
    }

    #[test]
    fn split_mentions_plain_text_is_one_segment() {
        assert_eq!(split_mentions("plain"), vec![(false, "plain")]);
    }

    #[test]
    fn split_mentions_empty_text() {
        assert!(split_mentions("").is_empty());
    }

    // -----------------------------------------------------------------------
    // File sizes
    // -----------------------------------------------------------------------

    #[rstest]
    #[case(0, "0 Bytes")]
    #[case(1, "1 Bytes")]
    #[case(512, "512 Bytes")]
    #[case(1024, "1 KB")]
    #[case(1536, "1.5 KB")]
    #[case(5 * 1024 * 1024, "5 MB")]
    #[case(1_234_567, "1.18 MB")]
    #[case(3 * 1024 * 1024 * 1024, "3 GB")]
    fn file_size_formatting(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_file_size(bytes), expected);
    }

    #[test]
    fn file_size_caps_at_gigabytes() {
        assert!(format_file_size(5 * 1024 * 1024 * 1024 * 1024).ends_with(" GB"));
    }

    // -----------------------------------------------------------------------
    // Read receipts
    // -----------------------------------------------------------------------

    fn set(users: &[&str]) -> BTreeSet<String> {
        users.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn receipt_only_self_is_sent() {
        assert_eq!(read_receipt_text(&set(&["alice"]), "alice"), "Sent");
        assert_eq!(read_receipt_text(&set(&[]), "alice"), "Sent");
    }

    #[test]
    fn receipt_single_reader_named() {
        assert_eq!(read_receipt_text(&set(&["alice", "bob"]), "alice"), "Read by bob");
    }

    #[test]
    fn receipt_many_readers_counted() {
        assert_eq!(
            read_receipt_text(&set(&["alice", "bob", "carol", "dave"]), "alice"),
            "Read by 3 people"
        );
    }

    // -----------------------------------------------------------------------
    // Emoji, avatars, guest names, mod actions
    // -----------------------------------------------------------------------

    #[test]
    fn append_emoji_extends_draft() {
        let mut draft = String::from("nice ");
        append_emoji(&mut draft, "🔥");
        assert_eq!(draft, "nice 🔥");
    }

    #[test]
    fn picker_is_one_based() {
        assert_eq!(picker_emoji(1), Some(EMOJI_PICKER[0]));
        assert_eq!(picker_emoji(0), None);
        assert_eq!(picker_emoji(EMOJI_PICKER.len() + 1), None);
    }

    #[test]
    fn avatar_initial_uppercases() {
        assert_eq!(avatar_initial("bob"), 'B');
        assert_eq!(avatar_initial(""), 'U');
    }

    #[test]
    fn guest_name_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let name = generate_guest_name(&mut rng);
            assert!(GUEST_ADJECTIVES.iter().any(|a| name.starts_with(a)), "{name}");
            assert!(name.chars().last().is_some_and(|c| c.is_ascii_digit()), "{name}");
        }
    }

    #[rstest]
    #[case("kick", "kicked")]
    #[case("ban", "banned")]
    #[case("pin", "pinned message")]
    #[case("delete", "deleted message")]
    #[case("mute", "mute")]
    fn mod_action_phrases(#[case] action: &str, #[case] expected: &str) {
        assert_eq!(mod_action_text(action), expected);
    }

    proptest! {
        #[test]
        fn mentions_appear_in_text(text in "[a-z @_]{0,40}") {
            for name in extract_mentions(&text) {
                let needle = format!("@{name}");
                prop_assert!(text.contains(&needle));
            }
        }

        #[test]
        fn split_mentions_reassembles(text in "[a-zA-Z0-9 @_.!]{0,60}") {
            let joined: String = split_mentions(&text).into_iter().map(|(_, s)| s).collect();
            prop_assert_eq!(joined, text);
        }

        #[test]
        fn file_size_always_has_unit(bytes in any::<u64>()) {
            let s = format_file_size(bytes);
            prop_assert!(["Bytes", "KB", "MB", "GB"].iter().any(|u| s.ends_with(u)));
        }
    }
}
