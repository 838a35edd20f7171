//! Built-in render stages.

use super::{Frame, LineKind, RenderContext, RenderStage};
use crate::api::Message;
use crate::text::{format_file_size, read_receipt_text, REACTION_EMOJIS};

/// Banner listing the room's pinned messages.
pub struct PinnedStage;

impl RenderStage for PinnedStage {
    fn name(&self) -> &str {
        "pinned"
    }

    fn prelude(&self, ctx: &RenderContext<'_>, frame: &mut Frame) {
        if ctx.pinned.is_empty() {
            return;
        }
        frame.push(LineKind::PinnedHeader, false, "📌 Pinned Messages:");
        for msg in ctx.pinned {
            frame.push(
                LineKind::Pinned,
                msg.is_from(ctx.current_user),
                format!("{}: {} ({})", msg.sender, msg.text, msg.time),
            );
        }
    }
}

/// Sender/time header plus the message text.
pub struct BubbleStage;

impl RenderStage for BubbleStage {
    fn name(&self) -> &str {
        "bubble"
    }

    fn message(&self, ctx: &RenderContext<'_>, message: &Message, frame: &mut Frame) {
        let own = message.is_from(ctx.current_user);
        let header = if message.time.is_empty() {
            message.sender.clone()
        } else {
            format!("{} • {}", message.sender, message.time)
        };
        frame.push(LineKind::Header, own, header);
        if !message.text.is_empty() {
            frame.push(LineKind::Body, own, message.text.clone());
        }
    }
}

pub struct AttachmentStage;

impl RenderStage for AttachmentStage {
    fn name(&self) -> &str {
        "attachment"
    }

    fn message(&self, ctx: &RenderContext<'_>, message: &Message, frame: &mut Frame) {
        let Some(file) = &message.file else {
            return;
        };
        let text = if file.is_image() {
            format!("[image] {} <{}>", file.filename, file.url)
        } else {
            format!(
                "[file] {} ({}) <{}>",
                file.filename,
                format_file_size(file.size),
                file.url
            )
        };
        frame.push(LineKind::Attachment, message.is_from(ctx.current_user), text);
    }
}

/// "Sent" / "Read by …" under the current user's own messages.
pub struct ReceiptStage;

impl RenderStage for ReceiptStage {
    fn name(&self) -> &str {
        "receipt"
    }

    fn message(&self, ctx: &RenderContext<'_>, message: &Message, frame: &mut Frame) {
        if !message.is_from(ctx.current_user) {
            return;
        }
        frame.push(
            LineKind::Receipt,
            true,
            read_receipt_text(&message.read_by, ctx.current_user),
        );
    }
}

/// Reaction counts; emoji the current user picked are tagged `(you)`.
pub struct ReactionsStage;

impl RenderStage for ReactionsStage {
    fn name(&self) -> &str {
        "reactions"
    }

    fn message(&self, ctx: &RenderContext<'_>, message: &Message, frame: &mut Frame) {
        let parts: Vec<String> = REACTION_EMOJIS
            .iter()
            .filter_map(|emoji| {
                let count = message.reaction_count(emoji);
                if count == 0 {
                    return None;
                }
                let mine = if message.reacted_by(emoji, ctx.current_user) {
                    " (you)"
                } else {
                    ""
                };
                Some(format!("{emoji} {count}{mine}"))
            })
            .collect();
        if !parts.is_empty() {
            frame.push(
                LineKind::Reactions,
                message.is_from(ctx.current_user),
                parts.join("  "),
            );
        }
    }
}

pub struct RepliesStage;

impl RenderStage for RepliesStage {
    fn name(&self) -> &str {
        "replies"
    }

    fn message(&self, ctx: &RenderContext<'_>, message: &Message, frame: &mut Frame) {
        let own = message.is_from(ctx.current_user);
        for reply in ctx.replies_for(message) {
            frame.push(
                LineKind::Reply,
                own,
                format!("↳ {}: {} ({})", reply.sender, reply.text, reply.time),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::message;
    use super::super::RenderPipeline;
    use super::*;
    use crate::api::{FileAttachment, MessageId, Reply};
    use std::collections::HashMap;

    fn render(pipeline: RenderPipeline, messages: &[Message], pinned: &[Message]) -> Frame {
        let replies = HashMap::new();
        let ctx = RenderContext {
            current_user: "alice",
            messages,
            pinned,
            replies: &replies,
        };
        pipeline.render("Room 1234", &ctx)
    }

    // -----------------------------------------------------------------------
    // Bubbles
    // -----------------------------------------------------------------------

    #[test]
    fn bubble_has_header_and_body() {
        let frame = render(
            RenderPipeline::new().with_stage(BubbleStage),
            &[message(1, "bob", "hello")],
            &[],
        );
        assert_eq!(frame.lines.len(), 2);
        assert_eq!(frame.lines[0].text, "bob • 12:00");
        assert!(!frame.lines[0].own);
        assert_eq!(frame.lines[1].text, "hello");
    }

    #[test]
    fn own_messages_are_flagged() {
        let frame = render(
            RenderPipeline::new().with_stage(BubbleStage),
            &[message(1, "alice", "mine")],
            &[],
        );
        assert!(frame.lines.iter().all(|l| l.own));
    }

    // -----------------------------------------------------------------------
    // Pinned
    // -----------------------------------------------------------------------

    #[test]
    fn pinned_banner_only_when_present() {
        let pipeline = || RenderPipeline::new().with_stage(PinnedStage);
        assert!(render(pipeline(), &[], &[]).lines.is_empty());

        let frame = render(pipeline(), &[], &[message(9, "bob", "rules")]);
        assert_eq!(frame.lines[0].kind, LineKind::PinnedHeader);
        assert_eq!(frame.lines[1].text, "bob: rules (12:00)");
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    #[test]
    fn file_attachment_shows_size() {
        let mut msg = message(1, "bob", "Shared file: report.pdf");
        msg.file = Some(FileAttachment {
            filename: "report.pdf".into(),
            url: "/uploads/report.pdf".into(),
            size: 1536,
        });
        let frame = render(RenderPipeline::new().with_stage(AttachmentStage), &[msg], &[]);
        assert_eq!(
            frame.lines[0].text,
            "[file] report.pdf (1.5 KB) </uploads/report.pdf>"
        );
    }

    #[test]
    fn image_attachment_is_previewed() {
        let mut msg = message(1, "bob", "");
        msg.file = Some(FileAttachment {
            filename: "cat.png".into(),
            url: "/uploads/cat.png".into(),
            size: 10,
        });
        let frame = render(RenderPipeline::new().with_stage(AttachmentStage), &[msg], &[]);
        assert!(frame.lines[0].text.starts_with("[image] cat.png"));
    }

    // -----------------------------------------------------------------------
    // Receipts and reactions
    // -----------------------------------------------------------------------

    #[test]
    fn receipts_only_on_own_messages() {
        let mut own = message(1, "alice", "a");
        own.read_by.insert("bob".into());
        let other = message(2, "bob", "b");
        let frame = render(
            RenderPipeline::new().with_stage(ReceiptStage),
            &[own, other],
            &[],
        );
        let receipts: Vec<_> = frame.lines_of(LineKind::Receipt).collect();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].text, "Read by bob");
    }

    #[test]
    fn reactions_skip_zero_counts_and_tag_own() {
        let mut msg = message(1, "bob", "party");
        msg.reactions
            .insert("🎉".into(), ["alice".to_string(), "carol".to_string()].into());
        msg.reactions.insert("😢".into(), Default::default());
        let frame = render(RenderPipeline::new().with_stage(ReactionsStage), &[msg], &[]);
        assert_eq!(frame.lines.len(), 1);
        assert_eq!(frame.lines[0].text, "🎉 2 (you)");
    }

    #[test]
    fn no_reactions_no_line() {
        let frame = render(
            RenderPipeline::new().with_stage(ReactionsStage),
            &[message(1, "bob", "x")],
            &[],
        );
        assert!(frame.lines.is_empty());
    }

    // -----------------------------------------------------------------------
    // Replies
    // -----------------------------------------------------------------------

    #[test]
    fn replies_follow_their_message() {
        let messages = vec![message(1, "bob", "q?"), message(2, "carol", "other")];
        let mut replies = HashMap::new();
        replies.insert(
            MessageId::Number(1),
            vec![Reply {
                sender: "alice".into(),
                text: "answer".into(),
                time: "12:01".into(),
            }],
        );
        let ctx = RenderContext {
            current_user: "alice",
            messages: &messages,
            pinned: &[],
            replies: &replies,
        };
        let frame = RenderPipeline::room().render("Room 1234", &ctx);
        let reply_pos = frame
            .lines
            .iter()
            .position(|l| l.kind == LineKind::Reply)
            .unwrap();
        assert_eq!(frame.lines[reply_pos].text, "↳ alice: answer (12:01)");
        assert_eq!(frame.lines[reply_pos + 1].text, "carol • 12:00");
        assert_eq!(frame.bubble_count(), 2);
    }
}
