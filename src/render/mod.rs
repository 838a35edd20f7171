//! Message rendering.
//!
//! A [`RenderPipeline`] is an ordered list of [`RenderStage`]s. Each stage
//! sees the whole [`RenderContext`] once (`prelude`) and then every message
//! in order (`message`), appending [`Line`]s to the [`Frame`]. New display
//! features are added by pushing a stage, not by wrapping existing ones.

pub mod stages;
pub mod terminal;

use std::collections::HashMap;

use crate::api::{Message, MessageId, Reply};

pub use stages::{
    AttachmentStage, BubbleStage, PinnedStage, ReactionsStage, ReceiptStage, RepliesStage,
};
pub use terminal::TerminalView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    PinnedHeader,
    Pinned,
    /// `sender • time`
    Header,
    Body,
    Attachment,
    Receipt,
    Reactions,
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    /// Belongs to a message sent by the current user.
    pub own: bool,
    pub text: String,
}

impl Line {
    pub fn new(kind: LineKind, own: bool, text: impl Into<String>) -> Self {
        Self {
            kind,
            own,
            text: text.into(),
        }
    }
}

/// A fully rendered view of one room or DM thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub title: String,
    pub lines: Vec<Line>,
}

impl Frame {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: LineKind, own: bool, text: impl Into<String>) {
        self.lines.push(Line::new(kind, own, text));
    }

    pub fn lines_of(&self, kind: LineKind) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(move |l| l.kind == kind)
    }

    /// One header per rendered message.
    pub fn bubble_count(&self) -> usize {
        self.lines_of(LineKind::Header).count()
    }
}

/// Snapshot a render pass reads from.
pub struct RenderContext<'a> {
    pub current_user: &'a str,
    pub messages: &'a [Message],
    pub pinned: &'a [Message],
    pub replies: &'a HashMap<MessageId, Vec<Reply>>,
}

impl<'a> RenderContext<'a> {
    pub fn replies_for(&self, message: &Message) -> &'a [Reply] {
        message
            .id
            .as_ref()
            .and_then(|id| self.replies.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub trait RenderStage: Send + Sync {
    fn name(&self) -> &str;

    /// Lines placed above the message list.
    fn prelude(&self, _ctx: &RenderContext<'_>, _frame: &mut Frame) {}

    /// Lines for one message.
    fn message(&self, _ctx: &RenderContext<'_>, _message: &Message, _frame: &mut Frame) {}
}

pub struct RenderPipeline {
    stages: Vec<Box<dyn RenderStage>>,
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Pinned banner, bubbles, attachments, receipts, reactions, replies.
    pub fn room() -> Self {
        Self::new()
            .with_stage(PinnedStage)
            .with_stage(BubbleStage)
            .with_stage(AttachmentStage)
            .with_stage(ReceiptStage)
            .with_stage(ReactionsStage)
            .with_stage(RepliesStage)
    }

    /// DM threads show bubbles and attachments only.
    pub fn direct() -> Self {
        Self::new().with_stage(BubbleStage).with_stage(AttachmentStage)
    }

    pub fn with_stage(mut self, stage: impl RenderStage + 'static) -> Self {
        self.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn RenderStage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn render(&self, title: &str, ctx: &RenderContext<'_>) -> Frame {
        let mut frame = Frame::new(title);
        for stage in &self.stages {
            stage.prelude(ctx, &mut frame);
        }
        for message in ctx.messages {
            for stage in &self.stages {
                stage.message(ctx, message, &mut frame);
            }
        }
        frame
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::room()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn message(id: u64, sender: &str, text: &str) -> Message {
        Message {
            id: Some(MessageId::Number(id)),
            sender: sender.to_string(),
            text: text.to_string(),
            time: "12:00".to_string(),
            file: None,
            reactions: Default::default(),
            read_by: Default::default(),
        }
    }
}
