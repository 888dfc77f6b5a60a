//! Channel abstraction for message I/O.

pub mod telegram;

pub use telegram::TelegramGateway;

use async_trait::async_trait;

use crate::error::ChannelError;

/// A single interactive control attached to an outbound message.
///
/// Either an inline selection (reported back as a short tag) or a
/// request-type control that drives the client UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Inline button; the press comes back as `EventKind::Selection(tag)`.
    Inline { text: String, tag: String },
    /// Reply-keyboard button that asks the user to share their contact.
    ShareContact { text: String },
    /// Reply-keyboard button that opens the embedded web app.
    OpenWebApp { text: String, url: String },
}

/// An outbound message addressed to a single identity.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Target identity (chat id).
    pub target: String,
    /// Body text.
    pub text: String,
    /// Render the body as Markdown (falls back to plain on rejection).
    pub markdown: bool,
    /// Interactive controls, one per keyboard row.
    pub controls: Vec<Control>,
    /// Clear any reply keyboard left over from a previous prompt.
    pub remove_keyboard: bool,
}

impl OutboundMessage {
    /// Plain text message with no controls.
    pub fn plain(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            markdown: false,
            controls: Vec::new(),
            remove_keyboard: false,
        }
    }

    /// Request Markdown rendering (the gateway falls back to plain text
    /// when the transport rejects the formatting).
    pub fn with_markdown(mut self) -> Self {
        self.markdown = true;
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }

    pub fn removing_keyboard(mut self) -> Self {
        self.remove_keyboard = true;
        self
    }
}

/// Opaque messaging gateway — the funnel core only knows how to hand it
/// outbound messages and check that it is alive.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one outbound message. Awaited by the caller so failures
    /// are observable before an inbound event is considered handled.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;
}
