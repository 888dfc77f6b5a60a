//! Classified inbound events.
//!
//! The gateway adapter turns every transport update into exactly one of
//! these kinds (or drops it). Each kind maps to one state-machine
//! transition in the engine.

/// What an inbound update turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The `/start` command — (re)enters the funnel.
    Start,
    /// An inline-button press, carrying its callback tag.
    Selection(String),
    /// The raw one-shot payload pushed by the wheel web app.
    WebAppPayload(String),
    /// A shared contact's phone number.
    Contact(String),
    /// Ordinary free text.
    Text(String),
}

impl EventKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Selection(_) => "selection",
            Self::WebAppPayload(_) => "web_app_payload",
            Self::Contact(_) => "contact",
            Self::Text(_) => "text",
        }
    }
}

/// A classified inbound event, addressed by user identity.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Opaque stable chat-participant id.
    pub user_id: String,
    /// Best-known display name of the sender.
    pub display_name: String,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}
