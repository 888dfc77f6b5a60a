//! Lead-capture funnel — the prize-wheel conversation state machine.
//!
//! Tracks each user through start → wheel spin → prize claim → keepsake
//! name → phone number, reconciling the bot conversation with the
//! out-of-band web-view payload, and produces exactly one lead per
//! completed pass.

pub mod engine;
pub mod event;
pub mod handler;
pub mod model;
pub mod state;

pub use engine::{transition, Effect, EngineOptions, Outcome};
pub use event::{EventKind, InboundEvent};
pub use handler::FunnelHandler;
pub use model::{Lead, PrizeClaim, Session};
pub use state::FunnelStage;
