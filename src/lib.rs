//! Prizewheel — Telegram prize-wheel lead-capture bot.

pub mod channels;
pub mod config;
pub mod error;
pub mod funnel;
pub mod server;
pub mod store;
