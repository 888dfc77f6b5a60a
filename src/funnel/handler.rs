//! FunnelHandler — executes one inbound event as an atomic unit.
//!
//! Read session → compute transition → write session → run effects.
//! A per-identity mutex keeps near-simultaneous events for the same user
//! from interleaving; distinct users proceed fully in parallel. This is
//! the single error boundary per event: nothing propagates back to the
//! transport, which always gets its acknowledgment.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::channels::{Gateway, OutboundMessage};
use crate::error::Result;
use crate::store::Database;

use super::engine::{self, Effect, EngineOptions};
use super::event::InboundEvent;

/// Coordinates the funnel: session I/O, transitions, and side effects.
pub struct FunnelHandler {
    db: Arc<dyn Database>,
    gateway: Arc<dyn Gateway>,
    options: EngineOptions,
    admin_chat_id: Option<String>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FunnelHandler {
    pub fn new(
        db: Arc<dyn Database>,
        gateway: Arc<dyn Gateway>,
        options: EngineOptions,
        admin_chat_id: Option<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            options,
            admin_chat_id,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one classified event. Never fails: internal errors are
    /// logged here so the transport's acknowledgment is unconditional.
    pub async fn handle_event(&self, event: InboundEvent) {
        if let Err(e) = self.process(&event).await {
            tracing::error!(
                user_id = %event.user_id,
                kind = event.kind.label(),
                error = %e,
                "Event processing failed"
            );
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<()> {
        let _guard = self.user_lock(&event.user_id).await;

        let session = self.db.get_session(&event.user_id).await?;
        let outcome = engine::transition(session, event, &self.options);

        if let Some(session) = &outcome.session {
            // A failed write must not swallow the replies the transition
            // already decided on; the user still gets their prompt.
            match self.db.put_session(session).await {
                Ok(()) => tracing::info!(
                    user_id = %event.user_id,
                    kind = event.kind.label(),
                    stage = %session.stage,
                    "Session advanced"
                ),
                Err(e) => tracing::warn!(
                    user_id = %event.user_id,
                    stage = %session.stage,
                    error = %e,
                    "Session write failed; continuing with effects"
                ),
            }
        }

        // Each effect is best-effort: a failed store insert or send is
        // logged and never blocks the effects that follow (the user
        // confirmation must go out even if persistence is down). All of
        // them are awaited before the event counts as handled.
        for effect in outcome.effects {
            self.run_effect(&event.user_id, effect).await;
        }

        Ok(())
    }

    async fn run_effect(&self, user_id: &str, effect: Effect) {
        let label = effect.label();
        match effect {
            Effect::StoreLead(lead) => {
                if let Err(e) = self.db.insert_lead(&lead).await {
                    tracing::warn!(
                        user_id,
                        lead_id = %lead.id,
                        error = %e,
                        "Lead insert failed; continuing with notifications"
                    );
                } else {
                    tracing::info!(user_id, lead_id = %lead.id, prize = %lead.prize, "Lead captured");
                }
            }
            Effect::Reply(message) => {
                if let Err(e) = self.gateway.send(&message).await {
                    tracing::warn!(user_id, effect = label, error = %e, "Outbound send failed");
                }
            }
            Effect::AdminReport(text) => match &self.admin_chat_id {
                Some(admin) => {
                    let message = OutboundMessage::plain(admin, text).with_markdown();
                    if let Err(e) = self.gateway.send(&message).await {
                        tracing::warn!(user_id, effect = label, error = %e, "Admin report failed");
                    }
                }
                None => {
                    tracing::debug!(user_id, "No admin chat configured; skipping report");
                }
            },
        }
    }

    /// Acquire the per-identity lock, creating it on first use.
    async fn user_lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
