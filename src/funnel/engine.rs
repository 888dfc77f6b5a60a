//! Pure funnel transitions.
//!
//! `transition` is the whole decision surface of the bot: given the
//! stored session and one classified event it returns the session to
//! write back plus an ordered list of side effects. No I/O happens here;
//! the handler executes the effects.

use crate::channels::{Control, OutboundMessage};

use super::event::{EventKind, InboundEvent};
use super::model::{Lead, PrizeClaim, Session};
use super::state::FunnelStage;

/// Callback tags for the entry-choice inline keyboard.
pub mod tags {
    pub const HAS_ID: &str = "has_id";
    pub const NEW_GUEST: &str = "new_guest";
}

/// User-facing copy, verbatim from the promo campaign.
pub mod texts {
    use crate::funnel::model::Lead;

    pub const WELCOME: &str = "Pinhan Box Secret Workshop.\n\nSizda Club ID bormi?";
    pub const HAS_ID_BUTTON: &str = "✅ Ha, ID bor";
    pub const NEW_GUEST_BUTTON: &str = "❌ Yo'q, yangi mehmonman";
    pub const LAUNCH_PROMPT: &str = "Omad Charxpalagini ishga tushiring:";
    pub const LAUNCH_BUTTON: &str = "🎰 O'YINNI BOSHLASH";
    pub const ASK_PHONE: &str = "Telefon raqamingizni yuboring:";
    pub const SHARE_PHONE_BUTTON: &str = "📞 Yuborish";
    pub const CONFIRMATION: &str = "Rahmat. Menejer tez orada bog'lanadi.";

    pub fn claim_accepted(prize: &str) -> String {
        format!(
            "🎉 YUTUQ QABUL QILINDI: {prize}\n\nSovg'a qutisiga qo'shiladigan \
             Maxsus Tabriknomaga (Otkritka) kimning ismini yozib qo'yaylik?"
        )
    }

    pub fn lead_report(lead: &Lead) -> String {
        format!(
            "💎 WEB APP LEAD:\nUser: {}\nPrize: {}\n💌 Tabriknoma Ismi: {}\nPhone: {}",
            lead.display_name, lead.prize, lead.custom_name, lead.phone
        )
    }

    pub fn support_forward(user_id: &str, display_name: &str, text: &str) -> String {
        format!("📨 Support ({display_name}, id {user_id}):\n{text}")
    }
}

/// A side effect decided by a transition, to be executed by the handler.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append the finalized lead to the store (best effort).
    StoreLead(Lead),
    /// Send a message to the user who triggered the event.
    Reply(OutboundMessage),
    /// Send a report to the configured admin chat, if any.
    AdminReport(String),
}

impl Effect {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StoreLead(_) => "store_lead",
            Self::Reply(_) => "reply",
            Self::AdminReport(_) => "admin_report",
        }
    }
}

/// Outcome of one transition.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Session to write back; `None` means the stored session is untouched.
    pub session: Option<Session>,
    /// Effects in execution order (user-facing replies before admin
    /// reports).
    pub effects: Vec<Effect>,
}

impl Outcome {
    /// No state change, no effects.
    fn unchanged() -> Self {
        Self {
            session: None,
            effects: Vec::new(),
        }
    }
}

/// Knobs the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// URL the web-app launch button opens.
    pub webapp_url: String,
    /// Forward out-of-funnel free text to the admin chat.
    pub forward_unsolicited: bool,
}

/// Compute the transition for one classified event.
pub fn transition(
    session: Option<Session>,
    event: &InboundEvent,
    options: &EngineOptions,
) -> Outcome {
    match &event.kind {
        // (Re-)entering the funnel unconditionally resets the session,
        // discarding any partial claim in progress.
        EventKind::Start => {
            let session = Session::new(&event.user_id, &event.display_name);
            let reply = OutboundMessage::plain(&event.user_id, texts::WELCOME).with_controls(vec![
                Control::Inline {
                    text: texts::HAS_ID_BUTTON.to_string(),
                    tag: tags::HAS_ID.to_string(),
                },
                Control::Inline {
                    text: texts::NEW_GUEST_BUTTON.to_string(),
                    tag: tags::NEW_GUEST.to_string(),
                },
            ]);
            Outcome {
                session: Some(session),
                effects: vec![Effect::Reply(reply)],
            }
        }

        EventKind::Selection(tag) if tag == tags::NEW_GUEST => {
            let reply =
                OutboundMessage::plain(&event.user_id, texts::LAUNCH_PROMPT).with_controls(vec![
                    Control::OpenWebApp {
                        text: texts::LAUNCH_BUTTON.to_string(),
                        url: options.webapp_url.clone(),
                    },
                ]);
            Outcome {
                session: None,
                effects: vec![Effect::Reply(reply)],
            }
        }

        // "Has Club ID" guests are handled by the concierge off-platform.
        EventKind::Selection(_) => Outcome::unchanged(),

        EventKind::WebAppPayload(raw) => {
            let Some(claim) = PrizeClaim::parse(raw) else {
                tracing::warn!(user_id = %event.user_id, "Ignoring malformed web-app payload");
                return Outcome::unchanged();
            };
            // The web view is not guaranteed to fire after an observed
            // /start — the user may reopen the app, or state may have
            // been lost since — so create the session lazily.
            let mut session = session
                .unwrap_or_else(|| Session::new(&event.user_id, &event.display_name));
            session.claim(claim.prize);

            let prompt = texts::claim_accepted(session.prize.as_deref().unwrap_or_default());
            let reply = OutboundMessage::plain(&event.user_id, prompt).removing_keyboard();
            Outcome {
                session: Some(session),
                effects: vec![Effect::Reply(reply)],
            }
        }

        EventKind::Text(text) => match session {
            Some(mut session) if session.stage.can_transition_to(FunnelStage::AwaitingPhone) => {
                session.record_name(text.clone());
                let reply =
                    OutboundMessage::plain(&event.user_id, texts::ASK_PHONE).with_controls(vec![
                        Control::ShareContact {
                            text: texts::SHARE_PHONE_BUTTON.to_string(),
                        },
                    ]);
                Outcome {
                    session: Some(session),
                    effects: vec![Effect::Reply(reply)],
                }
            }
            _ if options.forward_unsolicited => Outcome {
                session: None,
                effects: vec![Effect::AdminReport(texts::support_forward(
                    &event.user_id,
                    &event.display_name,
                    text,
                ))],
            },
            _ => Outcome::unchanged(),
        },

        EventKind::Contact(phone) => match session {
            // Never finalize without a prize; a duplicate contact share on
            // a completed session is also a no-op here.
            Some(mut session)
                if session.stage.can_transition_to(FunnelStage::Completed)
                    && session.prize.is_some() =>
            {
                session.record_phone(phone.clone());
                let Some(lead) = session.to_lead() else {
                    return Outcome::unchanged();
                };
                let report = texts::lead_report(&lead);
                let confirm = OutboundMessage::plain(&event.user_id, texts::CONFIRMATION)
                    .removing_keyboard();
                Outcome {
                    session: Some(session),
                    effects: vec![
                        Effect::StoreLead(lead),
                        Effect::Reply(confirm),
                        Effect::AdminReport(report),
                    ],
                }
            }
            _ => Outcome::unchanged(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EngineOptions {
        EngineOptions {
            webapp_url: "http://localhost:3000/index.html".to_string(),
            forward_unsolicited: true,
        }
    }

    fn event(kind: EventKind) -> InboundEvent {
        InboundEvent::new("42", "Nodira", kind)
    }

    fn claim_payload(prize: &str) -> EventKind {
        EventKind::WebAppPayload(format!(r#"{{"action":"claim_prize","prize":"{prize}"}}"#))
    }

    #[test]
    fn start_creates_session_and_entry_choice() {
        let outcome = transition(None, &event(EventKind::Start), &options());

        let session = outcome.session.expect("session created");
        assert_eq!(session.stage, FunnelStage::Start);
        assert_eq!(session.display_name, "Nodira");
        assert!(session.prize.is_none());

        assert_eq!(outcome.effects.len(), 1);
        let Effect::Reply(reply) = &outcome.effects[0] else {
            panic!("expected a reply");
        };
        assert_eq!(reply.controls.len(), 2);
        assert!(matches!(
            &reply.controls[1],
            Control::Inline { tag, .. } if tag == tags::NEW_GUEST
        ));
    }

    #[test]
    fn restart_resets_partial_claim() {
        let mut session = Session::new("42", "Nodira");
        session.claim("30% Chegirma");
        session.record_name("Nodira Aliyeva");

        let outcome = transition(Some(session), &event(EventKind::Start), &options());

        let session = outcome.session.expect("session reset");
        assert_eq!(session.stage, FunnelStage::Start);
        assert!(session.prize.is_none());
        assert!(session.custom_name.is_none());
        assert!(session.phone.is_none());
    }

    #[test]
    fn new_guest_selection_sends_launch_control() {
        let session = Session::new("42", "Nodira");
        let outcome = transition(
            Some(session),
            &event(EventKind::Selection(tags::NEW_GUEST.to_string())),
            &options(),
        );

        assert!(outcome.session.is_none(), "selection leaves state alone");
        assert_eq!(outcome.effects.len(), 1);
        let Effect::Reply(reply) = &outcome.effects[0] else {
            panic!("expected a reply");
        };
        assert!(matches!(
            &reply.controls[0],
            Control::OpenWebApp { url, .. } if url == "http://localhost:3000/index.html"
        ));
    }

    #[test]
    fn has_id_selection_is_a_noop() {
        let outcome = transition(
            None,
            &event(EventKind::Selection(tags::HAS_ID.to_string())),
            &options(),
        );
        assert!(outcome.session.is_none());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn claim_without_prior_session_creates_one_lazily() {
        let outcome = transition(None, &event(claim_payload("50% Chegirma")), &options());

        let session = outcome.session.expect("lazy session");
        assert_eq!(session.stage, FunnelStage::AwaitingName);
        assert_eq!(session.prize.as_deref(), Some("50% Chegirma"));
        assert_eq!(outcome.effects.len(), 1);
    }

    #[test]
    fn malformed_payload_changes_nothing() {
        let kinds = [
            EventKind::WebAppPayload("{broken".to_string()),
            EventKind::WebAppPayload(r#"{"action":"other","prize":"x"}"#.to_string()),
            EventKind::WebAppPayload(r#"{"prize":"x"}"#.to_string()),
        ];
        for kind in kinds {
            let outcome = transition(None, &event(kind), &options());
            assert!(outcome.session.is_none());
            assert!(outcome.effects.is_empty());
        }
    }

    #[test]
    fn contact_without_prize_produces_nothing() {
        // No session at all
        let outcome = transition(
            None,
            &event(EventKind::Contact("+998901234567".to_string())),
            &options(),
        );
        assert!(outcome.session.is_none());
        assert!(outcome.effects.is_empty());

        // Session exists but no prize claimed
        let outcome = transition(
            Some(Session::new("42", "Nodira")),
            &event(EventKind::Contact("+998901234567".to_string())),
            &options(),
        );
        assert!(outcome.session.is_none());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn duplicate_contact_after_completion_is_idempotent() {
        let mut session = Session::new("42", "Nodira");
        session.claim("40% Chegirma");
        session.record_name("Nodira Aliyeva");
        session.record_phone("+998901234567");
        assert!(session.stage.is_terminal());

        let outcome = transition(
            Some(session),
            &event(EventKind::Contact("+998901234567".to_string())),
            &options(),
        );
        assert!(outcome.session.is_none());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn unsolicited_text_forwards_to_admin_when_enabled() {
        let outcome = transition(None, &event(EventKind::Text("yordam kerak".to_string())), &options());
        assert!(outcome.session.is_none());
        assert_eq!(outcome.effects.len(), 1);
        let Effect::AdminReport(text) = &outcome.effects[0] else {
            panic!("expected an admin report");
        };
        assert!(text.contains("yordam kerak"));
        assert!(text.contains("Nodira"));
    }

    #[test]
    fn unsolicited_text_dropped_when_forwarding_disabled() {
        let opts = EngineOptions {
            forward_unsolicited: false,
            ..options()
        };
        let outcome = transition(None, &event(EventKind::Text("salom".to_string())), &opts);
        assert!(outcome.session.is_none());
        assert!(outcome.effects.is_empty());
    }

    // The full scenario from the campaign: start → claim → name → contact.
    #[test]
    fn complete_funnel_produces_exactly_one_lead() {
        let opts = options();

        let outcome = transition(None, &event(EventKind::Start), &opts);
        let session = outcome.session.unwrap();

        let outcome = transition(
            Some(session),
            &event(claim_payload("40% Chegirma")),
            &opts,
        );
        let session = outcome.session.unwrap();
        assert_eq!(session.stage, FunnelStage::AwaitingName);

        let outcome = transition(
            Some(session),
            &event(EventKind::Text("Nodira Aliyeva".to_string())),
            &opts,
        );
        let session = outcome.session.unwrap();
        assert_eq!(session.stage, FunnelStage::AwaitingPhone);
        let Effect::Reply(reply) = &outcome.effects[0] else {
            panic!("expected a reply");
        };
        assert!(matches!(&reply.controls[0], Control::ShareContact { .. }));

        let outcome = transition(
            Some(session),
            &event(EventKind::Contact("+998901234567".to_string())),
            &opts,
        );
        let session = outcome.session.unwrap();
        assert_eq!(session.stage, FunnelStage::Completed);

        // Store → user confirmation → admin report, in that order.
        assert_eq!(outcome.effects.len(), 3);
        let Effect::StoreLead(lead) = &outcome.effects[0] else {
            panic!("expected a stored lead first");
        };
        assert_eq!(lead.display_name, "Nodira");
        assert_eq!(lead.prize, "40% Chegirma");
        assert_eq!(lead.custom_name, "Nodira Aliyeva");
        assert_eq!(lead.phone, "+998901234567");
        assert!(matches!(&outcome.effects[1], Effect::Reply(r) if r.remove_keyboard));
        assert!(matches!(&outcome.effects[2], Effect::AdminReport(_)));
    }

    // Collection order is fixed: a name can never land without a prize.
    #[test]
    fn text_before_claim_never_sets_custom_name() {
        let session = Session::new("42", "Nodira");
        let outcome = transition(
            Some(session),
            &event(EventKind::Text("Nodira Aliyeva".to_string())),
            &options(),
        );
        // Forwarded as support, not recorded as a keepsake name.
        assert!(outcome.session.is_none());
        assert!(matches!(outcome.effects.first(), Some(Effect::AdminReport(_))));
    }
}
