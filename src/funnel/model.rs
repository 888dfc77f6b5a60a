//! Session, lead, and prize-claim models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::FunnelStage;

/// The only action the wheel web app is allowed to send.
pub const CLAIM_ACTION: &str = "claim_prize";

/// One-shot payload pushed by the wheel web app when the user claims
/// a prize.
///
/// Arrives as an untrusted UTF-8 JSON string; anything that is not
/// `{"action":"claim_prize","prize":"<non-empty>"}` is rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct PrizeClaim {
    pub action: String,
    pub prize: String,
}

impl PrizeClaim {
    /// Parse and validate a raw web-app payload.
    ///
    /// Returns `None` for malformed JSON, a foreign `action`, or an empty
    /// prize label. Never panics and never surfaces a parse error.
    pub fn parse(raw: &str) -> Option<PrizeClaim> {
        let claim: PrizeClaim = serde_json::from_str(raw).ok()?;
        if claim.action != CLAIM_ACTION || claim.prize.trim().is_empty() {
            return None;
        }
        Some(claim)
    }
}

/// Per-user funnel session.
///
/// `prize`, `custom_name`, and `phone` are populated strictly in that
/// order; `phone` arriving is what finalizes the lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque stable chat-participant id.
    pub user_id: String,
    /// Current funnel stage.
    pub stage: FunnelStage,
    /// Best-known display name, captured from the event that created
    /// the session.
    pub display_name: String,
    /// Claimed prize label.
    pub prize: Option<String>,
    /// User-supplied name for the keepsake card.
    pub custom_name: Option<String>,
    /// Shared phone number.
    pub phone: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in the `Start` stage.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            stage: FunnelStage::Start,
            display_name: display_name.into(),
            prize: None,
            custom_name: None,
            phone: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Absorb a prize claim: sets the prize and drops any stale name or
    /// phone from a previous pass, so the collection order holds even
    /// after a re-spin.
    pub fn claim(&mut self, prize: impl Into<String>) {
        self.prize = Some(prize.into());
        self.custom_name = None;
        self.phone = None;
        self.stage = FunnelStage::AwaitingName;
        self.touch();
    }

    /// Record the keepsake-card name.
    pub fn record_name(&mut self, name: impl Into<String>) {
        self.custom_name = Some(name.into());
        self.stage = FunnelStage::AwaitingPhone;
        self.touch();
    }

    /// Record the phone number and mark the session terminal.
    pub fn record_phone(&mut self, phone: impl Into<String>) {
        self.phone = Some(phone.into());
        self.stage = FunnelStage::Completed;
        self.touch();
    }

    /// Build the finalized lead. `None` unless prize, name, and phone
    /// have all been collected.
    pub fn to_lead(&self) -> Option<Lead> {
        Some(Lead {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            prize: self.prize.clone()?,
            custom_name: self.custom_name.clone()?,
            phone: self.phone.clone()?,
            captured_at: Utc::now(),
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A finalized lead, ready for handoff to the store and the admin chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub prize: String,
    pub custom_name: String,
    pub phone: String,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_parse_valid() {
        let claim =
            PrizeClaim::parse(r#"{"action":"claim_prize","prize":"40% Chegirma"}"#).unwrap();
        assert_eq!(claim.prize, "40% Chegirma");
    }

    #[test]
    fn claim_parse_ignores_extra_fields() {
        let claim = PrizeClaim::parse(
            r#"{"action":"claim_prize","prize":"90% JEKPOT 🔥","source":"wheel"}"#,
        )
        .unwrap();
        assert_eq!(claim.prize, "90% JEKPOT 🔥");
    }

    #[test]
    fn claim_parse_malformed_json() {
        assert!(PrizeClaim::parse("not json at all").is_none());
        assert!(PrizeClaim::parse(r#"{"action":"claim_prize""#).is_none());
        assert!(PrizeClaim::parse("").is_none());
    }

    #[test]
    fn claim_parse_wrong_action() {
        assert!(PrizeClaim::parse(r#"{"action":"steal_prize","prize":"x"}"#).is_none());
    }

    #[test]
    fn claim_parse_missing_or_empty_prize() {
        assert!(PrizeClaim::parse(r#"{"action":"claim_prize"}"#).is_none());
        assert!(PrizeClaim::parse(r#"{"action":"claim_prize","prize":"  "}"#).is_none());
    }

    #[test]
    fn session_collects_fields_in_order() {
        let mut session = Session::new("42", "Nodira");
        assert_eq!(session.stage, FunnelStage::Start);
        assert!(session.to_lead().is_none());

        session.claim("40% Chegirma");
        assert_eq!(session.stage, FunnelStage::AwaitingName);
        assert!(session.to_lead().is_none());

        session.record_name("Nodira Aliyeva");
        assert_eq!(session.stage, FunnelStage::AwaitingPhone);
        assert!(session.to_lead().is_none());

        session.record_phone("+998901234567");
        assert_eq!(session.stage, FunnelStage::Completed);

        let lead = session.to_lead().unwrap();
        assert_eq!(lead.user_id, "42");
        assert_eq!(lead.display_name, "Nodira");
        assert_eq!(lead.prize, "40% Chegirma");
        assert_eq!(lead.custom_name, "Nodira Aliyeva");
        assert_eq!(lead.phone, "+998901234567");
    }

    #[test]
    fn reclaim_drops_stale_name_and_phone() {
        let mut session = Session::new("42", "Nodira");
        session.claim("30% Chegirma");
        session.record_name("Nodira Aliyeva");

        session.claim("50% Chegirma");
        assert_eq!(session.stage, FunnelStage::AwaitingName);
        assert_eq!(session.prize.as_deref(), Some("50% Chegirma"));
        assert!(session.custom_name.is_none());
        assert!(session.phone.is_none());
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut session = Session::new("42", "Nodira");
        session.claim("40% Chegirma");

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.user_id, "42");
        assert_eq!(parsed.stage, FunnelStage::AwaitingName);
        assert_eq!(parsed.prize.as_deref(), Some("40% Chegirma"));
        assert!(parsed.custom_name.is_none());
    }
}
