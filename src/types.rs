use serde::{Deserialize, Serialize};

/// A ticket as it arrives from the helpdesk export or the API.
///
/// Timestamps are kept as the raw strings the upstream system produced; they
/// are only interpreted by [`crate::normalize::dates`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(alias = "id")]
    pub ticket_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub first_reply_at: Option<String>,
    /// Upstream exports this as a number or a numeric string
    #[serde(default)]
    pub first_reply_minutes: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
}

impl TicketRecord {
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ..Self::default()
        }
    }

    /// Explicit first-reply duration, if the field holds a usable number
    pub fn first_reply_minutes_value(&self) -> Option<f64> {
        let minutes = match self.first_reply_minutes.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (minutes.is_finite() && minutes >= 0.0).then_some(minutes)
    }
}

/// A message attached to a ticket. Messages are append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMessage {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sent_at: Option<String>,
}

/// Outcome of writing a ticket to the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub ticket_id: String,
    /// True on first sight of the ticket id
    pub created: bool,
    pub messages_appended: usize,
    /// Timestamps that could not be parsed and were stored as "now"
    pub timestamp_fallbacks: usize,
}
