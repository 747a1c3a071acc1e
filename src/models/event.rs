//! Loan domain events exchanged between the expiry scanner and the notifier
//!
//! Wire format (JSON):
//!
//! ```json
//! {
//!   "source": "loan-reminder",
//!   "time": "2025-01-01T08:00:00Z",
//!   "eventId": "1c0f…",
//!   "type": "LoanExpiring",
//!   "payload": { "userId": "…", "loanId": "…" }
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::loan::Loan;

/// Kind of loan event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Loan is due within the next days
    LoanExpiring,
    /// Loan is due today
    LoanExpired,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LoanExpiring => "LoanExpiring",
            EventType::LoanExpired => "LoanExpired",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LoanExpiring" => Ok(EventType::LoanExpiring),
            "LoanExpired" => Ok(EventType::LoanExpired),
            other => Err(EventDecodeError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub user_id: Uuid,
    pub loan_id: Uuid,
}

/// Immutable event envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanEvent {
    pub source: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub time: DateTime<Utc>,
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: EventPayload,
}

/// Why a delivered payload could not be turned into a [`LoanEvent`]
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognized event type: {0}")]
    UnknownType(String),
}

/// Envelope as read from the wire, before the type is checked
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoanEvent {
    source: String,
    #[serde(deserialize_with = "deserialize_rfc3339")]
    time: DateTime<Utc>,
    event_id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    payload: EventPayload,
}

impl LoanEvent {
    /// Build a fresh event for a loan, stamped now with a new id
    pub fn for_loan(source: &str, event_type: EventType, loan: &Loan) -> Self {
        Self {
            source: source.to_string(),
            time: Utc::now(),
            event_id: Uuid::new_v4(),
            event_type,
            payload: EventPayload {
                user_id: loan.user_id,
                loan_id: loan.id,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a delivered payload. Structural problems and unknown event
    /// types are reported separately so callers can log them distinctly.
    pub fn decode(bytes: &[u8]) -> Result<Self, EventDecodeError> {
        let raw: RawLoanEvent = serde_json::from_slice(bytes)?;
        let event_type = raw.event_type.parse()?;

        Ok(Self {
            source: raw.source,
            time: raw.time,
            event_id: raw.event_id,
            event_type,
            payload: raw.payload,
        })
    }
}

fn serialize_rfc3339<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn deserialize_rfc3339<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
