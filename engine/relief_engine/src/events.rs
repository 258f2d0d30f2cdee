//! Lifecycle events emitted by the engine after each successful transition.
//!
//! The engine hands events to an [`EventSink`]. Sinks must not fail the
//! transition: by the time an event is published the state change is final.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, Donation, Incident};

/// All event kinds emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A beneficiary submitted a new incident.
    IncidentSubmitted,
    /// A verifier approved an incident.
    IncidentVerified,
    /// A donation was recorded against an incident.
    DonationReceived,
    /// An incident's funded amount reached its target.
    IncidentFunded,
    /// Funds were released and the incident completed.
    FundsReleased,
}

impl EventKind {
    /// Short identifier suitable for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncidentSubmitted => "incident_submitted",
            Self::IncidentVerified => "incident_verified",
            Self::DonationReceived => "donation_received",
            Self::IncidentFunded => "incident_funded",
            Self::FundsReleased => "funds_released",
        }
    }
}

/// A transition that has been applied.
///
/// `incident` is the snapshot immediately after the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub incident: Incident,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation: Option<Donation>,
    /// Actor that triggered the transition (beneficiary, verifier or donor id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, incident: Incident) -> Self {
        Self {
            kind,
            incident,
            donation: None,
            actor: None,
            amount: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_donation(mut self, donation: Donation) -> Self {
        self.amount = Some(donation.amount);
        self.actor = Some(donation.donor_id.clone());
        self.donation = Some(donation);
        self
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: LifecycleEvent) {}
}

/// Keeps every event in memory, in publication order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: LifecycleEvent) {
        self.events.lock().push(event);
    }
}
