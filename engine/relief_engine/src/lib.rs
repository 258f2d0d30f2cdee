//! # Relief Engine
//!
//! The incident/donation lifecycle engine of **Relief Ledger**. Beneficiaries
//! report incidents, verifying organizations approve them, donors fund them
//! and verifiers finally release the funds.
//!
//! | Phase        | Entry Point                          | Status change            |
//! |--------------|--------------------------------------|--------------------------|
//! | Submission   | [`ReliefEngine::submit_incident`]    | → `submitted`            |
//! | Verification | [`ReliefEngine::verify_incident`]    | `submitted` → `verified` |
//! | Funding      | [`ReliefEngine::apply_donation`]     | `verified` → `funded` once the target is met |
//! | Release      | [`ReliefEngine::release_funds`]      | `funded` → `completed`   |
//! | Queries      | [`queries`]                          | none                     |
//!
//! ## Architecture
//!
//! Storage is delegated to an injected [`IncidentStore`]; read projections
//! live in [`queries`]. This file contains the transition rules only.
//!
//! Transitions on one incident are serialized by a per-incident lock held
//! across the read-validate-write sequence. Transitions on different
//! incidents do not contend beyond the store's short commit.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

mod errors;
pub mod events;
pub mod queries;
mod storage;
mod types;

#[cfg(test)]
mod test_events;
#[cfg(test)]
mod test_lifecycle;

pub use errors::{Error, Result};
pub use events::{EventKind, EventSink, LifecycleEvent, MemorySink, NoopSink};
pub use storage::{IdGenerator, IncidentStore, MemoryStore, SequentialIds};
pub use types::{
    Amount, Donation, DonationId, DonationStatus, FundingReceipt, Incident, IncidentConfig,
    IncidentId, IncidentState, IncidentStatus, NewDonation, NewIncident, Severity,
    TransactionRef, Verifier,
};

use types::require_text;

/// Whether an incident that already reached its target keeps accepting donations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingPolicy {
    /// Funded incidents keep accepting donations; overfunding is recorded as-is.
    #[default]
    Permissive,
    /// Donations to funded incidents are rejected with [`Error::InvalidState`].
    CloseOnFunded,
}

impl std::str::FromStr for FundingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "close_on_funded" => Ok(Self::CloseOnFunded),
            other => Err(Error::Validation(format!("unknown funding policy `{other}`"))),
        }
    }
}

pub struct ReliefEngine<S> {
    store: S,
    policy: FundingPolicy,
    sink: Arc<dyn EventSink>,
    locks: Mutex<HashMap<IncidentId, Arc<Mutex<()>>>>,
}

impl<S: IncidentStore> ReliefEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: FundingPolicy::default(),
            sink: Arc::new(NoopSink),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: FundingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> FundingPolicy {
        self.policy
    }

    // ─────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────

    /// Record a beneficiary's report as a new `submitted` incident.
    pub fn submit_incident(&self, submission: NewIncident) -> Result<Incident> {
        let incident = self.store.insert_incident(submission, Utc::now())?;
        info!(
            incident_id = %incident.id,
            beneficiary = %incident.beneficiary_id,
            amount_needed = incident.amount_needed,
            "incident submitted"
        );
        self.sink.publish(
            LifecycleEvent::new(EventKind::IncidentSubmitted, incident.clone())
                .with_actor(incident.beneficiary_id.clone()),
        );
        Ok(incident)
    }

    /// Approve a `submitted` incident and record who verified it.
    ///
    /// A second call fails with [`Error::InvalidState`] rather than
    /// overwriting the recorded verifier.
    pub fn verify_incident(
        &self,
        id: &IncidentId,
        verifier_id: &str,
        verifier_name: &str,
    ) -> Result<Incident> {
        require_text("verifier_id", verifier_id)?;
        require_text("verifier_name", verifier_name)?;

        let lock = self.incident_lock(id)?;
        let _guard = lock.lock();

        let incident = self.load(id)?;
        if incident.status != IncidentStatus::Submitted {
            return Err(self.reject(&incident, "verify"));
        }

        let mut state = incident.state();
        state.status = IncidentStatus::Verified;
        state.verifier = Some(Verifier {
            id: verifier_id.to_string(),
            name: verifier_name.to_string(),
        });
        let incident = self.store.save_incident_state(id, state)?;

        info!(incident_id = %id, verifier = verifier_id, "incident verified");
        self.sink.publish(
            LifecycleEvent::new(EventKind::IncidentVerified, incident.clone())
                .with_actor(verifier_id),
        );
        Ok(incident)
    }

    /// Apply a donation to a verified incident.
    ///
    /// The funded amount and the donation record are committed together. The
    /// incident moves to `funded` as soon as `amount_funded >= amount_needed`.
    pub fn apply_donation(
        &self,
        id: &IncidentId,
        donor_id: &str,
        donor_name: &str,
        amount: Amount,
    ) -> Result<FundingReceipt> {
        if amount <= 0 {
            return Err(Error::Validation(format!(
                "donation amount must be positive, got {amount}"
            )));
        }
        require_text("donor_id", donor_id)?;

        let lock = self.incident_lock(id)?;
        let _guard = lock.lock();

        let incident = self.load(id)?;
        match (incident.status, self.policy) {
            (IncidentStatus::Verified, _) => {}
            (IncidentStatus::Funded, FundingPolicy::Permissive) => {}
            _ => return Err(self.reject(&incident, "donate to")),
        }

        let mut state = incident.state();
        state.amount_funded = state.amount_funded.checked_add(amount).ok_or_else(|| {
            Error::Validation(format!("donation of {amount} overflows incident {id}"))
        })?;
        let reached_target =
            state.status == IncidentStatus::Verified && state.amount_funded >= incident.amount_needed;
        if reached_target {
            state.status = IncidentStatus::Funded;
        }

        let (incident, donation) = self.store.commit_donation(
            state,
            NewDonation {
                incident_id: id.clone(),
                donor_id: donor_id.to_string(),
                donor_name: donor_name.to_string(),
                amount,
                created_at: Utc::now(),
            },
        )?;

        info!(
            incident_id = %id,
            donation_id = %donation.id,
            amount,
            amount_funded = incident.amount_funded,
            amount_needed = incident.amount_needed,
            "donation applied"
        );
        self.sink.publish(
            LifecycleEvent::new(EventKind::DonationReceived, incident.clone())
                .with_donation(donation.clone()),
        );
        if reached_target {
            info!(incident_id = %id, "incident fully funded");
            self.sink
                .publish(LifecycleEvent::new(EventKind::IncidentFunded, incident.clone()));
        }

        Ok(FundingReceipt { donation, incident })
    }

    /// Mark a `funded` incident as `completed` once its funds are released.
    pub fn release_funds(&self, id: &IncidentId) -> Result<Incident> {
        let lock = self.incident_lock(id)?;
        let _guard = lock.lock();

        let incident = self.load(id)?;
        if incident.status != IncidentStatus::Funded {
            return Err(self.reject(&incident, "release funds for"));
        }

        let mut state = incident.state();
        state.status = IncidentStatus::Completed;
        let incident = self.store.save_incident_state(id, state)?;

        info!(incident_id = %id, amount_funded = incident.amount_funded, "funds released");
        let mut event = LifecycleEvent::new(EventKind::FundsReleased, incident.clone());
        if let Some(verifier) = &incident.verifier_id {
            event = event.with_actor(verifier.clone());
        }
        self.sink.publish(event);
        Ok(incident)
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    fn load(&self, id: &IncidentId) -> Result<Incident> {
        self.store
            .find_incident_by_id(id)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Per-incident mutex. Only handed out for incidents that exist, so the
    /// lock table is bounded by the number of stored incidents.
    fn incident_lock(&self, id: &IncidentId) -> Result<Arc<Mutex<()>>> {
        if let Some(lock) = self.locks.lock().get(id) {
            return Ok(Arc::clone(lock));
        }
        self.load(id)?;
        let mut locks = self.locks.lock();
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }

    fn reject(&self, incident: &Incident, action: &'static str) -> Error {
        warn!(
            incident_id = %incident.id,
            status = %incident.status,
            action,
            "transition rejected"
        );
        Error::InvalidState {
            id: incident.id.clone(),
            status: incident.status,
            action,
        }
    }
}
