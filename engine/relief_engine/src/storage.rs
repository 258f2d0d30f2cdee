//! # Storage
//!
//! The entity store behind the lifecycle engine.
//!
//! ## Records
//!
//! | Collection   | Type             | Description                              |
//! |--------------|------------------|------------------------------------------|
//! | configs      | `IncidentConfig` | Immutable incident data, insertion order |
//! | states       | `IncidentState`  | Mutable incident state, same positions   |
//! | donations    | `Donation`       | Append-only donation records             |
//!
//! ## Identity
//!
//! Ids and transaction references are produced by one [`IdGenerator`]. The
//! default [`SequentialIds`] hands out `incident-N` / `donation-N` from
//! monotonic counters and `0x`-prefixed 40 hex digit transaction references.
//!
//! ## Atomicity
//!
//! [`IncidentStore::commit_donation`] writes the incident's new state and the
//! donation record under one write lock, so no reader can observe an updated
//! `amount_funded` without the matching donation or the other way round.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::types::{
    Amount, Donation, DonationId, DonationStatus, Incident, IncidentConfig, IncidentId, IncidentState,
    IncidentStatus, NewDonation, NewIncident, TransactionRef,
};

const INCIDENT_PREFIX: &str = "incident-";
const DONATION_PREFIX: &str = "donation-";

// ── Id generation ────────────────────────────────────────────────────

/// Source of fresh record identities. Every value returned must be unique
/// for the lifetime of the store that owns the generator.
pub trait IdGenerator: Send + Sync {
    fn next_incident_id(&self) -> IncidentId;
    fn next_donation_id(&self) -> DonationId;
    fn next_transaction_ref(&self) -> TransactionRef;
}

/// Counter-backed ids.
///
/// Transaction references are a 12-byte salt followed by the big-endian
/// counter, hex encoded. The salt distinguishes generators created at
/// different times (e.g. across restarts).
#[derive(Debug)]
pub struct SequentialIds {
    incidents: AtomicU64,
    donations: AtomicU64,
    transactions: AtomicU64,
    salt: [u8; 12],
}

impl SequentialIds {
    pub fn new() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let mut salt = [0u8; 12];
        salt[..8].copy_from_slice(&nanos.to_be_bytes());
        salt[8..].copy_from_slice(&std::process::id().to_be_bytes());
        Self::with_salt(salt)
    }

    pub fn with_salt(salt: [u8; 12]) -> Self {
        Self {
            incidents: AtomicU64::new(0),
            donations: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            salt,
        }
    }

    /// Continue numbering after the given last-used sequence numbers.
    pub fn resume_after(mut self, last_incident: u64, last_donation: u64) -> Self {
        self.incidents = AtomicU64::new(last_incident);
        self.donations = AtomicU64::new(last_donation);
        self.transactions = AtomicU64::new(last_donation);
        self
    }

    /// Atomically increments `counter`, returning the new (1-based) value.
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_incident_id(&self) -> IncidentId {
        IncidentId::new(format!("{INCIDENT_PREFIX}{}", Self::bump(&self.incidents)))
    }

    fn next_donation_id(&self) -> DonationId {
        DonationId::new(format!("{DONATION_PREFIX}{}", Self::bump(&self.donations)))
    }

    fn next_transaction_ref(&self) -> TransactionRef {
        let seq = Self::bump(&self.transactions);
        let mut raw = [0u8; 20];
        raw[..12].copy_from_slice(&self.salt);
        raw[12..].copy_from_slice(&seq.to_be_bytes());
        TransactionRef::new(format!("0x{}", hex::encode(raw)))
    }
}

/// Numeric suffix of a generated id, if it has the expected prefix.
fn sequence_of(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}

// ── Store abstraction ────────────────────────────────────────────────

/// Authoritative collections of incidents and donations.
///
/// There are no delete operations. Incidents are only ever appended and
/// their mutable half replaced; donations are append-only.
pub trait IncidentStore: Send + Sync {
    /// Validate and append a new incident in `submitted` status.
    fn insert_incident(&self, submission: NewIncident, created_at: DateTime<Utc>)
        -> Result<Incident>;

    /// Append a donation record. Fails with [`Error::NotFound`] when the
    /// referenced incident does not exist. Does not touch `amount_funded`;
    /// use [`IncidentStore::commit_donation`] for the paired update.
    fn insert_donation(&self, donation: NewDonation) -> Result<Donation>;

    fn find_incident_by_id(&self, id: &IncidentId) -> Option<Incident>;

    /// All incidents in insertion order.
    fn list_incidents(&self) -> Vec<Incident>;

    /// All donations in insertion order.
    fn list_donations(&self) -> Vec<Donation>;

    fn list_donations_by_donor(&self, donor_id: &str) -> Vec<Donation>;

    /// Both collections read under one lock, in insertion order.
    fn snapshot(&self) -> (Vec<Incident>, Vec<Donation>);

    /// Replace the mutable state of one incident.
    fn save_incident_state(&self, id: &IncidentId, state: IncidentState) -> Result<Incident>;

    /// Write `state` for the donation's incident and append the donation,
    /// as one atomic step.
    fn commit_donation(
        &self,
        state: IncidentState,
        donation: NewDonation,
    ) -> Result<(Incident, Donation)>;
}

// ── In-memory store ──────────────────────────────────────────────────

#[derive(Default)]
struct Ledger {
    configs: Vec<IncidentConfig>,
    states: Vec<IncidentState>,
    positions: HashMap<IncidentId, usize>,
    donations: Vec<Donation>,
}

impl Ledger {
    fn position(&self, id: &IncidentId) -> Result<usize> {
        self.positions
            .get(id)
            .copied()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    fn incident_at(&self, pos: usize) -> Incident {
        Incident::from_parts(self.configs[pos].clone(), self.states[pos].clone())
    }

    fn push_incident(&mut self, config: IncidentConfig, state: IncidentState) -> usize {
        let pos = self.configs.len();
        self.positions.insert(config.id.clone(), pos);
        self.configs.push(config);
        self.states.push(state);
        pos
    }

    fn push_donation(&mut self, ids: &dyn IdGenerator, donation: NewDonation) -> Result<Donation> {
        self.position(&donation.incident_id)?;
        let record = Donation {
            id: ids.next_donation_id(),
            donor_id: donation.donor_id,
            donor_name: donation.donor_name,
            incident_id: donation.incident_id,
            amount: donation.amount,
            created_at: donation.created_at,
            transaction_ref: ids.next_transaction_ref(),
            status: DonationStatus::Completed,
        };
        self.donations.push(record.clone());
        Ok(record)
    }
}

/// Process-local [`IncidentStore`]. All state is lost on drop.
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
    ids: Box<dyn IdGenerator>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_ids(SequentialIds::new())
    }

    pub fn with_ids(ids: impl IdGenerator + 'static) -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            ids: Box::new(ids),
        }
    }

    /// Rebuild a store from previously persisted records.
    ///
    /// Rejects record sets with duplicate ids, donations pointing at unknown
    /// incidents, an `amount_funded` that disagrees with the incident's
    /// completed donations, or verifier fields or funding inconsistent with
    /// the status.
    /// Id counters resume after the highest restored sequence numbers.
    pub fn restore(incidents: Vec<Incident>, donations: Vec<Donation>) -> Result<Self> {
        let mut ledger = Ledger::default();
        let mut last_incident = 0;
        for incident in incidents {
            if ledger.positions.contains_key(&incident.id) {
                return Err(Error::Validation(format!(
                    "duplicate incident id {}",
                    incident.id
                )));
            }
            if incident.amount_needed <= 0 || incident.amount_funded < 0 {
                return Err(Error::Validation(format!(
                    "incident {} has invalid amounts",
                    incident.id
                )));
            }
            let verified = incident.status >= IncidentStatus::Verified;
            let has_verifier = incident.verifier_id.is_some() && incident.verifier_name.is_some();
            if verified != has_verifier {
                return Err(Error::Validation(format!(
                    "incident {} verifier fields do not match status {}",
                    incident.id, incident.status
                )));
            }
            if let Some(reason) = funding_conflict(&incident) {
                return Err(Error::Validation(format!(
                    "incident {} is {} but {reason}",
                    incident.id, incident.status
                )));
            }
            if let Some(seq) = sequence_of(incident.id.as_str(), INCIDENT_PREFIX) {
                last_incident = last_incident.max(seq);
            }
            let state = incident.state();
            ledger.push_incident(incident.config(), state);
        }

        let mut funded: Vec<Amount> = vec![0; ledger.configs.len()];
        let mut seen = HashSet::new();
        let mut last_donation = 0;
        for donation in donations {
            let pos = ledger.position(&donation.incident_id)?;
            if !seen.insert(donation.id.clone()) {
                return Err(Error::Validation(format!(
                    "duplicate donation id {}",
                    donation.id
                )));
            }
            if donation.amount <= 0 {
                return Err(Error::Validation(format!(
                    "donation {} has non-positive amount",
                    donation.id
                )));
            }
            if donation.status == DonationStatus::Completed {
                funded[pos] = funded[pos].checked_add(donation.amount).ok_or_else(|| {
                    Error::Validation(format!("donations to {} overflow", donation.incident_id))
                })?;
            }
            if let Some(seq) = sequence_of(donation.id.as_str(), DONATION_PREFIX) {
                last_donation = last_donation.max(seq);
            }
            ledger.donations.push(donation);
        }

        for (pos, total) in funded.into_iter().enumerate() {
            if ledger.states[pos].amount_funded != total {
                return Err(Error::Validation(format!(
                    "incident {} records {} funded but its donations sum to {}",
                    ledger.configs[pos].id, ledger.states[pos].amount_funded, total
                )));
            }
        }

        debug!(
            incidents = ledger.configs.len(),
            donations = ledger.donations.len(),
            "restored in-memory store"
        );
        Ok(Self {
            ledger: RwLock::new(ledger),
            ids: Box::new(SequentialIds::new().resume_after(last_incident, last_donation)),
        })
    }
}

/// A status the engine could not have produced for this funding level.
fn funding_conflict(incident: &Incident) -> Option<&'static str> {
    let reached = incident.amount_funded >= incident.amount_needed;
    match incident.status {
        IncidentStatus::Submitted if incident.amount_funded != 0 => Some("has funds"),
        IncidentStatus::Verified if reached => Some("already reached its target"),
        IncidentStatus::Funded | IncidentStatus::Completed if !reached => {
            Some("is short of its target")
        }
        _ => None,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentStore for MemoryStore {
    fn insert_incident(
        &self,
        submission: NewIncident,
        created_at: DateTime<Utc>,
    ) -> Result<Incident> {
        submission.validate()?;
        let id = self.ids.next_incident_id();
        let config = IncidentConfig::from_submission(id, submission, created_at);
        let mut ledger = self.ledger.write();
        let pos = ledger.push_incident(config, IncidentState::submitted());
        let incident = ledger.incident_at(pos);
        debug!(incident_id = %incident.id, "stored incident");
        Ok(incident)
    }

    fn insert_donation(&self, donation: NewDonation) -> Result<Donation> {
        let mut ledger = self.ledger.write();
        let record = ledger.push_donation(self.ids.as_ref(), donation)?;
        debug!(donation_id = %record.id, incident_id = %record.incident_id, "stored donation");
        Ok(record)
    }

    fn find_incident_by_id(&self, id: &IncidentId) -> Option<Incident> {
        let ledger = self.ledger.read();
        ledger.positions.get(id).map(|&pos| ledger.incident_at(pos))
    }

    fn list_incidents(&self) -> Vec<Incident> {
        let ledger = self.ledger.read();
        (0..ledger.configs.len())
            .map(|pos| ledger.incident_at(pos))
            .collect()
    }

    fn list_donations(&self) -> Vec<Donation> {
        self.ledger.read().donations.clone()
    }

    fn list_donations_by_donor(&self, donor_id: &str) -> Vec<Donation> {
        self.ledger
            .read()
            .donations
            .iter()
            .filter(|d| d.donor_id == donor_id)
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> (Vec<Incident>, Vec<Donation>) {
        let ledger = self.ledger.read();
        let incidents = (0..ledger.configs.len())
            .map(|pos| ledger.incident_at(pos))
            .collect();
        (incidents, ledger.donations.clone())
    }

    fn save_incident_state(&self, id: &IncidentId, state: IncidentState) -> Result<Incident> {
        let mut ledger = self.ledger.write();
        let pos = ledger.position(id)?;
        ledger.states[pos] = state;
        Ok(ledger.incident_at(pos))
    }

    fn commit_donation(
        &self,
        state: IncidentState,
        donation: NewDonation,
    ) -> Result<(Incident, Donation)> {
        let mut ledger = self.ledger.write();
        let pos = ledger.position(&donation.incident_id)?;
        let record = ledger.push_donation(self.ids.as_ref(), donation)?;
        ledger.states[pos] = state;
        debug!(donation_id = %record.id, incident_id = %record.incident_id, "committed donation");
        Ok((ledger.incident_at(pos), record))
    }
}
