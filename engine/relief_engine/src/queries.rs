//! # Queries
//!
//! Read-only projections over an [`IncidentStore`]. Nothing here mutates.
//!
//! | Reader      | Projection(s)                                             |
//! |-------------|-----------------------------------------------------------|
//! | Beneficiary | [`incidents_for_actor`], [`status_counts_for_actor`]      |
//! | Verifier    | [`incidents_by_status`], [`status_counts`], [`total_funded`] |
//! | Donor       | [`incidents_by_status`], [`donations_for_donor`], [`total_donated_by_donor`] |

use serde::{Deserialize, Serialize};

use crate::storage::IncidentStore;
use crate::types::{Amount, Donation, Incident, IncidentId, IncidentStatus};

/// Incidents whose status is exactly `status`, in insertion order.
pub fn incidents_by_status<S>(store: &S, status: IncidentStatus) -> Vec<Incident>
where
    S: IncidentStore + ?Sized,
{
    store
        .list_incidents()
        .into_iter()
        .filter(|i| i.status == status)
        .collect()
}

/// Incidents reported by the given beneficiary, in insertion order.
pub fn incidents_for_actor<S>(store: &S, actor_id: &str) -> Vec<Incident>
where
    S: IncidentStore + ?Sized,
{
    store
        .list_incidents()
        .into_iter()
        .filter(|i| i.beneficiary_id == actor_id)
        .collect()
}

pub fn donations_for_donor<S>(store: &S, donor_id: &str) -> Vec<Donation>
where
    S: IncidentStore + ?Sized,
{
    store.list_donations_by_donor(donor_id)
}

/// Donations recorded against one incident, in insertion order.
pub fn donations_for_incident<S>(store: &S, incident_id: &IncidentId) -> Vec<Donation>
where
    S: IncidentStore + ?Sized,
{
    store
        .list_donations()
        .into_iter()
        .filter(|d| &d.incident_id == incident_id)
        .collect()
}

/// Sum of everything `donor_id` has given. Zero for unknown donors.
///
/// Each incident's total is overflow-checked on donation, but a donor's
/// gifts span incidents, so the sum saturates at `Amount::MAX`.
pub fn total_donated_by_donor<S>(store: &S, donor_id: &str) -> Amount
where
    S: IncidentStore + ?Sized,
{
    saturating_sum(
        store
            .list_donations_by_donor(donor_id)
            .iter()
            .map(|d| d.amount),
    )
}

/// Funds raised across all incidents, saturating at `Amount::MAX`.
pub fn total_funded<S>(store: &S) -> Amount
where
    S: IncidentStore + ?Sized,
{
    saturating_sum(store.list_incidents().iter().map(|i| i.amount_funded))
}

fn saturating_sum(amounts: impl Iterator<Item = Amount>) -> Amount {
    amounts.fold(0, Amount::saturating_add)
}

/// `min(1, amount_funded / amount_needed)`, or 0 when there is no target.
pub fn funding_progress(incident: &Incident) -> f64 {
    if incident.amount_needed <= 0 {
        return 0.0;
    }
    let ratio = incident.amount_funded as f64 / incident.amount_needed as f64;
    ratio.clamp(0.0, 1.0)
}

/// Number of incidents in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub submitted: usize,
    pub verified: usize,
    pub funded: usize,
    pub completed: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn tally<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> Self {
        let mut counts = Self::default();
        for incident in incidents {
            match incident.status {
                IncidentStatus::Submitted => counts.submitted += 1,
                IncidentStatus::Verified => counts.verified += 1,
                IncidentStatus::Funded => counts.funded += 1,
                IncidentStatus::Completed => counts.completed += 1,
            }
            counts.total += 1;
        }
        counts
    }

    pub fn get(&self, status: IncidentStatus) -> usize {
        match status {
            IncidentStatus::Submitted => self.submitted,
            IncidentStatus::Verified => self.verified,
            IncidentStatus::Funded => self.funded,
            IncidentStatus::Completed => self.completed,
        }
    }
}

pub fn status_counts<S>(store: &S) -> StatusCounts
where
    S: IncidentStore + ?Sized,
{
    StatusCounts::tally(&store.list_incidents())
}

pub fn status_counts_for_actor<S>(store: &S, actor_id: &str) -> StatusCounts
where
    S: IncidentStore + ?Sized,
{
    StatusCounts::tally(&incidents_for_actor(store, actor_id))
}
