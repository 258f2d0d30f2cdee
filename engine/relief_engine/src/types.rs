//! # Types
//!
//! Shared data structures used across all modules of the relief engine.
//!
//! ## Design decisions
//!
//! ### Config / State split
//!
//! An [`Incident`] is internally stored as two separate records:
//!
//! - [`IncidentConfig`]: written once at submission; never mutated.
//! - [`IncidentState`]: written on verification, on every donation and on release.
//!
//! The public API exposes the reconstructed [`Incident`] struct for convenience.
//!
//! ### Status as a Finite-State Machine
//!
//! [`IncidentStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Submitted ──► Verified ──► Funded ──► Completed
//! ```
//!
//! Backward transitions, skipped steps and transitions out of the terminal
//! `Completed` state are rejected by the engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Whole currency units. Donations and targets are never fractional.
pub type Amount = i64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Stable, opaque identifier of an incident.
    IncidentId
);
string_id!(
    /// Stable, opaque identifier of a donation.
    DonationId
);
string_id!(
    /// Opaque settlement reference attached to each donation. Unique per donation.
    TransactionRef
);

// ── Enumerations ─────────────────────────────────────────────────────

/// How urgent a reported incident is. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::Validation(format!("unknown severity `{other}`"))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an incident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Reported by a beneficiary; awaiting verification.
    Submitted,
    /// Confirmed by a verifier; accepting donations.
    Verified,
    /// Donations reached the amount needed.
    Funded,
    /// Funds released to the beneficiary. Terminal.
    Completed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        Self::Submitted,
        Self::Verified,
        Self::Funded,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::Funded => "funded",
            Self::Completed => "completed",
        }
    }

    /// The single status this one may advance to, if any.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Submitted => Some(Self::Verified),
            Self::Verified => Some(Self::Funded),
            Self::Funded => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successor().is_none()
    }
}

impl FromStr for IncidentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Ok(Self::Submitted),
            "verified" => Ok(Self::Verified),
            "funded" => Ok(Self::Funded),
            "completed" => Ok(Self::Completed),
            other => Err(Error::Validation(format!("unknown incident status `{other}`"))),
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of a donation.
///
/// The engine only ever records `Completed` donations; the other variants keep
/// the record layout compatible with external payment collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DonationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Validation(format!("unknown donation status `{other}`"))),
        }
    }
}

// ── Incidents ────────────────────────────────────────────────────────

/// Verifying organization recorded on an incident.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verifier {
    pub id: String,
    pub name: String,
}

/// A beneficiary's report, before it has been given an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub location: String,
    pub cause: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub image_url: Option<String>,
    pub amount_needed: Amount,
}

impl NewIncident {
    /// Reject submissions with blank required fields or a non-positive target.
    pub fn validate(&self) -> Result<()> {
        require_text("beneficiary_id", &self.beneficiary_id)?;
        require_text("location", &self.location)?;
        require_text("cause", &self.cause)?;
        require_text("description", &self.description)?;
        if self.amount_needed <= 0 {
            return Err(Error::Validation(format!(
                "amount_needed must be positive, got {}",
                self.amount_needed
            )));
        }
        Ok(())
    }
}

/// Immutable incident configuration, written once at submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentConfig {
    pub id: IncidentId,
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub location: String,
    pub cause: String,
    pub description: String,
    pub severity: Severity,
    pub image_url: Option<String>,
    pub amount_needed: Amount,
    pub created_at: DateTime<Utc>,
}

impl IncidentConfig {
    pub fn from_submission(
        id: IncidentId,
        submission: NewIncident,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            beneficiary_id: submission.beneficiary_id,
            beneficiary_name: submission.beneficiary_name,
            location: submission.location,
            cause: submission.cause,
            description: submission.description,
            severity: submission.severity,
            image_url: submission.image_url,
            amount_needed: submission.amount_needed,
            created_at,
        }
    }
}

/// Mutable incident state, updated on verification, donations and release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentState {
    pub status: IncidentStatus,
    pub amount_funded: Amount,
    pub verifier: Option<Verifier>,
}

impl IncidentState {
    /// State of a freshly submitted incident.
    pub fn submitted() -> Self {
        Self {
            status: IncidentStatus::Submitted,
            amount_funded: 0,
            verifier: None,
        }
    }
}

/// Full representation of an incident.
///
/// Used as the public API return type; reconstructed from the split
/// [`IncidentConfig`] + [`IncidentState`] records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub location: String,
    pub cause: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Funding target. Always positive.
    pub amount_needed: Amount,
    /// Sum of all completed donations to this incident.
    pub amount_funded: Amount,
    pub status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Incident {
    pub fn from_parts(config: IncidentConfig, state: IncidentState) -> Self {
        let (verifier_id, verifier_name) = match state.verifier {
            Some(v) => (Some(v.id), Some(v.name)),
            None => (None, None),
        };
        Self {
            id: config.id,
            beneficiary_id: config.beneficiary_id,
            beneficiary_name: config.beneficiary_name,
            location: config.location,
            cause: config.cause,
            description: config.description,
            severity: config.severity,
            image_url: config.image_url,
            amount_needed: config.amount_needed,
            amount_funded: state.amount_funded,
            status: state.status,
            verifier_id,
            verifier_name,
            created_at: config.created_at,
        }
    }

    pub fn config(&self) -> IncidentConfig {
        IncidentConfig {
            id: self.id.clone(),
            beneficiary_id: self.beneficiary_id.clone(),
            beneficiary_name: self.beneficiary_name.clone(),
            location: self.location.clone(),
            cause: self.cause.clone(),
            description: self.description.clone(),
            severity: self.severity,
            image_url: self.image_url.clone(),
            amount_needed: self.amount_needed,
            created_at: self.created_at,
        }
    }

    pub fn state(&self) -> IncidentState {
        let verifier = match (&self.verifier_id, &self.verifier_name) {
            (Some(id), Some(name)) => Some(Verifier {
                id: id.clone(),
                name: name.clone(),
            }),
            _ => None,
        };
        IncidentState {
            status: self.status,
            amount_funded: self.amount_funded,
            verifier,
        }
    }
}

// ── Donations ────────────────────────────────────────────────────────

/// A donation about to be committed, before id and transaction reference exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDonation {
    pub incident_id: IncidentId,
    pub donor_id: String,
    pub donor_name: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// A recorded contribution toward one incident. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub donor_id: String,
    pub donor_name: String,
    pub incident_id: IncidentId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    pub transaction_ref: TransactionRef,
    pub status: DonationStatus,
}

/// Result of a successful donation: the stored record and the incident after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReceipt {
    pub donation: Donation,
    pub incident: Incident,
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(())
}
