//! Row shapes for the SQLite mirror and their conversions to engine types.
//!
//! Timestamps are stored as Unix milliseconds; enums as their lowercase names.

use chrono::{DateTime, Utc};
use relief_engine::{
    Donation, DonationId, DonationStatus, Incident, IncidentId, IncidentStatus, Severity,
    TransactionRef,
};
use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentRow {
    pub id: String,
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub location: String,
    pub cause: String,
    pub description: String,
    pub severity: String,
    pub image_url: Option<String>,
    pub amount_needed: i64,
    pub amount_funded: i64,
    pub status: String,
    pub verifier_id: Option<String>,
    pub verifier_name: Option<String>,
    pub created_at: i64,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = GatewayError;

    fn try_from(row: IncidentRow) -> Result<Self> {
        Ok(Incident {
            severity: parse_field::<Severity>(&row.id, "severity", &row.severity)?,
            status: parse_field::<IncidentStatus>(&row.id, "status", &row.status)?,
            created_at: from_millis(&row.id, row.created_at)?,
            id: IncidentId::new(row.id),
            beneficiary_id: row.beneficiary_id,
            beneficiary_name: row.beneficiary_name,
            location: row.location,
            cause: row.cause,
            description: row.description,
            image_url: row.image_url,
            amount_needed: row.amount_needed,
            amount_funded: row.amount_funded,
            verifier_id: row.verifier_id,
            verifier_name: row.verifier_name,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
    pub donor_name: String,
    pub incident_id: String,
    pub amount: i64,
    pub transaction_ref: String,
    pub status: String,
    pub created_at: i64,
}

impl TryFrom<DonationRow> for Donation {
    type Error = GatewayError;

    fn try_from(row: DonationRow) -> Result<Self> {
        Ok(Donation {
            status: parse_field::<DonationStatus>(&row.id, "status", &row.status)?,
            created_at: from_millis(&row.id, row.created_at)?,
            id: DonationId::new(row.id),
            donor_id: row.donor_id,
            donor_name: row.donor_name,
            incident_id: IncidentId::new(row.incident_id),
            amount: row.amount,
            transaction_ref: TransactionRef::new(row.transaction_ref),
        })
    }
}

/// A lifecycle event as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_type: String,
    pub incident_id: String,
    pub actor: Option<String>,
    pub amount: Option<i64>,
    pub donation_id: Option<String>,
    pub status: String,
    pub timestamp: i64,
    pub created_at: i64,
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(record: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| GatewayError::Corrupt(format!("{record}: timestamp {millis} out of range")))
}

fn parse_field<T>(record: &str, field: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = relief_engine::Error>,
{
    raw.parse()
        .map_err(|e| GatewayError::Corrupt(format!("{record}: bad {field}: {e}")))
}
